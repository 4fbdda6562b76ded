//! Saved-document history boundary.
//!
//! The core only needs paged reads and an import bridge; the storage
//! mechanics behind this trait are someone else's problem. The
//! in-memory implementation backs the server and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

/// One previously saved document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedDocument {
    /// When the document was saved.
    pub date_created: DateTime<Utc>,
    /// Document code.
    pub code: String,
    /// Declared framework of the code.
    pub stack: String,
}

/// One page of saved documents, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    /// Documents on this page.
    pub items: Vec<SavedDocument>,
    /// 1-based page number.
    pub page: usize,
    /// Total number of pages.
    pub total_pages: usize,
}

/// External store of saved documents.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Load one page (1-based). An out-of-range page yields an empty
    /// item list, not an error.
    async fn load_page(&self, page: usize) -> HistoryPage;

    /// Persist a document.
    async fn save(&self, code: String, stack: String);
}

/// Volatile store, newest first.
#[derive(Debug)]
pub struct InMemoryHistoryStore {
    documents: RwLock<Vec<SavedDocument>>,
    page_size: usize,
}

impl InMemoryHistoryStore {
    /// Create an empty store with the given page size.
    pub fn new(page_size: usize) -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            page_size: page_size.max(1),
        }
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn load_page(&self, page: usize) -> HistoryPage {
        let documents = self.documents.read().await;
        let total_pages = documents.len().div_ceil(self.page_size);
        let page = page.max(1);
        let start = (page - 1) * self.page_size;
        let items = documents
            .iter()
            .skip(start)
            .take(self.page_size)
            .cloned()
            .collect();
        HistoryPage {
            items,
            page,
            total_pages,
        }
    }

    async fn save(&self, code: String, stack: String) {
        let mut documents = self.documents.write().await;
        documents.insert(
            0,
            SavedDocument {
                date_created: Utc::now(),
                code,
                stack,
            },
        );
    }
}
