//! Deduplicated store for prompt media.
//!
//! Payloads are content-addressed by value: registering an identical
//! payload for the same kind returns the existing id instead of
//! storing a second copy. Assets are immutable and live for the whole
//! session.

use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{AssetId, AssetKind, PromptAsset};

/// In-session store of prompt assets, keyed by id with a value index
/// for deduplication.
#[derive(Debug, Default)]
pub struct AssetStore {
    assets: HashMap<AssetId, PromptAsset>,
    by_payload: HashMap<(AssetKind, String), AssetId>,
}

impl AssetStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register payloads, returning one id per payload in order.
    ///
    /// A payload already stored under the same kind yields its
    /// existing id; new payloads are inserted under a fresh id.
    pub fn register_assets(
        &mut self,
        kind: AssetKind,
        payloads: impl IntoIterator<Item = String>,
    ) -> Vec<AssetId> {
        payloads
            .into_iter()
            .map(|payload| {
                if let Some(id) = self.by_payload.get(&(kind, payload.clone())) {
                    return *id;
                }
                let id = Uuid::now_v7();
                self.by_payload.insert((kind, payload.clone()), id);
                self.assets.insert(id, PromptAsset { id, kind, payload });
                id
            })
            .collect()
    }

    /// Resolve ids back to payloads, silently dropping ids with no
    /// matching asset so an incomplete bookkeeping never fails the
    /// whole request.
    pub fn resolve(&self, ids: &[AssetId]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| self.assets.get(id).map(|a| a.payload.clone()))
            .collect()
    }

    /// Look up a single asset.
    pub fn get(&self, id: AssetId) -> Option<&PromptAsset> {
        self.assets.get(&id)
    }

    /// Number of distinct assets stored.
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether the store holds no assets.
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
