//! Append-only, parent-linked tree of commits.
//!
//! The graph is the single authority on commit identity: it assigns
//! hashes, stamps creation times, and records insertion order (the
//! tie-break used when two commits share a timestamp). Commits are
//! never destroyed during a session.

use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{Result, SessionError};
use crate::models::{Commit, CommitDraft, CommitHash};

/// In-session commit graph keyed by hash.
#[derive(Debug, Default)]
pub struct CommitGraph {
    commits: HashMap<CommitHash, Commit>,
    /// Hashes in insertion order.
    order: Vec<CommitHash>,
}

impl CommitGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a commit from a draft, assigning a fresh hash and
    /// creation timestamp.
    ///
    /// # Errors
    ///
    /// `DanglingParent` if the draft names a parent that is not in the
    /// graph.
    pub fn create_commit(&mut self, draft: CommitDraft) -> Result<CommitHash> {
        if let Some(parent) = draft.parent_hash {
            if !self.commits.contains_key(&parent) {
                return Err(SessionError::DanglingParent(parent));
            }
        }

        let hash = Uuid::now_v7();
        let commit = Commit {
            hash,
            parent_hash: draft.parent_hash,
            date_created: Utc::now(),
            is_committed: false,
            kind: draft.kind,
            inputs: draft.inputs,
            stack: draft.stack,
            variants: draft.variants,
            selected_variant_index: 0,
        };
        self.commits.insert(hash, commit);
        self.order.push(hash);
        Ok(hash)
    }

    /// Look up a commit.
    pub fn get(&self, hash: CommitHash) -> Option<&Commit> {
        self.commits.get(&hash)
    }

    /// Look up a commit mutably.
    pub fn get_mut(&mut self, hash: CommitHash) -> Option<&mut Commit> {
        self.commits.get_mut(&hash)
    }

    /// Look up a commit, failing with `CommitNotFound`.
    pub fn require(&self, hash: CommitHash) -> Result<&Commit> {
        self.get(hash).ok_or(SessionError::CommitNotFound(hash))
    }

    /// Select which variant a commit shows and carries forward.
    ///
    /// # Errors
    ///
    /// `VariantOutOfRange` if `index` does not address an existing
    /// variant.
    pub fn set_selected_variant(&mut self, hash: CommitHash, index: usize) -> Result<()> {
        let commit = self
            .commits
            .get_mut(&hash)
            .ok_or(SessionError::CommitNotFound(hash))?;
        if index >= commit.variants.len() {
            return Err(SessionError::VariantOutOfRange {
                hash,
                index,
                len: commit.variants.len(),
            });
        }
        commit.selected_variant_index = index;
        Ok(())
    }

    /// Freeze a commit's selected code. Idempotent.
    pub fn mark_committed(&mut self, hash: CommitHash) -> Result<()> {
        let commit = self
            .commits
            .get_mut(&hash)
            .ok_or(SessionError::CommitNotFound(hash))?;
        commit.is_committed = true;
        Ok(())
    }

    /// All commits in insertion order.
    pub fn ordered(&self) -> Vec<&Commit> {
        self.order
            .iter()
            .filter_map(|hash| self.commits.get(hash))
            .collect()
    }

    /// Number of commits in the graph.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the graph holds no commits.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CommitKind, PromptContent, Variant};

    fn draft(parent: Option<CommitHash>) -> CommitDraft {
        CommitDraft {
            parent_hash: parent,
            kind: CommitKind::AiCreate,
            inputs: Some(PromptContent::text("button")),
            stack: None,
            variants: vec![Variant::complete("<html></html>", "test-model")],
        }
    }

    #[test]
    fn hashes_are_pairwise_distinct() {
        let mut graph = CommitGraph::new();
        let mut hashes = Vec::new();
        for _ in 0..64 {
            hashes.push(graph.create_commit(draft(None)).unwrap());
        }
        let mut deduped = hashes.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), hashes.len());
    }

    #[test]
    fn every_non_root_parent_resolves() {
        let mut graph = CommitGraph::new();
        let root = graph.create_commit(draft(None)).unwrap();
        let child = graph.create_commit(draft(Some(root))).unwrap();
        for commit in graph.ordered() {
            if let Some(parent) = commit.parent_hash {
                assert!(graph.get(parent).is_some());
            }
        }
        assert_eq!(graph.get(child).unwrap().parent_hash, Some(root));
    }

    #[test]
    fn dangling_parent_is_rejected() {
        let mut graph = CommitGraph::new();
        let missing = Uuid::now_v7();
        let err = graph.create_commit(draft(Some(missing))).unwrap_err();
        assert!(matches!(err, SessionError::DanglingParent(p) if p == missing));
        assert!(graph.is_empty());
    }

    #[test]
    fn selected_variant_index_is_validated() {
        let mut graph = CommitGraph::new();
        let hash = graph.create_commit(draft(None)).unwrap();
        assert!(graph.set_selected_variant(hash, 0).is_ok());
        let err = graph.set_selected_variant(hash, 1).unwrap_err();
        assert!(matches!(
            err,
            SessionError::VariantOutOfRange { index: 1, len: 1, .. }
        ));
    }

    #[test]
    fn mark_committed_is_idempotent() {
        let mut graph = CommitGraph::new();
        let hash = graph.create_commit(draft(None)).unwrap();
        graph.mark_committed(hash).unwrap();
        graph.mark_committed(hash).unwrap();
        assert!(graph.get(hash).unwrap().is_committed);
    }

    #[test]
    fn ordered_preserves_insertion_order() {
        let mut graph = CommitGraph::new();
        let a = graph.create_commit(draft(None)).unwrap();
        let b = graph.create_commit(draft(Some(a))).unwrap();
        let c = graph.create_commit(draft(Some(a))).unwrap();
        let hashes: Vec<_> = graph.ordered().iter().map(|c| c.hash).collect();
        assert_eq!(hashes, vec![a, b, c]);
    }
}
