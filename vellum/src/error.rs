//! Typed failure taxonomy for session operations.
//!
//! Structural invariant violations (`DanglingParent`, `MalformedHistory`)
//! are hard failures and are never retried. Per-variant generation
//! failures never surface here; they stay local to the failing variant
//! as its `error_message`.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised by the commit graph, history renderer, and session
/// controller.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A commit draft referenced a parent that is not in the graph.
    #[error("parent commit not found: {0}")]
    DanglingParent(Uuid),

    /// A lookup addressed a commit hash that is not in the graph.
    #[error("commit not found: {0}")]
    CommitNotFound(Uuid),

    /// A variant index was out of range for the addressed commit.
    #[error("variant index {index} out of range for commit {hash} ({len} variants)")]
    VariantOutOfRange { hash: Uuid, index: usize, len: usize },

    /// A lineage walk hit a dangling parent pointer. This signals
    /// corrupted state and is not recoverable.
    #[error("history chain broken: commit {child} references missing parent {parent}")]
    MalformedHistory { child: Uuid, parent: Uuid },

    /// Revert was requested while a generation is in flight.
    #[error("cannot revert during generation")]
    RevertBlocked,

    /// An operation required a head commit but the session has none.
    #[error("session has no head commit")]
    NoHead,

    /// Regenerate was requested on a commit that carries no prompt
    /// (imported code or a revert).
    #[error("commit has no prompt inputs to regenerate")]
    NoPromptInputs,

    /// The generation backend refused to open a channel.
    #[error("generation backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;
