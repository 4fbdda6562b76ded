//! Session events broadcast to observers (WebSocket clients, the demo
//! printer, tests).

use serde::Serialize;

use crate::models::{CommitHash, CommitKind, VariantStatus};
use crate::session::AppState;

/// One observable change to session state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A commit was added to the graph.
    CommitCreated {
        hash: CommitHash,
        kind: CommitKind,
    },
    /// A variant's code changed. Chunk-driven notifications are
    /// throttled; the carried code is always the current value.
    VariantCode {
        hash: CommitHash,
        variant: usize,
        code: String,
    },
    /// A variant's transient progress line changed.
    VariantStatusText {
        hash: CommitHash,
        variant: usize,
        text: String,
    },
    /// A variant reached a terminal status. Never throttled.
    VariantTerminal {
        hash: CommitHash,
        variant: usize,
        status: VariantStatus,
        error: Option<String>,
    },
    /// The session state machine moved.
    StateChanged { state: AppState },
}
