//! Variant model: one candidate generation for a commit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AgentEvent, HistoryMessage};

/// Status of a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantStatus {
    /// Variant's channel is still streaming.
    Generating,
    /// Variant completed successfully.
    Complete,
    /// Variant was cancelled by the user.
    Cancelled,
    /// Variant failed with an error.
    Error,
}

impl VariantStatus {
    /// Convert status to its canonical string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Generating => "generating",
            Self::Complete => "complete",
            Self::Cancelled => "cancelled",
            Self::Error => "error",
        }
    }

    /// Whether this status is terminal. A variant reaches a terminal
    /// status exactly once and is immutable afterwards.
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Generating)
    }
}

impl std::fmt::Display for VariantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One of several concurrently generated candidate codes for a commit.
///
/// Owned exclusively by its commit; mutated only by frames arriving on
/// its own channel or by explicit cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    /// Generated document code (grows while streaming).
    pub code: String,
    /// Prompt/response lineage consumed to produce this code.
    pub history: Vec<HistoryMessage>,
    /// Current status.
    pub status: VariantStatus,
    /// Error message, set when `status` is `Error`.
    pub error_message: Option<String>,
    /// Accumulated reasoning text.
    pub thinking: Option<String>,
    /// When the first thinking delta arrived.
    pub thinking_started_at: Option<DateTime<Utc>>,
    /// Total thinking time in milliseconds, computed at completion.
    pub thinking_duration_ms: Option<i64>,
    /// Latest human-readable progress line from the backend.
    pub status_text: Option<String>,
    /// Generation trace (thinking / assistant / tool steps).
    pub agent_events: Vec<AgentEvent>,
    /// Model that produced (or is producing) this variant.
    pub model: String,
    /// When the generation request was issued.
    pub request_started_at: Option<DateTime<Utc>>,
    /// When the variant reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Variant {
    /// Create a variant in `Generating` status for a freshly opened
    /// channel.
    pub fn generating(model: impl Into<String>, history: Vec<HistoryMessage>) -> Self {
        Self {
            code: String::new(),
            history,
            status: VariantStatus::Generating,
            error_message: None,
            thinking: None,
            thinking_started_at: None,
            thinking_duration_ms: None,
            status_text: None,
            agent_events: Vec::new(),
            model: model.into(),
            request_started_at: Some(Utc::now()),
            completed_at: None,
        }
    }

    /// Create an already-complete variant holding known code (imports
    /// and reverts; no channel is ever opened for these).
    pub fn complete(code: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            history: Vec::new(),
            status: VariantStatus::Complete,
            error_message: None,
            thinking: None,
            thinking_started_at: None,
            thinking_duration_ms: None,
            status_text: None,
            agent_events: Vec::new(),
            model: model.into(),
            request_started_at: None,
            completed_at: Some(Utc::now()),
        }
    }
}
