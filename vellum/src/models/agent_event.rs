//! Agent event model: one step in a variant's generation trace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of agent event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentEventKind {
    /// Internal reasoning step.
    Thinking,
    /// Assistant-visible message.
    Assistant,
    /// Tool invocation.
    Tool,
}

/// Status of an agent event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentEventStatus {
    /// Event is still in progress.
    Running,
    /// Event finished successfully.
    Complete,
    /// Event finished with an error.
    Error,
}

impl AgentEventStatus {
    /// Convert status to its canonical string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for AgentEventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload of a tool invocation.
///
/// Known tools get typed payloads; anything else is carried as opaque
/// JSON so unrecognized backend tools still round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolPayload {
    /// A tool this build knows the shape of.
    Known(KnownToolPayload),
    /// Forward-compatibility fallback for unrecognized tools.
    Opaque(Value),
}

/// Typed payloads for tools the backend is known to expose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "args", rename_all = "snake_case")]
pub enum KnownToolPayload {
    /// Web search issued while generating.
    WebSearch { query: String },
    /// Remote asset fetched for embedding in the document.
    FetchAsset { url: String },
}

/// One step (thinking / assistant message / tool call) in a variant's
/// generation trace. Append-only, except that a `Running` event may be
/// finalized in place once its terminal frame arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Backend-assigned identifier, used to match the finalizing frame.
    pub id: String,
    /// Kind of step.
    pub kind: AgentEventKind,
    /// Current status of the step.
    pub status: AgentEventStatus,
    /// Text content (thinking or assistant events).
    pub content: Option<String>,
    /// Tool name (tool events).
    pub tool_name: Option<String>,
    /// Tool input (tool events).
    pub input: Option<ToolPayload>,
    /// Tool output, set when the event is finalized.
    pub output: Option<ToolPayload>,
    /// When the step started.
    pub started_at: DateTime<Utc>,
    /// When the step ended (if finalized).
    pub ended_at: Option<DateTime<Utc>>,
}

impl AgentEvent {
    /// Finalize a running event in place. No-op if the event already
    /// reached a terminal status.
    pub fn finalize(&mut self, status: AgentEventStatus, output: Option<ToolPayload>) {
        if self.status != AgentEventStatus::Running {
            return;
        }
        self.status = status;
        if output.is_some() {
            self.output = output;
        }
        self.ended_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tool_payload_round_trips() {
        let payload = ToolPayload::Known(KnownToolPayload::WebSearch {
            query: "pricing page layouts".to_string(),
        });
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("web_search"));
        let back: ToolPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn unknown_tool_payload_falls_back_to_opaque() {
        let json = r#"{"tool":"render_chart","series":[1,2,3]}"#;
        let payload: ToolPayload = serde_json::from_str(json).unwrap();
        match payload {
            ToolPayload::Opaque(v) => assert_eq!(v["tool"], "render_chart"),
            ToolPayload::Known(_) => panic!("unexpected known payload"),
        }
    }

    #[test]
    fn finalize_is_single_shot() {
        let mut event = AgentEvent {
            id: "ev-1".to_string(),
            kind: AgentEventKind::Tool,
            status: AgentEventStatus::Running,
            content: None,
            tool_name: Some("web_search".to_string()),
            input: None,
            output: None,
            started_at: Utc::now(),
            ended_at: None,
        };

        event.finalize(AgentEventStatus::Complete, None);
        assert_eq!(event.status, AgentEventStatus::Complete);
        let ended = event.ended_at;
        assert!(ended.is_some());

        // A second terminal frame must not rewrite the outcome.
        event.finalize(AgentEventStatus::Error, None);
        assert_eq!(event.status, AgentEventStatus::Complete);
        assert_eq!(event.ended_at, ended);
    }
}
