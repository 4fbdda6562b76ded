//! Wire contract for generation channels.
//!
//! One channel is opened per variant. The request frame is sent once
//! at open; response frames stream back until the channel closes. The
//! close itself carries the outcome: a normal close means success, a
//! user-initiated close maps to `Cancelled`, anything else to
//! `Failed`.

use serde::{Deserialize, Serialize};

use crate::models::{AgentEventKind, AgentEventStatus, HistoryMessage, MessageRole, ToolPayload};

/// Whether the request starts a document or edits an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationType {
    /// First generation from a prompt.
    Create,
    /// Follow-up edit on an existing lineage.
    Update,
}

/// Primary medium of the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    /// Prompt is driven by one or more images.
    Image,
    /// Prompt is driven by a screen recording.
    Video,
    /// Prompt is text only.
    Text,
}

/// Prompt block of a request frame. Media is sent inline as data URIs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptPayload {
    /// Instruction or description text.
    pub text: String,
    /// Image data URIs.
    #[serde(default)]
    pub images: Vec<String>,
    /// Video data URIs.
    #[serde(default)]
    pub videos: Vec<String>,
}

/// One turn of conversation context sent with an update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    /// Sender role.
    pub role: MessageRole,
    /// Text content (prompt text or generated code).
    pub text: String,
    /// Image data URIs attached to the turn.
    #[serde(default)]
    pub images: Vec<String>,
    /// Video data URIs attached to the turn.
    #[serde(default)]
    pub videos: Vec<String>,
}

/// Request frame, sent once when a channel opens.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Create or update.
    pub generation_type: GenerationType,
    /// Primary medium of the prompt.
    pub input_mode: InputMode,
    /// Prompt text and inline media.
    pub prompt: PromptPayload,
    /// Root-first conversation context for updates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<WireMessage>,
    /// Model to generate with.
    pub model: String,
}

impl GenerationRequest {
    /// Conversation seed for the variant this request produces: the
    /// wire history as text turns plus the trailing user prompt.
    pub fn seed_history(&self) -> Vec<HistoryMessage> {
        let mut history: Vec<HistoryMessage> = self
            .history
            .iter()
            .map(|m| HistoryMessage::text(m.role, m.text.clone()))
            .collect();
        history.push(HistoryMessage::text(
            MessageRole::User,
            self.prompt.text.clone(),
        ));
        history
    }
}

/// Agent-trace step carried on an `agentEvent` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentEventFrame {
    /// Backend-assigned event id; a repeated id finalizes the earlier
    /// running event in place.
    pub id: String,
    /// Kind of step.
    pub kind: AgentEventKind,
    /// Status carried by this frame.
    pub status: AgentEventStatus,
    /// Text content, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool name for tool steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Tool input for tool steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<ToolPayload>,
    /// Tool output, present on finalizing frames.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<ToolPayload>,
}

/// Response frame streamed over a generation channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum StreamFrame {
    /// Incremental token, appended to the variant's code.
    Chunk(String),
    /// Full replacement of the variant's code.
    SetCode(String),
    /// Human-readable progress line; only the latest value is kept.
    Status(String),
    /// Incremental reasoning text.
    Thinking(String),
    /// Agent-trace step.
    AgentEvent(AgentEventFrame),
    /// Fatal-to-this-variant error. Does not affect sibling variants.
    Error(String),
}

impl StreamFrame {
    /// Parse one newline-delimited frame. Blank lines yield `None`;
    /// unparseable lines also yield `None` so a stray transport
    /// artifact never kills the channel.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        serde_json::from_str(line).ok()
    }
}

/// Outcome of a channel, decided exactly once at teardown and mapped
/// deterministically to the variant's terminal status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    /// Channel closed normally; the variant completed.
    Completed,
    /// Close was caller-initiated; the variant was cancelled.
    Cancelled,
    /// Transport error or abnormal close.
    Failed(String),
}
