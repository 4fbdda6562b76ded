//! History message model: one turn of the prompt/response lineage
//! behind a variant's code.

use serde::{Deserialize, Serialize};

use super::AssetId;

/// Role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the user.
    User,
    /// Message from the assistant.
    Assistant,
}

impl MessageRole {
    /// Convert role to its canonical string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One message in the conversation context that produced a variant.
///
/// This lineage is independent of the commit graph's parent pointers;
/// it is the exact sequence resubmitted to the backend on edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Role of the message sender.
    pub role: MessageRole,
    /// Text content of the message.
    pub text: String,
    /// Image assets attached to this message.
    #[serde(default)]
    pub image_asset_ids: Vec<AssetId>,
    /// Video assets attached to this message.
    #[serde(default)]
    pub video_asset_ids: Vec<AssetId>,
}

impl HistoryMessage {
    /// Create a text-only message.
    pub fn text(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            image_asset_ids: Vec::new(),
            video_asset_ids: Vec::new(),
        }
    }
}
