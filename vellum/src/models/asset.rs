//! Prompt asset model for binary media referenced by commits.

use serde::{Deserialize, Serialize};

use super::AssetId;

/// Kind of a prompt asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Still image (screenshot, mockup).
    Image,
    /// Screen recording or other video.
    Video,
}

impl AssetKind {
    /// Convert kind to its canonical string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A piece of prompt media, stored once and referenced by id.
///
/// Owned exclusively by the asset store. Immutable after creation and
/// never deleted within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptAsset {
    /// Unique identifier for the asset.
    pub id: AssetId,
    /// Kind of media this asset holds.
    pub kind: AssetKind,
    /// Media payload as a data URI.
    pub payload: String,
}
