//! Commit model: one revision node in the branching history tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AssetId, CommitHash, Variant};

/// Kind of a commit, i.e. which user action produced it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitKind {
    /// First generation from a prompt.
    #[default]
    AiCreate,
    /// Follow-up edit instruction on an existing revision.
    AiEdit,
    /// Imported from user-supplied code, no generation.
    CodeCreate,
    /// Copy of an earlier revision's code, branched from head.
    Revert,
}

impl CommitKind {
    /// Convert kind to its canonical string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AiCreate => "ai_create",
            Self::AiEdit => "ai_edit",
            Self::CodeCreate => "code_create",
            Self::Revert => "revert",
        }
    }
}

impl std::fmt::Display for CommitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User-supplied inputs carried on a commit. Media is referenced by
/// asset id, never duplicated into the commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptContent {
    /// Instruction or description text.
    pub text: String,
    /// Image assets attached to the prompt.
    #[serde(default)]
    pub image_asset_ids: Vec<AssetId>,
    /// Video assets attached to the prompt.
    #[serde(default)]
    pub video_asset_ids: Vec<AssetId>,
}

impl PromptContent {
    /// Create text-only prompt content.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// One revision node in the branching history tree.
///
/// Append-only: once `is_committed` is true the selected variant's
/// code is immutable and further edits must create a child commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    /// Unique hash of this commit within the graph.
    pub hash: CommitHash,
    /// Parent commit, `None` for a lineage root.
    pub parent_hash: Option<CommitHash>,
    /// When the commit was created.
    pub date_created: DateTime<Utc>,
    /// Whether the selected variant's code is frozen.
    pub is_committed: bool,
    /// Which user action produced this commit.
    pub kind: CommitKind,
    /// User inputs, `None` for imported code.
    pub inputs: Option<PromptContent>,
    /// Declared framework of imported code (imports only).
    pub stack: Option<String>,
    /// Candidate generations for this revision.
    pub variants: Vec<Variant>,
    /// Index of the variant shown and carried forward on edits.
    pub selected_variant_index: usize,
}

impl Commit {
    /// The currently selected variant, if the index is valid.
    pub fn selected_variant(&self) -> Option<&Variant> {
        self.variants.get(self.selected_variant_index)
    }

    /// Whether any variant on this commit is still generating.
    pub fn is_generating(&self) -> bool {
        self.variants.iter().any(|v| !v.status.is_terminal())
    }
}

/// Draft handed to the graph; the graph assigns hash and timestamp.
#[derive(Debug, Clone, Default)]
pub struct CommitDraft {
    /// Parent commit, `None` for a lineage root.
    pub parent_hash: Option<CommitHash>,
    /// Which user action produces this commit.
    pub kind: CommitKind,
    /// User inputs, if any.
    pub inputs: Option<PromptContent>,
    /// Declared framework of imported code.
    pub stack: Option<String>,
    /// Initial variants. AI flows leave this empty; the orchestrator
    /// populates one variant per requested model before any channel
    /// opens.
    pub variants: Vec<Variant>,
}
