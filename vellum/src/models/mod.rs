//! Data models for vellum entities.

mod agent_event;
mod asset;
mod commit;
mod message;
mod variant;

pub use agent_event::{AgentEvent, AgentEventKind, AgentEventStatus, ToolPayload};
pub use asset::{AssetKind, PromptAsset};
pub use commit::{Commit, CommitDraft, CommitKind, PromptContent};
pub use message::{HistoryMessage, MessageRole};
pub use variant::{Variant, VariantStatus};

/// Hash identifying a commit within the graph. `UUIDv7`, so hashes are
/// collision-resistant and sort in creation order.
pub type CommitHash = uuid::Uuid;

/// Identifier of a stored prompt asset.
pub type AssetId = uuid::Uuid;
