//! Streaming generation: wire frames, the backend boundary, and the
//! per-variant orchestration loop.

mod backend;
mod frames;
mod orchestrator;
mod remote;

pub use backend::{GenerationBackend, GenerationChannel, MockBackend, VariantScript};
pub use frames::{
    AgentEventFrame, ChannelOutcome, GenerationRequest, GenerationType, InputMode, PromptPayload,
    StreamFrame, WireMessage,
};
pub use orchestrator::Orchestrator;
pub use remote::RemoteBackend;
