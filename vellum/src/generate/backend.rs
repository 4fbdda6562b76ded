//! Generation backend boundary.
//!
//! The inference service is an external collaborator; the core only
//! sees it through `GenerationBackend`: one request frame in, a stream
//! of typed frames out, and an outcome decided at teardown. The mock
//! implementation replays scripted frames for tests and the `demo`
//! subcommand.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::frames::{ChannelOutcome, GenerationRequest, StreamFrame};
use crate::error::{Result, SessionError};

/// Handle to one open generation channel.
///
/// Frames arrive in order on `frames`; when the sender side closes,
/// `outcome` resolves with the reason.
#[derive(Debug)]
pub struct GenerationChannel {
    /// Receiver for streamed frames.
    pub frames: mpsc::Receiver<StreamFrame>,
    /// Resolves once, at channel teardown.
    pub outcome: oneshot::Receiver<ChannelOutcome>,
}

/// An external service that turns generation requests into frame
/// streams. One channel per variant; channels are independent.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Open a channel for one variant. The backend must stop emitting
    /// promptly once `cancel` fires; a final in-flight frame after
    /// cancellation is tolerated (the orchestrator discards it).
    async fn open_channel(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<GenerationChannel>;
}

/// Scripted behavior for one model under the mock backend.
#[derive(Debug, Clone)]
pub struct VariantScript {
    /// Frames to emit, in order.
    pub frames: Vec<StreamFrame>,
    /// Outcome reported at teardown.
    pub outcome: ChannelOutcome,
    /// Pause between frames.
    pub frame_delay: Duration,
    /// Refuse to open the channel at all.
    pub refuse: bool,
}

impl VariantScript {
    /// Script that streams the given frames and completes.
    pub fn completed(frames: Vec<StreamFrame>) -> Self {
        Self {
            frames,
            outcome: ChannelOutcome::Completed,
            frame_delay: Duration::ZERO,
            refuse: false,
        }
    }

    /// Script that streams the given frames and then fails.
    pub fn failed(frames: Vec<StreamFrame>, reason: impl Into<String>) -> Self {
        Self {
            frames,
            outcome: ChannelOutcome::Failed(reason.into()),
            frame_delay: Duration::ZERO,
            refuse: false,
        }
    }

    /// Script whose channel cannot be opened.
    pub fn refused() -> Self {
        Self {
            frames: Vec::new(),
            outcome: ChannelOutcome::Failed("refused".to_string()),
            frame_delay: Duration::ZERO,
            refuse: true,
        }
    }

    /// Set the pause between frames.
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }
}

impl Default for VariantScript {
    fn default() -> Self {
        Self::completed(vec![
            StreamFrame::Status("Generating...".to_string()),
            StreamFrame::Chunk("<html>".to_string()),
            StreamFrame::Chunk("</html>".to_string()),
        ])
    }
}

/// Backend that replays per-model scripts.
#[derive(Debug, Default)]
pub struct MockBackend {
    scripts: HashMap<String, VariantScript>,
}

impl MockBackend {
    /// Backend that answers every model with the default script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a script for a model name.
    pub fn with_script(mut self, model: impl Into<String>, script: VariantScript) -> Self {
        self.scripts.insert(model.into(), script);
        self
    }

    fn script_for(&self, model: &str) -> VariantScript {
        self.scripts.get(model).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn open_channel(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<GenerationChannel> {
        let script = self.script_for(&request.model);
        if script.refuse {
            return Err(SessionError::Backend(format!(
                "no channel available for model {}",
                request.model
            )));
        }

        let (frame_tx, frame_rx) = mpsc::channel(64);
        let (outcome_tx, outcome_rx) = oneshot::channel();

        tokio::spawn(async move {
            for frame in script.frames {
                if cancel.is_cancelled() {
                    let _ = outcome_tx.send(ChannelOutcome::Cancelled);
                    return;
                }
                if script.frame_delay > Duration::ZERO {
                    tokio::time::sleep(script.frame_delay).await;
                }
                if frame_tx.send(frame).await.is_err() {
                    // Receiver dropped; the orchestrator already tore
                    // the variant down.
                    return;
                }
            }
            drop(frame_tx);
            let _ = outcome_tx.send(script.outcome);
        });

        Ok(GenerationChannel {
            frames: frame_rx,
            outcome: outcome_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::frames::{GenerationType, InputMode, PromptPayload};

    fn request(model: &str) -> GenerationRequest {
        GenerationRequest {
            generation_type: GenerationType::Create,
            input_mode: InputMode::Text,
            prompt: PromptPayload {
                text: "a button".to_string(),
                images: Vec::new(),
                videos: Vec::new(),
            },
            history: Vec::new(),
            model: model.to_string(),
        }
    }

    #[tokio::test]
    async fn mock_replays_script_then_reports_outcome() {
        let backend = MockBackend::new().with_script(
            "m1",
            VariantScript::completed(vec![
                StreamFrame::Chunk("<html>".to_string()),
                StreamFrame::Chunk("</html>".to_string()),
            ]),
        );

        let mut channel = backend
            .open_channel(request("m1"), CancellationToken::new())
            .await
            .unwrap();

        let mut frames = Vec::new();
        while let Some(frame) = channel.frames.recv().await {
            frames.push(frame);
        }
        assert_eq!(frames.len(), 2);
        assert_eq!(channel.outcome.await.unwrap(), ChannelOutcome::Completed);
    }

    #[tokio::test]
    async fn refused_script_fails_open() {
        let backend = MockBackend::new().with_script("m1", VariantScript::refused());
        let err = backend
            .open_channel(request("m1"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Backend(_)));
    }
}
