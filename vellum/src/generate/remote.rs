//! HTTP generation backend.
//!
//! Posts the request frame to an inference gateway and reads
//! newline-delimited frames off the response body. The channel outcome
//! is decided once, at teardown: normal end of stream completes the
//! variant, caller cancellation maps to `Cancelled`, and transport
//! errors map to `Failed`.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::backend::{GenerationBackend, GenerationChannel};
use super::frames::{ChannelOutcome, GenerationRequest, StreamFrame};
use crate::error::{Result, SessionError};

/// Backend that streams frames from a remote inference gateway.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteBackend {
    /// Create a backend pointed at a gateway base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl GenerationBackend for RemoteBackend {
    async fn open_channel(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> Result<GenerationChannel> {
        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| SessionError::Backend(e.to_string()))?;

        let (frame_tx, frame_rx) = mpsc::channel(64);
        let (outcome_tx, outcome_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut body = Box::pin(response.bytes_stream());
            let mut buffer = String::new();

            let outcome = loop {
                tokio::select! {
                    () = cancel.cancelled() => break ChannelOutcome::Cancelled,
                    chunk = body.next() => match chunk {
                        Some(Ok(bytes)) => {
                            buffer.push_str(&String::from_utf8_lossy(&bytes));
                            while let Some(newline) = buffer.find('\n') {
                                let line: String = buffer.drain(..=newline).collect();
                                if let Some(frame) = StreamFrame::parse(&line) {
                                    if frame_tx.send(frame).await.is_err() {
                                        return;
                                    }
                                }
                            }
                        }
                        Some(Err(e)) => break ChannelOutcome::Failed(e.to_string()),
                        None => {
                            // Flush a final unterminated line before closing.
                            if let Some(frame) = StreamFrame::parse(&buffer) {
                                if frame_tx.send(frame).await.is_err() {
                                    return;
                                }
                            }
                            break ChannelOutcome::Completed;
                        }
                    }
                }
            };

            debug!(?outcome, "generation channel closed");
            drop(frame_tx);
            let _ = outcome_tx.send(outcome);
        });

        Ok(GenerationChannel {
            frames: frame_rx,
            outcome: outcome_rx,
        })
    }
}
