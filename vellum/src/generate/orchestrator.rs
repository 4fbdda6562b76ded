//! Concurrent variant generation for one commit.
//!
//! The orchestrator opens one channel per requested variant, applies
//! streamed frames to the addressed variant only, and enforces the
//! cancellation and termination rules. Channels are independent:
//! failure of one never touches its siblings.
//!
//! Single-writer discipline: every mutation of a variant goes through
//! the shared session lock, and each spawned dispatch task writes to
//! exactly one variant.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::backend::{GenerationBackend, GenerationChannel};
use super::frames::{AgentEventFrame, ChannelOutcome, GenerationRequest, StreamFrame};
use crate::error::{Result, SessionError};
use crate::events::SessionEvent;
use crate::models::{
    AgentEvent, AgentEventStatus, CommitHash, HistoryMessage, MessageRole, Variant, VariantStatus,
};
use crate::session::SharedState;

/// Minimum interval between chunk-driven code notifications. Purely a
/// rendering rate cap: the variant's code is updated on every frame,
/// and terminal notifications are never throttled.
const CODE_NOTIFY_INTERVAL: Duration = Duration::from_millis(100);

/// Cancellation token per (commit, variant index), shared with the
/// dispatch tasks so entries are pruned when their variant settles.
type ChannelMap = Arc<Mutex<HashMap<CommitHash, HashMap<usize, CancellationToken>>>>;

/// Runs N concurrent variant generations per commit and owns their
/// cancellation tokens.
pub struct Orchestrator {
    state: SharedState,
    backend: Arc<dyn GenerationBackend>,
    events: broadcast::Sender<SessionEvent>,
    channels: ChannelMap,
}

impl Orchestrator {
    /// Create an orchestrator over shared session state.
    pub fn new(
        state: SharedState,
        backend: Arc<dyn GenerationBackend>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            state,
            backend,
            events,
            channels: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start one generating variant per request on the target commit,
    /// then open an independent channel for each.
    pub async fn start_generation(
        &self,
        hash: CommitHash,
        requests: Vec<GenerationRequest>,
    ) -> Result<()> {
        if requests.is_empty() {
            return Ok(());
        }

        let base_index = {
            let mut state = self.state.write().await;
            let commit = state
                .graph
                .get_mut(hash)
                .ok_or(SessionError::CommitNotFound(hash))?;
            let base = commit.variants.len();
            for request in &requests {
                commit
                    .variants
                    .push(Variant::generating(request.model.clone(), request.seed_history()));
            }
            // Show the first fresh candidate while it streams.
            commit.selected_variant_index = base;
            if let Some(next) = state.reevaluate() {
                let _ = self.events.send(SessionEvent::StateChanged { state: next });
            }
            base
        };

        self.open_channels(hash, base_index, requests).await
    }

    /// Open one channel per request for variants that already exist on
    /// the commit, starting at `base_index`.
    ///
    /// A request whose channel fails to open marks only its own
    /// variant as errored.
    pub async fn open_channels(
        &self,
        hash: CommitHash,
        base_index: usize,
        requests: Vec<GenerationRequest>,
    ) -> Result<()> {
        for (offset, request) in requests.into_iter().enumerate() {
            let index = base_index + offset;
            let token = CancellationToken::new();

            debug!(%hash, index, model = %request.model, "opening generation channel");
            match self.backend.open_channel(request, token.clone()).await {
                Ok(channel) => {
                    // Registered before the task spawns so the task's
                    // own release never races the insert.
                    self.channels
                        .lock()
                        .await
                        .entry(hash)
                        .or_default()
                        .insert(index, token.clone());
                    tokio::spawn(run_variant_channel(
                        self.state.clone(),
                        self.events.clone(),
                        self.channels.clone(),
                        hash,
                        index,
                        token,
                        channel,
                    ));
                }
                Err(e) => {
                    warn!(%hash, index, error = %e, "failed to open generation channel");
                    let mut state = self.state.write().await;
                    let mut emit = mark_terminal(
                        &mut state,
                        hash,
                        index,
                        VariantStatus::Error,
                        Some(e.to_string()),
                    );
                    if let Some(next) = state.reevaluate() {
                        emit.push(SessionEvent::StateChanged { state: next });
                    }
                    drop(state);
                    self.send_all(emit);
                }
            }
        }

        Ok(())
    }

    /// Cancel one variant's channel and mark it `Cancelled`. Frames
    /// still in flight for that channel are discarded on arrival.
    pub async fn cancel_variant(&self, hash: CommitHash, index: usize) -> Result<()> {
        if let Some(tokens) = self.channels.lock().await.get(&hash) {
            if let Some(token) = tokens.get(&index) {
                token.cancel();
            }
        }

        let mut state = self.state.write().await;
        let commit = state
            .graph
            .get(hash)
            .ok_or(SessionError::CommitNotFound(hash))?;
        if index >= commit.variants.len() {
            return Err(SessionError::VariantOutOfRange {
                hash,
                index,
                len: commit.variants.len(),
            });
        }
        let mut emit = mark_terminal(&mut state, hash, index, VariantStatus::Cancelled, None);
        if let Some(next) = state.reevaluate() {
            emit.push(SessionEvent::StateChanged { state: next });
        }
        drop(state);
        self.send_all(emit);
        Ok(())
    }

    /// Cancel every still-generating variant on the commit.
    pub async fn cancel_all(&self, hash: CommitHash) -> Result<()> {
        if let Some(tokens) = self.channels.lock().await.get(&hash) {
            for token in tokens.values() {
                token.cancel();
            }
        }

        let mut state = self.state.write().await;
        let commit = state
            .graph
            .get(hash)
            .ok_or(SessionError::CommitNotFound(hash))?;
        let indexes: Vec<usize> = commit
            .variants
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.status.is_terminal())
            .map(|(i, _)| i)
            .collect();

        let mut emit = Vec::new();
        for index in indexes {
            emit.extend(mark_terminal(
                &mut state,
                hash,
                index,
                VariantStatus::Cancelled,
                None,
            ));
        }
        if let Some(next) = state.reevaluate() {
            emit.push(SessionEvent::StateChanged { state: next });
        }
        drop(state);
        self.send_all(emit);
        Ok(())
    }

    fn send_all(&self, events: Vec<SessionEvent>) {
        for event in events {
            let _ = self.events.send(event);
        }
    }
}

/// Dispatch loop for one variant's channel. Applies frames in arrival
/// order until the channel closes or the token fires, then releases
/// the variant's token entry.
async fn run_variant_channel(
    state: SharedState,
    events: broadcast::Sender<SessionEvent>,
    channels: ChannelMap,
    hash: CommitHash,
    index: usize,
    token: CancellationToken,
    mut channel: GenerationChannel,
) {
    let mut last_code_notify: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => {
                finalize_variant(&state, &events, hash, index, ChannelOutcome::Cancelled).await;
                release_token(&channels, hash, index).await;
                return;
            }
            frame = channel.frames.recv() => match frame {
                Some(frame) => {
                    apply_frame(&state, &events, hash, index, frame, &mut last_code_notify).await;
                }
                None => break,
            }
        }
    }

    let outcome = channel.outcome.await.unwrap_or_else(|_| {
        ChannelOutcome::Failed("generation channel closed without an outcome".to_string())
    });
    finalize_variant(&state, &events, hash, index, outcome).await;
    release_token(&channels, hash, index).await;
}

/// Drop a settled variant's token entry; the commit's map goes with
/// its last token.
async fn release_token(channels: &ChannelMap, hash: CommitHash, index: usize) {
    let mut map = channels.lock().await;
    if let Some(tokens) = map.get_mut(&hash) {
        tokens.remove(&index);
        if tokens.is_empty() {
            map.remove(&hash);
        }
    }
}

/// Apply one frame to its variant. Frames addressed to a variant that
/// already reached a terminal status are discarded, which is what
/// makes cancellation final.
async fn apply_frame(
    state: &SharedState,
    events: &broadcast::Sender<SessionEvent>,
    hash: CommitHash,
    index: usize,
    frame: StreamFrame,
    last_code_notify: &mut Option<Instant>,
) {
    let mut state = state.write().await;
    let mut emit = Vec::new();
    let mut errored = false;

    {
        let Some(commit) = state.graph.get_mut(hash) else {
            return;
        };
        let Some(variant) = commit.variants.get_mut(index) else {
            return;
        };
        if variant.status.is_terminal() {
            return;
        }

        match frame {
            StreamFrame::Chunk(delta) => {
                variant.code.push_str(&delta);
                let due = last_code_notify.map_or(true, |at| at.elapsed() >= CODE_NOTIFY_INTERVAL);
                if due {
                    *last_code_notify = Some(Instant::now());
                    emit.push(SessionEvent::VariantCode {
                        hash,
                        variant: index,
                        code: variant.code.clone(),
                    });
                }
            }
            StreamFrame::SetCode(code) => {
                variant.code = code;
                *last_code_notify = Some(Instant::now());
                emit.push(SessionEvent::VariantCode {
                    hash,
                    variant: index,
                    code: variant.code.clone(),
                });
            }
            StreamFrame::Status(text) => {
                variant.status_text = Some(text.clone());
                emit.push(SessionEvent::VariantStatusText {
                    hash,
                    variant: index,
                    text,
                });
            }
            StreamFrame::Thinking(delta) => {
                if variant.thinking_started_at.is_none() {
                    variant.thinking_started_at = Some(Utc::now());
                }
                variant
                    .thinking
                    .get_or_insert_with(String::new)
                    .push_str(&delta);
            }
            StreamFrame::AgentEvent(event) => apply_agent_event(variant, event),
            StreamFrame::Error(message) => {
                variant.status = VariantStatus::Error;
                variant.error_message = Some(message.clone());
                variant.completed_at = Some(Utc::now());
                emit.push(SessionEvent::VariantTerminal {
                    hash,
                    variant: index,
                    status: VariantStatus::Error,
                    error: Some(message),
                });
                errored = true;
            }
        }
    }

    if errored {
        if let Some(next) = state.reevaluate() {
            emit.push(SessionEvent::StateChanged { state: next });
        }
    }
    drop(state);
    for event in emit {
        let _ = events.send(event);
    }
}

/// Append an agent event, or finalize the running event carrying the
/// same id. The in-place update is the one permitted mutation of the
/// trace.
fn apply_agent_event(variant: &mut Variant, frame: AgentEventFrame) {
    if let Some(existing) = variant.agent_events.iter_mut().find(|e| e.id == frame.id) {
        existing.finalize(frame.status, frame.output);
        return;
    }

    let now = Utc::now();
    let ended_at = (frame.status != AgentEventStatus::Running).then_some(now);
    variant.agent_events.push(AgentEvent {
        id: frame.id,
        kind: frame.kind,
        status: frame.status,
        content: frame.content,
        tool_name: frame.tool_name,
        input: frame.input,
        output: frame.output,
        started_at: now,
        ended_at,
    });
}

/// Map a channel outcome onto its variant at teardown. No-op if the
/// variant is already terminal (error frame or explicit cancellation
/// decided first).
async fn finalize_variant(
    state: &SharedState,
    events: &broadcast::Sender<SessionEvent>,
    hash: CommitHash,
    index: usize,
    outcome: ChannelOutcome,
) {
    let mut state = state.write().await;
    let (status, error) = match outcome {
        ChannelOutcome::Completed => (VariantStatus::Complete, None),
        ChannelOutcome::Cancelled => (VariantStatus::Cancelled, None),
        ChannelOutcome::Failed(reason) => (VariantStatus::Error, Some(reason)),
    };
    let mut emit = mark_terminal(&mut state, hash, index, status, error);
    if let Some(next) = state.reevaluate() {
        emit.push(SessionEvent::StateChanged { state: next });
    }
    drop(state);
    for event in emit {
        let _ = events.send(event);
    }
}

/// Move a variant to a terminal status, stamping completion fields.
/// Returns the events to broadcast; empty if the variant was already
/// terminal or does not exist.
fn mark_terminal(
    state: &mut crate::session::SessionState,
    hash: CommitHash,
    index: usize,
    status: VariantStatus,
    error: Option<String>,
) -> Vec<SessionEvent> {
    let Some(commit) = state.graph.get_mut(hash) else {
        return Vec::new();
    };
    let Some(variant) = commit.variants.get_mut(index) else {
        return Vec::new();
    };
    if variant.status.is_terminal() {
        return Vec::new();
    }

    let now = Utc::now();
    variant.status = status;
    variant.completed_at = Some(now);
    match status {
        VariantStatus::Complete => {
            if let Some(started) = variant.thinking_started_at {
                variant.thinking_duration_ms = Some((now - started).num_milliseconds());
            }
            let code = variant.code.clone();
            variant
                .history
                .push(HistoryMessage::text(MessageRole::Assistant, code));
        }
        VariantStatus::Error => {
            variant.error_message = error.clone();
        }
        VariantStatus::Cancelled | VariantStatus::Generating => {}
    }

    vec![SessionEvent::VariantTerminal {
        hash,
        variant: index,
        status,
        error,
    }]
}
