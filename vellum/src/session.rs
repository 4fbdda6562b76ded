//! Session state and the top-level controller.
//!
//! The controller sequences user actions into commit graph mutations
//! and orchestrator calls. All shared state lives in one
//! `SessionState` behind a `tokio` `RwLock`; the controller and the
//! per-variant dispatch tasks are the only writers.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};

use crate::assets::AssetStore;
use crate::error::{Result, SessionError};
use crate::events::SessionEvent;
use crate::generate::{
    GenerationBackend, GenerationRequest, GenerationType, InputMode, Orchestrator, PromptPayload,
    WireMessage,
};
use crate::graph::CommitGraph;
use crate::history::{extract_lineage, render_history, LineageTurn, RenderedItem};
use crate::models::{
    AssetKind, Commit, CommitDraft, CommitHash, CommitKind, PromptContent, Variant,
};

/// Model used when a request names none.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Top-level session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppState {
    /// No head commit yet.
    Initial,
    /// At least one variant on the head commit is generating.
    Coding,
    /// The head commit's variants have all settled.
    CodeReady,
}

impl AppState {
    /// Convert state to its canonical string form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Coding => "coding",
            Self::CodeReady => "code_ready",
        }
    }
}

impl std::fmt::Display for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Process-wide session state: commit graph, asset store, head, and
/// the derived state machine position. Torn down with the session.
#[derive(Debug)]
pub struct SessionState {
    /// Commit graph keyed by hash.
    pub graph: CommitGraph,
    /// Deduplicated prompt media.
    pub assets: AssetStore,
    /// Commit the session considers current.
    pub head: Option<CommitHash>,
    /// Current state machine position.
    pub app_state: AppState,
}

impl SessionState {
    /// Create an empty session.
    pub fn new() -> Self {
        Self {
            graph: CommitGraph::new(),
            assets: AssetStore::new(),
            head: None,
            app_state: AppState::Initial,
        }
    }

    /// Recompute the state machine position from the head commit.
    /// Returns the new state if it changed. A head whose variants have
    /// all settled is also frozen (`mark_committed`), so later edits
    /// branch instead of mutating it.
    pub fn reevaluate(&mut self) -> Option<AppState> {
        let next = match self.head.and_then(|h| self.graph.get(h)) {
            None => AppState::Initial,
            Some(commit) if commit.is_generating() => AppState::Coding,
            Some(commit) => {
                let hash = commit.hash;
                let _ = self.graph.mark_committed(hash);
                AppState::CodeReady
            }
        };
        if next == self.app_state {
            None
        } else {
            self.app_state = next;
            Some(next)
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to session state.
pub type SharedState = Arc<RwLock<SessionState>>;

/// Prompt supplied with `create`/`update`: text plus raw media data
/// URIs (registered into the asset store on submission).
#[derive(Debug, Clone, Default)]
pub struct UserPrompt {
    /// Instruction or description text.
    pub text: String,
    /// Image data URIs.
    pub images: Vec<String>,
    /// Video data URIs.
    pub videos: Vec<String>,
}

impl UserPrompt {
    /// Text-only prompt.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }
}

/// Sequences user actions into commit graph mutations and generation
/// runs.
pub struct SessionController {
    state: SharedState,
    orchestrator: Orchestrator,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    /// Create a controller over a fresh session.
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        let state: SharedState = Arc::new(RwLock::new(SessionState::new()));
        let (events, _) = broadcast::channel(1024);
        let orchestrator = Orchestrator::new(state.clone(), backend, events.clone());
        Self {
            state,
            orchestrator,
            events,
        }
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Create a revision from a prompt: a root commit on an empty
    /// session, a child of the head otherwise. Moves to `Coding`.
    pub async fn create(&self, prompt: UserPrompt, models: Vec<String>) -> Result<CommitHash> {
        let (hash, requests) = {
            let mut state = self.state.write().await;

            let image_ids = state
                .assets
                .register_assets(AssetKind::Image, prompt.images.clone());
            let video_ids = state
                .assets
                .register_assets(AssetKind::Video, prompt.videos.clone());
            let inputs = PromptContent {
                text: prompt.text.clone(),
                image_asset_ids: image_ids,
                video_asset_ids: video_ids,
            };

            let (parent, kind, generation_type) = match state.head {
                Some(head) => (Some(head), CommitKind::AiEdit, GenerationType::Update),
                None => (None, CommitKind::AiCreate, GenerationType::Create),
            };
            let history = match parent {
                Some(head) => lineage_to_wire(&extract_lineage(&state.graph, head)?),
                None => Vec::new(),
            };

            let payload = PromptPayload {
                text: prompt.text,
                images: prompt.images,
                videos: prompt.videos,
            };
            let requests = build_requests(generation_type, payload, history, models);

            // Commit and its generating variants land in one write, so
            // no reader ever observes the commit without variants.
            let variants = requests
                .iter()
                .map(|request| Variant::generating(request.model.clone(), request.seed_history()))
                .collect();
            let hash = state.graph.create_commit(CommitDraft {
                parent_hash: parent,
                kind,
                inputs: Some(inputs),
                stack: None,
                variants,
            })?;
            state.head = Some(hash);
            let _ = self.events.send(SessionEvent::CommitCreated { hash, kind });
            if let Some(next) = state.reevaluate() {
                let _ = self.events.send(SessionEvent::StateChanged { state: next });
            }
            (hash, requests)
        };

        self.orchestrator.open_channels(hash, 0, requests).await?;
        Ok(hash)
    }

    /// Edit the head revision with a new instruction. The lineage
    /// behind the head is resubmitted as conversation context.
    pub async fn update(
        &self,
        instruction: impl Into<String>,
        images: Vec<String>,
        models: Vec<String>,
    ) -> Result<CommitHash> {
        if self.state.read().await.head.is_none() {
            return Err(SessionError::NoHead);
        }
        self.create(
            UserPrompt {
                text: instruction.into(),
                images,
                videos: Vec::new(),
            },
            models,
        )
        .await
    }

    /// Branch a new commit off the head whose code is copied from an
    /// earlier revision. History is append-only: nothing between the
    /// target and the head is touched.
    pub async fn revert(&self, target: CommitHash) -> Result<CommitHash> {
        let mut state = self.state.write().await;
        if state.app_state == AppState::Coding {
            return Err(SessionError::RevertBlocked);
        }
        let head = state.head.ok_or(SessionError::NoHead)?;

        let source = state.graph.require(target)?;
        let variant = source
            .selected_variant()
            .ok_or(SessionError::VariantOutOfRange {
                hash: target,
                index: source.selected_variant_index,
                len: source.variants.len(),
            })?;
        let code = variant.code.clone();
        let model = variant.model.clone();

        let hash = state.graph.create_commit(CommitDraft {
            parent_hash: Some(head),
            kind: CommitKind::Revert,
            inputs: None,
            stack: None,
            variants: vec![Variant::complete(code, model)],
        })?;
        state.head = Some(hash);
        let _ = self.events.send(SessionEvent::CommitCreated {
            hash,
            kind: CommitKind::Revert,
        });
        if let Some(next) = state.reevaluate() {
            let _ = self.events.send(SessionEvent::StateChanged { state: next });
        }
        Ok(hash)
    }

    /// Import existing code as a new lineage root. No generation runs;
    /// the session is `CodeReady` immediately.
    pub async fn import_from_code(
        &self,
        code: impl Into<String>,
        stack: impl Into<String>,
    ) -> Result<CommitHash> {
        let mut state = self.state.write().await;
        let hash = state.graph.create_commit(CommitDraft {
            parent_hash: None,
            kind: CommitKind::CodeCreate,
            inputs: None,
            stack: Some(stack.into()),
            variants: vec![Variant::complete(code, "imported")],
        })?;
        state.head = Some(hash);
        let _ = self.events.send(SessionEvent::CommitCreated {
            hash,
            kind: CommitKind::CodeCreate,
        });
        if let Some(next) = state.reevaluate() {
            let _ = self.events.send(SessionEvent::StateChanged { state: next });
        }
        Ok(hash)
    }

    /// Re-run generation on the head commit with a fresh variant set,
    /// reusing its prompt and lineage. For new candidates without a
    /// new instruction.
    pub async fn regenerate(&self) -> Result<CommitHash> {
        let (hash, requests) = {
            let state = self.state.read().await;
            let head = state.head.ok_or(SessionError::NoHead)?;
            let commit = state.graph.require(head)?;
            let inputs = commit.inputs.clone().ok_or(SessionError::NoPromptInputs)?;

            let generation_type = if commit.parent_hash.is_some() {
                GenerationType::Update
            } else {
                GenerationType::Create
            };
            let history = match commit.parent_hash {
                Some(parent) => lineage_to_wire(&extract_lineage(&state.graph, parent)?),
                None => Vec::new(),
            };

            let payload = PromptPayload {
                text: inputs.text,
                images: state.assets.resolve(&inputs.image_asset_ids),
                videos: state.assets.resolve(&inputs.video_asset_ids),
            };

            let mut models: Vec<String> = Vec::new();
            for variant in &commit.variants {
                if !models.contains(&variant.model) {
                    models.push(variant.model.clone());
                }
            }

            (head, build_requests(generation_type, payload, history, models))
        };

        self.orchestrator.start_generation(hash, requests).await?;
        Ok(hash)
    }

    /// Cancel one variant's generation.
    pub async fn cancel_variant(&self, hash: CommitHash, index: usize) -> Result<()> {
        self.orchestrator.cancel_variant(hash, index).await
    }

    /// Cancel every generating variant on a commit.
    pub async fn cancel_all(&self, hash: CommitHash) -> Result<()> {
        self.orchestrator.cancel_all(hash).await
    }

    /// Select which variant a commit shows and carries forward.
    pub async fn select_variant(&self, hash: CommitHash, index: usize) -> Result<()> {
        self.state
            .write()
            .await
            .graph
            .set_selected_variant(hash, index)
    }

    /// Display-ready history rows.
    pub async fn rendered_history(&self) -> Vec<RenderedItem> {
        let state = self.state.read().await;
        render_history(&state.graph.ordered())
    }

    /// Current state machine position.
    pub async fn app_state(&self) -> AppState {
        self.state.read().await.app_state
    }

    /// Current head hash, if any.
    pub async fn head(&self) -> Option<CommitHash> {
        self.state.read().await.head
    }

    /// Snapshot of one commit.
    pub async fn commit(&self, hash: CommitHash) -> Result<Commit> {
        let state = self.state.read().await;
        state.graph.require(hash).cloned()
    }
}

/// Map root-first lineage turns onto wire messages. Each turn carries
/// its own role, so a revert's back-to-back code turns stay labeled as
/// assistant output.
fn lineage_to_wire(lineage: &[LineageTurn]) -> Vec<WireMessage> {
    lineage
        .iter()
        .map(|turn| WireMessage {
            role: turn.role,
            text: turn.text.clone(),
            images: Vec::new(),
            videos: Vec::new(),
        })
        .collect()
}

fn build_requests(
    generation_type: GenerationType,
    payload: PromptPayload,
    history: Vec<WireMessage>,
    models: Vec<String>,
) -> Vec<GenerationRequest> {
    let input_mode = if payload.videos.is_empty() {
        if payload.images.is_empty() {
            InputMode::Text
        } else {
            InputMode::Image
        }
    } else {
        InputMode::Video
    };

    let models = if models.is_empty() {
        vec![DEFAULT_MODEL.to_string()]
    } else {
        models
    };

    models
        .into_iter()
        .map(|model| GenerationRequest {
            generation_type,
            input_mode,
            prompt: payload.clone(),
            history: history.clone(),
            model,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{GenerationChannel, MockBackend, StreamFrame, VariantScript};
    use crate::models::{MessageRole, VariantStatus};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn quick_backend(code_parts: &[&str]) -> Arc<MockBackend> {
        let frames = code_parts
            .iter()
            .map(|part| StreamFrame::Chunk((*part).to_string()))
            .collect();
        Arc::new(MockBackend::new().with_script(DEFAULT_MODEL, VariantScript::completed(frames)))
    }

    async fn wait_for_ready(controller: &SessionController) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if controller.app_state().await == AppState::CodeReady {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("session never reached code_ready");
    }

    #[tokio::test]
    async fn fresh_session_is_initial() {
        let controller = SessionController::new(Arc::new(MockBackend::new()));
        assert_eq!(controller.app_state().await, AppState::Initial);
        assert_eq!(controller.head().await, None);
    }

    #[tokio::test]
    async fn create_streams_to_code_ready() {
        let controller = SessionController::new(quick_backend(&["<html>", "</html>"]));
        let hash = controller
            .create(UserPrompt::text("button"), Vec::new())
            .await
            .unwrap();
        wait_for_ready(&controller).await;

        let commit = controller.commit(hash).await.unwrap();
        assert_eq!(commit.kind, CommitKind::AiCreate);
        assert_eq!(commit.variants[0].status, VariantStatus::Complete);
        assert_eq!(commit.variants[0].code, "<html></html>");
        assert_eq!(controller.head().await, Some(hash));
        // Settled head is frozen; the next edit branches.
        assert!(controller.commit(hash).await.unwrap().is_committed);
    }

    #[tokio::test]
    async fn update_branches_from_head_and_resubmits_lineage() {
        let controller = SessionController::new(quick_backend(&["<html>1</html>"]));
        let root = controller
            .create(UserPrompt::text("page"), Vec::new())
            .await
            .unwrap();
        wait_for_ready(&controller).await;

        let edit = controller
            .update("use better icons", Vec::new(), Vec::new())
            .await
            .unwrap();
        wait_for_ready(&controller).await;

        let commit = controller.commit(edit).await.unwrap();
        assert_eq!(commit.kind, CommitKind::AiEdit);
        assert_eq!(commit.parent_hash, Some(root));

        // Variant context: ancestor code as assistant, then this prompt.
        let history = &commit.variants[0].history;
        assert_eq!(history[0].role, MessageRole::Assistant);
        assert_eq!(history[0].text, "<html>1</html>");
        assert_eq!(history[1].role, MessageRole::User);
        assert_eq!(history[1].text, "use better icons");
    }

    #[tokio::test]
    async fn update_without_head_is_rejected() {
        let controller = SessionController::new(Arc::new(MockBackend::new()));
        let err = controller
            .update("darker", Vec::new(), Vec::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::NoHead));
    }

    #[tokio::test]
    async fn import_is_code_ready_immediately() {
        let controller = SessionController::new(Arc::new(MockBackend::new()));
        let hash = controller
            .import_from_code("<html>mine</html>", "html_tailwind")
            .await
            .unwrap();

        assert_eq!(controller.app_state().await, AppState::CodeReady);
        let commit = controller.commit(hash).await.unwrap();
        assert_eq!(commit.kind, CommitKind::CodeCreate);
        assert_eq!(commit.parent_hash, None);
        assert_eq!(commit.stack.as_deref(), Some("html_tailwind"));
        assert!(commit.inputs.is_none());
        assert_eq!(commit.variants[0].status, VariantStatus::Complete);
    }

    #[tokio::test]
    async fn revert_is_append_only_and_copies_selected_code() {
        let controller = SessionController::new(quick_backend(&["<v1/>"]));
        let first = controller
            .create(UserPrompt::text("page"), Vec::new())
            .await
            .unwrap();
        wait_for_ready(&controller).await;
        let second = controller
            .update("tweak", Vec::new(), Vec::new())
            .await
            .unwrap();
        wait_for_ready(&controller).await;

        let target_before = controller.commit(first).await.unwrap();
        let reverted = controller.revert(first).await.unwrap();

        // Target untouched, new commit branches from the previous head.
        let target_after = controller.commit(first).await.unwrap();
        assert_eq!(target_after.variants[0].code, target_before.variants[0].code);

        let commit = controller.commit(reverted).await.unwrap();
        assert_eq!(commit.kind, CommitKind::Revert);
        assert_eq!(commit.parent_hash, Some(second));
        assert_eq!(commit.variants[0].code, target_before.variants[0].code);
        assert_eq!(controller.head().await, Some(reverted));
        assert_eq!(controller.app_state().await, AppState::CodeReady);
    }

    #[tokio::test]
    async fn revert_is_blocked_while_coding() {
        let backend = Arc::new(MockBackend::new().with_script(
            DEFAULT_MODEL,
            VariantScript::completed(vec![
                StreamFrame::Chunk("<slow>".to_string()),
                StreamFrame::Chunk("</slow>".to_string()),
            ])
            .with_delay(Duration::from_millis(400)),
        ));
        let controller = SessionController::new(backend);
        let hash = controller
            .create(UserPrompt::text("page"), Vec::new())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(controller.app_state().await, AppState::Coding);

        let err = controller.revert(hash).await.unwrap_err();
        assert!(matches!(err, SessionError::RevertBlocked));

        controller.cancel_all(hash).await.unwrap();
        assert_ne!(controller.app_state().await, AppState::Coding);
    }

    #[tokio::test]
    async fn lineage_after_revert_keeps_code_as_assistant_turns() {
        let controller = SessionController::new(quick_backend(&["<v1/>"]));
        controller
            .create(UserPrompt::text("page"), Vec::new())
            .await
            .unwrap();
        wait_for_ready(&controller).await;
        let first = controller.head().await.unwrap();
        controller.revert(first).await.unwrap();

        let edit = controller
            .update("darker", Vec::new(), Vec::new())
            .await
            .unwrap();
        wait_for_ready(&controller).await;

        // The revert contributes a second consecutive code turn; roles
        // must follow the turn kind, not its position.
        let commit = controller.commit(edit).await.unwrap();
        let history = &commit.variants[0].history;
        assert_eq!(history[0].role, MessageRole::Assistant);
        assert_eq!(history[1].role, MessageRole::Assistant);
        assert_eq!(history[1].text, "<v1/>");
        assert_eq!(history[2].role, MessageRole::User);
        assert_eq!(history[2].text, "darker");
    }

    /// Backend that stalls before opening each channel, widening the
    /// window between commit creation and channel setup.
    struct SlowOpenBackend {
        inner: MockBackend,
    }

    #[async_trait]
    impl GenerationBackend for SlowOpenBackend {
        async fn open_channel(
            &self,
            request: GenerationRequest,
            cancel: CancellationToken,
        ) -> Result<GenerationChannel> {
            tokio::time::sleep(Duration::from_millis(150)).await;
            self.inner.open_channel(request, cancel).await
        }
    }

    #[tokio::test]
    async fn new_commit_is_never_observable_without_variants() {
        let backend = Arc::new(SlowOpenBackend {
            inner: MockBackend::new(),
        });
        let controller = Arc::new(SessionController::new(backend));
        let create = {
            let controller = controller.clone();
            tokio::spawn(async move {
                controller
                    .create(UserPrompt::text("page"), Vec::new())
                    .await
                    .unwrap()
            })
        };

        let hash = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Some(hash) = controller.head().await {
                    return hash;
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("head never appeared");

        // First observation of the head already carries its variant.
        let commit = controller.commit(hash).await.unwrap();
        assert_eq!(commit.variants.len(), 1);
        assert_eq!(commit.variants[0].status, VariantStatus::Generating);
        assert_eq!(controller.app_state().await, AppState::Coding);
        create.await.unwrap();
    }

    #[tokio::test]
    async fn regenerate_appends_fresh_variants_on_head() {
        let controller = SessionController::new(quick_backend(&["<v/>"]));
        let hash = controller
            .create(UserPrompt::text("page"), Vec::new())
            .await
            .unwrap();
        wait_for_ready(&controller).await;

        controller.regenerate().await.unwrap();
        wait_for_ready(&controller).await;

        let commit = controller.commit(hash).await.unwrap();
        assert_eq!(commit.variants.len(), 2);
        assert_eq!(commit.variants[1].status, VariantStatus::Complete);
        assert_eq!(commit.selected_variant_index, 1);
        assert_eq!(controller.head().await, Some(hash));
    }

    #[tokio::test]
    async fn regenerate_requires_prompt_inputs() {
        let controller = SessionController::new(Arc::new(MockBackend::new()));
        controller
            .import_from_code("<html/>", "html_tailwind")
            .await
            .unwrap();
        let err = controller.regenerate().await.unwrap_err();
        assert!(matches!(err, SessionError::NoPromptInputs));
    }

    #[tokio::test]
    async fn prompt_media_is_registered_and_deduplicated() {
        let controller = SessionController::new(quick_backend(&["<img/>"]));
        let prompt = UserPrompt {
            text: "from screenshot".to_string(),
            images: vec![
                "data:image/png;base64,AAA".to_string(),
                "data:image/png;base64,AAA".to_string(),
            ],
            videos: Vec::new(),
        };
        let hash = controller.create(prompt, Vec::new()).await.unwrap();
        wait_for_ready(&controller).await;

        let commit = controller.commit(hash).await.unwrap();
        let inputs = commit.inputs.unwrap();
        assert_eq!(inputs.image_asset_ids.len(), 2);
        assert_eq!(inputs.image_asset_ids[0], inputs.image_asset_ids[1]);
    }
}
