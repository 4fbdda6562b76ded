//! HTTP + WebSocket surface over one session.
//!
//! Thin wrapper: every endpoint delegates to the session controller
//! and the history store; session events are re-broadcast to
//! WebSocket clients as JSON.
//!
//! Endpoints:
//! - POST /api/create - start a revision from a prompt
//! - POST /api/update - edit the head revision
//! - POST /api/revert - branch a copy of an earlier revision
//! - POST /api/import - import code as a new root
//! - POST /api/regenerate - fresh candidates for the head
//! - POST /api/commits/{hash}/select - pick a variant
//! - POST /api/commits/{hash}/cancel - cancel one or all variants
//! - GET  /api/state - state machine position and head
//! - GET  /api/history - rendered history rows
//! - GET  /api/commits/{hash} - one commit
//! - GET  /api/saved - saved-document pages
//! - WS   /ws - session event stream

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;
use uuid::Uuid;

use crate::error::SessionError;
use crate::history::RenderedItem;
use crate::models::Commit;
use crate::persist::{HistoryPage, HistoryStore};
use crate::session::{AppState as SessionAppState, SessionController, UserPrompt};

/// Shared server state.
pub struct ServerState {
    /// The one session this server fronts.
    pub controller: SessionController,
    /// Saved-document store.
    pub store: Arc<dyn HistoryStore>,
}

type Shared = Arc<ServerState>;
type ApiError = (StatusCode, String);

fn api_error(e: &SessionError) -> ApiError {
    let status = match e {
        SessionError::CommitNotFound(_) => StatusCode::NOT_FOUND,
        SessionError::DanglingParent(_)
        | SessionError::VariantOutOfRange { .. }
        | SessionError::NoHead
        | SessionError::NoPromptInputs => StatusCode::BAD_REQUEST,
        SessionError::RevertBlocked => StatusCode::CONFLICT,
        SessionError::MalformedHistory { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        SessionError::Backend(_) => StatusCode::BAD_GATEWAY,
    };
    (status, e.to_string())
}

// === Request/Response Types ===

#[derive(Debug, Deserialize)]
pub struct PromptBody {
    pub text: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub videos: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub prompt: PromptBody,
    #[serde(default)]
    pub models: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRequest {
    pub instruction: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub models: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RevertRequest {
    pub target: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub code: String,
    pub stack: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    /// Cancel one variant, or every generating variant when absent.
    pub variant: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct CommitResponse {
    pub hash: Uuid,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub state: SessionAppState,
    pub head: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub page: Option<usize>,
}

// === Server Lifecycle ===

/// Serve the session on the given port until shutdown.
pub async fn start_server(port: u16, state: ServerState) -> Result<()> {
    let shared: Shared = Arc::new(state);

    let app = Router::new()
        .route("/api/create", post(create))
        .route("/api/update", post(update))
        .route("/api/revert", post(revert))
        .route("/api/import", post(import))
        .route("/api/regenerate", post(regenerate))
        .route("/api/commits/{hash}/select", post(select_variant))
        .route("/api/commits/{hash}/cancel", post(cancel))
        .route("/api/commits/{hash}", get(get_commit))
        .route("/api/state", get(get_state))
        .route("/api/history", get(get_history))
        .route("/api/saved", get(get_saved))
        .route("/ws", get(websocket_handler))
        .layer(CorsLayer::permissive())
        .with_state(shared);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!(%addr, "vellum server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

// === Handlers ===

async fn create(
    State(state): State<Shared>,
    Json(req): Json<CreateRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let prompt = UserPrompt {
        text: req.prompt.text,
        images: req.prompt.images,
        videos: req.prompt.videos,
    };
    let hash = state
        .controller
        .create(prompt, req.models)
        .await
        .map_err(|e| api_error(&e))?;
    Ok(Json(CommitResponse { hash }))
}

async fn update(
    State(state): State<Shared>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let hash = state
        .controller
        .update(req.instruction, req.images, req.models)
        .await
        .map_err(|e| api_error(&e))?;
    Ok(Json(CommitResponse { hash }))
}

async fn revert(
    State(state): State<Shared>,
    Json(req): Json<RevertRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    let hash = state
        .controller
        .revert(req.target)
        .await
        .map_err(|e| api_error(&e))?;
    Ok(Json(CommitResponse { hash }))
}

async fn import(
    State(state): State<Shared>,
    Json(req): Json<ImportRequest>,
) -> Result<Json<CommitResponse>, ApiError> {
    state.store.save(req.code.clone(), req.stack.clone()).await;
    let hash = state
        .controller
        .import_from_code(req.code, req.stack)
        .await
        .map_err(|e| api_error(&e))?;
    Ok(Json(CommitResponse { hash }))
}

async fn regenerate(State(state): State<Shared>) -> Result<Json<CommitResponse>, ApiError> {
    let hash = state
        .controller
        .regenerate()
        .await
        .map_err(|e| api_error(&e))?;
    Ok(Json(CommitResponse { hash }))
}

async fn select_variant(
    State(state): State<Shared>,
    Path(hash): Path<Uuid>,
    Json(req): Json<SelectRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .controller
        .select_variant(hash, req.index)
        .await
        .map_err(|e| api_error(&e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn cancel(
    State(state): State<Shared>,
    Path(hash): Path<Uuid>,
    Json(req): Json<CancelRequest>,
) -> Result<StatusCode, ApiError> {
    match req.variant {
        Some(index) => state.controller.cancel_variant(hash, index).await,
        None => state.controller.cancel_all(hash).await,
    }
    .map_err(|e| api_error(&e))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_commit(
    State(state): State<Shared>,
    Path(hash): Path<Uuid>,
) -> Result<Json<Commit>, ApiError> {
    let commit = state
        .controller
        .commit(hash)
        .await
        .map_err(|e| api_error(&e))?;
    Ok(Json(commit))
}

async fn get_state(State(state): State<Shared>) -> Json<StateResponse> {
    Json(StateResponse {
        state: state.controller.app_state().await,
        head: state.controller.head().await,
    })
}

async fn get_history(State(state): State<Shared>) -> Json<Vec<RenderedItem>> {
    Json(state.controller.rendered_history().await)
}

async fn get_saved(
    State(state): State<Shared>,
    Query(params): Query<PageParams>,
) -> Json<HistoryPage> {
    Json(state.store.load_page(params.page.unwrap_or(1)).await)
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Shared>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

async fn handle_websocket(mut socket: axum::extract::ws::WebSocket, state: Shared) {
    use axum::extract::ws::Message;
    use tokio::sync::broadcast::error::RecvError;

    let mut rx = state.controller.subscribe();

    loop {
        match rx.recv().await {
            Ok(event) => {
                if let Ok(json) = serde_json::to_string(&event) {
                    if socket.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }
            // A slow client misses throttle-able frames, not session end.
            Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => break,
        }
    }
}
