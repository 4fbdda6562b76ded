//! CLI command execution.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::events::SessionEvent;
use crate::generate::{GenerationBackend, MockBackend, RemoteBackend, StreamFrame, VariantScript};
use crate::persist::InMemoryHistoryStore;
use crate::server::{start_server, ServerState};
use crate::session::{AppState, SessionController, UserPrompt, DEFAULT_MODEL};

use super::args::{Cli, Commands};

/// Saved-document pages served by the API.
const SAVED_PAGE_SIZE: usize = 20;

/// Execute the parsed CLI command.
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve { port, backend_url } => serve(port, backend_url).await,
        Commands::Demo { model, prompt } => demo(model, prompt.join(" ")).await,
    }
}

async fn serve(port: u16, backend_url: Option<String>) -> Result<()> {
    let backend: Arc<dyn GenerationBackend> = match backend_url {
        Some(url) => Arc::new(RemoteBackend::new(url)),
        None => Arc::new(MockBackend::new()),
    };

    let state = ServerState {
        controller: SessionController::new(backend),
        store: Arc::new(InMemoryHistoryStore::new(SAVED_PAGE_SIZE)),
    };
    start_server(port, state).await
}

fn demo_script() -> VariantScript {
    VariantScript::completed(vec![
        StreamFrame::Status("Sketching the layout".to_string()),
        StreamFrame::Thinking("Single card, centered, one call to action. ".to_string()),
        StreamFrame::Chunk("<!doctype html>\n<html>\n<body>\n".to_string()),
        StreamFrame::Chunk("  <main class=\"card\">\n".to_string()),
        StreamFrame::Chunk("    <button>Get started</button>\n".to_string()),
        StreamFrame::Chunk("  </main>\n</body>\n</html>\n".to_string()),
    ])
    .with_delay(Duration::from_millis(120))
}

async fn demo(models: Vec<String>, prompt: String) -> Result<()> {
    let models = if models.is_empty() {
        vec![DEFAULT_MODEL.to_string()]
    } else {
        models
    };

    let mut backend = MockBackend::new();
    for model in &models {
        backend = backend.with_script(model.clone(), demo_script());
    }

    let controller = SessionController::new(Arc::new(backend));
    let mut events = controller.subscribe();

    let prompt = if prompt.is_empty() {
        "a landing page with one button".to_string()
    } else {
        prompt
    };
    println!("prompt: {prompt}");
    let hash = controller.create(UserPrompt::text(prompt), models).await?;

    while let Ok(event) = events.recv().await {
        match event {
            SessionEvent::CommitCreated { hash, kind } => {
                println!("commit {hash} ({kind})");
            }
            SessionEvent::VariantStatusText { variant, text, .. } => {
                println!("[variant {variant}] {text}");
            }
            SessionEvent::VariantCode { variant, code, .. } => {
                println!("[variant {variant}] {} bytes so far", code.len());
            }
            SessionEvent::VariantTerminal {
                variant,
                status,
                error,
                ..
            } => match error {
                Some(message) => println!("[variant {variant}] {status}: {message}"),
                None => println!("[variant {variant}] {status}"),
            },
            SessionEvent::StateChanged { state } => {
                println!("session: {state}");
                if state == AppState::CodeReady {
                    break;
                }
            }
        }
    }

    let commit = controller.commit(hash).await?;
    if let Some(variant) = commit.selected_variant() {
        println!("\n{}", variant.code);
    }

    for (position, item) in controller.rendered_history().await.iter().enumerate() {
        println!("v{} {} - {}", position + 1, item.label, item.summary);
    }
    Ok(())
}
