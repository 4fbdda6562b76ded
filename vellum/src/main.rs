//! Vellum - iterate on AI-generated UI documents with branching,
//! recoverable revision history.
//!
//! Architecture:
//! - A session is a branching commit graph; each commit holds several
//!   concurrently generated candidate variants
//! - One cancellable streaming channel feeds each variant
//! - The server is a thin HTTP/WS wrapper over the session controller

mod assets;
mod cli;
mod error;
mod events;
mod generate;
mod graph;
mod history;
mod models;
mod persist;
mod server;
mod session;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{execute, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    execute(cli).await
}
