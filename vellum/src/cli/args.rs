//! CLI argument definitions.

use clap::{Parser, Subcommand};

/// Vellum - iterate on AI-generated UI documents with branching history
#[derive(Parser, Debug)]
#[command(name = "vellum")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the session API over HTTP and WebSocket
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 4080)]
        port: u16,

        /// Base URL of the generation gateway; without it a scripted
        /// mock backend answers every request
        #[arg(long)]
        backend_url: Option<String>,
    },

    /// Run one scripted generation locally and print the event stream
    Demo {
        /// Models to request candidates from
        #[arg(short, long)]
        model: Vec<String>,

        /// Prompt text
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },
}
