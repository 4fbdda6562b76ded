//! Command-line interface for vellum.

mod args;
mod commands;

pub use args::{Cli, Commands};
pub use commands::execute;
