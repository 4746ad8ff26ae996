//! Console harness for the parley turn-taking engine.
//!
//! Wires [`parley_voice::TurnOrchestrator`] to typed-line input, printed
//! output and a chat-completions backend, so the turn engine can be
//! exercised from a terminal.
#![deny(unused_crate_dependencies)]

// Used only by the `parley` binary.
use anyhow as _;
use dotenvy as _;
use tracing_subscriber as _;

#[cfg(test)]
use tempfile as _;

pub mod config;
pub mod console;
pub mod error;
pub mod parser;
pub mod responder;

pub use error::CliError;
pub use parser::Cli;
