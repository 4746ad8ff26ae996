//! Main CLI parser and top-level argument handling.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use parley_voice::SilenceMode;

/// Default chat-completions endpoint (a local OpenAI-compatible server).
pub const DEFAULT_ENDPOINT: &str = "http://localhost:8080/v1/chat/completions";

/// Default instructions for the conversation partner.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly English conversation partner for a \
language learner. Reply in one or two short, simple sentences and usually end with a question \
that keeps the conversation going.";

/// Command-line interface for the console practice harness.
///
/// Learner speech is typed: a plain line is a final recognizer fragment,
/// a line starting with `~` is an interim one.
#[derive(Debug, Parser)]
#[command(name = "parley")]
#[command(about = "Practice spoken English with a turn-taking conversation partner")]
#[command(version)]
pub struct Cli {
    /// JSON file with orchestrator settings (missing fields use defaults)
    #[arg(long = "config", env = "PARLEY_CONFIG")]
    pub config: Option<PathBuf>,

    /// How long to wait for the learner to finish
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Fixed silence wait in seconds (ignored in patient mode)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Name the assistant introduces itself with
    #[arg(long = "assistant-name")]
    pub assistant_name: Option<String>,

    /// Start listening again automatically after each reply
    #[arg(long = "auto-listen")]
    pub auto_listen: bool,

    /// Use the built-in scripted tutor instead of a chat endpoint
    #[arg(long)]
    pub offline: bool,

    /// OpenAI-compatible chat-completions URL
    #[arg(long, env = "PARLEY_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Model name sent to the endpoint
    #[arg(long, env = "PARLEY_MODEL", default_value = "default")]
    pub model: String,

    /// Bearer token for the endpoint
    #[arg(long = "api-key", env = "PARLEY_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// System prompt for the conversation partner
    #[arg(long = "system-prompt", default_value = DEFAULT_SYSTEM_PROMPT)]
    pub system_prompt: String,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Silence mode as spelled on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Continuous,
    PushToTalk,
    Patient,
}

impl From<ModeArg> for SilenceMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Continuous => Self::Continuous,
            ModeArg::PushToTalk => Self::PushToTalk,
            ModeArg::Patient => Self::Patient,
        }
    }
}
