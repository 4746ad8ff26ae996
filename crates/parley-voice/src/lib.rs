//! Turn-taking engine for spoken English practice.
//!
//! `parley-voice` decides whose turn it is in a voice conversation between a
//! learner and an assistant. It listens to recognizer fragments, decides
//! when the learner has finished speaking, forwards the transcript to a
//! response service, speaks the reply, and keeps the microphone closed long
//! enough that the assistant never hears itself.
//!
//! The engine is platform-agnostic: speech recognition, speech synthesis and
//! the chat backend are supplied as trait objects (see [`backend`]).
//!
//! ```text
//!   recognizer ──fragments──▶ TurnOrchestrator ──transcript──▶ ResponseService
//!                                  │    ▲                              │
//!                          MicLock │    └──────────── reply ───────────┘
//!                                  ▼
//!                          SpeechSynthesizer (behind SynthesisReadiness)
//! ```
#![deny(unused_crate_dependencies)]

pub mod backend;
pub mod completion;
pub mod config;
pub mod echo;
pub mod error;
pub mod gate;
pub mod orchestrator;
pub mod readiness;
pub mod session;
pub mod text_utils;

// Re-export key types for convenience
pub use backend::{
    ContextTurn, ResponseService, Speaker, SpeechRecognizer, SpeechSynthesizer, Utterance,
    VoiceInfo,
};
pub use completion::{CompletionReason, CompletionResult};
pub use config::{
    EchoConfig, OrchestratorConfig, SilenceConfig, SilenceMode, SpeechSettings, TurnTimings,
};
pub use echo::EchoFilter;
pub use error::{ConfigError, RecognizerError, VoiceError};
pub use gate::MicLock;
pub use orchestrator::{
    Collaborators, TurnEvent, TurnHandle, TurnOrchestrator, TurnSnapshot, TurnState,
};
pub use readiness::{ReadinessSettings, ReadinessStatus, SynthesisReadiness};
pub use session::SpeechSession;
