//! Turn engine error types.

/// Errors reported by the speech-to-text capability.
///
/// These are surfaced to the user as text; the orchestrator returns to
/// `Idle` and never touches the mic lock because of them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecognizerError {
    /// The recognizer heard nothing before giving up.
    #[error("No speech detected")]
    NoSpeech,

    /// Microphone access was refused by the user or the platform.
    #[error("Microphone permission denied")]
    PermissionDenied,

    /// The recognizer's network backend is unreachable.
    #[error("Speech recognition network error")]
    Network,

    /// Recognition was aborted before it produced a result.
    #[error("Speech recognition aborted")]
    Aborted,

    /// Anything else the recognizer reports.
    #[error("Speech recognition failed: {0}")]
    Other(String),
}

impl RecognizerError {
    /// Text shown to the learner when this error occurs.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NoSpeech => "I didn't hear anything. Tap the mic and try again.".to_string(),
            Self::PermissionDenied => {
                "Microphone access is blocked. Allow it in your settings to practice speaking."
                    .to_string()
            }
            Self::Network => {
                "Speech recognition needs a network connection. Check it and try again.".to_string()
            }
            Self::Aborted => "Listening stopped. Tap the mic to try again.".to_string(),
            Self::Other(detail) => format!("Speech recognition failed: {detail}"),
        }
    }
}

/// Errors that can occur in the turn engine and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// The speech-to-text capability reported an error.
    #[error(transparent)]
    Recognizer(#[from] RecognizerError),

    /// The response service answered with a non-success status.
    #[error("Response service returned status {0}")]
    ResponseStatus(u16),

    /// The response service answered with a payload we could not use.
    #[error("Malformed response payload: {0}")]
    ResponseMalformed(String),

    /// The response service could not be reached.
    #[error("Response service unreachable: {0}")]
    ResponseTransport(String),

    /// The response service did not answer in time.
    #[error("Response service timed out")]
    ResponseTimeout,

    /// Failed to synthesize or play speech.
    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    /// Synthesis did not report completion in time.
    #[error("Speech synthesis timed out")]
    SynthesisTimeout,

    /// The orchestrator task is no longer running.
    #[error("Turn orchestrator is not running")]
    NotRunning,

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// IO error (config files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Custom silence threshold must be between 1 and 120 seconds, got {0}")]
    InvalidSilenceThreshold(f64),

    #[error("Early-finalize confidence must be within 0.0..=1.0, got {0}")]
    InvalidConfidence(f32),

    #[error("{name} must be greater than zero")]
    ZeroDuration { name: &'static str },

    #[error("Echo history capacity must be between 1 and 100, got {0}")]
    InvalidEchoCapacity(usize),

    #[error("Speech rate must be between 0.1 and 10.0, got {0}")]
    InvalidSpeechRate(f32),

    #[error("Fallback reply cannot be empty")]
    EmptyFallbackReply,
}
