//! Collaborator traits: the engine's view of recognizer, synthesizer and
//! response service.
//!
//! The [`TurnOrchestrator`](crate::TurnOrchestrator) holds these as trait
//! objects so that browser, native and test implementations can be swapped
//! without touching the turn logic.
//!
//! The recognizer delivers fragments by pushing them through a
//! [`TurnHandle`](crate::TurnHandle); the trait only covers starting and
//! stopping it.

use serde::{Deserialize, Serialize};

use crate::error::{RecognizerError, VoiceError};

// ── Shared types ───────────────────────────────────────────────────

/// A voice offered by the synthesis engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceInfo {
    /// Voice identifier (used in [`Utterance::voice`]).
    pub id: String,

    /// Human-readable display name.
    pub name: String,

    /// BCP-47 language tag, e.g. `"en-US"`.
    pub language: String,
}

/// One request to speak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Utterance {
    pub text: String,

    /// Voice id; `None` lets the engine use its default voice.
    pub voice: Option<String>,

    /// Speaking rate multiplier (1.0 = normal).
    pub rate: f32,

    /// Volume, 0.0 (silent) to 1.0.
    pub volume: f32,
}

impl Utterance {
    /// Normal-volume speech at the default rate and voice.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice: None,
            rate: 1.0,
            volume: 1.0,
        }
    }

    #[must_use]
    pub fn with_voice(mut self, voice: Option<String>) -> Self {
        self.voice = voice;
        self
    }

    #[must_use]
    pub const fn with_rate(mut self, rate: f32) -> Self {
        self.rate = rate;
        self
    }

    /// The inaudible, fast utterance used to warm up a cold engine.
    #[must_use]
    pub fn warmup_probe() -> Self {
        Self {
            text: "ready".to_string(),
            voice: None,
            rate: 2.0,
            volume: 0.0,
        }
    }
}

/// Who said a line of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Learner,
    Assistant,
}

/// One line of recent conversation passed to the response service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextTurn {
    pub speaker: Speaker,
    pub text: String,
}

// ── Recognizer ─────────────────────────────────────────────────────

/// Start/stop control over the speech-to-text capability.
///
/// Called only from the orchestrator task, so implementations need not be
/// `Sync`.
pub trait SpeechRecognizer: Send {
    /// Begin emitting fragments for a new listening window.
    fn start(&mut self) -> Result<(), RecognizerError>;

    /// Stop emitting fragments. Must be safe to call when already stopped.
    fn stop(&mut self);
}

// ── Synthesizer ────────────────────────────────────────────────────

/// Backend-agnostic text-to-speech capability.
///
/// `speak` resolves when playback completes; both `Ok` and `Err` mean the
/// engine is done speaking as far as the turn engine is concerned.
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Speak `utterance` and wait for playback to finish.
    async fn speak(&self, utterance: &Utterance) -> Result<(), VoiceError>;

    /// Voices currently known to the engine. May be empty while it loads.
    async fn voices(&self) -> Vec<VoiceInfo>;

    /// Stop any playback in progress. Best effort.
    fn cancel(&self) {}
}

// ── Response service ───────────────────────────────────────────────

/// The chat backend that produces the assistant's reply.
#[async_trait::async_trait]
pub trait ResponseService: Send + Sync {
    /// Produce a reply to `transcript` given the recent conversation.
    async fn send(&self, transcript: &str, context: &[ContextTurn]) -> Result<String, VoiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warmup_probe_is_silent_and_fast() {
        let probe = Utterance::warmup_probe();
        assert!(probe.volume.abs() < f32::EPSILON);
        assert!(probe.rate > 1.0);
        assert!(!probe.text.is_empty());
    }

    #[test]
    fn utterance_builder_sets_voice_and_rate() {
        let u = Utterance::new("hello")
            .with_voice(Some("en-gb-1".to_string()))
            .with_rate(0.8);
        assert_eq!(u.voice.as_deref(), Some("en-gb-1"));
        assert!((u.rate - 0.8).abs() < f32::EPSILON);
        assert!((u.volume - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn voice_info_serializes_field_names() {
        let json = serde_json::to_value(VoiceInfo {
            id: "v1".into(),
            name: "Ava".into(),
            language: "en-US".into(),
        })
        .unwrap();
        let mut keys: Vec<&str> = json
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, ["id", "language", "name"]);

        let back: VoiceInfo = serde_json::from_value(json).unwrap();
        assert_eq!(back.language, "en-US");
    }
}
