//! Orchestrator configuration and validation.
//!
//! All types deserialize with `#[serde(default)]` so a partial JSON file
//! only overrides the fields it names.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Silence wait used in Patient mode, regardless of word count.
pub const PATIENT_SILENCE: Duration = Duration::from_secs(15);

/// Silence wait used in Push-to-Talk mode.
pub const PUSH_TO_TALK_SILENCE: Duration = Duration::from_secs(8);

/// Apology spoken when the response service fails.
pub const DEFAULT_FALLBACK_REPLY: &str =
    "Sorry, I had trouble answering just now. Could you say that again?";

// ── Silence ────────────────────────────────────────────────────────

/// How long the orchestrator waits for a learner to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SilenceMode {
    /// Hands-free conversation; the wait grows with utterance length.
    #[default]
    Continuous,

    /// Learner explicitly starts each turn.
    PushToTalk,

    /// Long fixed wait for learners who pause a lot.
    Patient,
}

/// Silence-timing settings, consulted only by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SilenceConfig {
    pub mode: SilenceMode,

    /// Explicit silence wait in seconds (overrides every mode but Patient).
    pub custom_threshold_secs: Option<f64>,
}

impl SilenceConfig {
    /// Silence wait `D` for an utterance of `word_count` words.
    #[must_use]
    pub fn silence_timeout(&self, word_count: usize) -> Duration {
        if self.mode == SilenceMode::Patient {
            return PATIENT_SILENCE;
        }
        if let Some(secs) = self.custom_threshold_secs {
            return Duration::from_secs_f64(secs);
        }
        match self.mode {
            SilenceMode::PushToTalk => PUSH_TO_TALK_SILENCE,
            _ => match word_count {
                0..10 => Duration::from_secs(8),
                10..30 => Duration::from_secs(10),
                _ => Duration::from_secs(12),
            },
        }
    }

    /// Whether the short-utterance word floor applies.
    #[must_use]
    pub fn enforces_word_floor(&self) -> bool {
        self.mode != SilenceMode::Patient
    }
}

// ── Timings ────────────────────────────────────────────────────────

/// Timer constants for endpointing and cooldown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnTimings {
    /// Early-completion poll cadence.
    pub poll_interval_ms: u64,

    /// Minimum quiet time since the last fragment before an early finalize.
    pub min_settle_ms: u64,

    /// Heuristic confidence that must be exceeded for an early finalize.
    pub early_confidence: f32,

    /// Utterances shorter than this arm only the backstop timer (outside Patient mode).
    pub min_words: usize,

    /// Silence wait while the word floor holds.
    pub floor_backstop_ms: u64,

    /// First cooldown stage: let the audio device go quiet.
    pub cooldown_settle_ms: u64,

    /// Second cooldown stage before the mic lock is released.
    pub cooldown_release_ms: u64,

    /// Upper bound on a response-service call.
    pub response_timeout_ms: u64,

    /// Upper bound on one synthesis call.
    pub synthesis_timeout_ms: u64,
}

impl Default for TurnTimings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            min_settle_ms: 3_000,
            early_confidence: 0.8,
            min_words: 5,
            floor_backstop_ms: 15_000,
            cooldown_settle_ms: 2_000,
            cooldown_release_ms: 8_000,
            response_timeout_ms: 30_000,
            synthesis_timeout_ms: 120_000,
        }
    }
}

impl TurnTimings {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn min_settle(&self) -> Duration {
        Duration::from_millis(self.min_settle_ms)
    }

    #[must_use]
    pub const fn floor_backstop(&self) -> Duration {
        Duration::from_millis(self.floor_backstop_ms)
    }

    #[must_use]
    pub const fn cooldown_settle(&self) -> Duration {
        Duration::from_millis(self.cooldown_settle_ms)
    }

    #[must_use]
    pub const fn cooldown_release(&self) -> Duration {
        Duration::from_millis(self.cooldown_release_ms)
    }

    #[must_use]
    pub const fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    #[must_use]
    pub const fn synthesis_timeout(&self) -> Duration {
        Duration::from_millis(self.synthesis_timeout_ms)
    }
}

// ── Echo and speech ────────────────────────────────────────────────

/// Echo filter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    /// How many recent system utterances are remembered.
    pub history_capacity: usize,

    /// Name the assistant introduces itself with.
    pub assistant_name: String,

    /// Extra phrases always treated as system speech.
    pub extra_signatures: Vec<String>,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            history_capacity: 10,
            assistant_name: "emma".to_string(),
            extra_signatures: Vec::new(),
        }
    }
}

/// Voice settings applied to each reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    /// Explicit voice id; `None` picks a loaded voice matching `language`.
    pub voice: Option<String>,

    /// Language prefix used to pick a voice (e.g. `"en"`).
    pub language: String,

    /// Speaking rate multiplier.
    pub rate: f32,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            voice: None,
            language: "en".to_string(),
            rate: 0.9,
        }
    }
}

// ── Orchestrator ───────────────────────────────────────────────────

/// Full configuration for a [`TurnOrchestrator`](crate::TurnOrchestrator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub silence: SilenceConfig,
    pub timings: TurnTimings,
    pub echo: EchoConfig,
    pub speech: SpeechSettings,

    /// Spoken when the response service fails or returns nothing.
    pub fallback_reply: String,

    /// Number of recent turns passed to the response service.
    pub context_turns: usize,

    /// Re-arm the microphone automatically once cooldown ends.
    pub auto_listen: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            silence: SilenceConfig::default(),
            timings: TurnTimings::default(),
            echo: EchoConfig::default(),
            speech: SpeechSettings::default(),
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
            context_turns: 6,
            auto_listen: false,
        }
    }
}

/// Validate configuration values.
pub fn validate_config(config: &OrchestratorConfig) -> Result<(), ConfigError> {
    if let Some(secs) = config.silence.custom_threshold_secs {
        if !(1.0..=120.0).contains(&secs) {
            return Err(ConfigError::InvalidSilenceThreshold(secs));
        }
    }

    let timings = &config.timings;
    if !(0.0..=1.0).contains(&timings.early_confidence) {
        return Err(ConfigError::InvalidConfidence(timings.early_confidence));
    }

    for (name, value) in [
        ("poll_interval_ms", timings.poll_interval_ms),
        ("floor_backstop_ms", timings.floor_backstop_ms),
        ("response_timeout_ms", timings.response_timeout_ms),
        ("synthesis_timeout_ms", timings.synthesis_timeout_ms),
    ] {
        if value == 0 {
            return Err(ConfigError::ZeroDuration { name });
        }
    }

    if !(1..=100).contains(&config.echo.history_capacity) {
        return Err(ConfigError::InvalidEchoCapacity(config.echo.history_capacity));
    }

    if !(0.1..=10.0).contains(&config.speech.rate) {
        return Err(ConfigError::InvalidSpeechRate(config.speech.rate));
    }

    if config.fallback_reply.trim().is_empty() {
        return Err(ConfigError::EmptyFallbackReply);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patient_mode_ignores_custom_threshold() {
        let config = SilenceConfig {
            mode: SilenceMode::Patient,
            custom_threshold_secs: Some(3.0),
        };
        assert_eq!(config.silence_timeout(1), Duration::from_secs(15));
        assert_eq!(config.silence_timeout(100), Duration::from_secs(15));
        assert!(!config.enforces_word_floor());
    }

    #[test]
    fn custom_threshold_overrides_modes() {
        let config = SilenceConfig {
            mode: SilenceMode::Continuous,
            custom_threshold_secs: Some(4.5),
        };
        assert_eq!(config.silence_timeout(40), Duration::from_millis(4_500));
    }

    #[test]
    fn push_to_talk_is_fixed() {
        let config = SilenceConfig {
            mode: SilenceMode::PushToTalk,
            custom_threshold_secs: None,
        };
        assert_eq!(config.silence_timeout(3), Duration::from_secs(8));
        assert_eq!(config.silence_timeout(50), Duration::from_secs(8));
    }

    #[test]
    fn continuous_mode_tiers_by_word_count() {
        let config = SilenceConfig::default();
        assert_eq!(config.silence_timeout(9), Duration::from_secs(8));
        assert_eq!(config.silence_timeout(10), Duration::from_secs(10));
        assert_eq!(config.silence_timeout(29), Duration::from_secs(10));
        assert_eq!(config.silence_timeout(30), Duration::from_secs(12));
        assert!(config.enforces_word_floor());
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&OrchestratorConfig::default()).is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = OrchestratorConfig::default();
        config.silence.custom_threshold_secs = Some(0.2);
        assert_eq!(
            validate_config(&config),
            Err(ConfigError::InvalidSilenceThreshold(0.2))
        );

        let mut config = OrchestratorConfig::default();
        config.timings.poll_interval_ms = 0;
        assert_eq!(
            validate_config(&config),
            Err(ConfigError::ZeroDuration {
                name: "poll_interval_ms"
            })
        );

        let mut config = OrchestratorConfig::default();
        config.timings.floor_backstop_ms = 0;
        assert_eq!(
            validate_config(&config),
            Err(ConfigError::ZeroDuration {
                name: "floor_backstop_ms"
            })
        );

        let mut config = OrchestratorConfig::default();
        config.echo.history_capacity = 0;
        assert_eq!(validate_config(&config), Err(ConfigError::InvalidEchoCapacity(0)));

        let mut config = OrchestratorConfig::default();
        config.fallback_reply = "  ".to_string();
        assert_eq!(validate_config(&config), Err(ConfigError::EmptyFallbackReply));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: OrchestratorConfig = serde_json::from_str(
            r#"{ "silence": { "mode": "patient" }, "timings": { "min_words": 3 } }"#,
        )
        .unwrap();
        assert_eq!(config.silence.mode, SilenceMode::Patient);
        assert_eq!(config.timings.min_words, 3);
        assert_eq!(config.timings.poll_interval_ms, 500);
        assert_eq!(config.timings.floor_backstop(), Duration::from_secs(15));
        assert_eq!(config.echo.history_capacity, 10);
    }
}
