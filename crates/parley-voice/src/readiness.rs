//! One-time warm-up gate for the speech synthesis engine.
//!
//! A cold engine tends to drop or garble the first real utterance: its voice
//! list loads asynchronously and the first playback pays the start-up cost.
//! [`SynthesisReadiness::initialize`] waits for voices (with backoff) and
//! round-trips one inaudible probe utterance before the first reply is
//! spoken. Neither step can block forever: an empty voice list and a probe
//! timeout both count as "proceed anyway".
//!
//! Construct one instance per process and share it as
//! `Arc<SynthesisReadiness>`; concurrent callers of `initialize` await the
//! same in-flight warm-up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::OnceCell;

use crate::backend::{SpeechSynthesizer, Utterance, VoiceInfo};

/// Retry and timeout settings for the warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessSettings {
    /// How many times the voice list is requested before giving up.
    pub voice_attempts: u32,

    /// First backoff delay; doubles after every empty answer.
    pub voice_backoff_base: Duration,

    /// Upper bound on a single backoff delay.
    pub voice_backoff_cap: Duration,

    /// Hard limit on the probe utterance.
    pub probe_timeout: Duration,
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            voice_attempts: 10,
            voice_backoff_base: Duration::from_millis(50),
            voice_backoff_cap: Duration::from_millis(500),
            probe_timeout: Duration::from_secs(2),
        }
    }
}

/// Snapshot of the warm-up progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadinessStatus {
    pub voices_loaded: bool,
    pub voice_count: usize,
    pub test_passed: bool,
    pub is_ready: bool,
}

/// Warm-up gate in front of a [`SpeechSynthesizer`].
pub struct SynthesisReadiness {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    settings: ReadinessSettings,
    voices_loaded: AtomicBool,
    test_passed: AtomicBool,
    ready: AtomicBool,
    voices: OnceLock<Vec<VoiceInfo>>,
    init: OnceCell<bool>,
}

impl SynthesisReadiness {
    #[must_use]
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>) -> Self {
        Self::with_settings(synthesizer, ReadinessSettings::default())
    }

    #[must_use]
    pub fn with_settings(synthesizer: Arc<dyn SpeechSynthesizer>, settings: ReadinessSettings) -> Self {
        Self {
            synthesizer,
            settings,
            voices_loaded: AtomicBool::new(false),
            test_passed: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            voices: OnceLock::new(),
            init: OnceCell::new(),
        }
    }

    /// Warm the engine up, once.
    ///
    /// Later and concurrent calls share the first call's outcome. Returns
    /// whether the probe utterance genuinely completed; the gate is ready
    /// either way once this returns.
    pub async fn initialize(&self) -> bool {
        *self.init.get_or_init(|| self.warm_up()).await
    }

    /// Whether both warm-up steps have finished.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn status(&self) -> ReadinessStatus {
        ReadinessStatus {
            voices_loaded: self.voices_loaded.load(Ordering::SeqCst),
            voice_count: self.voices().len(),
            test_passed: self.test_passed.load(Ordering::SeqCst),
            is_ready: self.is_ready(),
        }
    }

    /// Voices reported during warm-up (empty before it or if none arrived).
    #[must_use]
    pub fn voices(&self) -> &[VoiceInfo] {
        self.voices.get().map_or(&[], Vec::as_slice)
    }

    /// First loaded voice whose language tag starts with `language`.
    #[must_use]
    pub fn preferred_voice(&self, language: &str) -> Option<String> {
        let language = language.to_lowercase();
        self.voices()
            .iter()
            .find(|v| v.language.to_lowercase().starts_with(&language))
            .map(|v| v.id.clone())
    }

    // ── Warm-up steps ──────────────────────────────────────────────

    async fn warm_up(&self) -> bool {
        tracing::info!("Warming up speech synthesis");

        let voices = self.load_voices().await;
        let voice_count = voices.len();
        let _ = self.voices.set(voices);
        self.voices_loaded.store(true, Ordering::SeqCst);

        let passed = self.run_probe().await;
        self.test_passed.store(passed, Ordering::SeqCst);
        self.ready.store(true, Ordering::SeqCst);

        tracing::info!(voice_count, probe_passed = passed, "Speech synthesis ready");
        passed
    }

    async fn load_voices(&self) -> Vec<VoiceInfo> {
        let mut delay = self.settings.voice_backoff_base;

        for attempt in 1..=self.settings.voice_attempts {
            let voices = self.synthesizer.voices().await;
            if !voices.is_empty() {
                tracing::debug!(attempt, count = voices.len(), "Voice list loaded");
                return voices;
            }

            if attempt < self.settings.voice_attempts {
                tracing::debug!(attempt, delay_ms = delay.as_millis(), "Voice list empty, retrying");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(self.settings.voice_backoff_cap);
            }
        }

        tracing::warn!(
            attempts = self.settings.voice_attempts,
            "No voices reported, proceeding with the engine default"
        );
        Vec::new()
    }

    async fn run_probe(&self) -> bool {
        let probe = Utterance::warmup_probe();
        match tokio::time::timeout(self.settings.probe_timeout, self.synthesizer.speak(&probe)).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Warm-up utterance failed, proceeding anyway");
                false
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.settings.probe_timeout.as_millis(),
                    "Warm-up utterance timed out, proceeding anyway"
                );
                self.synthesizer.cancel();
                false
            }
        }
    }
}

impl std::fmt::Debug for SynthesisReadiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisReadiness")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VoiceError;
    use mockall::mock;
    use tokio::time::Instant;

    mock! {
        Synth {}

        #[async_trait::async_trait]
        impl SpeechSynthesizer for Synth {
            async fn speak(&self, utterance: &Utterance) -> Result<(), VoiceError>;
            async fn voices(&self) -> Vec<VoiceInfo>;
            fn cancel(&self);
        }
    }

    fn voice(id: &str, language: &str) -> VoiceInfo {
        VoiceInfo {
            id: id.to_string(),
            name: id.to_uppercase(),
            language: language.to_string(),
        }
    }

    /// A synthesizer whose playback never completes.
    struct StuckSynth;

    #[async_trait::async_trait]
    impl SpeechSynthesizer for StuckSynth {
        async fn speak(&self, _utterance: &Utterance) -> Result<(), VoiceError> {
            std::future::pending().await
        }

        async fn voices(&self) -> Vec<VoiceInfo> {
            vec![voice("v1", "en-US")]
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_voices_arrive() {
        let mut synth = MockSynth::new();
        let mut calls = 0;
        synth.expect_voices().times(3).returning(move || {
            calls += 1;
            if calls < 3 {
                Vec::new()
            } else {
                vec![voice("fr", "fr-FR"), voice("en", "en-GB")]
            }
        });
        synth
            .expect_speak()
            .withf(|u| u.volume.abs() < f32::EPSILON)
            .times(1)
            .returning(|_| Ok(()));

        let readiness = SynthesisReadiness::new(Arc::new(synth));
        assert!(!readiness.is_ready());

        assert!(readiness.initialize().await);

        let status = readiness.status();
        assert!(status.is_ready && status.voices_loaded && status.test_passed);
        assert_eq!(status.voice_count, 2);
        assert_eq!(readiness.preferred_voice("en").as_deref(), Some("en"));
        assert_eq!(readiness.preferred_voice("de"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn proceeds_without_voices_after_bounded_backoff() {
        let mut synth = MockSynth::new();
        synth.expect_voices().times(10).returning(Vec::new);
        synth.expect_speak().times(1).returning(|_| Ok(()));

        let readiness = SynthesisReadiness::new(Arc::new(synth));
        let started = Instant::now();
        readiness.initialize().await;

        assert!(started.elapsed() < Duration::from_secs(5));
        let status = readiness.status();
        assert!(status.voices_loaded);
        assert_eq!(status.voice_count, 0);
        assert!(status.is_ready);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_failure_still_marks_ready() {
        let mut synth = MockSynth::new();
        synth.expect_voices().returning(|| vec![voice("en", "en-US")]);
        synth
            .expect_speak()
            .times(1)
            .returning(|_| Err(VoiceError::Synthesis("engine busy".into())));

        let readiness = SynthesisReadiness::new(Arc::new(synth));

        assert!(!readiness.initialize().await);
        assert!(readiness.is_ready());
        assert!(!readiness.status().test_passed);
    }

    #[tokio::test(start_paused = true)]
    async fn probe_timeout_is_bounded() {
        let readiness = SynthesisReadiness::new(Arc::new(StuckSynth));
        let started = Instant::now();

        assert!(!readiness.initialize().await);

        assert!(readiness.is_ready());
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_warm_up() {
        let mut synth = MockSynth::new();
        synth.expect_voices().times(1).returning(|| vec![voice("en", "en-US")]);
        synth.expect_speak().times(1).returning(|_| Ok(()));

        let readiness = Arc::new(SynthesisReadiness::new(Arc::new(synth)));
        let other = Arc::clone(&readiness);

        let (a, b) = tokio::join!(readiness.initialize(), other.initialize());
        assert!(a && b);

        // A later call is answered from the memoized result.
        assert!(readiness.initialize().await);
    }

    #[tokio::test(start_paused = true)]
    async fn not_ready_while_probe_is_in_flight() {
        use tokio_test::{assert_pending, task};

        let readiness = SynthesisReadiness::new(Arc::new(StuckSynth));
        let mut fut = task::spawn(readiness.initialize());
        assert_pending!(fut.poll());
        assert!(!readiness.is_ready());
    }
}
