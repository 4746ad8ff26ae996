//! Turn orchestrator — decides whose turn it is and when the learner is done.
//!
//! The orchestrator is a single actor task that owns the whole turn state
//! machine:
//!
//! ```text
//!   Idle → Listening → AwaitingSilence → Processing → Speaking → CoolingDown
//!    ▲                        │                                     │
//!    └──── duplicate / echo ──┘                                     │
//!    └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything that can change the state arrives on one queue and is handled
//! in order: commands from [`TurnHandle`], completions of spawned reply and
//! synthesis work, and timer deadlines. Timers are plain deadlines held in a
//! single [`TurnTimers`] value that is cleared on every state transition, so
//! no timer ever outlives the turn that armed it.
//!
//! The [`MicLock`] is engaged from the moment a reply starts playing until
//! the two-stage cooldown ends. Activation requests while it is engaged are
//! dropped, not queued.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::backend::{
    ContextTurn, ResponseService, Speaker, SpeechRecognizer, SpeechSynthesizer, Utterance,
};
use crate::completion;
use crate::config::{OrchestratorConfig, validate_config};
use crate::echo::EchoFilter;
use crate::error::{ConfigError, RecognizerError, VoiceError};
use crate::gate::MicLock;
use crate::readiness::SynthesisReadiness;
use crate::session::SpeechSession;
use crate::text_utils;

// ── Turn state machine ─────────────────────────────────────────────

/// Current phase of the conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// Nobody holds the turn; waiting for an activation request.
    #[default]
    Idle,

    /// Recognizer running, nothing heard yet.
    Listening,

    /// Speech heard; endpointing timers decide when it is finished.
    AwaitingSilence,

    /// Transcript handed to the response service.
    Processing,

    /// Reply being synthesized and played.
    Speaking,

    /// Playback finished; waiting for the room to go quiet.
    CoolingDown,
}

/// What the UI renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct TurnSnapshot {
    pub state: TurnState,

    /// Mic lock engaged (listening vetoed).
    pub locked: bool,

    /// Whole seconds left on the silence timer, while it runs.
    pub countdown_secs: Option<u64>,

    /// Last recognizer error, as user-facing text.
    pub last_error: Option<String>,
}

// ── Events emitted by the orchestrator ─────────────────────────────

/// Events emitted to the UI / application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// Turn state changed.
    StateChanged(TurnState),

    /// Mic lock engaged (`true`) or released (`false`).
    LockChanged(bool),

    /// Seconds left before the silence timer ends the learner's turn.
    Countdown(u64),

    /// A transcript passed the duplicate and echo checks.
    TranscriptAccepted(String),

    /// The reply about to be spoken.
    Reply(String),

    /// The recognizer failed; user-facing message.
    RecognizerError(String),
}

// ── Commands and completions ───────────────────────────────────────

#[derive(Debug)]
enum Command {
    Activate,
    Fragment { text: String, is_final: bool },
    RecognizerFailed(RecognizerError),
    EndConversation,
    Shutdown,
}

#[derive(Debug)]
enum Completion {
    Reply {
        turn: u64,
        result: Result<String, VoiceError>,
    },
    Spoken {
        turn: u64,
        result: Result<(), VoiceError>,
    },
}

// ── Timers ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CooldownStage {
    /// Waiting for the audio device to go quiet.
    Settle,
    /// Extra margin for speaker tails before the lock is released.
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tick {
    Silence,
    Poll,
    Countdown,
    Cooldown(CooldownStage),
}

/// Every pending deadline of the current turn.
#[derive(Debug, Default)]
struct TurnTimers {
    silence: Option<Instant>,
    poll: Option<Instant>,
    poll_until: Option<Instant>,
    countdown: Option<Instant>,
    cooldown: Option<(Instant, CooldownStage)>,
}

impl TurnTimers {
    fn cancel_all(&mut self) {
        *self = Self::default();
    }

    /// Earliest pending deadline; ties resolve in declaration order.
    fn next(&self) -> Option<(Instant, Tick)> {
        [
            self.silence.map(|at| (at, Tick::Silence)),
            self.poll.map(|at| (at, Tick::Poll)),
            self.countdown.map(|at| (at, Tick::Countdown)),
            self.cooldown.map(|(at, stage)| (at, Tick::Cooldown(stage))),
        ]
        .into_iter()
        .flatten()
        .min_by_key(|(at, _)| *at)
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

// ── Collaborators ──────────────────────────────────────────────────

/// External capabilities the orchestrator drives.
pub struct Collaborators {
    pub recognizer: Box<dyn SpeechRecognizer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub responder: Arc<dyn ResponseService>,
    /// Shared, process-wide warm-up gate for `synthesizer`.
    pub readiness: Arc<SynthesisReadiness>,
}

// ── Handle ─────────────────────────────────────────────────────────

/// Cloneable front door to a running orchestrator.
#[derive(Debug, Clone)]
pub struct TurnHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<TurnSnapshot>,
    mic_lock: MicLock,
}

impl TurnHandle {
    /// Ask to start listening. Dropped while the mic lock is engaged.
    pub fn activate(&self) -> Result<(), VoiceError> {
        self.send(Command::Activate)
    }

    /// Deliver a recognizer fragment.
    pub fn push_fragment(&self, text: impl Into<String>, is_final: bool) -> Result<(), VoiceError> {
        self.send(Command::Fragment {
            text: text.into(),
            is_final,
        })
    }

    /// Deliver a recognizer error signal.
    pub fn report_recognizer_error(&self, error: RecognizerError) -> Result<(), VoiceError> {
        self.send(Command::RecognizerFailed(error))
    }

    /// Abandon the conversation and return to `Idle` from any state.
    pub fn end_conversation(&self) -> Result<(), VoiceError> {
        self.send(Command::EndConversation)
    }

    /// Stop the orchestrator task.
    pub fn shutdown(&self) -> Result<(), VoiceError> {
        self.send(Command::Shutdown)
    }

    #[must_use]
    pub fn snapshot(&self) -> TurnSnapshot {
        self.snapshot.borrow().clone()
    }

    #[must_use]
    pub fn state(&self) -> TurnState {
        self.snapshot.borrow().state
    }

    /// Receiver that is notified on every snapshot change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<TurnSnapshot> {
        self.snapshot.clone()
    }

    /// The shared mic lock, for recognizer adapters and other playback.
    #[must_use]
    pub fn mic_lock(&self) -> MicLock {
        self.mic_lock.clone()
    }

    fn send(&self, command: Command) -> Result<(), VoiceError> {
        self.commands.send(command).map_err(|_| VoiceError::NotRunning)
    }
}

// ── Orchestrator ───────────────────────────────────────────────────

/// The turn-taking coordinator. Create with [`new`](Self::new), then
/// [`spawn`](Self::spawn) it (or `.await` [`run`](Self::run) yourself).
pub struct TurnOrchestrator {
    config: OrchestratorConfig,
    state: TurnState,
    session: SpeechSession,
    echo: EchoFilter,
    mic_lock: MicLock,
    timers: TurnTimers,

    /// Id of the current reply/synthesis round; stale completions are ignored.
    turn: u64,
    /// Transcript most recently forwarded to the response service.
    last_processed: Option<String>,
    context: VecDeque<ContextTurn>,
    in_flight: Option<JoinHandle<()>>,
    listening: bool,
    countdown_secs: Option<u64>,
    last_error: Option<String>,

    recognizer: Box<dyn SpeechRecognizer>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    responder: Arc<dyn ResponseService>,
    readiness: Arc<SynthesisReadiness>,

    event_tx: mpsc::UnboundedSender<TurnEvent>,
    snapshot_tx: watch::Sender<TurnSnapshot>,
    snapshot_rx: watch::Receiver<TurnSnapshot>,
    command_tx: mpsc::UnboundedSender<Command>,
    command_rx: mpsc::UnboundedReceiver<Command>,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
}

impl TurnOrchestrator {
    /// Create an orchestrator in `Idle`.
    ///
    /// Returns the orchestrator and a receiver for [`TurnEvent`]s.
    pub fn new(
        config: OrchestratorConfig,
        collaborators: Collaborators,
    ) -> Result<(Self, mpsc::UnboundedReceiver<TurnEvent>), ConfigError> {
        validate_config(&config)?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(TurnSnapshot::default());

        let orchestrator = Self {
            echo: EchoFilter::new(&config.echo),
            context: VecDeque::with_capacity(config.context_turns),
            config,
            state: TurnState::Idle,
            session: SpeechSession::new(),
            mic_lock: MicLock::new(),
            timers: TurnTimers::default(),
            turn: 0,
            last_processed: None,
            in_flight: None,
            listening: false,
            countdown_secs: None,
            last_error: None,
            recognizer: collaborators.recognizer,
            synthesizer: collaborators.synthesizer,
            responder: collaborators.responder,
            readiness: collaborators.readiness,
            event_tx,
            snapshot_tx,
            snapshot_rx,
            command_tx,
            command_rx,
            completion_tx,
            completion_rx,
        };

        Ok((orchestrator, event_rx))
    }

    /// A handle for sending commands and reading snapshots.
    #[must_use]
    pub fn handle(&self) -> TurnHandle {
        TurnHandle {
            commands: self.command_tx.clone(),
            snapshot: self.snapshot_rx.clone(),
            mic_lock: self.mic_lock.clone(),
        }
    }

    /// Run the orchestrator on its own task.
    pub fn spawn(self) -> (TurnHandle, JoinHandle<()>) {
        let handle = self.handle();
        (handle, tokio::spawn(self.run()))
    }

    /// Process commands, completions and timers until shut down.
    pub async fn run(mut self) {
        tracing::info!(mode = ?self.config.silence.mode, "Turn orchestrator running");

        loop {
            let next_tick = self.timers.next();

            tokio::select! {
                biased;

                command = self.command_rx.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.handle_command(command),
                },

                Some(completion) = self.completion_rx.recv() => {
                    self.handle_completion(completion);
                }

                () = sleep_until_deadline(next_tick.map(|(at, _)| at)) => {
                    if let Some((_, tick)) = next_tick {
                        self.handle_tick(tick);
                    }
                }
            }
        }

        self.abort_in_flight();
        self.stop_listening();
        tracing::info!("Turn orchestrator stopped");
    }

    // ── Commands ───────────────────────────────────────────────────

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Activate => self.activate(),
            Command::Fragment { text, is_final } => self.on_fragment(&text, is_final),
            Command::RecognizerFailed(error) => self.on_recognizer_error(&error),
            Command::EndConversation => self.end_conversation(),
            Command::Shutdown => {}
        }
    }

    fn activate(&mut self) {
        if self.mic_lock.is_locked() {
            tracing::info!(state = ?self.state, "Activation ignored, mic locked");
            self.publish_snapshot();
            return;
        }
        if self.state != TurnState::Idle {
            tracing::debug!(state = ?self.state, "Activation ignored, turn in progress");
            return;
        }

        self.timers.cancel_all();
        self.session.start();
        if let Err(error) = self.recognizer.start() {
            let _ = self.session.end();
            self.on_recognizer_error(&error);
            return;
        }
        self.listening = true;
        self.last_error = None;
        self.set_state(TurnState::Listening);
    }

    fn on_fragment(&mut self, text: &str, is_final: bool) {
        if !matches!(self.state, TurnState::Listening | TurnState::AwaitingSilence) {
            tracing::debug!(state = ?self.state, "Fragment outside listening window dropped");
            return;
        }
        if self.mic_lock.is_locked() {
            tracing::debug!("Fragment dropped, mic locked");
            return;
        }
        if text.trim().is_empty() {
            return;
        }

        self.session.add_fragment(text, is_final);
        if self.state == TurnState::Listening {
            self.set_state(TurnState::AwaitingSilence);
        }
        self.arm_endpointing();
    }

    fn on_recognizer_error(&mut self, error: &RecognizerError) {
        tracing::warn!(error = %error, state = ?self.state, "Recognizer error");

        let message = error.user_message();
        self.last_error = Some(message.clone());
        self.emit(TurnEvent::RecognizerError(message));

        if matches!(
            self.state,
            TurnState::Idle | TurnState::Listening | TurnState::AwaitingSilence
        ) {
            self.stop_listening();
            let _ = self.session.end();
            self.set_state(TurnState::Idle);
        }
        self.publish_snapshot();
    }

    fn end_conversation(&mut self) {
        tracing::info!(state = ?self.state, "Conversation ended");

        self.timers.cancel_all();
        self.turn += 1;
        self.abort_in_flight();
        if self.state == TurnState::Speaking {
            self.synthesizer.cancel();
        }
        self.stop_listening();
        let _ = self.session.end();
        self.last_processed = None;
        self.context.clear();
        self.last_error = None;

        if self.mic_lock.release() {
            self.emit(TurnEvent::LockChanged(false));
        }
        self.set_state(TurnState::Idle);
        self.countdown_secs = None;
        self.publish_snapshot();
    }

    // ── Endpointing ────────────────────────────────────────────────

    /// Re-arm silence, poll and countdown timers for the current text.
    fn arm_endpointing(&mut self) {
        self.timers.cancel_all();
        self.countdown_secs = None;

        let words = self.session.word_count();
        let silence = self.config.silence;
        if silence.enforces_word_floor() && words < self.config.timings.min_words {
            tracing::debug!(words, "Below word floor, waiting for more speech");
            self.timers.silence = Some(Instant::now() + self.config.timings.floor_backstop());
            self.publish_snapshot();
            return;
        }

        let now = Instant::now();
        let wait = silence.silence_timeout(words);
        self.timers.silence = Some(now + wait);
        self.timers.poll = Some(now + self.config.timings.poll_interval());
        self.timers.poll_until = Some(now + wait / 2);
        self.timers.countdown = Some(now + Duration::from_secs(1));

        tracing::debug!(words, wait_ms = wait.as_millis(), "Endpointing timers armed");
        self.update_countdown(now);
    }

    fn handle_tick(&mut self, tick: Tick) {
        match tick {
            Tick::Silence => {
                tracing::debug!("Silence timer elapsed");
                self.finalize();
            }
            Tick::Poll => self.poll_completion(),
            Tick::Countdown => {
                let now = Instant::now();
                self.update_countdown(now);
                self.timers.countdown = self
                    .timers
                    .silence
                    .filter(|deadline| now + Duration::from_secs(1) < *deadline)
                    .map(|_| now + Duration::from_secs(1));
            }
            Tick::Cooldown(stage) => self.advance_cooldown(stage),
        }
    }

    fn poll_completion(&mut self) {
        let now = Instant::now();
        if self.timers.poll_until.is_none_or(|until| now > until) {
            tracing::trace!("Early-completion poll window closed");
            self.timers.poll = None;
            return;
        }

        let timings = &self.config.timings;
        let verdict = completion::evaluate(&self.session.live_text());
        let quiet_for = self
            .session
            .last_fragment_at()
            .map_or(Duration::ZERO, |at| now.saturating_duration_since(at));

        if verdict.is_confidently_complete(timings.early_confidence) && quiet_for >= timings.min_settle() {
            tracing::debug!(
                reason = ?verdict.reason,
                confidence = verdict.confidence,
                quiet_ms = quiet_for.as_millis(),
                "Early completion"
            );
            self.finalize();
            return;
        }

        self.timers.poll = Some(now + timings.poll_interval());
    }

    fn update_countdown(&mut self, now: Instant) {
        let Some(deadline) = self.timers.silence else {
            return;
        };
        let remaining = deadline.saturating_duration_since(now);
        let secs = u64::try_from(remaining.as_millis().div_ceil(1000)).unwrap_or(u64::MAX);
        if self.countdown_secs != Some(secs) {
            self.countdown_secs = Some(secs);
            self.emit(TurnEvent::Countdown(secs));
            self.publish_snapshot();
        }
    }

    /// End the learner's turn and decide what to do with the transcript.
    fn finalize(&mut self) {
        self.timers.cancel_all();
        self.stop_listening();

        let transcript = self
            .session
            .end()
            .map(|t| t.trim().to_string())
            .unwrap_or_default();

        if transcript.is_empty() {
            tracing::debug!("Empty transcript discarded");
            self.enter_idle(self.config.auto_listen);
            return;
        }
        if self.last_processed.as_deref() == Some(transcript.as_str()) {
            tracing::debug!("Duplicate transcript discarded");
            self.enter_idle(self.config.auto_listen);
            return;
        }
        if self.echo.is_echo(&transcript) {
            tracing::debug!("Echo transcript discarded");
            self.enter_idle(self.config.auto_listen);
            return;
        }

        tracing::info!(words = text_utils::word_count(&transcript), "Transcript accepted");
        self.last_processed = Some(transcript.clone());
        self.set_state(TurnState::Processing);
        self.emit(TurnEvent::TranscriptAccepted(transcript.clone()));
        self.request_reply(transcript);
    }

    // ── Reply and playback ─────────────────────────────────────────

    fn request_reply(&mut self, transcript: String) {
        let context: Vec<ContextTurn> = self.context.iter().cloned().collect();
        self.remember(Speaker::Learner, &transcript);

        self.turn += 1;
        let turn = self.turn;
        let responder = Arc::clone(&self.responder);
        let completion_tx = self.completion_tx.clone();
        let limit = self.config.timings.response_timeout();

        self.in_flight = Some(tokio::spawn(async move {
            let result = tokio::time::timeout(limit, responder.send(&transcript, &context))
                .await
                .unwrap_or(Err(VoiceError::ResponseTimeout));
            let _ = completion_tx.send(Completion::Reply { turn, result });
        }));
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Reply { turn, result } => {
                if turn != self.turn || self.state != TurnState::Processing {
                    tracing::debug!(turn, "Stale reply ignored");
                    return;
                }
                self.in_flight = None;

                let reply = match result {
                    Ok(text) if !text.trim().is_empty() => text,
                    Ok(_) => {
                        tracing::warn!("Response service returned an empty reply, speaking fallback");
                        self.config.fallback_reply.clone()
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Response service failed, speaking fallback");
                        self.config.fallback_reply.clone()
                    }
                };
                self.begin_speaking(reply);
            }
            Completion::Spoken { turn, result } => {
                if turn != self.turn || self.state != TurnState::Speaking {
                    tracing::debug!(turn, "Stale synthesis completion ignored");
                    return;
                }
                self.in_flight = None;

                if let Err(e) = result {
                    tracing::warn!(error = %e, "Synthesis failed, treating reply as spoken");
                }
                self.set_state(TurnState::CoolingDown);
                self.timers.cooldown = Some((
                    Instant::now() + self.config.timings.cooldown_settle(),
                    CooldownStage::Settle,
                ));
            }
        }
    }

    fn begin_speaking(&mut self, reply: String) {
        let spoken = text_utils::strip_markdown(&reply);
        self.echo.record_system_utterance(&reply);
        if text_utils::normalize(&spoken) != text_utils::normalize(&reply) {
            self.echo.record_system_utterance(&spoken);
        }
        self.remember(Speaker::Assistant, &reply);

        if self.mic_lock.engage() {
            self.emit(TurnEvent::LockChanged(true));
        }
        self.stop_listening();
        self.set_state(TurnState::Speaking);
        self.emit(TurnEvent::Reply(reply));

        let turn = self.turn;
        let synthesizer = Arc::clone(&self.synthesizer);
        let readiness = Arc::clone(&self.readiness);
        let completion_tx = self.completion_tx.clone();
        let speech = self.config.speech.clone();
        let limit = self.config.timings.synthesis_timeout();

        self.in_flight = Some(tokio::spawn(async move {
            if !readiness.is_ready() {
                tracing::debug!("Waiting for speech synthesis warm-up");
            }
            readiness.initialize().await;

            let result = if spoken.is_empty() {
                Ok(())
            } else {
                let voice = speech
                    .voice
                    .or_else(|| readiness.preferred_voice(&speech.language));
                let utterance = Utterance::new(spoken).with_voice(voice).with_rate(speech.rate);
                speak_with_fallback(synthesizer.as_ref(), utterance, limit).await
            };
            let _ = completion_tx.send(Completion::Spoken { turn, result });
        }));
    }

    fn advance_cooldown(&mut self, stage: CooldownStage) {
        match stage {
            CooldownStage::Settle => {
                tracing::debug!("Audio settled, holding mic lock for speaker tails");
                self.timers.cooldown = Some((
                    Instant::now() + self.config.timings.cooldown_release(),
                    CooldownStage::Release,
                ));
            }
            CooldownStage::Release => {
                self.timers.cooldown = None;
                if self.mic_lock.release() {
                    self.emit(TurnEvent::LockChanged(false));
                }
                self.enter_idle(self.config.auto_listen);
            }
        }
    }

    // ── Internal helpers ───────────────────────────────────────────

    /// Go to `Idle`, optionally re-arming the microphone straight away.
    fn enter_idle(&mut self, rearm: bool) {
        self.set_state(TurnState::Idle);
        if rearm {
            self.activate();
        }
    }

    fn stop_listening(&mut self) {
        if self.listening {
            self.recognizer.stop();
            self.listening = false;
        }
    }

    fn abort_in_flight(&mut self) {
        if let Some(task) = self.in_flight.take() {
            task.abort();
        }
    }

    fn remember(&mut self, speaker: Speaker, text: &str) {
        if self.config.context_turns == 0 {
            return;
        }
        self.context.push_back(ContextTurn {
            speaker,
            text: text.to_string(),
        });
        while self.context.len() > self.config.context_turns {
            self.context.pop_front();
        }
    }

    /// Transition to a new state, cancelling every pending timer.
    fn set_state(&mut self, new_state: TurnState) {
        if self.state == new_state {
            return;
        }
        tracing::debug!(old = ?self.state, new = ?new_state, "Turn state transition");
        self.timers.cancel_all();
        self.countdown_secs = None;
        self.state = new_state;
        self.emit(TurnEvent::StateChanged(new_state));
        self.publish_snapshot();
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(TurnSnapshot {
            state: self.state,
            locked: self.mic_lock.is_locked(),
            countdown_secs: self.countdown_secs,
            last_error: self.last_error.clone(),
        });
    }

    /// Emit an event. A dropped receiver is not an error.
    fn emit(&self, event: TurnEvent) {
        if self.event_tx.send(event).is_err() {
            tracing::trace!("Turn event receiver dropped");
        }
    }
}

/// Speak `utterance`; on failure retry once with the engine's default voice.
async fn speak_with_fallback(
    synthesizer: &dyn SpeechSynthesizer,
    utterance: Utterance,
    limit: Duration,
) -> Result<(), VoiceError> {
    match speak_bounded(synthesizer, &utterance, limit).await {
        Ok(()) => Ok(()),
        Err(e) => {
            tracing::warn!(error = %e, "Synthesis failed, trying default voice once");
            speak_bounded(synthesizer, &utterance.with_voice(None), limit).await
        }
    }
}

async fn speak_bounded(
    synthesizer: &dyn SpeechSynthesizer,
    utterance: &Utterance,
    limit: Duration,
) -> Result<(), VoiceError> {
    if let Ok(result) = tokio::time::timeout(limit, synthesizer.speak(utterance)).await {
        result
    } else {
        synthesizer.cancel();
        Err(VoiceError::SynthesisTimeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_all_clears_every_deadline() {
        let now = Instant::now();
        let mut timers = TurnTimers {
            silence: Some(now),
            poll: Some(now),
            poll_until: Some(now),
            countdown: Some(now),
            cooldown: Some((now, CooldownStage::Settle)),
        };
        timers.cancel_all();
        assert!(timers.next().is_none());
        assert!(timers.poll_until.is_none());
    }

    #[test]
    fn next_tick_is_earliest_deadline() {
        let now = Instant::now();
        let timers = TurnTimers {
            silence: Some(now + Duration::from_secs(8)),
            poll: Some(now + Duration::from_millis(500)),
            poll_until: Some(now + Duration::from_secs(4)),
            countdown: Some(now + Duration::from_secs(1)),
            cooldown: None,
        };
        assert_eq!(timers.next(), Some((now + Duration::from_millis(500), Tick::Poll)));
    }

    #[test]
    fn silence_wins_ties_with_countdown() {
        let at = Instant::now() + Duration::from_secs(8);
        let timers = TurnTimers {
            silence: Some(at),
            countdown: Some(at),
            ..TurnTimers::default()
        };
        assert_eq!(timers.next(), Some((at, Tick::Silence)));
    }

    #[test]
    fn default_snapshot_is_idle_and_unlocked() {
        let snapshot = TurnSnapshot::default();
        assert_eq!(snapshot.state, TurnState::Idle);
        assert!(!snapshot.locked);
        assert!(snapshot.countdown_secs.is_none());
    }
}
