//! Console adapters: typed lines stand in for the microphone and printed
//! lines for the speaker.
//!
//! Input syntax:
//!
//! | Line            | Meaning                               |
//! |-----------------|---------------------------------------|
//! | `/start`        | activate the microphone               |
//! | `/end`          | end the conversation                  |
//! | `/status`       | print the current turn snapshot       |
//! | `/help`         | print this table                      |
//! | `/quit`         | leave                                 |
//! | `~some words`   | interim recognizer fragment           |
//! | `!no-speech` …  | simulated recognizer error            |
//! | anything else   | final recognizer fragment             |

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parley_voice::{
    RecognizerError, SpeechRecognizer, SpeechSynthesizer, TurnEvent, TurnHandle, TurnState,
    Utterance, VoiceError, VoiceInfo,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{Notify, mpsc};

use crate::error::CliError;

const HELP: &str = "\
commands: /start  /end  /status  /help  /quit
speech:   type a sentence (final) or ~words (interim)
errors:   !no-speech  !denied  !network  !aborted";

/// Simulated speaking speed at rate 1.0.
const WORDS_PER_SECOND: f32 = 2.5;

/// Longest simulated playback of a single reply.
const MAX_PLAYBACK: Duration = Duration::from_secs(20);

// ── Input ──────────────────────────────────────────────────────────

/// One parsed line of console input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    Activate,
    EndConversation,
    Status,
    Help,
    Quit,
    Fragment { text: String, is_final: bool },
    RecognizerError(RecognizerError),
    Unknown(String),
}

/// Parse a console line. Blank lines yield `None`.
#[must_use]
pub fn parse_line(line: &str) -> Option<InputLine> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let parsed = match line {
        "/start" => InputLine::Activate,
        "/end" => InputLine::EndConversation,
        "/status" => InputLine::Status,
        "/help" => InputLine::Help,
        "/quit" | "/exit" => InputLine::Quit,
        "!no-speech" => InputLine::RecognizerError(RecognizerError::NoSpeech),
        "!denied" => InputLine::RecognizerError(RecognizerError::PermissionDenied),
        "!network" => InputLine::RecognizerError(RecognizerError::Network),
        "!aborted" => InputLine::RecognizerError(RecognizerError::Aborted),
        other if other.starts_with('/') || other.starts_with('!') => {
            InputLine::Unknown(other.to_string())
        }
        other => match other.strip_prefix('~') {
            Some(interim) => InputLine::Fragment {
                text: interim.trim().to_string(),
                is_final: false,
            },
            None => InputLine::Fragment {
                text: other.to_string(),
                is_final: true,
            },
        },
    };
    Some(parsed)
}

/// Read console lines and drive the orchestrator until `/quit` or EOF.
pub async fn run<R>(handle: &TurnHandle, listening: &AtomicBool, input: R) -> Result<(), CliError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let Some(parsed) = parse_line(&line) else {
            continue;
        };

        match parsed {
            InputLine::Activate => handle.activate()?,
            InputLine::EndConversation => handle.end_conversation()?,
            InputLine::Status => {
                let snapshot = handle.snapshot();
                println!(
                    "state: {:?}  locked: {}  countdown: {:?}",
                    snapshot.state, snapshot.locked, snapshot.countdown_secs
                );
                if let Some(error) = snapshot.last_error {
                    println!("last error: {error}");
                }
            }
            InputLine::Help => println!("{HELP}"),
            InputLine::Quit => break,
            InputLine::Fragment { text, is_final } => {
                if handle.mic_lock().is_locked() {
                    println!("(mic is closed while the assistant speaks)");
                } else if !listening.load(Ordering::SeqCst) {
                    println!("(mic is off, type /start first)");
                } else {
                    handle.push_fragment(text, is_final)?;
                }
            }
            InputLine::RecognizerError(error) => handle.report_recognizer_error(error)?,
            InputLine::Unknown(command) => println!("unknown command {command}; try /help"),
        }
    }

    Ok(())
}

// ── Output ─────────────────────────────────────────────────────────

/// Console text for an orchestrator event, if it is worth showing.
#[must_use]
pub fn describe(event: &TurnEvent) -> Option<String> {
    match event {
        TurnEvent::StateChanged(TurnState::Processing) => Some("…thinking".to_string()),
        TurnEvent::Countdown(secs) if *secs <= 3 => Some(format!("({secs}…)")),
        TurnEvent::TranscriptAccepted(text) => Some(format!("you: {text}")),
        TurnEvent::RecognizerError(message) => Some(format!("! {message}")),
        TurnEvent::LockChanged(false) => Some("(your turn, /start to speak)".to_string()),
        _ => None,
    }
}

/// Print orchestrator events until the orchestrator stops.
pub async fn print_events(mut events: mpsc::UnboundedReceiver<TurnEvent>) {
    while let Some(event) = events.recv().await {
        tracing::debug!(?event, "Turn event");
        if let Some(line) = describe(&event) {
            println!("{line}");
        }
    }
}

// ── Recognizer ─────────────────────────────────────────────────────

/// Treats the console as a microphone that is on between `start` and `stop`.
#[derive(Debug, Default)]
pub struct ConsoleRecognizer {
    listening: Arc<AtomicBool>,
}

impl ConsoleRecognizer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag the input loop checks before forwarding typed speech.
    #[must_use]
    pub fn listening_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.listening)
    }
}

impl SpeechRecognizer for ConsoleRecognizer {
    fn start(&mut self) -> Result<(), RecognizerError> {
        self.listening.store(true, Ordering::SeqCst);
        println!("(listening, type what you say)");
        Ok(())
    }

    fn stop(&mut self) {
        self.listening.store(false, Ordering::SeqCst);
    }
}

// ── Synthesizer ────────────────────────────────────────────────────

/// Prints replies and waits roughly as long as speaking them would take.
#[derive(Debug)]
pub struct ConsoleSynthesizer {
    speaker_name: String,
    cancel: Notify,
}

impl ConsoleSynthesizer {
    #[must_use]
    pub fn new(speaker_name: impl Into<String>) -> Self {
        Self {
            speaker_name: speaker_name.into(),
            cancel: Notify::new(),
        }
    }
}

/// Simulated playback time for `text` at `rate`.
#[must_use]
pub fn playback_duration(text: &str, rate: f32) -> Duration {
    #[allow(clippy::cast_precision_loss)]
    let words = text.split_whitespace().count() as f32;
    let secs = words / (WORDS_PER_SECOND * rate.max(0.1));
    Duration::from_secs_f32(secs).min(MAX_PLAYBACK)
}

#[async_trait::async_trait]
impl SpeechSynthesizer for ConsoleSynthesizer {
    async fn speak(&self, utterance: &Utterance) -> Result<(), VoiceError> {
        if utterance.volume <= 0.0 {
            return Ok(());
        }

        println!("{}: {}", self.speaker_name, utterance.text);
        let playback = playback_duration(&utterance.text, utterance.rate);

        tokio::select! {
            () = tokio::time::sleep(playback) => {}
            () = self.cancel.notified() => {
                tracing::debug!("Console playback cancelled");
            }
        }
        Ok(())
    }

    async fn voices(&self) -> Vec<VoiceInfo> {
        vec![VoiceInfo {
            id: "console-en".to_string(),
            name: "Console".to_string(),
            language: "en-US".to_string(),
        }]
    }

    fn cancel(&self) {
        self.cancel.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::responder::ScriptedTutor;
    use parley_voice::{Collaborators, OrchestratorConfig, SynthesisReadiness, TurnOrchestrator};

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_line("  /start "), Some(InputLine::Activate));
        assert_eq!(parse_line("/end"), Some(InputLine::EndConversation));
        assert_eq!(parse_line("/exit"), Some(InputLine::Quit));
        assert_eq!(parse_line("   "), None);
        assert_eq!(
            parse_line("/dance"),
            Some(InputLine::Unknown("/dance".to_string()))
        );
    }

    #[test]
    fn test_parse_fragments() {
        assert_eq!(
            parse_line("I like tea."),
            Some(InputLine::Fragment {
                text: "I like tea.".to_string(),
                is_final: true
            })
        );
        assert_eq!(
            parse_line("~ I like"),
            Some(InputLine::Fragment {
                text: "I like".to_string(),
                is_final: false
            })
        );
    }

    #[test]
    fn test_parse_recognizer_errors() {
        assert_eq!(
            parse_line("!denied"),
            Some(InputLine::RecognizerError(RecognizerError::PermissionDenied))
        );
        assert!(matches!(parse_line("!boom"), Some(InputLine::Unknown(_))));
    }

    #[test]
    fn test_describe_filters_noise() {
        assert_eq!(describe(&TurnEvent::Countdown(8)), None);
        assert_eq!(describe(&TurnEvent::Countdown(2)).as_deref(), Some("(2…)"));
        assert_eq!(
            describe(&TurnEvent::TranscriptAccepted("hi there".into())).as_deref(),
            Some("you: hi there")
        );
        assert_eq!(describe(&TurnEvent::LockChanged(true)), None);
    }

    #[test]
    fn test_playback_duration_scales_and_caps() {
        assert_eq!(playback_duration("one two three four five", 1.0), Duration::from_secs(2));
        assert!(playback_duration("one two", 2.0) < playback_duration("one two", 1.0));
        assert_eq!(playback_duration(&"word ".repeat(500), 1.0), MAX_PLAYBACK);
    }

    #[test]
    fn test_recognizer_toggles_flag() {
        let mut recognizer = ConsoleRecognizer::new();
        let flag = recognizer.listening_flag();
        recognizer.start().unwrap();
        assert!(flag.load(Ordering::SeqCst));
        recognizer.stop();
        recognizer.stop();
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_cuts_playback_short() {
        let synth = Arc::new(ConsoleSynthesizer::new("emma"));
        let speaking = {
            let synth = Arc::clone(&synth);
            tokio::spawn(async move {
                let started = tokio::time::Instant::now();
                synth.speak(&Utterance::new("a fairly long sentence to say out loud")).await.unwrap();
                started.elapsed()
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        synth.cancel();

        assert!(speaking.await.unwrap() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_drives_orchestrator_until_quit() {
        let recognizer = ConsoleRecognizer::new();
        let listening = recognizer.listening_flag();
        let synth = Arc::new(ConsoleSynthesizer::new("emma"));
        let (orchestrator, _events) = TurnOrchestrator::new(
            OrchestratorConfig::default(),
            Collaborators {
                recognizer: Box::new(recognizer),
                synthesizer: synth.clone(),
                responder: Arc::new(ScriptedTutor::new()),
                readiness: Arc::new(SynthesisReadiness::new(synth)),
            },
        )
        .unwrap();
        let (handle, _task) = orchestrator.spawn();

        let input: &[u8] = b"/start\n\n/quit\nnever read\n";
        run(&handle, &listening, input).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert_eq!(handle.state(), TurnState::Listening);
        assert!(listening.load(Ordering::SeqCst));
    }
}
