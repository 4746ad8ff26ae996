//! Echo filter — recognizes the system's own voice in recognizer output.
//!
//! The mic lock keeps the microphone closed while a reply plays, but speaker
//! tails and late recognizer results still leak through. Every transcript is
//! checked here before it reaches the response service. A miss starts an
//! endless self-conversation; a false hit only drops one learner utterance,
//! so every rule errs towards "echo".
//!
//! The prefix rule (a candidate containing the first 20 characters of a
//! recent system utterance) is an approximation with no formal
//! false-positive bound.

use std::collections::VecDeque;

use crate::config::EchoConfig;
use crate::text_utils::{char_prefix, normalize};

/// Candidates shorter than this (in characters) are always rejected.
const MIN_CANDIDATE_CHARS: usize = 3;

/// Length of the prefix compared by the prefix rule.
const PREFIX_CHARS: usize = 20;

/// Candidates longer than this may match as a fragment of a system utterance.
const MIN_FRAGMENT_CHARS: usize = 10;

/// Phrases only the assistant ever says.
const STATIC_SIGNATURES: &[&str] = &[
    "how can i help you",
    "let's practice english",
    "let's continue our conversation",
    "i didn't catch that",
    "could you please repeat",
    "i'm having trouble",
    "sorry, i had trouble",
    "sorry, something went wrong",
    "great job",
    "well done",
    "nice work",
];

/// Openings typical of synthesized replies.
const CANONICAL_OPENINGS: &[&str] = &["sure i'd", "that's a great", "thank you for sharing"];

/// Classifies recognizer text as system echo or human speech.
#[derive(Debug, Clone)]
pub struct EchoFilter {
    /// Most recent first, lower-cased.
    history: VecDeque<String>,
    capacity: usize,
    signatures: Vec<String>,
    /// Introductions with the assistant's name, then [`CANONICAL_OPENINGS`].
    openings: Vec<String>,
}

impl EchoFilter {
    /// Create a filter with the given settings.
    #[must_use]
    pub fn new(config: &EchoConfig) -> Self {
        let capacity = config.history_capacity.max(1);
        let signatures = STATIC_SIGNATURES
            .iter()
            .map(|s| (*s).to_string())
            .chain(config.extra_signatures.iter().map(|s| normalize(s)))
            .filter(|s| !s.is_empty())
            .collect();

        let name = normalize(&config.assistant_name);
        let openings = ["hello i'm", "hello i am", "hi i'm", "hi i am"]
            .iter()
            .map(|greeting| format!("{greeting} {name}"))
            .chain(CANONICAL_OPENINGS.iter().map(|s| (*s).to_string()))
            .collect();

        Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            signatures,
            openings,
        }
    }

    /// Remember something the system said.
    pub fn record_system_utterance(&mut self, text: &str) {
        let utterance = normalize(text);
        if utterance.is_empty() {
            return;
        }
        self.history.push_front(utterance);
        self.history.truncate(self.capacity);
        tracing::trace!(remembered = self.history.len(), "Recorded system utterance");
    }

    /// Whether `candidate` is most likely the system's own voice.
    #[must_use]
    pub fn is_echo(&self, candidate: &str) -> bool {
        let candidate = normalize(candidate);
        let candidate_chars = candidate.chars().count();

        if candidate_chars < MIN_CANDIDATE_CHARS {
            tracing::debug!("Echo: candidate too short");
            return true;
        }

        if let Some(signature) = self.signatures.iter().find(|s| candidate.contains(s.as_str())) {
            tracing::debug!(signature = %signature, "Echo: static signature");
            return true;
        }

        for utterance in &self.history {
            if candidate == *utterance {
                tracing::debug!("Echo: exact repeat of system utterance");
                return true;
            }
            if utterance.chars().count() > PREFIX_CHARS
                && candidate.contains(char_prefix(utterance, PREFIX_CHARS))
            {
                tracing::debug!("Echo: contains opening of system utterance");
                return true;
            }
            if candidate_chars > MIN_FRAGMENT_CHARS && utterance.contains(candidate.as_str()) {
                tracing::debug!("Echo: fragment of system utterance");
                return true;
            }
        }

        let squashed = candidate.replace(',', "");
        if self.openings.iter().any(|opening| squashed.starts_with(opening.as_str())) {
            tracing::debug!("Echo: canonical system opening");
            return true;
        }

        false
    }

    /// Number of remembered system utterances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.history.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Forget all remembered system utterances.
    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Default for EchoFilter {
    fn default() -> Self {
        Self::new(&EchoConfig::default())
    }
}
