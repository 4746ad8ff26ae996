//! Utterance completion heuristic.
//!
//! Estimates from text alone whether a learner has finished a thought. The
//! result feeds the orchestrator's early-completion poll; it never decides
//! on its own to end a turn.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! | # | Trigger                                   | Complete | Confidence |
//! |---|-------------------------------------------|----------|------------|
//! | 1 | empty or near-empty                       | no       | 0.0        |
//! | 2 | terminal punctuation                      | yes      | 0.95       |
//! | 3 | closing phrase ("thank you", "okay", …)   | yes      | 0.8        |
//! | 4 | fewer than 3 words                        | yes      | 0.7        |
//! | 5 | short question opener (< 5 words)         | no       | 0.7        |
//! | 6 | trailing conjunction / subordinator       | no       | 0.8        |
//! | 7 | trailing auxiliary, article, preposition  | no       | 0.75       |
//! | 8 | more than 10 words                        | yes      | 0.6        |
//! | 9 | anything else                             | no       | 0.5        |

use serde::Serialize;

use crate::text_utils;

const TERMINAL_PUNCTUATION: [char; 6] = ['.', '!', '?', '。', '！', '？'];

const CLOSING_PHRASES: &[&str] = &[
    "thank you",
    "thanks",
    "okay",
    "ok",
    "that's all",
    "that is all",
    "i agree",
    "exactly",
    "got it",
    "sounds good",
    "that's it",
    "i see",
];

const INTERROGATIVES: &[&str] = &[
    "what", "how", "why", "when", "where", "who", "whom", "whose", "which",
];

const CONJUNCTIONS: &[&str] = &[
    "and", "but", "or", "nor", "so", "yet", "because", "if", "although", "though", "while",
    "unless", "since", "until", "whereas", "whether", "then",
];

const FUNCTION_WORDS: &[&str] = &[
    // auxiliaries
    "is", "am", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does",
    "did", "will", "would", "can", "could", "should", "shall", "may", "might", "must",
    // articles
    "a", "an", "the",
    // prepositions
    "to", "of", "in", "on", "at", "for", "with", "from", "by", "about", "into", "onto", "over",
    "under", "than", "as", "like", "through", "after", "before", "between",
];

/// Why the heuristic reached its verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    Empty,
    TerminalPunctuation,
    ClosingPhrase,
    ShortUtterance,
    OpenQuestion,
    TrailingConjunction,
    TrailingFunctionWord,
    LongUtterance,
    Uncertain,
}

/// Verdict of [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompletionResult {
    pub is_complete: bool,
    /// Confidence in the verdict, within `0.0..=1.0`.
    pub confidence: f32,
    pub reason: CompletionReason,
}

impl CompletionResult {
    const fn new(is_complete: bool, confidence: f32, reason: CompletionReason) -> Self {
        Self {
            is_complete,
            confidence,
            reason,
        }
    }

    /// Complete with confidence strictly above `threshold`.
    #[must_use]
    pub fn is_confidently_complete(&self, threshold: f32) -> bool {
        self.is_complete && self.confidence > threshold
    }
}

/// Estimate whether `text` is a finished utterance.
#[must_use]
pub fn evaluate(text: &str) -> CompletionResult {
    use CompletionReason as R;

    let trimmed = text.trim();
    if trimmed.chars().filter(|c| !c.is_whitespace()).count() < 2 {
        return CompletionResult::new(false, 0.0, R::Empty);
    }

    if trimmed.ends_with(TERMINAL_PUNCTUATION) {
        return CompletionResult::new(true, 0.95, R::TerminalPunctuation);
    }

    let words = text_utils::bare_words(trimmed);
    let count = text_utils::word_count(trimmed);

    if ends_with_closing_phrase(&words) {
        return CompletionResult::new(true, 0.8, R::ClosingPhrase);
    }

    if count < 3 {
        return CompletionResult::new(true, 0.7, R::ShortUtterance);
    }

    if count < 5 && words.first().is_some_and(|w| INTERROGATIVES.contains(&w.as_str())) {
        return CompletionResult::new(false, 0.7, R::OpenQuestion);
    }

    if let Some(last) = words.last().map(String::as_str) {
        if CONJUNCTIONS.contains(&last) {
            return CompletionResult::new(false, 0.8, R::TrailingConjunction);
        }
        if FUNCTION_WORDS.contains(&last) {
            return CompletionResult::new(false, 0.75, R::TrailingFunctionWord);
        }
    }

    if count > 10 {
        return CompletionResult::new(true, 0.6, R::LongUtterance);
    }

    CompletionResult::new(false, 0.5, R::Uncertain)
}

fn ends_with_closing_phrase(words: &[String]) -> bool {
    CLOSING_PHRASES.iter().any(|phrase| {
        let phrase_words: Vec<&str> = phrase.split(' ').collect();
        words.len() >= phrase_words.len()
            && words[words.len() - phrase_words.len()..]
                .iter()
                .zip(&phrase_words)
                .all(|(w, p)| w == p)
    })
}
