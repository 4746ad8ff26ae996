//! One listening window's worth of recognizer output.
//!
//! Recognizers re-send growing interim text, so interim fragments replace
//! each other (last write wins) while final fragments accumulate. When the
//! window closes, [`SpeechSession::end`] resolves the transcript exactly
//! once: the final fragments joined with spaces, or the last interim text if
//! nothing was ever finalized.

use tokio::time::Instant;

use crate::text_utils;

/// Accumulates recognizer fragments for the current listening window.
#[derive(Debug, Clone, Default)]
pub struct SpeechSession {
    accumulated_text: String,
    /// Insertion-ordered, de-duplicated.
    final_fragments: Vec<String>,
    last_was_final: bool,
    started_at: Option<Instant>,
    last_fragment_at: Option<Instant>,
    active: bool,
    resolved: Option<String>,
    handed_out: bool,
}

impl SpeechSession {
    /// An inactive session; call [`start`](Self::start) to open it.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new listening window, discarding anything from the last one.
    pub fn start(&mut self) {
        let now = Instant::now();
        *self = Self {
            started_at: Some(now),
            last_fragment_at: Some(now),
            active: true,
            ..Self::default()
        };
    }

    /// Add a recognizer fragment. Ignored once the session has ended.
    pub fn add_fragment(&mut self, text: &str, is_final: bool) {
        if !self.active {
            tracing::debug!("Fragment after session end ignored");
            return;
        }

        let text = text.trim();
        if is_final && !text.is_empty() && !self.final_fragments.iter().any(|f| f == text) {
            self.final_fragments.push(text.to_string());
        }
        text.clone_into(&mut self.accumulated_text);
        self.last_was_final = is_final;
        self.last_fragment_at = Some(Instant::now());
    }

    /// Close the window and hand out the resolved transcript.
    ///
    /// Returns `None` if the session was never started or has already ended;
    /// a second call never resurrects the old text.
    pub fn end(&mut self) -> Option<String> {
        if !self.active {
            return None;
        }
        self.active = false;

        let resolved = if self.final_fragments.is_empty() {
            self.accumulated_text.clone()
        } else {
            self.final_fragments.join(" ")
        };
        self.resolved = Some(resolved.clone());
        self.handed_out = true;
        Some(resolved)
    }

    /// The transcript frozen by [`end`](Self::end), if the session has ended.
    #[must_use]
    pub fn final_transcript(&self) -> Option<&str> {
        self.resolved.as_deref()
    }

    /// The latest fragment text (last write wins).
    #[must_use]
    pub fn current_text(&self) -> &str {
        &self.accumulated_text
    }

    /// Everything heard so far: final fragments plus a trailing interim.
    #[must_use]
    pub fn live_text(&self) -> String {
        let mut text = self.final_fragments.join(" ");
        if !self.last_was_final && !self.accumulated_text.is_empty() {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&self.accumulated_text);
        }
        text
    }

    /// Word count of [`live_text`](Self::live_text).
    #[must_use]
    pub fn word_count(&self) -> usize {
        text_utils::word_count(&self.live_text())
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the resolved transcript has already been consumed.
    #[must_use]
    pub const fn is_consumed(&self) -> bool {
        self.handed_out
    }

    #[must_use]
    pub const fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// When the last fragment arrived (or the session started).
    #[must_use]
    pub const fn last_fragment_at(&self) -> Option<Instant> {
        self.last_fragment_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_fragment_wins_over_interim() {
        let mut session = SpeechSession::new();
        session.start();
        session.add_fragment("hi", false);
        session.add_fragment("hi there", true);

        assert_eq!(session.end().as_deref(), Some("hi there"));
        assert_eq!(session.final_transcript(), Some("hi there"));
    }

    #[test]
    fn interim_text_is_used_when_nothing_was_final() {
        let mut session = SpeechSession::new();
        session.start();
        session.add_fragment("I went", false);
        session.add_fragment("I went to the park", false);

        assert_eq!(session.end().as_deref(), Some("I went to the park"));
    }

    #[test]
    fn final_fragments_join_in_arrival_order_without_duplicates() {
        let mut session = SpeechSession::new();
        session.start();
        session.add_fragment("I like tea.", true);
        session.add_fragment("I like tea.", true);
        session.add_fragment("Do you", false);
        session.add_fragment("Do you like tea?", true);

        assert_eq!(session.end().as_deref(), Some("I like tea. Do you like tea?"));
    }

    #[test]
    fn second_end_is_inert() {
        let mut session = SpeechSession::new();
        session.start();
        session.add_fragment("hello again", true);

        assert!(session.end().is_some());
        assert_eq!(session.end(), None);
        assert!(!session.is_active());
        assert!(session.is_consumed());
    }

    #[test]
    fn fragments_after_end_are_ignored() {
        let mut session = SpeechSession::new();
        session.start();
        session.add_fragment("first", true);
        let _ = session.end();

        session.add_fragment("late fragment", true);
        assert_eq!(session.final_transcript(), Some("first"));
        assert_eq!(session.current_text(), "first");
    }

    #[test]
    fn end_without_start_yields_nothing() {
        let mut session = SpeechSession::new();
        assert_eq!(session.end(), None);
    }

    #[test]
    fn start_resets_previous_window() {
        let mut session = SpeechSession::new();
        session.start();
        session.add_fragment("old words", true);
        let _ = session.end();

        session.start();
        assert!(session.is_active());
        assert_eq!(session.current_text(), "");
        assert_eq!(session.final_transcript(), None);
        assert_eq!(session.word_count(), 0);
    }

    #[test]
    fn live_text_combines_finals_and_trailing_interim() {
        let mut session = SpeechSession::new();
        session.start();
        session.add_fragment("I like tea.", true);
        session.add_fragment("and coffee", false);

        assert_eq!(session.live_text(), "I like tea. and coffee");
        assert_eq!(session.word_count(), 5);
        assert_eq!(session.current_text(), "and coffee");
    }

    #[tokio::test(start_paused = true)]
    async fn tracks_fragment_arrival_time() {
        let mut session = SpeechSession::new();
        session.start();
        let started = session.started_at().unwrap();

        tokio::time::advance(std::time::Duration::from_secs(2)).await;
        session.add_fragment("hello", false);

        assert_eq!(
            session.last_fragment_at().unwrap() - started,
            std::time::Duration::from_secs(2)
        );
    }
}
