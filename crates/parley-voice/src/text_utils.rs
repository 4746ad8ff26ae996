//! Text helpers shared by the endpointing and echo modules.
//!
//! Counts words the way the timers expect, normalises recognizer text for
//! comparison, and cleans chat replies so markdown is never read aloud.

/// Number of whitespace-separated words in `text`.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Lower-cased, trimmed copy of `text` used for all echo comparisons.
#[must_use]
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Lower-cased words of `text` with surrounding punctuation removed.
///
/// Apostrophes inside a word are kept so "that's" stays one token.
#[must_use]
pub fn bare_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .trim_matches('\'')
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

/// The first `n` characters of `text`, respecting UTF-8 boundaries.
#[must_use]
pub fn char_prefix(text: &str, n: usize) -> &str {
    text.char_indices().nth(n).map_or(text, |(idx, _)| &text[..idx])
}

/// Strip markdown formatting from a chat reply, producing plain text for TTS.
///
/// Handles:
/// - Fenced code blocks (```…```) → replaced with "Code omitted."
/// - Headers (# …) and blockquotes (> …) → text only
/// - Bullet / numbered list markers → removed
/// - Bold / italic / strikethrough / inline code markers → removed
/// - Links \[text\](url) → text only
/// - Horizontal rules → removed
#[must_use]
pub fn strip_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_code_block = false;
    let mut code_block_replaced = false;

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            code_block_replaced = false;
            continue;
        }

        if in_code_block {
            if !code_block_replaced {
                push_segment(&mut result, "Code omitted.");
                code_block_replaced = true;
            }
            continue;
        }

        if is_horizontal_rule(trimmed) {
            continue;
        }

        let stripped = strip_inline(strip_line_prefix(trimmed));
        push_segment(&mut result, stripped.trim());
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Internal helpers ───────────────────────────────────────────────

fn push_segment(out: &mut String, segment: &str) {
    if segment.is_empty() {
        return;
    }
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(segment);
}

fn is_horizontal_rule(line: &str) -> bool {
    line.len() >= 3
        && ['-', '*', '_']
            .iter()
            .any(|&c| line.chars().all(|ch| ch == c || ch == ' '))
}

/// Drop header, blockquote and list markers from the start of a line.
fn strip_line_prefix(line: &str) -> &str {
    let line = line.trim_start_matches('#').trim_start_matches('>').trim_start();

    if let Some(rest) = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("+ "))
    {
        return rest;
    }

    // Numbered list: "12. item"
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return rest;
        }
    }

    line
}

/// Remove emphasis markers and collapse links to their label.
fn strip_inline(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' | '`' | '~' => {}
            '_' if out.is_empty() || out.ends_with(' ') || chars.peek().is_none_or(|n| *n == ' ') => {}
            '!' if chars.peek() == Some(&'[') => {}
            '[' => {
                let label: String = chars.by_ref().take_while(|&ch| ch != ']').collect();
                out.push_str(&label);
                if chars.peek() == Some(&'(') {
                    chars.by_ref().take_while(|&ch| ch != ')').for_each(drop);
                }
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_words_across_whitespace() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("  hello   there \n friend "), 3);
    }

    #[test]
    fn bare_words_trim_punctuation_but_keep_contractions() {
        assert_eq!(bare_words("Well, that's ALL!"), vec!["well", "that's", "all"]);
        assert_eq!(bare_words("\"okay\""), vec!["okay"]);
    }

    #[test]
    fn char_prefix_respects_multibyte_text() {
        assert_eq!(char_prefix("héllo wörld", 4), "héll");
        assert_eq!(char_prefix("hi", 20), "hi");
    }

    #[test]
    fn strips_emphasis_headers_and_links() {
        let md = "## Great job!\n\nYou used **past tense** and _nice_ [phrasing](https://x.y).";
        assert_eq!(
            strip_markdown(md),
            "Great job! You used past tense and nice phrasing."
        );
    }

    #[test]
    fn replaces_code_blocks_and_list_markers() {
        let md = "Try these:\n- first one\n2. second one\n```\nlet x = 1;\n```\n---\nDone.";
        assert_eq!(
            strip_markdown(md),
            "Try these: first one second one Code omitted. Done."
        );
    }

    #[test]
    fn keeps_underscores_inside_words() {
        assert_eq!(strip_markdown("snake_case word"), "snake_case word");
    }
}
