//! Text normalization and sentence splitting.
//!
//! ## Canonical text rules
//!
//! All coded spans, memos, and transcript sentences pass through the same
//! normalization before any comparison:
//!
//! ```text
//! clean_text(text) = trim(collapse_ws(repair_encoding(text)))
//! ```
//!
//! Where:
//! - `repair_encoding`: fix UTF-8 mojibake artifacts and standardize
//!   smart quotes/dashes/ellipses
//! - `collapse_ws`: every whitespace run becomes a single space
//! - `trim`: remove leading and trailing whitespace
//!
//! Determinism: same input text always yields the same output, so text
//! equality and token overlap are stable across runs.

use regex_lite::Regex;
use std::sync::OnceLock;

/// Mojibake and smart-punctuation repairs, applied in order.
const REPLACEMENTS: &[(&str, &str)] = &[
    ("â€™", "'"),
    ("â€œ", "\""),
    ("â€", "\""),
    ("â€“", "-"),
    ("â€”", "-"),
    ("â€˜", "'"),
    ("\u{2019}", "'"),
    ("\u{201c}", "\""),
    ("\u{201d}", "\""),
    ("\u{2026}", "..."),
];

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

/// Normalize a text span to its canonical comparison form.
///
/// # Example
///
/// ```rust
/// use agreement_kernel::text::clean_text;
///
/// assert_eq!(clean_text("  itâ€™s   fine\r\n"), "it's fine");
/// ```
pub fn clean_text(text: &str) -> String {
    let mut out = text.to_string();
    for (bad, good) in REPLACEMENTS {
        if out.contains(bad) {
            out = out.replace(bad, good);
        }
    }
    whitespace_re().replace_all(&out, " ").trim().to_string()
}

/// Sentence delimiter: `.`, `!` or `?`, optionally followed by a closing
/// quote, then whitespace. The punctuation stays attached to its sentence.
fn sentence_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new("([.!?][\"\u{201d}\u{2019}]?)\\s+").expect("valid sentence pattern")
    })
}

/// Split a transcript into sentences.
///
/// Line endings are normalized first, then each non-empty line is split on
/// sentence punctuation with the delimiter re-attached to the preceding
/// sentence. Sentences are returned raw; callers normalize with
/// [`clean_text`].
pub fn split_sentences(content: &str) -> Vec<String> {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    let mut sentences = Vec::new();

    for line in normalized.split('\n') {
        let chunk = line.trim();
        if chunk.is_empty() {
            continue;
        }
        split_chunk(chunk, &mut sentences);
    }
    sentences
}

fn split_chunk(chunk: &str, out: &mut Vec<String>) {
    let re = sentence_break_re();
    let mut last = 0;

    for caps in re.captures_iter(chunk) {
        let whole = caps.get(0).expect("match");
        let punct = caps.get(1).expect("group 1");
        let sentence = format!("{}{}", &chunk[last..punct.start()], punct.as_str());
        if !sentence.trim().is_empty() {
            out.push(sentence.trim().to_string());
        }
        last = whole.end();
    }

    let tail = &chunk[last..];
    if !tail.trim().is_empty() {
        out.push(tail.trim().to_string());
    }
}

/// Count whitespace-separated words, the measure used for transcript
/// volume estimation.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}
