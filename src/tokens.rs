//! Word tokenization and Jaccard overlap.
//!
//! Fuzzy matching compares lowercase word-token sets. The similarity
//! measure is the Jaccard index |A ∩ B| / |A ∪ B|, zero when either set
//! is empty.

use regex_lite::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

/// A unit's cached token set. `BTreeSet` keeps iteration deterministic.
pub type TokenSet = BTreeSet<String>;

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\w+").expect("valid word pattern"))
}

/// Tokenize a text span into its lowercase word set.
pub fn tokenize(text: &str) -> TokenSet {
    let lowered = text.to_lowercase();
    word_re()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Jaccard overlap of two token sets. Empty sets never match anything.
pub fn jaccard(a: &TokenSet, b: &TokenSet) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_dedups() {
        let tokens = tokenize("The cat, the CAT sat!");
        let expected: TokenSet = ["the", "cat", "sat"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn jaccard_of_partial_overlap_is_fractional() {
        // {the, cat, sat} vs {the, cat, sat, on, mat} -> 3/5
        let a = tokenize("the cat sat");
        let b = tokenize("the cat sat on the mat");
        assert!((jaccard(&a, &b) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn jaccard_with_empty_set_is_zero() {
        let a = tokenize("");
        let b = tokenize("words here");
        assert_eq!(jaccard(&a, &b), 0.0);
        assert_eq!(jaccard(&a, &a), 0.0);
    }

    #[test]
    fn jaccard_identical_sets_is_one() {
        let a = tokenize("same words");
        assert_eq!(jaccard(&a, &a), 1.0);
    }
}
