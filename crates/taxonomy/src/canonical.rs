use std::collections::{BTreeSet, HashSet};

/// Words that carry no discriminating meaning in device descriptions.
///
/// Tokens of length two or less are dropped before this list is consulted, so short articles and
/// numerals ("a", "of", "ii") are covered implicitly.
pub const DEFAULT_STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "without", "from", "into", "per", "other", "system", "device",
    "devices", "single", "use", "kit", "set", "iii", "vii", "viii", "xii", "xiii", "xiv",
];

/// Shortest token length kept by [`Tokenizer::tokenize`].
const MIN_TOKEN_CHARS: usize = 3;

/// Lower-case `text`, turn every run of non-alphanumeric characters into one space, and trim.
///
/// Total and idempotent: `canonicalize(&canonicalize(x)) == canonicalize(x)`.
pub fn canonicalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        // Some lower-case mappings expand into combining marks; keep only the alphanumeric part.
        let mut lowered = ch
            .to_lowercase()
            .filter(|c| c.is_alphanumeric())
            .peekable();
        if !ch.is_alphanumeric() || lowered.peek().is_none() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.extend(lowered);
    }
    out
}

/// Tokenize with the default stop-word set.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    Tokenizer::default().tokenize(text)
}

/// Substring match in either direction.
#[must_use]
pub fn substring_related(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

/// Substring match in either direction where both tokens have at least `min_chars` characters.
#[must_use]
pub fn tokens_related(a: &str, b: &str, min_chars: usize) -> bool {
    a.chars().count() >= min_chars && b.chars().count() >= min_chars && substring_related(a, b)
}

/// Does canonical `text` mention canonical `term` at a word start?
///
/// "stent" is mentioned by "coronary stents" but not by "nonstent".
#[must_use]
pub fn mentions(text: &str, term: &str) -> bool {
    if term.is_empty() || text.is_empty() {
        return false;
    }
    if text.starts_with(term) {
        return true;
    }
    let needle = format!(" {term}");
    text.contains(&needle)
}

/// Splits descriptions into comparable token sets.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    stop_words: HashSet<String>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self {
            stop_words: DEFAULT_STOP_WORDS.iter().map(|w| (*w).to_string()).collect(),
        }
    }
}

impl Tokenizer {
    /// Default stop words plus `extra` (canonicalized; blanks ignored).
    pub fn with_extra_stop_words<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tokenizer = Self::default();
        for word in extra {
            let word = canonicalize(word.as_ref());
            if !word.is_empty() {
                tokenizer.stop_words.insert(word);
            }
        }
        tokenizer
    }

    #[must_use]
    pub fn is_stop_word(&self, token: &str) -> bool {
        self.stop_words.contains(token)
    }

    /// Canonicalize, split on whitespace, drop short tokens and stop words.
    pub fn tokenize(&self, text: &str) -> BTreeSet<String> {
        canonicalize(text)
            .split_whitespace()
            .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
            .filter(|t| !self.stop_words.contains(*t))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn canonicalize_strips_punctuation_and_case() {
        assert_eq!(
            canonicalize("  Compression/pressure sock/stocking, reusable "),
            "compression pressure sock stocking reusable"
        );
        assert_eq!(canonicalize("X-RAY   film"), "x ray film");
    }

    #[test]
    fn canonicalize_symbol_only_is_empty() {
        assert_eq!(canonicalize(""), "");
        assert_eq!(canonicalize("--/ ,;"), "");
    }

    #[test]
    fn tokenize_empty_is_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("!!!").is_empty());
    }

    #[test]
    fn tokenize_drops_short_tokens_and_stop_words() {
        let tokens = tokenize("Catheter kit, single use, IV set for the ICU system");
        let expected: BTreeSet<String> = ["catheter", "icu"].iter().map(|s| s.to_string()).collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn extra_stop_words_are_canonicalized() {
        let tokenizer = Tokenizer::with_extra_stop_words(["Sterile", " "]);
        assert!(tokenizer.is_stop_word("sterile"));
        assert!(!tokenizer.tokenize("sterile gauze").contains("sterile"));
    }

    #[test]
    fn mentions_requires_word_start() {
        assert!(mentions("coronary stents", "stent"));
        assert!(mentions("stent graft", "stent"));
        assert!(!mentions("nonstent", "stent"));
        assert!(mentions("gloves single use", "single use"));
        assert!(!mentions("", "stent"));
    }

    #[test]
    fn related_tokens_respect_min_length() {
        assert!(tokens_related("stocking", "stockings", 4));
        assert!(!tokens_related("ray", "xray", 4));
        assert!(substring_related("ray", "xray"));
    }

    proptest! {
        #[test]
        fn proptest_canonicalize_is_idempotent(text in "[ -~]{0,64}") {
            let once = canonicalize(&text);
            prop_assert_eq!(canonicalize(&once), once);
        }

        #[test]
        fn proptest_canonical_form_has_no_edge_or_double_spaces(text in "[ -~]{0,64}") {
            let out = canonicalize(&text);
            prop_assert!(!out.starts_with(' '));
            prop_assert!(!out.ends_with(' '));
            prop_assert!(!out.contains("  "));
        }
    }
}
