//! Word tokenizer and suffix-stripping stemmer.
//!
//! Text is lower-cased and split into maximal runs of ASCII word
//! characters (`[a-z0-9_]`); everything else is a separator. Each token is
//! then reduced by [`stem`], a fixed rule list where only the first
//! matching rule applies:
//!
//! | Suffix | Strip |
//! |--------|-------|
//! | `ing` | 3 |
//! | `ly` | 2 |
//! | `ed` | 2 |
//! | `es` | 2 |
//! | `s` (not `ss`) | 1 |
//!
//! Tokens shorter than three characters are left as-is.
//!
//! # Example
//!
//! ```rust
//! use teapot_core::tokenize::tokenize;
//!
//! let stems: Vec<String> = tokenize("Running quickly jumped boxes").collect();
//! assert_eq!(stems, ["runn", "quick", "jump", "box"]);
//! ```

/// Minimum token length for stemming to apply.
const MIN_STEM_LEN: usize = 3;

/// Ordered suffix rules. The first match wins; rules are not cascaded.
const SUFFIX_RULES: &[&str] = &["ing", "ly", "ed", "es"];

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Lower-case `text` and yield the stem of every word, in input order.
///
/// Case folding happens before word splitting, so characters that fold to
/// ASCII (the Kelvin sign, dotted capital I) still join their word.
/// Duplicates are preserved so callers can count term frequency.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> {
    let lowered = text.to_lowercase();
    words(&lowered)
        .map(|w| stem(w).to_string())
        .collect::<Vec<_>>()
        .into_iter()
}

/// Raw word runs without case folding or stemming.
fn words(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !is_word_char(c)).filter(|w| !w.is_empty())
}

/// Strip at most one suffix from an already lower-cased token.
pub fn stem(word: &str) -> &str {
    if word.len() < MIN_STEM_LEN {
        return word;
    }
    for suffix in SUFFIX_RULES {
        if let Some(base) = word.strip_suffix(suffix) {
            return base;
        }
    }
    if word.ends_with('s') && !word.ends_with("ss") {
        return &word[..word.len() - 1];
    }
    word
}
