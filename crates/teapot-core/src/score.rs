//! Lexical ranking by raw term frequency.
//!
//! A candidate's score is the number of its stemmed tokens that appear in
//! the distinct stemmed query-term set, i.e. the per-term counts summed
//! over all query terms. There is no inverse-document-frequency weight and
//! no length normalization, so longer passages are favoured.
//!
//! # Selection
//!
//! Candidates are stable-sorted by ascending score, the last `top_k` are
//! kept and the result is reversed so it reads best-first. Among equal
//! scores this places later candidates ahead of earlier ones, which biases
//! memory retrieval toward recent turns.
//!
//! Zero-score candidates are not filtered; they survive whenever fewer than
//! `top_k` candidates score higher.

use std::collections::HashSet;

use crate::models::ScoredCandidate;
use crate::tokenize::tokenize;

/// Rank `candidates` against `query` and return at most `top_k`, best-first.
///
/// Returns an empty vector when there are no candidates, when `top_k` is
/// zero, or when the query has no word characters.
///
/// # Example
///
/// ```rust
/// use teapot_core::score::rank;
///
/// let ranked = rank(
///     "teapot model",
///     &["Teapot is a small model.", "Cats are cute.", "The teapot teapot teapot."],
///     2,
/// );
/// let texts: Vec<&str> = ranked.iter().map(|c| c.text.as_str()).collect();
/// assert_eq!(texts, ["The teapot teapot teapot.", "Teapot is a small model."]);
/// assert_eq!(ranked[0].score, 3);
/// assert_eq!(ranked[1].score, 2);
/// ```
pub fn rank<S: AsRef<str>>(query: &str, candidates: &[S], top_k: usize) -> Vec<ScoredCandidate> {
    if candidates.is_empty() || top_k == 0 {
        return Vec::new();
    }

    let terms: HashSet<String> = tokenize(query).collect();
    if terms.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<ScoredCandidate> = candidates
        .iter()
        .enumerate()
        .map(|(index, text)| {
            let text = text.as_ref();
            ScoredCandidate {
                index,
                text: text.to_string(),
                score: term_frequency(&terms, text),
            }
        })
        .collect();

    // `sort_by_key` is stable: equal scores keep input order before the reverse.
    scored.sort_by_key(|c| c.score);
    let mut top = scored.split_off(scored.len().saturating_sub(top_k));
    top.reverse();
    top
}

/// Occurrences of any of `terms` among the stems of `text`.
pub fn term_frequency(terms: &HashSet<String>, text: &str) -> usize {
    tokenize(text).filter(|stem| terms.contains(stem)).count()
}
