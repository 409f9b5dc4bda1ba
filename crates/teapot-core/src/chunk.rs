//! Paragraph-boundary text chunker.
//!
//! Splits document text into passages that are the unit of retrieval.
//!
//! # Algorithm
//!
//! 1. Split text on runs of two or more newlines into paragraphs.
//! 2. Drop paragraphs with no words.
//! 3. A paragraph of at most `max_words` whitespace-delimited words becomes
//!    one passage, trimmed but otherwise verbatim.
//! 4. A longer paragraph is packed greedily into groups of exactly
//!    `max_words` words joined by single spaces; the trailing partial
//!    group is emitted as the last passage.
//!
//! # Example
//!
//! ```rust
//! use teapot_core::chunk::chunk_text;
//!
//! let passages = chunk_text("Hello world.\n\n\nSecond paragraph.", 512);
//! assert_eq!(passages, ["Hello world.", "Second paragraph."]);
//! ```

/// Default passage size in words.
pub const DEFAULT_MAX_WORDS: usize = 512;

/// Split `text` into passages of at most `max_words` words each.
///
/// Never fails; empty or whitespace-only input yields no passages.
/// A `max_words` of zero is treated as one.
pub fn chunk_text(text: &str, max_words: usize) -> Vec<String> {
    let max_words = max_words.max(1);
    let mut passages = Vec::new();

    // "a\n\n\nb" splits into "a" and "\nb"; trimming absorbs the extra newline.
    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let words: Vec<&str> = trimmed.split_whitespace().collect();
        if words.len() <= max_words {
            passages.push(trimmed.to_string());
        } else {
            passages.extend(words.chunks(max_words).map(|group| group.join(" ")));
        }
    }

    passages
}

/// Whitespace-delimited word count, as used for the passage limit.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
