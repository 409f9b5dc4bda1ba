//! Context blocks injected into a generation prompt.
//!
//! Two corpora are searched with the same scorer:
//!
//! | Block | Candidates | `top_k` | Joined by |
//! |-------|------------|---------|-----------|
//! | RAG | every document chunk | 5 | `"\n\n"` |
//! | Memory | prior turns as `"User: .."` / `"Assistant: .."` lines | 3 | `"\n"` |
//!
//! Both builders are pure: they read the store or turn slice and never
//! mutate it, so identical inputs always produce identical blocks. Passages
//! appear best-first, not in document or chronological order.

use crate::documents::DocumentStore;
use crate::models::ConversationTurn;
use crate::score::rank;

/// Passages taken from the document store per query.
pub const DEFAULT_RAG_TOP_K: usize = 5;

/// Prior turns taken from the active session per query.
pub const DEFAULT_MEMORY_TOP_K: usize = 3;

/// How many candidates each block keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalParams {
    pub rag_top_k: usize,
    pub memory_top_k: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            rag_top_k: DEFAULT_RAG_TOP_K,
            memory_top_k: DEFAULT_MEMORY_TOP_K,
        }
    }
}

/// Best-matching document passages for `query`, separated by blank lines.
///
/// Empty when the store has no chunks or the query has no terms.
pub fn build_rag_context(query: &str, documents: &DocumentStore, top_k: usize) -> String {
    let chunks = documents.chunks_for_retrieval();
    rank(query, &chunks, top_k)
        .into_iter()
        .map(|c| c.text)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Best-matching prior turns for `query`, one per line.
pub fn build_memory_context(query: &str, turns: &[ConversationTurn], top_k: usize) -> String {
    let lines: Vec<String> = turns.iter().map(ConversationTurn::as_line).collect();
    rank(query, &lines, top_k)
        .into_iter()
        .map(|c| c.text)
        .collect::<Vec<_>>()
        .join("\n")
}
