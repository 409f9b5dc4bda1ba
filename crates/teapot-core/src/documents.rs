//! Persisted store of user-supplied reference documents.
//!
//! [`DocumentStore`] owns the document collection in insertion order. Each
//! document is chunked once, when added, and its chunks are kept alongside
//! the text. Persistence is explicit: [`DocumentStore::load`] at startup and
//! [`DocumentStore::save`] after every mutation, always rewriting the whole
//! collection under [`DOCUMENTS_KEY`].
//!
//! Mutating methods report whether anything changed so callers can skip
//! the save for rejected adds and unknown ids.

use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use crate::chunk::{chunk_text, DEFAULT_MAX_WORDS};
use crate::models::Document;
use crate::store::{KeyValueStore, DOCUMENTS_KEY};

/// Number of leading words used for an auto-generated title.
const AUTO_TITLE_WORDS: usize = 5;

/// Title of the document seeded into a fresh store.
pub const DEFAULT_DOCUMENT_TITLE: &str = "Default Context";

/// Body of the document seeded into a fresh store.
pub const DEFAULT_DOCUMENT_TEXT: &str = "Teapot is a small open-source language model \
(~300 million parameters) fine-tuned on synthetic data and optimized to run locally on \
resource-constrained devices such as smartphones and CPUs. Teapot can perform a variety of \
tasks, including hallucination-resistant Question Answering (QnA), Retrieval-Augmented \
Generation (RAG), and JSON extraction. Teapot is a model built by and for the community.";

/// Ordered collection of reference documents.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    documents: Vec<Document>,
    max_words: usize,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore {
    /// An empty store chunking at [`DEFAULT_MAX_WORDS`].
    pub fn new() -> Self {
        Self::with_max_words(DEFAULT_MAX_WORDS)
    }

    /// An empty store chunking at `max_words` words per passage.
    pub fn with_max_words(max_words: usize) -> Self {
        Self {
            documents: Vec::new(),
            max_words,
        }
    }

    /// A store holding only the default Teapot document.
    pub fn seeded(max_words: usize) -> Self {
        let mut store = Self::with_max_words(max_words);
        store.add_document(Some(DEFAULT_DOCUMENT_TITLE), DEFAULT_DOCUMENT_TEXT);
        store
    }

    /// Add a document, chunking its text immediately.
    ///
    /// Returns `None` without touching the store when `text` is empty or
    /// whitespace-only. A missing or blank `title` is derived from the
    /// first five words of `text`.
    pub fn add_document(&mut self, title: Option<&str>, text: &str) -> Option<&Document> {
        if text.trim().is_empty() {
            return None;
        }

        let title = match title.map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => auto_title(text),
        };

        self.documents.push(Document {
            id: Uuid::new_v4().to_string(),
            title,
            text: text.to_string(),
            chunks: chunk_text(text, self.max_words),
            created_at: Utc::now().timestamp_millis(),
        });
        self.documents.last()
    }

    /// Remove the document with `id`. Returns `false` if it was not present.
    pub fn delete_document(&mut self, id: &str) -> bool {
        let before = self.documents.len();
        self.documents.retain(|d| d.id != id);
        self.documents.len() != before
    }

    pub fn get_document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    /// All documents in insertion order.
    pub fn list_documents(&self) -> &[Document] {
        &self.documents
    }

    /// Every document's chunks, flattened in document then chunk order.
    pub fn chunks_for_retrieval(&self) -> Vec<&str> {
        self.documents
            .iter()
            .flat_map(|d| d.chunks.iter().map(String::as_str))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Parse a persisted document array.
    ///
    /// Records stored without chunks get them recomputed from their text.
    pub fn from_json(json: &str, max_words: usize) -> Result<Self> {
        let mut documents: Vec<Document> =
            serde_json::from_str(json).context("Failed to parse stored documents")?;
        for doc in &mut documents {
            if doc.chunks.is_empty() {
                doc.chunks = chunk_text(&doc.text, max_words);
            }
        }
        Ok(Self {
            documents,
            max_words,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.documents)?)
    }

    /// Load the persisted store, falling back to [`DocumentStore::seeded`]
    /// when nothing is stored or the stored value does not parse.
    ///
    /// Only a failing backend is an error.
    pub async fn load(kv: &dyn KeyValueStore, max_words: usize) -> Result<Self> {
        let stored = kv.get(DOCUMENTS_KEY).await?;
        Ok(stored
            .and_then(|json| Self::from_json(&json, max_words).ok())
            .unwrap_or_else(|| Self::seeded(max_words)))
    }

    /// Rewrite the whole collection to durable storage.
    pub async fn save(&self, kv: &dyn KeyValueStore) -> Result<()> {
        kv.set(DOCUMENTS_KEY, &self.to_json()?).await
    }
}

/// First five words of `text`, with `"..."` appended if there are more.
pub fn auto_title(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let mut title = words
        .iter()
        .take(AUTO_TITLE_WORDS)
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    if words.len() > AUTO_TITLE_WORDS {
        title.push_str("...");
    }
    title
}
