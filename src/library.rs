//! Reference-document library.
//!
//! Wraps the core [`DocumentStore`] with its durable backend. Every
//! mutation is a read-modify-persist sequence under one lock, so
//! concurrent requests (e.g. from the HTTP server) cannot interleave a
//! mutation with a save or with context building.
//!
//! Also hosts the `teapot docs ...` CLI entry points.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use teapot_core::documents::DocumentStore;
use teapot_core::models::Document;
use teapot_core::retrieval::build_rag_context;
use teapot_core::store::KeyValueStore;

/// Document store plus the key-value backend it persists to.
pub struct Library {
    kv: Arc<dyn KeyValueStore>,
    store: Mutex<DocumentStore>,
}

impl Library {
    /// Load the persisted documents (seeding a default when absent).
    pub async fn load(kv: Arc<dyn KeyValueStore>, max_words: usize) -> Result<Self> {
        let store = DocumentStore::load(kv.as_ref(), max_words).await?;
        tracing::debug!(documents = store.len(), "document store loaded");
        Ok(Self {
            kv,
            store: Mutex::new(store),
        })
    }

    /// Add a document and persist the store.
    ///
    /// Returns `None`, without writing, when `text` is blank.
    pub async fn add_document(&self, title: Option<&str>, text: &str) -> Result<Option<Document>> {
        let mut store = self.store.lock().await;
        let Some(doc) = store.add_document(title, text).cloned() else {
            return Ok(None);
        };
        store.save(self.kv.as_ref()).await?;
        tracing::info!(id = %doc.id, chunks = doc.chunks.len(), "document added");
        Ok(Some(doc))
    }

    /// Delete a document and persist the store. Unknown ids write nothing.
    pub async fn delete_document(&self, id: &str) -> Result<bool> {
        let mut store = self.store.lock().await;
        if !store.delete_document(id) {
            return Ok(false);
        }
        store.save(self.kv.as_ref()).await?;
        tracing::info!(id, "document deleted");
        Ok(true)
    }

    pub async fn get_document(&self, id: &str) -> Option<Document> {
        self.store.lock().await.get_document(id).cloned()
    }

    pub async fn list_documents(&self) -> Vec<Document> {
        self.store.lock().await.list_documents().to_vec()
    }

    /// RAG block for `query`, computed under the store lock.
    pub async fn rag_context(&self, query: &str, top_k: usize) -> String {
        let store = self.store.lock().await;
        build_rag_context(query, &store, top_k)
    }

    /// Flattened chunks, for ranking outside the lock.
    pub async fn chunks(&self) -> Vec<String> {
        let store = self.store.lock().await;
        store
            .chunks_for_retrieval()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

// ============ CLI ============

/// `teapot docs add`: text comes from `--file` or the positional argument.
pub async fn run_add(
    library: &Library,
    title: Option<String>,
    file: Option<&Path>,
    text: Option<String>,
) -> Result<()> {
    let (title, text) = match (file, text) {
        (Some(path), None) => {
            let body = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            // Uploaded files are titled by their file name.
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned());
            (title.or(name), body)
        }
        (None, Some(text)) => (title, text),
        (Some(_), Some(_)) => bail!("pass either --file or TEXT, not both"),
        (None, None) => bail!("nothing to add: pass --file or TEXT"),
    };

    match library.add_document(title.as_deref(), &text).await? {
        Some(doc) => {
            println!("added {}", doc.id);
            println!("title:  {}", doc.title);
            println!("chunks: {}", doc.chunks.len());
        }
        None => println!("skipped: document text is empty"),
    }
    Ok(())
}

/// `teapot docs list`
pub async fn run_list(library: &Library) -> Result<()> {
    let docs = library.list_documents().await;
    if docs.is_empty() {
        println!("No documents added.");
        return Ok(());
    }
    for doc in &docs {
        println!(
            "{}  {}  ({} chunks, {})",
            doc.id,
            doc.title,
            doc.chunks.len(),
            format_ts_date(doc.created_at)
        );
    }
    Ok(())
}

/// `teapot docs show <id>`
pub async fn run_show(library: &Library, id: &str) -> Result<()> {
    let Some(doc) = library.get_document(id).await else {
        bail!("document not found: {}", id);
    };

    println!("--- Document ---");
    println!("id:         {}", doc.id);
    println!("title:      {}", doc.title);
    println!("created_at: {}", format_ts_date(doc.created_at));
    println!();

    println!("--- Text ---");
    println!("{}", doc.text);
    println!();

    println!("--- Chunks ({}) ---", doc.chunks.len());
    for (i, chunk) in doc.chunks.iter().enumerate() {
        println!("[chunk {}]", i);
        println!("{}", chunk);
        println!();
    }
    Ok(())
}

/// `teapot docs delete <id>`
pub async fn run_delete(library: &Library, id: &str) -> Result<()> {
    if library.delete_document(id).await? {
        println!("deleted {}", id);
        Ok(())
    } else {
        bail!("document not found: {}", id)
    }
}

fn format_ts_date(ts_millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ts_millis)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| ts_millis.to_string())
}
