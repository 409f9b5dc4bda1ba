//! Durable key-value storage abstraction.
//!
//! The document store and the session list each persist as one JSON value
//! under a fixed key, rewritten in full on every mutation. The
//! [`KeyValueStore`] trait lets the host decide where those values live
//! (SQLite on native targets, browser storage or memory elsewhere).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

/// Key holding the serialized document array.
pub const DOCUMENTS_KEY: &str = "teapot_documents";

/// Key holding the serialized session map.
pub const SESSIONS_KEY: &str = "teapot_sessions";

/// Abstract durable key-value backend.
///
/// All operations are async (via `async-trait`) so native hosts can use
/// database drivers. In-memory implementations return immediately-ready
/// futures.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace the value stored under `key`.
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}
