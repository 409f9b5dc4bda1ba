//! # Teapot Core
//!
//! Shared, WASM-safe logic for Teapot Chat: the lexical retrieval engine
//! (tokenizer, chunker, scorer), the persisted document store, chat
//! sessions, prompt assembly, and the generation message protocol.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Durable storage goes through the
//! [`store::KeyValueStore`] trait, implemented by the host.
//!
//! ## Retrieval Flow
//!
//! ```text
//! user message ──┬──▶ rank(docs chunks, k=5) ──▶ rag block
//!                └──▶ rank(session turns, k=3) ─▶ memory block
//!                                                     │
//!         web / weather / calc / memory / rag / system / user
//!                                                     ▼
//!                                             assembled prompt
//! ```

pub mod chunk;
pub mod documents;
pub mod history;
pub mod models;
pub mod prompt;
pub mod protocol;
pub mod retrieval;
pub mod score;
pub mod store;
pub mod tokenize;
