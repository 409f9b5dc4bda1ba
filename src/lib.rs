//! # Teapot Chat
//!
//! A local-first chat client that augments small language model prompts
//! with lexically retrieved document passages and conversation memory.
//!
//! Retrieval is deliberately simple: text is tokenized and stemmed, and
//! passages are ranked by how many of their terms occur in the query. The
//! retrieval core lives in the `teapot-core` crate; this crate adds
//! durable storage, generation backends, tools, the CLI, and the HTTP
//! server.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Documents   │──▶│   Retrieval  │──▶│    Prompt    │
//! │  + Sessions  │   │ memory + RAG │   │  (7 blocks)  │
//! └──────┬───────┘   └──────────────┘   └──────┬───────┘
//!        │                                     ▼
//!   ┌────┴─────┐                        ┌──────────────┐
//!   │  SQLite  │◀── flush on done ──────│  Generator   │
//!   │ kv table │                        │ echo/ollama  │
//!   └──────────┘                        └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! teapot init
//! teapot docs add --file notes.md
//! teapot context "what is teapot"
//! teapot chat "What is Teapot?"
//! teapot serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`sqlite_store`] | SQLite key-value backend and its schema |
//! | [`library`] | Persisted document store |
//! | [`generation`] | Text-generation backends |
//! | [`tools`] | Web search, weather, calculator blocks |
//! | [`chat`] | Message-send flow and sessions |
//! | [`search`] | Ranked passage search |
//! | [`server`] | HTTP server |

pub mod chat;
pub mod config;
pub mod generation;
pub mod library;
pub mod search;
pub mod server;
pub mod sqlite_store;
pub mod tools;
