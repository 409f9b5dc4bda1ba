//! Core data models used throughout Teapot Chat.
//!
//! These types represent the reference documents, conversation turns, and
//! ranked retrieval candidates that flow through the retrieval pipeline.

use serde::{Deserialize, Serialize};

/// A user-supplied reference document and its precomputed chunks.
///
/// `chunks` is always derived from `text` by [`chunk_text`](crate::chunk::chunk_text);
/// it is never edited on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub chunks: Vec<String>,
    /// Creation time in epoch milliseconds.
    #[serde(rename = "timestamp", default)]
    pub created_at: i64,
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    /// Older session data stored assistant turns as `"ai"`.
    #[serde(alias = "ai")]
    Assistant,
}

impl Role {
    /// Prefix used when a turn is rendered as a single line.
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One message in a chat session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Render as `"User: <content>"` or `"Assistant: <content>"`.
    pub fn as_line(&self) -> String {
        format!("{}: {}", self.role.label(), self.content)
    }
}

/// A chat session: ordered turns plus the time of last activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ConversationTurn>,
    /// Last activity in epoch milliseconds.
    #[serde(rename = "timestamp", default)]
    pub last_activity: i64,
}

/// A ranked retrieval candidate. Produced per query and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredCandidate {
    /// Position of the candidate in the input sequence.
    pub index: usize,
    pub text: String,
    /// Sum of query-term occurrences in `text`.
    pub score: usize,
}
