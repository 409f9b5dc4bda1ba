//! Chat sessions and their conversation history.
//!
//! [`SessionStore`] owns every session keyed by id and tracks the single
//! active one. Turns are append-only, except that streamed assistant
//! tokens extend the content of the last assistant turn in place.
//!
//! Like the document store, the whole session map is rewritten under
//! [`SESSIONS_KEY`] on each [`SessionStore::save`].

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::Utc;
use uuid::Uuid;

use crate::models::{ConversationTurn, Role, Session};
use crate::store::{KeyValueStore, SESSIONS_KEY};

/// Title given to a session before its first message.
pub const NEW_SESSION_TITLE: &str = "New Chat";

/// Characters of the first user message used as the session title.
const TITLE_CHARS: usize = 30;

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: NEW_SESSION_TITLE.to_string(),
            messages: Vec::new(),
            last_activity: Utc::now().timestamp_millis(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// All known sessions plus the id of the active one.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: HashMap<String, Session>,
    active: String,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    /// A store with one fresh, active session.
    pub fn new() -> Self {
        Self::from_sessions(HashMap::new())
    }

    fn from_sessions(sessions: HashMap<String, Session>) -> Self {
        let mut store = Self {
            sessions,
            active: String::new(),
        };
        store.new_session();
        store
    }

    /// Start a new empty session and make it active.
    pub fn new_session(&mut self) -> &Session {
        let session = Session::new();
        let id = session.id.clone();
        self.sessions.insert(id.clone(), session);
        self.active = id;
        &self.sessions[&self.active]
    }

    /// Make the session with `id` active. Returns `false` for unknown ids.
    pub fn switch_to(&mut self, id: &str) -> bool {
        if self.sessions.contains_key(id) {
            self.active = id.to_string();
            true
        } else {
            false
        }
    }

    pub fn active(&self) -> &Session {
        &self.sessions[&self.active]
    }

    fn active_mut(&mut self) -> &mut Session {
        let id = self.active.clone();
        self.sessions
            .entry(id.clone())
            .or_insert_with(|| Session { id, ..Session::new() })
    }

    /// Turns of the active session, oldest first.
    pub fn active_turns(&self) -> &[ConversationTurn] {
        &self.active().messages
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Append a user turn to the active session.
    ///
    /// The first message of a session also becomes its title.
    pub fn push_user_turn(&mut self, text: &str) {
        let session = self.active_mut();
        session.messages.push(ConversationTurn::user(text));
        if session.messages.len() == 1 {
            session.title = text.chars().take(TITLE_CHARS).collect();
        }
        session.last_activity = Utc::now().timestamp_millis();
    }

    /// Extend the last assistant turn with a streamed token, starting a new
    /// assistant turn if the last turn is not one.
    pub fn append_assistant_token(&mut self, token: &str) {
        let session = self.active_mut();
        match session.messages.last_mut() {
            Some(turn) if turn.role == Role::Assistant => turn.content.push_str(token),
            _ => session.messages.push(ConversationTurn::assistant(token)),
        }
    }

    /// Sessions ordered by most recent activity first.
    pub fn list(&self) -> Vec<&Session> {
        let mut sessions: Vec<&Session> = self.sessions.values().collect();
        sessions.sort_by(|a, b| {
            b.last_activity
                .cmp(&a.last_activity)
                .then_with(|| a.id.cmp(&b.id))
        });
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let sessions: HashMap<String, Session> =
            serde_json::from_str(json).context("Failed to parse stored sessions")?;
        Ok(Self::from_sessions(sessions))
    }

    /// Serialize every session except untouched empty ones.
    pub fn to_json(&self) -> Result<String> {
        let kept: HashMap<&String, &Session> = self
            .sessions
            .iter()
            .filter(|(_, s)| !s.messages.is_empty())
            .collect();
        Ok(serde_json::to_string(&kept)?)
    }

    /// Load persisted sessions and open a fresh active session on top.
    ///
    /// Missing or malformed data yields a store with only the new session.
    pub async fn load(kv: &dyn KeyValueStore) -> Result<Self> {
        let stored = kv.get(SESSIONS_KEY).await?;
        Ok(stored
            .and_then(|json| Self::from_json(&json).ok())
            .unwrap_or_default())
    }

    pub async fn save(&self, kv: &dyn KeyValueStore) -> Result<()> {
        kv.set(SESSIONS_KEY, &self.to_json()?).await
    }

    /// Resume the most recently active stored session instead of the
    /// fresh one opened by [`SessionStore::load`].
    pub fn resume_latest(&mut self) -> bool {
        let latest = self
            .list()
            .into_iter()
            .find(|s| !s.messages.is_empty())
            .map(|s| s.id.clone());
        match latest {
            Some(id) => {
                let fresh = std::mem::replace(&mut self.active, id);
                if self.sessions.get(&fresh).is_some_and(|s| s.messages.is_empty()) {
                    self.sessions.remove(&fresh);
                }
                true
            }
            None => false,
        }
    }
}
