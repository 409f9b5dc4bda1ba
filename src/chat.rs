//! Message-send flow.
//!
//! [`ChatEngine`] ties retrieval, tools, and generation together for the
//! active session:
//!
//! 1. Run the enabled tool blocks (web, weather, calculator).
//! 2. Build the memory block from the turns *before* this message, and the
//!    RAG block from the document library.
//! 3. Append the user turn and persist sessions.
//! 4. Assemble the raw prompt and start generation.
//! 5. Consume the event channel in order, appending each token to the
//!    active session's assistant turn, and flush sessions to storage on
//!    the terminal event.
//!
//! The retrieval blocks are snapshots computed before generation starts;
//! they are never recomputed while tokens stream in.

use anyhow::{bail, Result};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

use teapot_core::history::SessionStore;
use teapot_core::models::{ConversationTurn, Session};
use teapot_core::prompt::PromptBlocks;
use teapot_core::protocol::{GenerateRequest, LoadStatus, WorkerEvent};
use teapot_core::retrieval::build_memory_context;
use teapot_core::store::KeyValueStore;

use crate::config::Config;
use crate::generation::TextGenerator;
use crate::library::Library;
use crate::tools::run_tools;

/// Buffered generation events between producer and consumer.
const EVENT_BUFFER: usize = 64;

/// Retrieval blocks computed for a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ContextBlocks {
    pub memory: String,
    pub rag: String,
}

/// Outcome of one sent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    /// The assembled prompt handed to the generator.
    pub prompt: String,
    /// Concatenated output tokens.
    pub reply: String,
}

/// Chat state shared by the CLI and the HTTP server.
pub struct ChatEngine {
    config: Config,
    kv: Arc<dyn KeyValueStore>,
    library: Library,
    sessions: Mutex<SessionStore>,
    generator: Box<dyn TextGenerator>,
}

impl ChatEngine {
    /// Load documents and sessions from `kv` and open a fresh session.
    pub async fn open(
        config: Config,
        kv: Arc<dyn KeyValueStore>,
        generator: Box<dyn TextGenerator>,
    ) -> Result<Self> {
        let library = Library::load(kv.clone(), config.chunking.max_words).await?;
        let sessions = SessionStore::load(kv.as_ref()).await?;
        tracing::debug!(
            sessions = sessions.len(),
            generator = generator.name(),
            "chat engine ready"
        );
        Ok(Self {
            config,
            kv,
            library,
            sessions: Mutex::new(sessions),
            generator,
        })
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Continue the most recent stored session instead of a fresh one.
    pub async fn resume_latest(&self) -> bool {
        self.sessions.lock().await.resume_latest()
    }

    pub async fn new_session(&self) -> Session {
        self.sessions.lock().await.new_session().clone()
    }

    /// Make a stored session the active one.
    pub async fn switch_session(&self, id: &str) -> Result<()> {
        if !self.sessions.lock().await.switch_to(id) {
            bail!("session not found: {}", id);
        }
        Ok(())
    }

    pub async fn active_session(&self) -> Session {
        self.sessions.lock().await.active().clone()
    }

    pub async fn list_sessions(&self) -> Vec<Session> {
        self.sessions
            .lock()
            .await
            .list()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Memory and RAG blocks for `query`, with memory drawn from the
    /// active session.
    pub async fn context(&self, query: &str) -> ContextBlocks {
        let turns = self.sessions.lock().await.active_turns().to_vec();
        self.context_with_turns(query, &turns).await
    }

    /// Memory and RAG blocks for `query`, with memory ranked over `turns`.
    ///
    /// Disabled tools contribute empty blocks.
    pub async fn context_with_turns(&self, query: &str, turns: &[ConversationTurn]) -> ContextBlocks {
        let params = self.config.retrieval.params();
        let memory = if self.config.tools.memory {
            build_memory_context(query, turns, params.memory_top_k)
        } else {
            String::new()
        };
        let rag = if self.config.tools.rag {
            self.library.rag_context(query, params.rag_top_k).await
        } else {
            String::new()
        };
        ContextBlocks { memory, rag }
    }

    /// Turns of a stored session, or `None` for an unknown id.
    pub async fn session_turns(&self, id: &str) -> Option<Vec<ConversationTurn>> {
        self.sessions
            .lock()
            .await
            .get(id)
            .map(|s| s.messages.clone())
    }

    /// Send a message in the active session, streaming tokens to `on_token`.
    ///
    /// Blank messages are ignored and return `Ok(None)`. A generation error
    /// is returned after the partial reply has been persisted.
    pub async fn send_message<F>(&self, text: &str, mut on_token: F) -> Result<Option<ChatReply>>
    where
        F: FnMut(&str) + Send,
    {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let tools = run_tools(&self.config.tools, &self.config.search, text).await;
        let context = self.context(text).await;

        {
            let mut sessions = self.sessions.lock().await;
            sessions.push_user_turn(text);
            sessions.save(self.kv.as_ref()).await?;
        }

        let blocks = PromptBlocks {
            web: tools.web,
            weather: tools.weather,
            calculator: tools.calculator,
            memory: context.memory,
            rag: context.rag,
            system: self.config.generation.system_prompt.clone(),
            user: text.to_string(),
        };
        let prompt = blocks.assemble();
        tracing::debug!(prompt_len = prompt.len(), "prompt assembled");

        let request = GenerateRequest::raw(prompt.clone(), self.config.generation.model.clone());
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        let (produced, consumed) = tokio::join!(
            self.generator.generate(request, tx),
            self.consume(rx, &mut on_token)
        );

        let outcome = consumed?;
        if let Err(e) = produced {
            tracing::warn!(error = %e, "generator stopped early");
        }

        match outcome {
            Outcome::Done(reply) => Ok(Some(ChatReply { prompt, reply })),
            Outcome::Failed(message) => bail!("generation failed: {}", message),
        }
    }

    /// Apply events to the active session until a terminal event, then
    /// persist sessions.
    async fn consume<F>(&self, mut rx: mpsc::Receiver<WorkerEvent>, on_token: &mut F) -> Result<Outcome>
    where
        F: FnMut(&str) + Send,
    {
        let mut reply = String::new();
        let mut outcome = None;

        while let Some(event) = rx.recv().await {
            match event {
                WorkerEvent::Status(LoadStatus::Loading { model }) => {
                    tracing::info!(%model, "loading model");
                }
                WorkerEvent::Status(LoadStatus::Progress { progress, file }) => {
                    tracing::debug!(progress, file = file.as_deref().unwrap_or("model"), "download progress");
                }
                WorkerEvent::Status(LoadStatus::Ready { model }) => {
                    tracing::info!(%model, "model ready");
                }
                WorkerEvent::Start => {
                    tracing::debug!("generation started");
                }
                WorkerEvent::Output { token, .. } => {
                    self.sessions.lock().await.append_assistant_token(&token);
                    reply.push_str(&token);
                    on_token(&token);
                }
                WorkerEvent::Done => {
                    outcome = Some(Outcome::Done(std::mem::take(&mut reply)));
                    break;
                }
                WorkerEvent::Error { message } => {
                    outcome = Some(Outcome::Failed(message));
                    break;
                }
            }
        }

        self.sessions.lock().await.save(self.kv.as_ref()).await?;

        Ok(outcome.unwrap_or_else(|| {
            Outcome::Failed("generator closed the stream without finishing".to_string())
        }))
    }
}

enum Outcome {
    Done(String),
    Failed(String),
}

// ============ CLI ============

/// `teapot chat [MESSAGE]`: one message, or a line-based REPL on stdin.
pub async fn run_chat(engine: &ChatEngine, message: Option<String>, show_prompt: bool) -> Result<()> {
    if let Some(message) = message {
        return send_and_print(engine, &message, show_prompt).await;
    }

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        if matches!(line.trim(), "/quit" | "/exit") {
            break;
        }
        if line.trim() == "/new" {
            let session = engine.new_session().await;
            println!("new session {}", session.id);
            continue;
        }
        if let Err(e) = send_and_print(engine, &line, show_prompt).await {
            eprintln!("Error: {}", e);
        }
    }
    Ok(())
}

async fn send_and_print(engine: &ChatEngine, message: &str, show_prompt: bool) -> Result<()> {
    let reply = engine
        .send_message(message, |token| {
            print!("{}", token);
            let _ = std::io::stdout().flush();
        })
        .await?;
    if let Some(reply) = reply {
        println!();
        if show_prompt {
            println!("--- Prompt ---");
            println!("{}", reply.prompt);
        }
    }
    Ok(())
}

/// `teapot context <query>`
pub async fn run_context(engine: &ChatEngine, query: &str) -> Result<()> {
    let blocks = engine.context(query).await;
    println!("--- Memory ---");
    println!("{}", blocks.memory);
    println!();
    println!("--- RAG ---");
    println!("{}", blocks.rag);
    Ok(())
}

/// `teapot sessions list`
pub async fn run_list_sessions(engine: &ChatEngine) -> Result<()> {
    let sessions = engine.list_sessions().await;
    let stored: Vec<&Session> = sessions.iter().filter(|s| !s.messages.is_empty()).collect();
    if stored.is_empty() {
        println!("No sessions.");
        return Ok(());
    }
    for s in stored {
        let when = chrono::DateTime::from_timestamp_millis(s.last_activity)
            .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("{}  {}  ({} messages, {})", s.id, s.title, s.messages.len(), when);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::EchoGenerator;
    use async_trait::async_trait;
    use teapot_core::models::Role;
    use teapot_core::store::memory::InMemoryKeyValueStore;

    /// Emits a fixed reply, or fails midway.
    struct ScriptedGenerator {
        tokens: Vec<&'static str>,
        fail: bool,
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            _request: GenerateRequest,
            events: mpsc::Sender<WorkerEvent>,
        ) -> Result<()> {
            events.send(WorkerEvent::Start).await?;
            for t in &self.tokens {
                events.send(WorkerEvent::output(*t)).await?;
            }
            let last = if self.fail {
                WorkerEvent::error("out of memory")
            } else {
                WorkerEvent::Done
            };
            events.send(last).await?;
            Ok(())
        }
    }

    async fn engine_with(generator: Box<dyn TextGenerator>) -> (Arc<InMemoryKeyValueStore>, ChatEngine) {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let mut config = Config::minimal();
        config.generation.system_prompt = "Be brief.".to_string();
        let engine = ChatEngine::open(config, kv.clone(), generator).await.unwrap();
        (kv, engine)
    }

    #[tokio::test]
    async fn test_blank_message_ignored() {
        let (kv, engine) = engine_with(Box::new(EchoGenerator)).await;
        assert!(engine.send_message("   ", |_| {}).await.unwrap().is_none());
        assert!(engine.active_session().await.messages.is_empty());
        assert_eq!(kv.write_count(), 0);
    }

    #[tokio::test]
    async fn test_prompt_layout() {
        let (_kv, engine) = engine_with(Box::new(EchoGenerator)).await;
        let reply = engine
            .send_message("What is Teapot?", |_| {})
            .await
            .unwrap()
            .unwrap();

        let lines: Vec<&str> = reply.prompt.split('\n').collect();
        // web, weather, calculator, memory are empty; rag holds the seeded document.
        assert_eq!(&lines[..4], ["", "", "", ""]);
        assert!(lines[4].starts_with("Teapot is a small open-source language model"));
        assert_eq!(lines[5], "Be brief.");
        assert_eq!(lines[6], "What is Teapot?");
        assert_eq!(reply.reply, "What is Teapot?");
    }

    #[tokio::test]
    async fn test_tokens_accumulate_into_session() {
        let generator = ScriptedGenerator {
            tokens: vec!["Hel", "lo ", "there"],
            fail: false,
        };
        let (kv, engine) = engine_with(Box::new(generator)).await;

        let mut streamed = Vec::new();
        let reply = engine
            .send_message("hi", |t| streamed.push(t.to_string()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.reply, "Hello there");
        assert_eq!(streamed, ["Hel", "lo ", "there"]);

        let session = engine.active_session().await;
        assert_eq!(
            session.messages,
            [ConversationTurn::user("hi"), ConversationTurn::assistant("Hello there")]
        );
        assert_eq!(session.title, "hi");

        // User turn saved before generation, full exchange flushed after.
        assert_eq!(kv.write_count(), 2);
        let reloaded = SessionStore::load(kv.as_ref()).await.unwrap();
        let stored = reloaded.get(&session.id).unwrap();
        assert_eq!(stored.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_memory_uses_prior_turns_only() {
        let (_kv, engine) = engine_with(Box::new(EchoGenerator)).await;
        engine.send_message("oolong tea is great", |_| {}).await.unwrap();

        let reply = engine
            .send_message("tell me about oolong", |_| {})
            .await
            .unwrap()
            .unwrap();
        let memory_line = reply.prompt.split('\n').nth(3).unwrap();
        assert!(memory_line.contains("oolong tea is great"));
        assert!(!memory_line.contains("tell me about"));
    }

    #[tokio::test]
    async fn test_generation_error_keeps_partial_reply() {
        let generator = ScriptedGenerator {
            tokens: vec!["partial"],
            fail: true,
        };
        let (kv, engine) = engine_with(Box::new(generator)).await;
        let err = engine.send_message("hi", |_| {}).await.unwrap_err();
        assert!(err.to_string().contains("out of memory"));

        let session = engine.active_session().await;
        assert_eq!(session.messages.last().unwrap().role, Role::Assistant);
        assert_eq!(session.messages.last().unwrap().content, "partial");
        assert_eq!(kv.write_count(), 2);
    }

    #[tokio::test]
    async fn test_context_respects_tool_toggles() {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let mut config = Config::minimal();
        config.tools.rag = false;
        let engine = ChatEngine::open(config, kv, Box::new(EchoGenerator)).await.unwrap();
        assert_eq!(engine.context("Teapot").await, ContextBlocks::default());
    }

    #[tokio::test]
    async fn test_switch_to_older_session() {
        let (_kv, engine) = engine_with(Box::new(EchoGenerator)).await;
        engine.send_message("first session about oolong", |_| {}).await.unwrap();
        let older = engine.active_session().await.id;
        engine.new_session().await;
        engine.send_message("second session about rooibos", |_| {}).await.unwrap();

        engine.switch_session(&older).await.unwrap();
        let blocks = engine.context("oolong").await;
        assert!(blocks.memory.contains("User: first session about oolong"));
        assert!(!blocks.memory.contains("rooibos"));

        let err = engine.switch_session("missing").await.unwrap_err();
        assert!(err.to_string().contains("session not found"));
    }

    #[tokio::test]
    async fn test_context_with_supplied_turns() {
        let (_kv, engine) = engine_with(Box::new(EchoGenerator)).await;
        let turns = [
            ConversationTurn::user("oolong tea"),
            ConversationTurn::assistant("it is rolled"),
        ];
        let blocks = engine.context_with_turns("oolong", &turns).await;
        assert!(blocks.memory.starts_with("User: oolong tea"));
    }
}
