//! Messages exchanged with a text-generation backend.
//!
//! Requests and events are closed tagged enums, serialized with a `type`
//! field, so both sides match exhaustively on the message kind.
//!
//! A generation run emits, in order:
//!
//! ```text
//! Status(Loading) → Status(Progress)* → Status(Ready)   (first load only)
//! Start → Output* → Done | Error
//! ```

use serde::{Deserialize, Serialize};

use crate::models::ConversationTurn;
use crate::prompt::chat_template;

/// Request sent to a generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
    /// Load (or switch to) a model ahead of the first generation.
    Load { model: String },
    Generate(GenerateRequest),
}

/// Payload of [`WorkerRequest::Generate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    /// Fully assembled context, or extra context for the chat template.
    pub context: String,
    /// Use `context` verbatim as the prompt.
    pub raw_override: bool,
    pub model: String,
    #[serde(default)]
    pub messages: Vec<ConversationTurn>,
}

impl GenerateRequest {
    /// A request whose context is sent to the model as-is.
    pub fn raw(context: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            raw_override: true,
            model: model.into(),
            messages: Vec::new(),
        }
    }

    /// The prompt text the model should see.
    pub fn prompt(&self) -> String {
        if self.raw_override {
            self.context.clone()
        } else {
            chat_template(&self.context, &self.messages)
        }
    }
}

/// Model loading status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadStatus {
    Loading { model: String },
    /// Download progress in percent.
    Progress {
        progress: f64,
        #[serde(default)]
        file: Option<String>,
    },
    Ready { model: String },
}

/// Event emitted by a generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerEvent {
    Status(LoadStatus),
    Start,
    Output {
        token: String,
        /// Tokens per second so far, when the backend measures it.
        #[serde(default)]
        tps: Option<f64>,
    },
    Done,
    Error { message: String },
}

impl WorkerEvent {
    pub fn output(token: impl Into<String>) -> Self {
        WorkerEvent::Output {
            token: token.into(),
            tps: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        WorkerEvent::Error {
            message: message.into(),
        }
    }

    /// `true` for the events that end a generation run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerEvent::Done | WorkerEvent::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_prompt_is_context() {
        let req = GenerateRequest::raw("ctx\nquestion", "teapotllm");
        assert_eq!(req.prompt(), "ctx\nquestion");
    }

    #[test]
    fn test_templated_prompt() {
        let req = GenerateRequest {
            context: String::new(),
            raw_override: false,
            model: "m".into(),
            messages: vec![ConversationTurn::user("hi")],
        };
        assert_eq!(req.prompt(), "User: hi\nAssistant:");
    }

    #[test]
    fn test_event_tags() {
        let json = serde_json::to_value(WorkerEvent::output("tok")).unwrap();
        assert_eq!(json["type"], "output");
        assert_eq!(json["token"], "tok");

        let status = WorkerEvent::Status(LoadStatus::Ready { model: "m".into() });
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["type"], "status");
        assert_eq!(json["status"], "ready");
    }

    #[test]
    fn test_request_round_trip() {
        let req = WorkerRequest::Generate(GenerateRequest::raw("c", "m"));
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""type":"generate""#));
        assert_eq!(serde_json::from_str::<WorkerRequest>(&json).unwrap(), req);
    }

    #[test]
    fn test_terminal_events() {
        assert!(WorkerEvent::Done.is_terminal());
        assert!(WorkerEvent::error("boom").is_terminal());
        assert!(!WorkerEvent::Start.is_terminal());
        assert!(!WorkerEvent::output("x").is_terminal());
    }
}
