//! Prompt assembly.
//!
//! A raw prompt is seven blocks joined by single newlines, in fixed order:
//! web search, weather, calculator, memory, RAG, system prompt, user text.
//! Disabled or empty blocks still contribute their (empty) line.

use crate::models::ConversationTurn;

/// Inputs to a raw prompt, one field per block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptBlocks {
    pub web: String,
    pub weather: String,
    pub calculator: String,
    pub memory: String,
    pub rag: String,
    pub system: String,
    pub user: String,
}

impl PromptBlocks {
    pub fn assemble(&self) -> String {
        [
            self.web.as_str(),
            self.weather.as_str(),
            self.calculator.as_str(),
            self.memory.as_str(),
            self.rag.as_str(),
            self.system.as_str(),
            self.user.as_str(),
        ]
        .join("\n")
    }
}

/// Chat-template prompt used when a request does not ask for a raw prompt.
pub fn chat_template(context: &str, turns: &[ConversationTurn]) -> String {
    let mut prompt = String::new();
    if !context.is_empty() {
        prompt.push_str("System: Use the following context to answer the user request:\n");
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }
    for turn in turns {
        prompt.push_str(&turn.as_line());
        prompt.push('\n');
    }
    prompt.push_str("Assistant:");
    prompt
}
