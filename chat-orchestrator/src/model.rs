//! Language-model collaborator boundary.
//!
//! The core never talks to a model provider directly; it hands a
//! [`CompletionRequest`] to whatever [`ModelClient`] was injected and gets
//! text back. [`TemplateModel`] is the deterministic implementation used by
//! the CLI and the tests: same request in, same text out, no network.

use async_trait::async_trait;

use crate::sdk::{Author, Message, OrchestratorError};

/// One prompt for the model capability.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    /// Trailing conversation context, oldest first.
    pub history: Vec<Message>,
    /// The text the model should respond to.
    pub input: String,
}

impl CompletionRequest {
    pub fn new(system_prompt: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            history: Vec::new(),
            input: input.into(),
        }
    }

    pub fn with_history(mut self, history: Vec<Message>) -> Self {
        self.history = history;
        self
    }
}

/// Opaque model capability: given a prompt, return text.
///
/// Implementations may block on the network; callers wrap invocations in
/// their own timeout. Failures surface as `ModelCall` and are never silently
/// replaced with canned answers.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, OrchestratorError>;
}

/// Deterministic model stand-in.
///
/// Produces readable prose derived only from the request, so workflow output
/// is reproducible across sync and streaming paths.
#[derive(Debug, Default)]
pub struct TemplateModel;

impl TemplateModel {
    pub fn new() -> Self {
        Self
    }

    fn condense(text: &str) -> String {
        let trimmed = text.trim().trim_end_matches(['?', '!', '.']);
        let mut words: Vec<&str> = trimmed.split_whitespace().collect();
        if words.len() > 14 {
            words.truncate(14);
        }
        words.join(" ")
    }
}

#[async_trait]
impl ModelClient for TemplateModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, OrchestratorError> {
        let subject = Self::condense(&request.input);
        let context_turns = request
            .history
            .iter()
            .filter(|m| m.author == Author::User)
            .count();

        let mut text = format!("Regarding \"{subject}\":");
        text.push_str(" here is a considered response drawing on the conversation so far.");
        if context_turns > 1 {
            text.push_str(&format!(
                " This builds on {context_turns} earlier messages in this thread."
            ));
        }
        Ok(text)
    }
}
