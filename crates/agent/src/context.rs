//! Context builder for per-question conversations

use std::path::Path;

use chrono::Local;
use tracing::debug;

use crate::conversation::Conversation;

/// User prompt for one question, pointing at its attachment when present
pub fn build_user_prompt(question: &str, attachment: Option<&Path>) -> String {
    match attachment {
        Some(path) => format!(
            "{}\n\nAttached file: {}\nUse the tools to read or inspect this file when the question depends on it.",
            question.trim(),
            path.display()
        ),
        None => question.trim().to_string(),
    }
}

/// Builds the opening system + user messages of each conversation
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: String,
    with_date: bool,
}

impl ContextBuilder {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            with_date: true,
        }
    }

    /// Leave the current date out of the system prompt
    pub fn without_date(mut self) -> Self {
        self.with_date = false;
        self
    }

    pub fn system_prompt(&self) -> String {
        if !self.with_date {
            return self.system_prompt.clone();
        }
        format!(
            "{}\n\nToday's date: {}",
            self.system_prompt,
            Local::now().format("%Y-%m-%d")
        )
    }

    pub fn build(&self, question: &str, attachment: Option<&Path>) -> Conversation {
        debug!(
            "building conversation (attachment: {:?})",
            attachment.map(Path::display)
        );
        Conversation::new(self.system_prompt(), build_user_prompt(question, attachment))
    }
}
