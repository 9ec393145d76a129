//! Per-question message history
//!
//! A [`Conversation`] starts with one system and one user message, then
//! grows by alternating assistant tool requests and their results until an
//! assistant message without a tool request closes it.

use gaia_provider::{Message as WireMessage, ToolCallDef};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::tools::ToolOutcome;

/// Tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Model turn: a final answer, or a single tool request
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantMessage {
    pub content: String,
    pub tool_call: Option<ToolCallRequest>,
}

impl AssistantMessage {
    pub fn answer(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_call: None,
        }
    }

    pub fn tool_request(content: impl Into<String>, call: ToolCallRequest) -> Self {
        Self {
            content: content.into(),
            tool_call: Some(call),
        }
    }
}

/// Result of one tool request, linked by call id
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResultMessage {
    pub call_id: String,
    pub name: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolResultMessage {
    pub fn from_outcome(call: &ToolCallRequest, outcome: &ToolOutcome) -> Self {
        Self {
            call_id: call.id.clone(),
            name: call.name.clone(),
            content: outcome.render(),
            is_error: outcome.is_failure(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant(AssistantMessage),
    ToolResult(ToolResultMessage),
}

impl Message {
    pub fn role(&self) -> &'static str {
        match self {
            Message::System { .. } => "system",
            Message::User { .. } => "user",
            Message::Assistant(_) => "assistant",
            Message::ToolResult(_) => "tool",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::System { content } | Message::User { content } => content,
            Message::Assistant(m) => &m.content,
            Message::ToolResult(m) => &m.content,
        }
    }

    fn to_wire(&self) -> WireMessage {
        match self {
            Message::System { content } => WireMessage::system(content),
            Message::User { content } => WireMessage::user(content),
            Message::Assistant(m) => {
                let mut wire = WireMessage::assistant(&m.content);
                if let Some(call) = &m.tool_call {
                    wire.tool_calls = Some(vec![ToolCallDef::new(
                        &call.id,
                        &call.name,
                        call.arguments.clone(),
                    )]);
                }
                wire
            }
            Message::ToolResult(m) => WireMessage::tool(&m.call_id, &m.name, &m.content),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversationError {
    #[error("tool call '{0}' is still waiting for its result")]
    PendingToolCall(String),

    #[error("conversation already ended with a final answer")]
    Terminated,

    #[error("tool result '{0}' has no pending tool call")]
    OrphanToolResult(String),

    #[error("tool result '{got}' does not answer pending call '{expected}'")]
    MismatchedToolResult { expected: String, got: String },
}

/// Append-only history for one question
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![
                Message::System {
                    content: system_prompt.into(),
                },
                Message::User {
                    content: user_prompt.into(),
                },
            ],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True only for a conversation with no messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn pending_tool_call(&self) -> Option<&ToolCallRequest> {
        match self.messages.last() {
            Some(Message::Assistant(m)) => m.tool_call.as_ref(),
            _ => None,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.final_answer().is_some()
    }

    pub fn final_answer(&self) -> Option<&str> {
        match self.messages.last() {
            Some(Message::Assistant(m)) if m.tool_call.is_none() => Some(&m.content),
            _ => None,
        }
    }

    pub fn tool_round_trips(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| matches!(m, Message::ToolResult(_)))
            .count()
    }

    pub fn push_assistant(&mut self, message: AssistantMessage) -> Result<(), ConversationError> {
        if self.is_terminated() {
            return Err(ConversationError::Terminated);
        }
        if let Some(pending) = self.pending_tool_call() {
            return Err(ConversationError::PendingToolCall(pending.id.clone()));
        }
        self.messages.push(Message::Assistant(message));
        Ok(())
    }

    pub fn push_tool_result(&mut self, result: ToolResultMessage) -> Result<(), ConversationError> {
        let Some(pending) = self.pending_tool_call() else {
            return Err(ConversationError::OrphanToolResult(result.call_id));
        };
        if pending.id != result.call_id {
            return Err(ConversationError::MismatchedToolResult {
                expected: pending.id.clone(),
                got: result.call_id,
            });
        }
        self.messages.push(Message::ToolResult(result));
        Ok(())
    }

    pub fn to_provider_messages(&self) -> Vec<WireMessage> {
        self.messages.iter().map(Message::to_wire).collect()
    }
}
