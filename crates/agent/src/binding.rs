//! Model binding
//!
//! Turns a [`Conversation`] plus the tool descriptors into one chat
//! completion and normalizes the reply into an [`AssistantMessage`] that
//! carries at most one tool request.

use std::sync::Arc;

use async_trait::async_trait;
use gaia_config::Config;
use gaia_provider::{ChatParams, ChatResponse, Provider, ProviderError, ToolChoice};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::conversation::{AssistantMessage, Conversation, ToolCallRequest};
use crate::tools::ToolDescriptor;

#[derive(Error, Debug)]
pub enum BindingError {
    #[error("model endpoint failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("malformed model response: {0}")]
    Malformed(String),
}

/// Something that can produce the next assistant turn
#[async_trait]
pub trait ModelBinding: Send + Sync {
    async fn invoke(
        &self,
        conversation: &Conversation,
        tools: &[ToolDescriptor],
    ) -> Result<AssistantMessage, BindingError>;
}

/// Chat-completions binding over any [`Provider`]
pub struct ChatBinding {
    provider: Arc<dyn Provider>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ChatBinding {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: 4096,
            temperature: 0.0,
        }
    }

    pub fn from_config(provider: Arc<dyn Provider>, config: &Config) -> Self {
        Self {
            provider,
            model: config.model.model.clone(),
            max_tokens: config.model.max_tokens,
            temperature: config.model.temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn params(&self, conversation: &Conversation, tools: &[ToolDescriptor]) -> ChatParams {
        ChatParams {
            model: self.model.clone(),
            messages: conversation.to_provider_messages(),
            tools: tools.iter().map(ToolDescriptor::to_provider_tool).collect(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            tool_choice: ToolChoice::Auto,
            single_tool_call: !tools.is_empty(),
        }
    }
}

/// Reduce a raw completion to a single-request assistant message
pub fn normalize_response(response: ChatResponse) -> Result<AssistantMessage, BindingError> {
    let content = response.content.unwrap_or_default();
    let mut calls = response.tool_calls.into_iter();

    let Some(first) = calls.next() else {
        if content.trim().is_empty() {
            return Err(BindingError::Malformed(
                "response has neither content nor a tool call".to_string(),
            ));
        }
        return Ok(AssistantMessage::answer(content));
    };

    let dropped: Vec<String> = calls.map(|c| c.name).collect();
    if !dropped.is_empty() {
        warn!(
            "model returned {} extra tool call(s), keeping '{}' and dropping {:?}",
            dropped.len(),
            first.name,
            dropped
        );
    }

    if first.name.trim().is_empty() {
        return Err(BindingError::Malformed("tool call without a name".to_string()));
    }
    let id = if first.id.is_empty() {
        format!("call_{}", uuid::Uuid::new_v4().simple())
    } else {
        first.id
    };
    let arguments = match first.arguments {
        Value::Null => json!({}),
        other => other,
    };

    Ok(AssistantMessage::tool_request(
        content,
        ToolCallRequest::new(id, first.name, arguments),
    ))
}

#[async_trait]
impl ModelBinding for ChatBinding {
    async fn invoke(
        &self,
        conversation: &Conversation,
        tools: &[ToolDescriptor],
    ) -> Result<AssistantMessage, BindingError> {
        debug!(
            "asking {} with {} messages and {} tools",
            self.model,
            conversation.len(),
            tools.len()
        );
        let response = self.provider.chat(self.params(conversation, tools)).await?;
        debug!(
            "usage: {} prompt + {} completion tokens",
            response.usage.prompt_tokens, response.usage.completion_tokens
        );
        normalize_response(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gaia_provider::ToolCall;

    #[test]
    fn test_plain_answer() {
        let msg = normalize_response(ChatResponse::text("FINAL ANSWER: 68")).unwrap();
        assert_eq!(msg, AssistantMessage::answer("FINAL ANSWER: 68"));
    }

    #[test]
    fn test_empty_response_is_malformed() {
        let err = normalize_response(ChatResponse::text("  ")).unwrap_err();
        assert!(matches!(err, BindingError::Malformed(_)));
    }

    #[test]
    fn test_keeps_only_first_tool_call() {
        let mut response = ChatResponse::tool_call("c1", "multiply", json!({"a": 17, "b": 4}));
        response.tool_calls.push(ToolCall {
            id: "c2".to_string(),
            name: "add".to_string(),
            arguments: json!({"a": 1, "b": 2}),
        });

        let msg = normalize_response(response).unwrap();
        let call = msg.tool_call.unwrap();
        assert_eq!(call.id, "c1");
        assert_eq!(call.name, "multiply");
    }

    #[test]
    fn test_missing_id_and_null_arguments_filled_in() {
        let response = ChatResponse::tool_call("", "wiki_search", Value::Null);
        let call = normalize_response(response).unwrap().tool_call.unwrap();
        assert!(call.id.starts_with("call_"));
        assert_eq!(call.arguments, json!({}));
    }

    #[test]
    fn test_nameless_tool_call_is_malformed() {
        let response = ChatResponse::tool_call("c1", "", json!({}));
        assert!(matches!(
            normalize_response(response),
            Err(BindingError::Malformed(_))
        ));
    }
}
