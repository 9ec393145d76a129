//! Shared fakes for agent integration tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gaia_agent::{
    AssistantMessage, BindingError, Conversation, Message, ModelBinding, ParamKind,
    ToolCallRequest, ToolDescriptor, ToolError, ToolPayload, ToolTrait,
};
use serde_json::{json, Value};

/// Binding that replays a fixed list of assistant turns
pub struct ScriptedBinding {
    replies: Mutex<VecDeque<Result<AssistantMessage, BindingError>>>,
    pub seen_lengths: Mutex<Vec<usize>>,
}

impl ScriptedBinding {
    pub fn new(replies: Vec<AssistantMessage>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            seen_lengths: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(error: BindingError) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(VecDeque::from(vec![Err(error)])),
            seen_lengths: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.seen_lengths.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelBinding for ScriptedBinding {
    async fn invoke(
        &self,
        conversation: &Conversation,
        _tools: &[ToolDescriptor],
    ) -> Result<AssistantMessage, BindingError> {
        self.seen_lengths.lock().unwrap().push(conversation.len());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BindingError::Malformed("script exhausted".to_string())))
    }
}

/// Binding that never stops asking for `tool`
pub struct AlwaysToolBinding {
    tool: String,
    calls: AtomicUsize,
}

impl AlwaysToolBinding {
    pub fn new(tool: &str) -> Arc<Self> {
        Arc::new(Self {
            tool: tool.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelBinding for AlwaysToolBinding {
    async fn invoke(
        &self,
        _conversation: &Conversation,
        _tools: &[ToolDescriptor],
    ) -> Result<AssistantMessage, BindingError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AssistantMessage::tool_request(
            "",
            ToolCallRequest::new(format!("call_{}", n), &self.tool, json!({})),
        ))
    }
}

/// Tool that counts its invocations
#[derive(Clone, Default)]
pub struct CountingTool {
    pub count: Arc<AtomicUsize>,
}

impl CountingTool {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolTrait for CountingTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("counter", "Counts calls")
    }

    async fn execute(&self, _args: Value) -> Result<ToolPayload, ToolError> {
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(ToolPayload::Text(n.to_string()))
    }
}

/// Tool that sleeps longer than any sensible timeout
pub struct SleepyTool(pub Duration);

#[async_trait]
impl ToolTrait for SleepyTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("sleepy", "Sleeps")
    }

    async fn execute(&self, _args: Value) -> Result<ToolPayload, ToolError> {
        tokio::time::sleep(self.0).await;
        Ok(ToolPayload::Text("woke up".to_string()))
    }
}

/// Tool with one required argument
pub struct EchoTool;

#[async_trait]
impl ToolTrait for EchoTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("echo", "Echo text").param("text", ParamKind::String, "Text")
    }

    async fn execute(&self, args: Value) -> Result<ToolPayload, ToolError> {
        Ok(ToolPayload::Text(
            args["text"].as_str().unwrap_or_default().to_string(),
        ))
    }
}

/// Every ToolResult directly follows the Assistant turn that requested it,
/// and the conversation opens with System then User.
pub fn assert_well_formed(conversation: &Conversation) {
    let messages = conversation.messages();
    assert!(matches!(messages[0], Message::System { .. }));
    assert!(matches!(messages[1], Message::User { .. }));

    for window in messages.windows(2).skip(1) {
        match (&window[0], &window[1]) {
            (Message::Assistant(a), Message::ToolResult(r)) => {
                let call = a.tool_call.as_ref().expect("tool result without request");
                assert_eq!(call.id, r.call_id);
            }
            (Message::Assistant(a), next) => {
                assert!(a.tool_call.is_none(), "request not followed by result: {:?}", next);
            }
            (Message::ToolResult(_), next) => {
                assert!(matches!(next, Message::Assistant(_)), "tool results in a row");
            }
            (Message::User { .. }, next) => {
                assert!(matches!(next, Message::Assistant(_)));
            }
            (prev, next) => panic!("unexpected order: {:?} then {:?}", prev, next),
        }
    }
}
