//! Control loop
//!
//! Alternates between asking the model and running the tool it requested
//! until the model answers without a tool request, the model binding fails,
//! or the round-trip cap is reached.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::binding::{BindingError, ModelBinding};
use crate::conversation::{Conversation, ConversationError, ToolCallRequest, ToolResultMessage};
use crate::tools::ToolRegistry;

/// Default cap on tool round trips per question
pub const DEFAULT_MAX_ROUND_TRIPS: u32 = 12;

/// Where the loop is between steps
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    AwaitingModel,
    AwaitingTool(ToolCallRequest),
    Terminal(String),
}

#[derive(Error, Debug)]
pub enum LoopError {
    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("gave up after {limit} tool round trips without a final answer")]
    RoundTripLimit {
        limit: u32,
        conversation: Box<Conversation>,
    },

    #[error("conversation out of order: {0}")]
    Conversation(#[from] ConversationError),
}

/// Final answer plus the full history that produced it
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub answer: String,
    pub conversation: Conversation,
    pub round_trips: u32,
}

pub struct ControlLoop {
    binding: Arc<dyn ModelBinding>,
    tools: Arc<ToolRegistry>,
    max_round_trips: u32,
}

impl ControlLoop {
    pub fn new(binding: Arc<dyn ModelBinding>, tools: Arc<ToolRegistry>, max_round_trips: u32) -> Self {
        Self {
            binding,
            tools,
            max_round_trips,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn max_round_trips(&self) -> u32 {
        self.max_round_trips
    }

    /// Drive `conversation` to a final answer
    pub async fn run(&self, mut conversation: Conversation) -> Result<LoopOutcome, LoopError> {
        let descriptors = self.tools.descriptors();
        let mut round_trips = 0u32;
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    debug!("asking model (round trip {})", round_trips);
                    let reply = self.binding.invoke(&conversation, &descriptors).await?;
                    let next = match &reply.tool_call {
                        Some(call) => LoopState::AwaitingTool(call.clone()),
                        None => LoopState::Terminal(reply.content.clone()),
                    };
                    conversation.push_assistant(reply)?;
                    next
                }
                LoopState::AwaitingTool(call) => {
                    if round_trips >= self.max_round_trips {
                        warn!(
                            "stopping after {} round trips; last request was '{}'",
                            round_trips, call.name
                        );
                        return Err(LoopError::RoundTripLimit {
                            limit: self.max_round_trips,
                            conversation: Box::new(conversation),
                        });
                    }
                    info!("tool call: {}", call.name);
                    let outcome = self.tools.invoke(&call).await;
                    conversation.push_tool_result(ToolResultMessage::from_outcome(&call, &outcome))?;
                    round_trips += 1;
                    LoopState::AwaitingModel
                }
                LoopState::Terminal(answer) => {
                    debug!("final answer after {} round trips", round_trips);
                    return Ok(LoopOutcome {
                        answer,
                        conversation,
                        round_trips,
                    });
                }
            };
        }
    }
}
