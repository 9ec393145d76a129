//! GAIA agent core
//!
//! Conversation model, tool set, model binding and the control loop that
//! ties them together.

pub mod binding;
pub mod context;
pub mod control;
pub mod conversation;
pub mod tools;

pub use binding::{BindingError, ChatBinding, ModelBinding};
pub use context::{build_user_prompt, ContextBuilder};
pub use control::{ControlLoop, LoopError, LoopOutcome, LoopState, DEFAULT_MAX_ROUND_TRIPS};
pub use conversation::{
    AssistantMessage, Conversation, ConversationError, Message, ToolCallRequest, ToolResultMessage,
};
pub use tools::{
    default_registry, ParamKind, RegistryError, ToolDescriptor, ToolError, ToolOutcome,
    ToolPayload, ToolRegistry, ToolRegistryBuilder, ToolTrait,
};
