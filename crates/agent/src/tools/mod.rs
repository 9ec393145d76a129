//! Tool set
//!
//! Every tool exposes a [`ToolDescriptor`] for prompting and an async
//! `execute` that returns a payload or a [`ToolError`]. The registry turns
//! both into a [`ToolOutcome`], so nothing a tool does can escape the loop.

pub mod algebra;
pub mod code;
pub mod files;
pub mod math;
pub mod media;
pub mod registry;
pub mod search;
pub mod tabular;
pub mod web;
mod xlsx;

pub use algebra::{CayleyQuery, CayleyTool};
pub use code::{ExecuteCodeTool, Language};
pub use files::FileResolver;
pub use math::{ArithmeticTool, BinaryOp, SqrtTool};
pub use media::{AnalyzeImageTool, TranscribeAudioTool};
pub use registry::{default_registry, RegistryError, ToolRegistry, ToolRegistryBuilder};
pub use search::{ArxivSearchTool, TavilySearchTool, WikiSearchTool};
pub use tabular::InteractTabularTool;
pub use web::ScrapeWebpageTool;

use async_trait::async_trait;
use gaia_provider::{ProviderError, Tool};
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("gaia-runner/", env!("CARGO_PKG_VERSION"));

/// Primitive argument types understood by the model
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<ParamKind>),
}

impl ParamKind {
    fn schema(&self) -> Value {
        match self {
            ParamKind::String => json!({"type": "string"}),
            ParamKind::Integer => json!({"type": "integer"}),
            ParamKind::Number => json!({"type": "number"}),
            ParamKind::Boolean => json!({"type": "boolean"}),
            ParamKind::Array(items) => json!({"type": "array", "items": items.schema()}),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
}

/// Name, argument schema and prompt text of one tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            params: Vec::new(),
        }
    }

    /// Add a required parameter
    pub fn param(self, name: &str, kind: ParamKind, description: &str) -> Self {
        self.push(name, kind, description, true)
    }

    /// Add an optional parameter
    pub fn optional(self, name: &str, kind: ParamKind, description: &str) -> Self {
        self.push(name, kind, description, false)
    }

    fn push(mut self, name: &str, kind: ParamKind, description: &str, required: bool) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            required,
        });
        self
    }

    pub fn to_json_schema(&self) -> Value {
        let mut props = serde_json::Map::new();
        let mut required = Vec::new();

        for param in &self.params {
            let mut schema = param.kind.schema();
            schema["description"] = json!(param.description);
            props.insert(param.name.clone(), schema);
            if param.required {
                required.push(param.name.clone());
            }
        }

        json!({
            "type": "object",
            "properties": props,
            "required": required
        })
    }

    /// Required parameters absent (or null) in `args`
    pub fn missing_required<'a>(&'a self, args: &Value) -> Vec<&'a str> {
        self.params
            .iter()
            .filter(|p| p.required)
            .filter(|p| args.get(&p.name).map_or(true, Value::is_null))
            .map(|p| p.name.as_str())
            .collect()
    }

    pub fn to_provider_tool(&self) -> Tool {
        Tool::new(&self.name, &self.description, self.to_json_schema())
    }
}

/// Successful tool output
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    Text(String),
    Structured(Value),
}

impl ToolPayload {
    pub fn render(&self) -> String {
        match self {
            ToolPayload::Text(text) => text.clone(),
            ToolPayload::Structured(value) => value.to_string(),
        }
    }
}

/// Result of one tool invocation as seen by the model
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(ToolPayload),
    Failure(String),
}

impl ToolOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, ToolOutcome::Failure(_))
    }

    pub fn render(&self) -> String {
        match self {
            ToolOutcome::Success(payload) => payload.render(),
            ToolOutcome::Failure(diagnostic) => format!("Error: {}", diagnostic),
        }
    }
}

/// Tool-level failures; always recovered into a [`ToolOutcome::Failure`]
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("could not parse {0}")]
    Parse(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("{0} is not configured")]
    NotConfigured(String),

    #[error("math error: {0}")]
    Math(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("model call failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Tool interface
#[async_trait]
pub trait ToolTrait: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;
    async fn execute(&self, args: Value) -> Result<ToolPayload, ToolError>;
}

/// Deserialize tool arguments into a typed struct
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Shared HTTP client for outbound tool requests
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Fail on non-2xx responses, keeping a short excerpt of the body
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ToolError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ToolError::Status {
        status: status.as_u16(),
        body: truncate_chars(&body, 300).0,
    })
}

/// Cut `text` to at most `max` characters; the flag reports whether it was cut
pub(crate) fn truncate_chars(text: &str, max: usize) -> (String, bool) {
    match text.char_indices().nth(max) {
        Some((idx, _)) => (text[..idx].to_string(), true),
        None => (text.to_string(), false),
    }
}

static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("valid entity regex")
});

/// Decode character references and the common named entities in one pass.
/// Unknown entities are left as written.
pub(crate) fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                _ => match name.strip_prefix('#') {
                    Some(hex) if hex.starts_with(['x', 'X']) => {
                        u32::from_str_radix(&hex[1..], 16).ok().and_then(char::from_u32)
                    }
                    Some(dec) => dec.parse::<u32>().ok().and_then(char::from_u32),
                    None => None,
                },
            };
            decoded.map(String::from).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}
