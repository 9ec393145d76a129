//! Immutable tool registry

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use gaia_config::Config;
use gaia_provider::Provider;
use thiserror::Error;
use tracing::{debug, warn};

use super::{
    AnalyzeImageTool, ArithmeticTool, ArxivSearchTool, BinaryOp, CayleyQuery, CayleyTool,
    ExecuteCodeTool, FileResolver, InteractTabularTool, ScrapeWebpageTool, SqrtTool,
    TavilySearchTool, ToolDescriptor, ToolOutcome, ToolTrait, TranscribeAudioTool,
    WikiSearchTool,
};
use crate::conversation::ToolCallRequest;

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

type BoxedTool = Box<dyn ToolTrait>;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),
}

struct Entry {
    descriptor: ToolDescriptor,
    tool: BoxedTool,
}

/// Collects tools before the registry is frozen
pub struct ToolRegistryBuilder {
    tools: HashMap<String, Entry>,
    timeout: Duration,
}

impl ToolRegistryBuilder {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Upper bound for any single tool call
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn register<T: ToolTrait + 'static>(&mut self, tool: T) -> Result<(), RegistryError> {
        let descriptor = tool.descriptor();
        if self.tools.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateTool(descriptor.name));
        }
        self.tools.insert(
            descriptor.name.clone(),
            Entry {
                descriptor,
                tool: Box::new(tool),
            },
        );
        Ok(())
    }

    pub fn build(self) -> ToolRegistry {
        ToolRegistry {
            tools: self.tools,
            timeout: self.timeout,
        }
    }
}

impl Default for ToolRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Name → tool mapping, fixed after construction
pub struct ToolRegistry {
    tools: HashMap<String, Entry>,
    timeout: Duration,
}

impl ToolRegistry {
    pub fn builder() -> ToolRegistryBuilder {
        ToolRegistryBuilder::new()
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolTrait> {
        self.tools.get(name).map(|e| e.tool.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Sorted tool names
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Descriptors sorted by name so prompts are stable across runs
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> =
            self.tools.values().map(|e| e.descriptor.clone()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Run one tool call. Never fails: every problem becomes a failure outcome.
    pub async fn invoke(&self, call: &ToolCallRequest) -> ToolOutcome {
        let Some(entry) = self.tools.get(&call.name) else {
            warn!("model requested unknown tool '{}'", call.name);
            return ToolOutcome::Failure(format!(
                "unknown tool '{}'; available tools: {}",
                call.name,
                self.names().join(", ")
            ));
        };

        let missing = entry.descriptor.missing_required(&call.arguments);
        if !missing.is_empty() {
            warn!("tool '{}' called without {:?}", call.name, missing);
            return ToolOutcome::Failure(format!(
                "missing required argument(s) for '{}': {}",
                call.name,
                missing.join(", ")
            ));
        }

        debug!("invoking tool '{}' with {}", call.name, call.arguments);
        match tokio::time::timeout(self.timeout, entry.tool.execute(call.arguments.clone())).await
        {
            Ok(Ok(payload)) => ToolOutcome::Success(payload),
            Ok(Err(e)) => {
                warn!("tool '{}' failed: {}", call.name, e);
                ToolOutcome::Failure(e.to_string())
            }
            Err(_) => {
                warn!("tool '{}' exceeded {:?}", call.name, self.timeout);
                ToolOutcome::Failure(format!(
                    "tool '{}' timed out after {:?}",
                    call.name, self.timeout
                ))
            }
        }
    }
}

/// Build the full GAIA tool set from configuration
pub fn default_registry(
    config: &Config,
    provider: Arc<dyn Provider>,
    attachments_dir: Option<PathBuf>,
) -> Result<ToolRegistry, RegistryError> {
    let tools = &config.tools;
    let files = FileResolver::new(attachments_dir);
    let mut builder = ToolRegistry::builder()
        .with_timeout(Duration::from_secs(config.agent.tool_timeout_secs));

    // Search
    builder.register(WikiSearchTool::new(
        tools.search_max_results as usize,
        tools.wiki_max_chars,
    ))?;
    builder.register(TavilySearchTool::new(
        config.tavily_api_key(),
        tools.search_max_results,
    ))?;
    builder.register(ArxivSearchTool::new(tools.search_max_results as usize))?;

    // Arithmetic
    for op in BinaryOp::ALL {
        builder.register(ArithmeticTool::new(op))?;
    }
    builder.register(SqrtTool)?;

    // Cayley tables
    for query in CayleyQuery::ALL {
        builder.register(CayleyTool::new(query))?;
    }

    // Web and media
    builder.register(ScrapeWebpageTool::new(tools.scrape_max_chars))?;
    builder.register(AnalyzeImageTool::new(
        provider.clone(),
        config.vision_model(),
        files.clone(),
    ))?;
    builder.register(TranscribeAudioTool::new(
        provider,
        tools.transcription_model.clone(),
        files.clone(),
    ))?;

    // Code and tables
    builder.register(ExecuteCodeTool::new(
        Duration::from_secs(tools.code_timeout_secs),
        files.clone(),
    ))?;
    builder.register(InteractTabularTool::new(files))?;

    Ok(builder.build())
}
