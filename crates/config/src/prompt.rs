//! System prompt resolution

use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::{ConfigError, Result};

/// GAIA answer-format prompt used when no prompt file is configured
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a general AI assistant. I will ask you a question. \
Report your thoughts, and finish your answer with the following template: \
FINAL ANSWER: [YOUR FINAL ANSWER]. \
YOUR FINAL ANSWER should be a number OR as few words as possible OR a comma separated list of numbers and/or strings. \
If you are asked for a number, don't use comma to write your number neither use units such as $ or percent sign unless specified otherwise. \
If you are asked for a string, don't use articles, neither abbreviations (e.g. for cities), and write the digits in plain text unless specified otherwise. \
If you are asked for a comma separated list, apply the above rules depending of whether the element to be put in the list is a number or a string.\n\n\
You can call tools to search the web, Wikipedia and arXiv, do arithmetic, read web pages, \
look at images, transcribe audio, run code and analyse tables. \
Call at most one tool at a time. If a tool reports an error, try another approach.";

#[derive(Deserialize)]
struct PromptFile {
    system_prompt: Option<String>,
}

/// Read the `system_prompt` key from a YAML file
pub async fn load_prompt_file(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    debug!("reading system prompt from {:?}", path);
    let content = tokio::fs::read_to_string(path).await?;
    parse_prompt(&content, path)
}

fn parse_prompt(content: &str, path: &Path) -> Result<String> {
    let file: PromptFile = serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    file.system_prompt
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingPromptKey(path.to_path_buf()))
}
