//! OpenAI-compatible endpoint
//!
//! Covers plain OpenAI-style APIs (OpenAI, OpenRouter, vLLM, ...) and Azure
//! OpenAI deployments, which differ only in URL shape and auth header.

use crate::*;
use reqwest::{Client, RequestBuilder};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, trace};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// How requests are addressed and authenticated
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderFlavor {
    /// `{api_base}/chat/completions` with bearer auth
    OpenAi { api_base: String },
    /// `{endpoint}/openai/deployments/{model}/...?api-version=` with `api-key` header
    Azure { endpoint: String, api_version: String },
}

impl ProviderFlavor {
    pub fn openai(api_base: Option<String>) -> Self {
        Self::OpenAi {
            api_base: api_base
                .filter(|b| !b.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn azure(endpoint: impl Into<String>, api_version: impl Into<String>) -> Self {
        Self::Azure {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_version: api_version.into(),
        }
    }

    fn url(&self, model: &str, operation: &str) -> String {
        match self {
            Self::OpenAi { api_base } => format!("{}/{}", api_base, operation),
            Self::Azure {
                endpoint,
                api_version,
            } => format!(
                "{}/openai/deployments/{}/{}?api-version={}",
                endpoint, model, operation, api_version
            ),
        }
    }
}

/// Chat and transcription client for OpenAI-shaped APIs
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    flavor: ProviderFlavor,
    default_model: String,
}

impl OpenAiProvider {
    pub fn new(
        api_key: impl Into<String>,
        flavor: ProviderFlavor,
        default_model: Option<String>,
    ) -> Self {
        Self::with_timeout(
            api_key,
            flavor,
            default_model,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        )
    }

    pub fn with_timeout(
        api_key: impl Into<String>,
        flavor: ProviderFlavor,
        default_model: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: api_key.into(),
            flavor,
            default_model: default_model.unwrap_or_else(|| "gpt-4o".to_string()),
        }
    }

    pub fn flavor(&self) -> &ProviderFlavor {
        &self.flavor
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.flavor {
            ProviderFlavor::OpenAi { .. } => request.bearer_auth(&self.api_key),
            ProviderFlavor::Azure { .. } => request.header("api-key", &self.api_key),
        }
    }

    fn build_request(&self, params: &ChatParams) -> serde_json::Value {
        let model = if params.model.is_empty() {
            self.default_model.clone()
        } else {
            params.model.clone()
        };

        let messages: Vec<serde_json::Value> = params
            .messages
            .iter()
            .map(|m| {
                let mut obj = json!({ "role": &m.role });
                if !m.parts.is_empty() {
                    obj["content"] = json!(m.parts);
                } else if let Some(content) = &m.content {
                    obj["content"] = json!(content);
                }
                if let Some(tool_calls) = &m.tool_calls {
                    // Chat-completions expects arguments as an encoded JSON string
                    let calls: Vec<serde_json::Value> = tool_calls
                        .iter()
                        .map(|c| {
                            json!({
                                "id": c.id,
                                "type": c.call_type,
                                "function": {
                                    "name": c.function.name,
                                    "arguments": c.function.arguments.to_string(),
                                }
                            })
                        })
                        .collect();
                    obj["tool_calls"] = json!(calls);
                }
                if let Some(tool_call_id) = &m.tool_call_id {
                    obj["tool_call_id"] = json!(tool_call_id);
                }
                if let Some(name) = &m.name {
                    obj["name"] = json!(name);
                }
                obj
            })
            .collect();

        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
        });

        if !params.tools.is_empty() {
            let tools: Vec<serde_json::Value> = params
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": &t.function.name,
                            "description": &t.function.description,
                            "parameters": &t.function.parameters
                        }
                    })
                })
                .collect();

            body["tools"] = json!(tools);
            body["tool_choice"] = match &params.tool_choice {
                ToolChoice::Auto => json!("auto"),
                ToolChoice::Required(name) => {
                    json!({"type": "function", "function": {"name": name}})
                }
                ToolChoice::None => json!("none"),
            };
            if params.single_tool_call {
                body["parallel_tool_calls"] = json!(false);
            }
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<ChatResponse> {
        let choice = json["choices"]
            .get(0)
            .ok_or_else(|| ProviderError::InvalidResponse("no choices".to_string()))?;
        let message = &choice["message"];
        if !message.is_object() {
            return Err(ProviderError::InvalidResponse(
                "choice has no message".to_string(),
            ));
        }
        let content = message["content"].as_str().map(|s| s.to_string());
        let finish_reason = choice["finish_reason"]
            .as_str()
            .unwrap_or("stop")
            .to_string();

        let mut tool_calls = Vec::new();
        if let Some(calls) = message["tool_calls"].as_array() {
            for call in calls {
                let function = &call["function"];
                let args = match function["arguments"].as_str() {
                    Some(s) if s.trim().is_empty() => json!({}),
                    Some(s) => serde_json::from_str(s).map_err(|e| {
                        ProviderError::InvalidResponse(format!("tool arguments: {}", e))
                    })?,
                    None => function["arguments"].clone(),
                };

                tool_calls.push(ToolCall {
                    id: call["id"].as_str().unwrap_or("").to_string(),
                    name: function["name"].as_str().unwrap_or("").to_string(),
                    arguments: args,
                });
            }
        }

        let usage = if let Some(usage) = json["usage"].as_object() {
            let field = |k: &str| usage.get(k).and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            Usage {
                prompt_tokens: field("prompt_tokens"),
                completion_tokens: field("completion_tokens"),
                total_tokens: field("total_tokens"),
            }
        } else {
            Usage::default()
        };

        Ok(ChatResponse {
            content,
            tool_calls,
            finish_reason,
            usage,
        })
    }

    fn api_error(status: reqwest::StatusCode, json: &serde_json::Value) -> ProviderError {
        if status.as_u16() == 429 {
            return ProviderError::RateLimited;
        }
        let error = json["error"]["message"]
            .as_str()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("HTTP {}", status));
        ProviderError::Api(error)
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiProvider {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse> {
        if !self.is_configured() {
            return Err(ProviderError::NoApiKey);
        }

        let model = if params.model.is_empty() {
            self.default_model.clone()
        } else {
            params.model.clone()
        };
        let url = self.flavor.url(&model, "chat/completions");
        let body = self.build_request(&params);
        trace!("chat request to {}: {}", url, body);

        let response = self
            .authorize(self.client.post(&url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let json: serde_json::Value = serde_json::from_str(&text).map_err(|_| {
            ProviderError::InvalidResponse(format!(
                "non-JSON body (HTTP {}): {}",
                status,
                text.chars().take(200).collect::<String>()
            ))
        })?;

        if !status.is_success() {
            return Err(Self::api_error(status, &json));
        }

        debug!(
            "chat response: {} tool calls",
            json["choices"][0]["message"]["tool_calls"]
                .as_array()
                .map(|v| v.len())
                .unwrap_or(0)
        );

        self.parse_response(json)
    }

    async fn transcribe(&self, request: TranscriptionRequest) -> Result<String> {
        if !self.is_configured() {
            return Err(ProviderError::NoApiKey);
        }

        let url = self.flavor.url(&request.model, "audio/transcriptions");
        debug!(
            "transcribing {} ({} bytes) via {}",
            request.file_name,
            request.audio.len(),
            url
        );

        let part = reqwest::multipart::Part::bytes(request.audio)
            .file_name(request.file_name)
            .mime_str(&request.mime_type)?;
        let form = reqwest::multipart::Form::new()
            .text("model", request.model)
            .part("file", part);

        let response = self
            .authorize(self.client.post(&url))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let json: serde_json::Value = response.json().await?;
        if !status.is_success() {
            return Err(Self::api_error(status, &json));
        }

        json["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ProviderError::InvalidResponse("transcription has no text".to_string()))
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}
