//! Media tools: analyze_image and transcribe_audio
//!
//! Both delegate to the model provider: images go through a vision chat
//! completion, audio through the transcription endpoint.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use gaia_provider::{ChatParams, Message, Provider, TranscriptionRequest};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::files::extension;
use super::{parse_args, FileResolver, ParamKind, ToolDescriptor, ToolError, ToolPayload, ToolTrait};

const DEFAULT_IMAGE_QUESTION: &str = "Describe this image in detail.";
const VISION_MAX_TOKENS: u32 = 1024;

fn image_mime(path: &Path) -> Result<&'static str, ToolError> {
    match extension(path).as_deref() {
        Some("png") => Ok("image/png"),
        Some("jpg") | Some("jpeg") => Ok("image/jpeg"),
        Some("gif") => Ok("image/gif"),
        Some("webp") => Ok("image/webp"),
        other => Err(ToolError::Unsupported(format!(
            "image format '{}'",
            other.unwrap_or("none")
        ))),
    }
}

/// Encode raw image bytes as a `data:` URL
pub fn image_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

pub struct AnalyzeImageTool {
    provider: Arc<dyn Provider>,
    model: String,
    files: FileResolver,
}

impl AnalyzeImageTool {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, files: FileResolver) -> Self {
        Self {
            provider,
            model: model.into(),
            files,
        }
    }

    async fn image_url(&self, source: &str) -> Result<String, ToolError> {
        if source.starts_with("http://")
            || source.starts_with("https://")
            || source.starts_with("data:")
        {
            return Ok(source.to_string());
        }
        let path = self.files.resolve(source)?;
        let mime = image_mime(&path)?;
        let bytes = tokio::fs::read(&path).await?;
        Ok(image_data_url(mime, &bytes))
    }
}

#[derive(Deserialize)]
struct ImageArgs {
    image_path: String,
    question: Option<String>,
}

#[async_trait]
impl ToolTrait for AnalyzeImageTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "analyze_image",
            "Answer a question about an image given as a local file path or URL.",
        )
        .param(
            "image_path",
            ParamKind::String,
            "Local path (png, jpg, gif, webp) or http(s) URL of the image",
        )
        .optional(
            "question",
            ParamKind::String,
            "What to look for in the image",
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolPayload, ToolError> {
        let args: ImageArgs = parse_args(args)?;
        let question = args
            .question
            .filter(|q| !q.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE_QUESTION.to_string());
        debug!("Analyzing image {} with {}", args.image_path, self.model);

        let url = self.image_url(&args.image_path).await?;
        let params = ChatParams {
            model: self.model.clone(),
            messages: vec![Message::user_with_image(question, url)],
            max_tokens: VISION_MAX_TOKENS,
            ..ChatParams::default()
        };
        let response = self.provider.chat(params).await?;
        let answer = response.content.unwrap_or_default();
        if answer.trim().is_empty() {
            return Err(ToolError::Parse("empty vision response".to_string()));
        }
        Ok(ToolPayload::Text(answer))
    }
}

pub struct TranscribeAudioTool {
    provider: Arc<dyn Provider>,
    model: String,
    files: FileResolver,
}

impl TranscribeAudioTool {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, files: FileResolver) -> Self {
        Self {
            provider,
            model: model.into(),
            files,
        }
    }
}

#[derive(Deserialize)]
struct AudioArgs {
    file_path: String,
}

#[async_trait]
impl ToolTrait for TranscribeAudioTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "transcribe_audio",
            "Transcribe speech in an audio file (mp3, wav, m4a, ...) to text.",
        )
        .param("file_path", ParamKind::String, "Path to the audio file")
    }

    async fn execute(&self, args: Value) -> Result<ToolPayload, ToolError> {
        let AudioArgs { file_path } = parse_args(args)?;
        let path = self.files.resolve(&file_path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let audio = tokio::fs::read(&path).await?;
        debug!("Transcribing {} ({} bytes)", file_name, audio.len());

        let request = TranscriptionRequest::new(&self.model, file_name, audio);
        let text = self.provider.transcribe(request).await?;
        Ok(ToolPayload::Text(text))
    }
}
