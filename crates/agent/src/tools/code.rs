//! Source execution: execute_source_file

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use super::files::extension;
use super::{parse_args, FileResolver, ParamKind, ToolDescriptor, ToolError, ToolPayload, ToolTrait};

const MAX_OUTPUT: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Python,
    JavaScript,
    Bash,
    Ruby,
}

impl Language {
    pub fn from_name(name: &str) -> Result<Self, ToolError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "python" | "python3" | "py" => Ok(Language::Python),
            "javascript" | "js" | "node" => Ok(Language::JavaScript),
            "bash" | "sh" | "shell" => Ok(Language::Bash),
            "ruby" | "rb" => Ok(Language::Ruby),
            other => Err(ToolError::Unsupported(format!("language '{}'", other))),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ToolError> {
        match extension(path).as_deref() {
            Some("py") => Ok(Language::Python),
            Some("js") | Some("mjs") => Ok(Language::JavaScript),
            Some("sh") => Ok(Language::Bash),
            Some("rb") => Ok(Language::Ruby),
            other => Err(ToolError::Unsupported(format!(
                "source file extension '{}'",
                other.unwrap_or("none")
            ))),
        }
    }

    pub fn interpreter(self) -> &'static str {
        match self {
            Language::Python => "python3",
            Language::JavaScript => "node",
            Language::Bash => "bash",
            Language::Ruby => "ruby",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::JavaScript => "js",
            Language::Bash => "sh",
            Language::Ruby => "rb",
        }
    }
}

/// Temporary source file, removed on drop
struct ScratchFile(PathBuf);

impl ScratchFile {
    async fn create(language: Language, code: &str) -> Result<Self, ToolError> {
        let path = std::env::temp_dir().join(format!(
            "gaia-{}.{}",
            uuid::Uuid::new_v4(),
            language.extension()
        ));
        tokio::fs::write(&path, code).await?;
        Ok(Self(path))
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            warn!("could not remove {:?}: {}", self.0, e);
        }
    }
}

pub struct ExecuteCodeTool {
    timeout: Duration,
    files: FileResolver,
}

impl ExecuteCodeTool {
    pub fn new(timeout: Duration, files: FileResolver) -> Self {
        Self { timeout, files }
    }

    async fn run(&self, language: Language, script: &Path) -> Result<String, ToolError> {
        // the child runs in the base dir; cwd-relative paths must be absolute by then
        let script = tokio::fs::canonicalize(script).await?;
        debug!("running {:?} with {}", script, language.interpreter());
        let mut cmd = Command::new(language.interpreter());
        cmd.arg(&script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = self.files.base_dir() {
            cmd.current_dir(dir);
        }

        // dropping the output future kills the child
        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|e| {
                ToolError::Execution(format!("could not start {}: {}", language.interpreter(), e))
            })?,
            Err(_) => return Err(ToolError::Timeout(self.timeout)),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            return Err(ToolError::Execution(truncate_output(format!(
                "exit code {}\n{}",
                code,
                stderr.trim_end()
            ))));
        }

        let mut parts = Vec::new();
        if !stdout.is_empty() {
            parts.push(stdout.into_owned());
        }
        if !stderr.is_empty() {
            parts.push(format!("STDERR:\n{}", stderr));
        }
        let result = if parts.is_empty() {
            "(no output)".to_string()
        } else {
            parts.join("\n")
        };
        Ok(truncate_output(result))
    }
}

/// Cap output at `MAX_OUTPUT` bytes on a char boundary
fn truncate_output(output: String) -> String {
    if output.len() <= MAX_OUTPUT {
        return output;
    }
    let mut cut = MAX_OUTPUT;
    while !output.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "{}\n... output truncated, {} bytes omitted",
        &output[..cut],
        output.len() - cut
    )
}

#[derive(Deserialize)]
struct CodeArgs {
    file_path: Option<String>,
    code: Option<String>,
    language: Option<String>,
}

#[async_trait]
impl ToolTrait for ExecuteCodeTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "execute_source_file",
            "Run a Python, JavaScript, Bash or Ruby program and return its output. \
             Pass either the path of a source file or inline code with its language.",
        )
        .optional("file_path", ParamKind::String, "Path to the source file")
        .optional("code", ParamKind::String, "Inline source code")
        .optional(
            "language",
            ParamKind::String,
            "python, javascript, bash or ruby (defaults to the file extension, or python for inline code)",
        )
    }

    async fn execute(&self, args: Value) -> Result<ToolPayload, ToolError> {
        let args: CodeArgs = parse_args(args)?;
        let language = args.language.as_deref().map(Language::from_name).transpose()?;

        let output = match (args.file_path, args.code) {
            (Some(path), _) => {
                let path = self.files.resolve(&path)?;
                let language = match language {
                    Some(l) => l,
                    None => Language::from_path(&path)?,
                };
                self.run(language, &path).await?
            }
            (None, Some(code)) => {
                let language = language.unwrap_or(Language::Python);
                let scratch = ScratchFile::create(language, &code).await?;
                self.run(language, &scratch.0).await?
            }
            (None, None) => {
                return Err(ToolError::InvalidArguments(
                    "either file_path or code is required".to_string(),
                ))
            }
        };
        Ok(ToolPayload::Text(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_lookup() {
        assert_eq!(Language::from_name("Python").unwrap(), Language::Python);
        assert_eq!(Language::from_name("node").unwrap(), Language::JavaScript);
        assert!(matches!(
            Language::from_name("cobol"),
            Err(ToolError::Unsupported(_))
        ));
        assert_eq!(
            Language::from_path(Path::new("solve.rb")).unwrap(),
            Language::Ruby
        );
        assert!(Language::from_path(Path::new("data.xlsx")).is_err());
    }

    #[test]
    fn test_truncate_output() {
        let long = "x".repeat(MAX_OUTPUT + 5);
        let cut = truncate_output(long);
        assert!(cut.starts_with(&"x".repeat(MAX_OUTPUT)));
        assert!(cut.ends_with("5 bytes omitted"));
        assert_eq!(truncate_output("short".to_string()), "short");
    }

    #[tokio::test]
    async fn test_requires_file_or_code() {
        let tool = ExecuteCodeTool::new(Duration::from_secs(5), FileResolver::default());
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn test_scratch_file_removed_on_drop() {
        let scratch = ScratchFile::create(Language::Bash, "echo hi").await.unwrap();
        let path = scratch.0.clone();
        assert!(path.exists());
        drop(scratch);
        assert!(!path.exists());
    }
}
