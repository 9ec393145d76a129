//! Session driver
//!
//! Turns GAIA questions into conversations, runs each one through the
//! control loop, and hands the answered ones to a submission sink.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info};

use gaia_agent::{ContextBuilder, ControlLoop};

const FINAL_ANSWER_MARKER: &str = "final answer:";

/// One benchmark question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub task_id: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// Answer as written to the answers file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub task_id: String,
    pub submitted_answer: String,
}

/// What happened to one question
#[derive(Debug, Clone, PartialEq)]
pub enum QuestionReport {
    Answered {
        task_id: String,
        answer: String,
        round_trips: u32,
    },
    Failed {
        task_id: String,
        reason: String,
    },
}

impl QuestionReport {
    pub fn task_id(&self) -> &str {
        match self {
            Self::Answered { task_id, .. } | Self::Failed { task_id, .. } => task_id,
        }
    }

    pub fn to_record(&self) -> Option<AnswerRecord> {
        match self {
            Self::Answered {
                task_id, answer, ..
            } => Some(AnswerRecord {
                task_id: task_id.clone(),
                submitted_answer: answer.clone(),
            }),
            Self::Failed { .. } => None,
        }
    }
}

/// Text after the last `FINAL ANSWER:` marker, or the whole reply without one
pub fn extract_final_answer(text: &str) -> String {
    // ASCII lowercasing keeps byte offsets aligned with `text`
    match text.to_ascii_lowercase().rfind(FINAL_ANSWER_MARKER) {
        Some(idx) => text[idx + FINAL_ANSWER_MARKER.len()..].trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// Read a JSON array of questions
pub async fn load_questions(path: &Path) -> Result<Vec<Question>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading questions from {}", path.display()))?;
    let questions: Vec<Question> = serde_json::from_str(&content)
        .with_context(|| format!("parsing questions in {}", path.display()))?;
    Ok(questions)
}

/// Where answered questions go
#[async_trait]
pub trait Submission: Send + Sync {
    async fn submit(&self, answers: &[AnswerRecord]) -> Result<()>;
}

/// Writes answers as a pretty-printed JSON array
pub struct FileSubmission {
    path: PathBuf,
}

impl FileSubmission {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Submission for FileSubmission {
    async fn submit(&self, answers: &[AnswerRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(answers)?;
        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("writing answers to {}", self.path.display()))?;
        info!("wrote {} answers to {}", answers.len(), self.path.display());
        Ok(())
    }
}

/// Runs questions through a shared control loop
#[derive(Clone)]
pub struct SessionDriver {
    control: Arc<ControlLoop>,
    context: Arc<ContextBuilder>,
    attachments_dir: Option<PathBuf>,
    concurrency: usize,
}

impl SessionDriver {
    pub fn new(control: Arc<ControlLoop>, context: ContextBuilder) -> Self {
        Self {
            control,
            context: Arc::new(context),
            attachments_dir: None,
            concurrency: 1,
        }
    }

    pub fn with_attachments_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.attachments_dir = dir;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    fn attachment_path(&self, question: &Question) -> Option<PathBuf> {
        let name = question.file_name.as_deref().filter(|n| !n.trim().is_empty())?;
        Some(match &self.attachments_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        })
    }

    /// Answer a single question
    pub async fn answer(&self, question: &Question) -> QuestionReport {
        info!("question {}: starting", question.task_id);
        let attachment = self.attachment_path(question);
        let conversation = self
            .context
            .build(&question.question, attachment.as_deref());

        match self.control.run(conversation).await {
            Ok(outcome) => {
                let answer = extract_final_answer(&outcome.answer);
                info!(
                    "question {}: answered after {} round trips",
                    question.task_id, outcome.round_trips
                );
                QuestionReport::Answered {
                    task_id: question.task_id.clone(),
                    answer,
                    round_trips: outcome.round_trips,
                }
            }
            Err(e) => {
                error!("question {}: {}", question.task_id, e);
                QuestionReport::Failed {
                    task_id: question.task_id.clone(),
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Answer every question and submit the successful ones.
    ///
    /// Reports come back in input order regardless of completion order.
    /// A question whose task panics is reported as failed; the rest are
    /// still submitted.
    pub async fn run_all(
        &self,
        questions: Vec<Question>,
        submission: &dyn Submission,
    ) -> Result<Vec<QuestionReport>> {
        let total = questions.len();
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        let mut owners = HashMap::with_capacity(total);

        for (index, question) in questions.into_iter().enumerate() {
            let driver = self.clone();
            let permits = permits.clone();
            let task_id = question.task_id.clone();
            let handle = tasks.spawn(async move {
                let _permit = permits.acquire_owned().await;
                driver.answer(&question).await
            });
            owners.insert(handle.id(), (index, task_id));
        }

        let mut slots: Vec<Option<QuestionReport>> = vec![None; total];
        while let Some(joined) = tasks.join_next_with_id().await {
            let (id, report) = match joined {
                Ok(done) => done,
                Err(e) => {
                    let Some((_, task_id)) = owners.get(&e.id()) else {
                        continue;
                    };
                    error!("question {}: task failed: {}", task_id, e);
                    let reason = if e.is_panic() {
                        format!("panicked: {}", e)
                    } else {
                        format!("aborted: {}", e)
                    };
                    let report = QuestionReport::Failed {
                        task_id: task_id.clone(),
                        reason,
                    };
                    (e.id(), report)
                }
            };
            if let Some((index, _)) = owners.get(&id) {
                slots[*index] = Some(report);
            }
        }
        let reports: Vec<QuestionReport> = slots.into_iter().flatten().collect();

        let answers: Vec<AnswerRecord> = reports.iter().filter_map(|r| r.to_record()).collect();
        info!("{}/{} questions answered", answers.len(), total);
        submission.submit(&answers).await?;

        Ok(reports)
    }
}
