//! GAIA command implementations

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use gaia_agent::{default_registry, ChatBinding, ContextBuilder, ControlLoop, ToolRegistry};
use gaia_config::{self, Config, EndpointFlavor};
use gaia_provider::{OpenAiProvider, Provider, ProviderFlavor};

use crate::driver::{load_questions, FileSubmission, Question, QuestionReport, SessionDriver};

/// Load config from `path` when given, otherwise from `~/.gaia/config.json`
async fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            gaia_config::load_env_file();
            let mut config = Config::load_from(path)
                .await
                .with_context(|| format!("loading config from {}", path.display()))?;
            config.apply_env();
            Ok(config)
        }
        None => Config::load().await.context("loading config"),
    }
}

/// Model endpoint described by the config
fn build_provider(config: &Config) -> Result<OpenAiProvider> {
    let model = &config.model;
    let flavor = match model.flavor {
        EndpointFlavor::Openai => ProviderFlavor::openai(model.api_base.clone()),
        EndpointFlavor::Azure => {
            let endpoint = model
                .api_base
                .clone()
                .context("Azure endpoint requires model.api_base (or MODEL_ENDPOINT)")?;
            ProviderFlavor::azure(endpoint, model.api_version.clone())
        }
    };
    debug!("model endpoint: {:?}", flavor);

    Ok(OpenAiProvider::with_timeout(
        model.api_key.clone(),
        flavor,
        Some(model.model.clone()),
        Duration::from_secs(model.request_timeout_secs),
    ))
}

fn build_registry(
    config: &Config,
    provider: Arc<dyn Provider>,
    attachments: Option<PathBuf>,
) -> Result<ToolRegistry> {
    default_registry(config, provider, attachments).context("building tool set")
}

/// Wire provider, tools, binding and loop into a driver
async fn build_driver(config: &Config, attachments: Option<PathBuf>) -> Result<SessionDriver> {
    if !config.has_api_key() {
        anyhow::bail!(
            "No API key configured. Set model.api_key in {} or MODEL_KEY / OPENAI_API_KEY",
            gaia_config::config_path().display()
        );
    }

    let provider: Arc<dyn Provider> = Arc::new(build_provider(config)?);
    let tools = build_registry(config, provider.clone(), attachments.clone())?;
    let binding = ChatBinding::from_config(provider, config);
    info!(
        "model {} with {} tools, max {} round trips",
        binding.model(),
        tools.len(),
        config.agent.max_round_trips
    );

    let control = ControlLoop::new(
        Arc::new(binding),
        Arc::new(tools),
        config.agent.max_round_trips,
    );
    let system_prompt = config
        .system_prompt()
        .await
        .context("loading system prompt")?;

    Ok(
        SessionDriver::new(Arc::new(control), ContextBuilder::new(system_prompt))
            .with_attachments_dir(attachments)
            .with_concurrency(config.driver.concurrency),
    )
}

/// Initialize config and data directory
pub async fn init_command() -> Result<()> {
    println!("◆ Initializing GAIA agent...");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = gaia_config::init().await?;

    println!("Config:  {}", gaia_config::config_path().display());
    println!("Model:   {}", config.model.model);

    println!("\n◆ GAIA agent initialized");
    println!("\nNext steps:");
    println!("  1. Add your API key to ~/.gaia/config.json (or set OPENAI_API_KEY)");
    println!("  2. Ask a question: gaia ask \"What is 17 * 4?\"");

    Ok(())
}

/// Answer one question and print the final answer
pub async fn ask_command(
    config_path: Option<PathBuf>,
    question: String,
    file: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config_path.as_deref()).await?;

    let attachments = file
        .as_ref()
        .and_then(|f| f.parent())
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf);
    let file_name = file
        .as_ref()
        .and_then(|f| f.file_name())
        .map(|n| n.to_string_lossy().into_owned());

    let driver = build_driver(&config, attachments).await?;
    let report = driver
        .answer(&Question {
            task_id: "ask".to_string(),
            question,
            file_name,
        })
        .await;

    match report {
        QuestionReport::Answered {
            answer,
            round_trips,
            ..
        } => {
            debug!("answered after {} round trips", round_trips);
            println!("{}", answer);
            Ok(())
        }
        QuestionReport::Failed { reason, .. } => anyhow::bail!(reason),
    }
}

/// Answer every question in a file and write the answers
pub async fn run_command(
    config_path: Option<PathBuf>,
    questions: PathBuf,
    attachments: Option<PathBuf>,
    out: PathBuf,
    concurrency: Option<usize>,
) -> Result<()> {
    let config = load_config(config_path.as_deref()).await?;
    let questions = load_questions(&questions).await?;

    let mut driver = build_driver(&config, attachments).await?;
    if let Some(n) = concurrency {
        driver = driver.with_concurrency(n);
    }

    println!(
        "◆ Answering {} questions (concurrency {})",
        questions.len(),
        driver.concurrency()
    );
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let submission = FileSubmission::new(out);
    let reports = driver.run_all(questions, &submission).await?;

    let mut answered = 0;
    for report in &reports {
        match report {
            QuestionReport::Answered {
                task_id,
                answer,
                round_trips,
            } => {
                answered += 1;
                println!("{}: {} ({} round trips)", task_id, answer, round_trips);
            }
            QuestionReport::Failed { task_id, reason } => {
                println!("{}: FAILED: {}", task_id, reason);
            }
        }
    }

    println!(
        "\n◆ {}/{} answered, written to {}",
        answered,
        reports.len(),
        submission.path().display()
    );
    Ok(())
}

/// List the tool set
pub async fn tools_command(config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path.as_deref()).await?;
    // Listing never reaches the endpoint, so a missing key is fine here
    let provider: Arc<dyn Provider> = Arc::new(build_provider(&config)?);
    let tools = build_registry(&config, provider, None)?;

    println!("◆ Tool Set ({} tools)", tools.len());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for descriptor in tools.descriptors() {
        println!("  {:<40} {}", descriptor.name, descriptor.description);
    }

    Ok(())
}

/// Show config and key status
pub async fn status_command(config_path: Option<PathBuf>) -> Result<()> {
    let path = config_path
        .clone()
        .unwrap_or_else(gaia_config::config_path);

    println!("◆ GAIA Agent Status");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    println!(
        "Config:    {} {}",
        path.display(),
        if path.exists() { "[OK]" } else { "[Missing]" }
    );

    let config = load_config(config_path.as_deref()).await?;
    let endpoint = match config.model.flavor {
        EndpointFlavor::Openai => "openai",
        EndpointFlavor::Azure => "azure",
    };
    println!("Endpoint:  {}", endpoint);
    println!("Model:     {}", config.model.model);
    println!(
        "API Key:   {}",
        if config.has_api_key() { "[Set]" } else { "[Missing]" }
    );
    println!(
        "Tavily:    {}",
        if config.tavily_api_key().is_some() {
            "[Set]"
        } else {
            "[Missing]"
        }
    );
    println!("Max round trips: {}", config.agent.max_round_trips);

    println!("\n◆ Ready");

    Ok(())
}
