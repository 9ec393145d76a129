//! GAIA - tool-using question answering agent

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::EnvFilter;

mod commands;
mod driver;

use commands::{ask_command, init_command, run_command, status_command, tools_command};

/// GAIA - tool-using agent for benchmark questions
#[derive(Parser)]
#[command(name = "gaia")]
#[command(about = "◆ A tool-using agent for GAIA benchmark questions")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: ~/.gaia/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config and data directory
    Init,
    /// Answer a single question
    Ask {
        /// Question text
        question: String,
        /// File attached to the question
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Answer every question in a questions file
    Run {
        /// JSON array of {task_id, question, file_name}
        #[arg(short, long)]
        questions: PathBuf,
        /// Directory holding attached files
        #[arg(short, long)]
        attachments: Option<PathBuf>,
        /// Where to write the answers
        #[arg(short, long, default_value = "answers.json")]
        out: PathBuf,
        /// Questions answered at once (overrides config)
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },
    /// List available tools
    Tools,
    /// Show configuration status
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only answers
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config;
    match cli.command {
        Commands::Init => {
            if let Err(e) = init_command().await {
                error!("Init failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Ask { question, file } => {
            if let Err(e) = ask_command(config, question, file).await {
                error!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Run {
            questions,
            attachments,
            out,
            concurrency,
        } => {
            if let Err(e) = run_command(config, questions, attachments, out, concurrency).await {
                error!("Run failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Tools => {
            if let Err(e) = tools_command(config).await {
                error!("Tools failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Commands::Status => {
            if let Err(e) = status_command(config).await {
                error!("Status failed: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}
