#![deny(unsafe_code)]

//! coderag CLI: ask for code from the terminal.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use coderag_config::AppConfig;
use coderag_core::{
    ChatTurn, CodePipeline, InMemoryStore, PipelineRequest, PipelineResult, StoreFetcher,
};

/// coderag: conversational code generation grounded in your documentation.
#[derive(Parser)]
#[command(name = "coderag", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "coderag.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question.
    Ask {
        /// The request, e.g. "build me a todo list app".
        question: String,

        /// JSON file holding the prior conversation as `[{role, content}]`.
        #[arg(long)]
        history: Option<PathBuf>,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,

        /// Use the blocking pipeline instead of the async one.
        #[arg(long)]
        blocking: bool,

        /// Write the generated code to this file if it passed review.
        #[arg(long)]
        write: Option<PathBuf>,
    },

    /// Interactive session that keeps the conversation history.
    Chat {
        /// Use the blocking pipeline instead of the async one.
        #[arg(long)]
        blocking: bool,
    },

    /// Validate and display configuration.
    Config {
        /// Show the resolved configuration.
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, found) = load_config(&cli.config).await?;

    let filter = match cli.verbose {
        0 => config.logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if !found {
        info!(path = %cli.config.display(), "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Ask {
            question,
            history,
            json,
            blocking,
            write,
        } => cmd_ask(&config, question, history.as_deref(), json, blocking, write.as_deref()).await?,
        Commands::Chat { blocking } => cmd_chat(&config, blocking).await?,
        Commands::Config { show } => cmd_config(&cli.config, config, show)?,
    }

    Ok(())
}

async fn cmd_ask(
    config: &AppConfig,
    question: String,
    history: Option<&Path>,
    json: bool,
    blocking: bool,
    write: Option<&Path>,
) -> Result<()> {
    let pipeline = build_pipeline(config).await?;
    let chat_history = match history {
        Some(path) => read_history(path).await?,
        None => Vec::new(),
    };
    let request = PipelineRequest::new(question).with_history(chat_history);

    let (_pipeline, result) = invoke(pipeline, request, blocking)
        .await
        .map_err(|e| e.error)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_text(&result, &config.pipeline.code_language));
    }

    if let Some(path) = write {
        match result.code().filter(|_| result.is_approved()) {
            Some(code) => {
                tokio::fs::write(path, code.trim_start_matches('\n'))
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
                info!(path = %path.display(), "Generated code written");
            }
            None => warn!(path = %path.display(), "No approved code, nothing written"),
        }
    }
    Ok(())
}

async fn cmd_chat(config: &AppConfig, blocking: bool) -> Result<()> {
    let mut pipeline = build_pipeline(config).await?;
    let mut history: Vec<ChatTurn> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("Describe the program you want. Type 'exit' to quit.");
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        let request = PipelineRequest::new(question).with_history(history.clone());
        let (returned, outcome) = match invoke(pipeline, request, blocking).await {
            Ok((returned, result)) => (returned, Ok(result)),
            Err(InvokeError { pipeline, error }) => (pipeline, Err(error)),
        };
        pipeline = returned;

        match outcome {
            Ok(result) => {
                print!("{}", render_text(&result, &config.pipeline.code_language));
                history.push(ChatTurn::user(question));
                history.push(ChatTurn::assistant(assistant_turn(&result)));
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}

fn cmd_config(config_path: &Path, mut config: AppConfig, show: bool) -> Result<()> {
    if show {
        if !config.llm.api_key.is_empty() {
            config.llm.api_key = "********".to_string();
        }
        let toml_str =
            toml::to_string_pretty(&config).map_err(|e| anyhow::anyhow!("TOML error: {e}"))?;
        println!("{toml_str}");
    } else {
        println!("Configuration at '{}' is valid.", config_path.display());
    }
    Ok(())
}

/// Load the config file, falling back to defaults when it does not exist.
/// The flag reports whether the file was found.
async fn load_config(path: &Path) -> Result<(AppConfig, bool)> {
    if tokio::fs::try_exists(path).await.unwrap_or(false) {
        let config = AppConfig::load(path)
            .await
            .with_context(|| format!("invalid configuration at {}", path.display()))?;
        Ok((config, true))
    } else {
        Ok((AppConfig::default(), false))
    }
}

async fn build_pipeline(config: &AppConfig) -> Result<Arc<CodePipeline>> {
    let store = InMemoryStore::from_config(&config.store)?;
    if store.is_empty() {
        warn!(dir = %config.store.knowledge_dir, "Knowledge store is empty");
    } else {
        info!(documents = store.len(), "Knowledge store loaded");
    }
    let fetcher = Arc::new(StoreFetcher::new(Arc::new(store)));
    let pipeline = CodePipeline::from_config(config, fetcher).await?;
    Ok(Arc::new(pipeline))
}

/// A failed invocation, handing the pipeline back to the caller.
struct InvokeError {
    pipeline: Arc<CodePipeline>,
    error: anyhow::Error,
}

/// Run one request. The blocking path moves the pipeline onto the blocking
/// thread pool and hands it back with the outcome.
async fn invoke(
    pipeline: Arc<CodePipeline>,
    request: PipelineRequest,
    blocking: bool,
) -> std::result::Result<(Arc<CodePipeline>, PipelineResult), InvokeError> {
    if blocking {
        let joined = tokio::task::spawn_blocking(move || {
            let outcome = pipeline.run(&request);
            (pipeline, outcome)
        })
        .await;
        match joined {
            Ok((pipeline, Ok(result))) => Ok((pipeline, result)),
            Ok((pipeline, Err(e))) => Err(InvokeError {
                pipeline,
                error: e.into(),
            }),
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    } else {
        match pipeline.run_async(&request).await {
            Ok(result) => Ok((pipeline, result)),
            Err(e) => Err(InvokeError {
                pipeline,
                error: e.into(),
            }),
        }
    }
}

async fn read_history(path: &Path) -> Result<Vec<ChatTurn>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read history file {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("history file {} is not a JSON list of turns", path.display()))
}

/// Human-readable rendering of a result.
fn render_text(result: &PipelineResult, language: &str) -> String {
    let mut out = String::new();
    if let Some(question) = result.generated_question() {
        out.push_str(&format!("Request: {}\n\n", question.trim()));
    }

    match result.code() {
        Some(code) if result.is_approved() => {
            out.push_str(&format!("```{language}{code}```\n"));
        }
        Some(_) => out.push_str("The generated code did not pass the safety review.\n"),
        None => out.push_str("No code was produced for this request.\n"),
    }
    if let Some(explanation) = result.explanation().map(str::trim).filter(|e| !e.is_empty()) {
        out.push_str(&format!("\n{explanation}\n"));
    }

    if let Some(documents) = result.source_documents() {
        let sources: Vec<&str> = documents.iter().filter_map(|d| d.source()).collect();
        if !sources.is_empty() {
            out.push_str(&format!("\nSources: {}\n", sources.join(", ")));
        }
    }
    if let Some(verdict) = result.safety_verdict() {
        out.push_str(&format!("Safety review: {verdict}\n"));
    }
    out
}

/// What the assistant "said" in a chat turn, fed back as history.
fn assistant_turn(result: &PipelineResult) -> String {
    let explanation = result.explanation().map(str::trim).unwrap_or_default();
    match result.code() {
        Some(code) if result.is_approved() => format!("{}\n{explanation}", code.trim()),
        _ => explanation.to_string(),
    }
}
