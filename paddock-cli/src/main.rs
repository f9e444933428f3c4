//! paddock: terminal shell for a race-outcome session
//!
//! Reads one command per line from stdin, forwards it to the session and
//! prints the state after every change. Logs go to stderr.

mod input;
mod reach;
mod render;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use paddock_agent::{LlmBackend, LlmInferenceClient, OpenAiBackend};
use paddock_session::{IntentAck, Orchestrator, PaddockConfig, SessionError};

use input::Input;
use reach::Reachability;

/// Entries shown by the `log` command.
const LOG_LIMIT: usize = 10;

/// Budget for the startup reachability check.
const AVAILABILITY_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "paddock")]
#[command(about = "Track race results and get recommendations from an LLM")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "PADDOCK_CONFIG", default_value = "paddock.yaml")]
    config: String,

    /// Chat-completions base URL (overrides config file)
    #[arg(long, env = "PADDOCK_BASE_URL")]
    base_url: Option<String>,

    /// Model name (overrides config file)
    #[arg(long, env = "PADDOCK_MODEL")]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut config, from_file) = if Path::new(&cli.config).exists() {
        (PaddockConfig::from_file(&cli.config)?, true)
    } else {
        (PaddockConfig::default(), false)
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(config.general.log_level.parse()?)
                .from_env_lossy(),
        )
        .init();

    if from_file {
        info!("Config file: {}", cli.config);
    } else {
        info!("Config file not found, using defaults");
    }

    // Apply CLI overrides
    if let Some(base_url) = cli.base_url {
        config.backend.base_url = base_url;
    }
    if let Some(model) = cli.model {
        config.backend.model = model;
    }

    let backend = OpenAiBackend::new(
        config.backend.base_url.clone(),
        config.backend.model.clone(),
        config.backend.api_key(),
        config.backend.timeout(),
    )?;
    info!(
        base_url = backend.base_url(),
        model = backend.id(),
        "Inference backend configured"
    );
    let backend = Arc::new(backend);

    // Off the input path: an unreachable host must not stall the prompt
    let checked = Arc::clone(&backend);
    tokio::spawn(async move {
        match reach::check_backend(&*checked, AVAILABILITY_TIMEOUT).await {
            Reachability::Reachable => debug!("Backend reachable"),
            Reachability::Unreachable => {
                warn!("Backend not reachable yet; analyses will fail until it is")
            }
            Reachability::TimedOut => warn!(
                timeout_ms = AVAILABILITY_TIMEOUT.as_millis() as u64,
                "Backend did not answer the availability check"
            ),
        }
    });

    let client = LlmInferenceClient::new(backend).with_max_tokens(config.backend.max_tokens);
    let handle = Orchestrator::spawn(Arc::new(client), &config.general);

    let mut states = WatchStream::new(handle.subscribe());
    let renderer = tokio::spawn(async move {
        while let Some(state) = states.next().await {
            println!("{}", render::render(&state));
        }
    });

    println!("{}", input::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match input::parse(&line) {
            Input::Intent(intent) => match handle.submit(intent).await {
                Ok(IntentAck::Accepted) => {}
                Ok(IntentAck::Ignored) => println!("(nothing to do)"),
                Err(SessionError::Rejected(err)) => println!("! {}", err),
                Err(SessionError::Closed) => break,
            },
            Input::Log => {
                for entry in handle.analysis_log(LOG_LIMIT).await? {
                    println!("{}", serde_json::to_string(&entry)?);
                }
            }
            Input::Stats => {
                let stats = handle.analysis_stats().await?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            Input::Help => println!("{}", input::HELP),
            Input::Quit => break,
            Input::Empty => {}
            Input::Unknown(text) => println!("! Unknown command: {} (try 'help')", text),
        }
    }

    handle.shutdown().await;
    renderer.abort();
    info!("Goodbye");

    Ok(())
}
