use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use wingbeat::executor::{Executor, Operation};
use wingbeat::{BrowserManager, Config};

/// wingbeat: deterministic Chrome automation core via CDP.
///
/// Reads operation requests as JSON lines on stdin —
/// `{"op": "navigate", "params": {"url": "https://example.com"}}` —
/// and writes one OperationResult JSON line per request on stdout.
/// This is the same dispatch-by-name shape the HTTP and MCP handler
/// layers drive.
#[derive(Parser)]
#[command(name = "wingbeat", version, about)]
struct Cli {
    /// Run Chrome with a visible window (default: headless)
    #[arg(long)]
    headed: bool,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Record script runs to GIF (overrides config)
    #[arg(long)]
    screencast: bool,
}

#[derive(Debug, Deserialize)]
struct Request {
    op: String,
    #[serde(default)]
    params: serde_json::Value,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to stderr only — stdout carries operation results
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if cli.headed {
        config.browser.headless = false;
    }
    if cli.screencast {
        config.screencast.enabled = true;
    }
    let config = Arc::new(config);

    tracing::info!(
        "Starting wingbeat (headless: {})",
        config.browser.headless
    );

    let manager = BrowserManager::launch(&config).await?;
    let executor = Executor::new(Arc::clone(&manager), Arc::clone(&config));
    let cancel = CancellationToken::new();

    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let result = match serde_json::from_str::<Request>(&line) {
            Ok(request) => match Operation::from_request(&request.op, request.params) {
                Ok(op) => executor.execute(op, &cancel).await,
                Err(e) => wingbeat::OperationResult::from_error(&e),
            },
            Err(e) => wingbeat::OperationResult::from_error(
                &wingbeat::AutomationError::InvalidInput(format!("bad request line: {e}")),
            ),
        };

        println!("{}", serde_json::to_string(&result)?);
    }

    manager.shutdown().await;
    tracing::info!("wingbeat shut down");
    Ok(())
}
