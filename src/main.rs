use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pacer::clock::SystemClock;
use pacer::config::PacerConfig;
use pacer::runtime::Pacer;

#[derive(Parser, Debug)]
#[command(name = "pacer", version, about = "Request throttling and keyset pagination core")]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the counter store and limiter and keep them swept until stopped
    Run,
    /// Load and validate the configuration and rate limit rules, then print them
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = PacerConfig::load(cli.config.as_deref())?;
    info!(
        default_limit = config.pagination.default_limit,
        max_limit = config.pagination.max_limit,
        "Configuration loaded"
    );

    match cli.command {
        Command::CheckConfig => check_config(&config),
        Command::Run => run(&config).await,
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn check_config(config: &PacerConfig) -> anyhow::Result<()> {
    let rules = config.rate_limiting.load_rules()?;
    rules.validate()?;

    println!("evaluation: {:?}", config.rate_limiting.evaluation);
    for (action, policy) in &rules.actions {
        let windows: Vec<String> = policy
            .windows
            .iter()
            .map(|w| format!("{} per {:?}", w.limit, w.window()))
            .collect();
        println!("{}: {}", action, windows.join(", "));
    }

    info!(actions = rules.actions.len(), "Configuration is valid");
    Ok(())
}

async fn run(config: &PacerConfig) -> anyhow::Result<()> {
    info!("Starting Pacer");

    let mut pacer = Pacer::from_config(config, Arc::new(SystemClock))?;
    if let Some(interval) = config.store.sweep_interval() {
        pacer.start_sweeper(interval)?;
    }

    shutdown_signal().await;

    pacer.shutdown();
    info!("Pacer stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
