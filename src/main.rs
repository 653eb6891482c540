//! factbot - Scheduled fact publisher
//!
//! Generates short facts with a language model and posts them to Telegram
//! on a fixed interval.

use anyhow::Result;
use clap::{Parser, Subcommand};
use factbot::{config::BotConfig, scheduler::Runner};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "factbot")]
#[command(version)]
#[command(about = "Scheduled LLM fact generator that publishes to Telegram")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "FACTBOT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish on the configured interval until interrupted
    Run,

    /// Execute a single run and exit
    Once,

    /// Show the effective configuration (credentials masked)
    Config,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("factbot={}", log_level).into());
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let config = BotConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run => run(config).await?,
        Commands::Once => once(config).await?,
        Commands::Config => show_config(&config)?,
    }

    Ok(())
}

async fn run(config: BotConfig) -> Result<()> {
    tracing::info!(
        interval_minutes = config.schedule.interval_minutes,
        posts_per_run = config.schedule.posts_per_run,
        "Starting factbot"
    );

    let mut runner = Runner::from_config(&config)?;

    runner
        .run_forever(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down...");
        })
        .await;

    // Dropping the runner closes the ledger.
    drop(runner);
    Ok(())
}

async fn once(config: BotConfig) -> Result<()> {
    let mut runner = Runner::from_config(&config)?;
    let report = runner.run_once().await;

    println!("published:  {}", report.published);
    println!("duplicates: {}", report.duplicates);
    println!("attempts:   {}", report.attempts);
    if let Some(reason) = &report.aborted {
        println!("aborted:    {}", reason);
    }
    Ok(())
}

fn show_config(config: &BotConfig) -> Result<()> {
    let toml = toml::to_string_pretty(&config.masked())?;
    println!("{}", toml);
    Ok(())
}
