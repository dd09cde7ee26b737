//! huginn: diagnostics for local inference servers
//!
//! Discover a server, list its loaded models, validate a model and inspect
//! a host configuration, all through the same cache and classifier the
//! library uses.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use huginn::{HostConfig, Huginn, HuginnConfig};
use serde::Serialize;

/// huginn CLI
#[derive(Parser)]
#[command(name = "huginn")]
#[command(version)]
#[command(about = "Model readiness checks for local OpenAI-compatible servers")]
struct Args {
    /// Config file (default: ~/.huginn/config.toml, then /etc/huginn/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Server base URL (default: configured, else auto-discovered)
    #[arg(short, long, global = true, env = "HUGINN_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe candidate ports for a running server
    Discover,

    /// List models loaded on the server
    Models,

    /// Check that a model is loaded and ready
    Validate {
        /// Model identifier
        model: String,
    },

    /// Rank loaded models by similarity to a model identifier
    Suggest {
        /// Model identifier
        model: String,
    },

    /// Validate a host configuration file and show the models that would be added
    CheckConfig {
        /// Host configuration (JSON)
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = HuginnConfig::load(args.config.as_deref())?;
    let huginn = Huginn::builder().config(config).build()?;
    let base_url = args.base_url.as_deref();

    match args.command {
        Command::Discover => match huginn.resolve_base_url(None).await {
            Ok(base) => print_json(&serde_json::json!({ "base_url": base }))?,
            Err(e) => {
                eprintln!("{e}");
                return Ok(ExitCode::FAILURE);
            }
        },

        Command::Models => {
            let base = huginn.resolve_base_url(base_url).await?;
            let models = huginn.models(Some(base.as_str())).await?;
            print_json(&serde_json::json!({ "base_url": base, "models": models }))?;
        }

        Command::Validate { model } => {
            let base = huginn.resolve_base_url(base_url).await?;
            let outcome = huginn.on_chat_params(&model, &base).await;
            print_json(&outcome)?;
            if !outcome.is_success() {
                return Ok(ExitCode::FAILURE);
            }
        }

        Command::Suggest { model } => {
            let suggestions = huginn.suggest(&model, base_url).await?;
            print_json(&suggestions)?;
        }

        Command::CheckConfig { path } => {
            let content = std::fs::read_to_string(&path)?;
            let mut host = HostConfig::from_json(&content)?;
            let report = huginn.on_config(&mut host).await;
            print_json(&serde_json::json!({ "report": report, "config": host }))?;
            if !report.is_ok() {
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_json<T: Serialize>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
