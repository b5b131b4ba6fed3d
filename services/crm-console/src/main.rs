//! CRM admin console
//!
//! Command-line front end to the CRM REST API:
//! 1. Loads configuration (file, then env overlay)
//! 2. Opens the on-disk session holding the token pair
//! 3. Runs one command through the authenticated client, which refreshes
//!    expired tokens transparently
//! 4. Exits with status 2 when the session ended and a new login is needed

mod commands;
mod config;
mod metrics;
mod navigator;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{App, Commands};
use crate::config::{Config, DEFAULT_CONFIG_PATH};

/// Exit status when the command could not finish because sign-in is required.
const SESSION_ENDED_EXIT: u8 = 2;

#[derive(Parser)]
#[command(name = "crm-console", version, about = "CRM admin console")]
struct Cli {
    /// Config file (default: CONFIG_PATH, then ./crm-console.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print client metrics in Prometheus text format on exit
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // JSON logs on stderr; stdout carries command output
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    // Install the recorder before the client emits anything
    let prometheus = if cli.metrics {
        Some(metrics::install_recorder()?)
    } else {
        None
    };

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = if config_path.as_os_str() == DEFAULT_CONFIG_PATH {
        Config::load_or_default(&config_path)
    } else {
        Config::load(&config_path)
    }
    .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.base_url(),
        session = %config.session.path.display(),
        timeout_secs = config.api.timeout_secs,
        "configuration loaded"
    );

    let app = App::new(config)?;
    let result = cli.command.execute(&app).await;

    if let Some(handle) = prometheus {
        print!("{}", handle.render());
    }

    if app.navigator.session_ended() {
        if let Err(e) = result {
            error!(error = %e, "command ended with the session");
            eprintln!("error: {e:#}");
        }
        return Ok(ExitCode::from(SESSION_ENDED_EXIT));
    }

    result?;
    Ok(ExitCode::SUCCESS)
}
