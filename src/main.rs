//! Pylon Workbench command-line entry point.

use clap::Parser;
use pylon_client::PylonClient;
use pylon_workbench::cli::Cli;
use pylon_workbench::commands::execute;
use pylon_workbench::config::Config;
use std::io;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing; stdout is reserved for command output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            debug!(path = %path.display(), "loading configuration");
            Config::load(path)?
        }
        None => Config::default(),
    }
    .with_overrides(cli.token.clone(), cli.deployment.clone());

    let client = PylonClient::new(config.client_config())?;
    let mut stdout = io::stdout();
    execute(&client, config.log_stream_config(), &cli.command, &mut stdout).await
}
