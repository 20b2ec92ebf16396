//! # Era Node
//!
//! Entry point: layered configuration, telemetry, then the runtime until
//! Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use era_telemetry::init_telemetry;
use tracing::info;

use node_runtime::cli::Cli;
use node_runtime::container::NodeConfig;
use node_runtime::NodeRuntime;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = NodeConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?
        .with_env_overrides()
        .context("invalid environment override")?;
    let config = cli.apply(config);

    let _telemetry =
        init_telemetry(config.telemetry.clone()).context("failed to initialize telemetry")?;

    let runtime = NodeRuntime::new(config)?;
    runtime.start().await?;

    info!("Node running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;

    runtime.shutdown().await;
    Ok(())
}
