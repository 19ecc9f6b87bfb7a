use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::info;

mod checker;
mod config;
mod engine;
mod escalation;
mod models;
mod notifier;
mod state;

use crate::engine::Monitor;
use crate::notifier::TeamsNotifier;

#[derive(Parser)]
#[command(name = "service-monitor", about = "Probes endpoints and escalates Teams alerts")]
struct Args {
    /// Path to the config file
    #[arg(long, default_value = "/etc/service-monitor/config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    if config::create_example_if_missing(&args.config)? {
        info!("created example config at {}", args.config.display());
        info!("edit it before starting the monitor");
        return Ok(());
    }

    let config = config::load(&args.config)?;
    info!("monitoring started using config: {}", args.config.display());

    let notifier = Arc::new(TeamsNotifier::new(
        config.webhook_url.clone(),
        config.mentions.clone(),
    ));
    let monitor = Monitor::new(config, notifier)?;

    tokio::select! {
        _ = monitor.run() => {}
        _ = signal::ctrl_c() => {
            info!("shutdown signal received, stopping monitor");
        }
    }

    Ok(())
}
