//! Trajhook CLI
//!
//! Loads `trajhook.toml`, initialises logging and drives one scripted
//! trajectory through the hook engine, printing a JSON summary.
//!
//! ```bash
//! trajhook --tool read_file --tool shell --deny-tool shell --log-level debug
//! ```

mod args;
mod config;
mod demo;

use clap::Parser;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use trajhook_core::TrajectoryId;

use args::Cli;
use config::AppConfig;
use demo::DemoOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)?;
    config.logging.init(cli.log_level.as_deref(), cli.log_format)?;

    info!(
        config = %cli.config.display(),
        gate_timeout = ?config.engine.inbox.gate_timeout,
        "trajhook starting"
    );

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling run");
                cancel.cancel();
            }
        });
    }

    let options = DemoOptions {
        trajectory_id: cli
            .trajectory_id
            .map(TrajectoryId::from)
            .unwrap_or_else(TrajectoryId::generate),
        tools: cli.tools,
        deny_tools: cli.deny_tools,
        approval_delay: (!cli.no_approval).then(|| Duration::from_millis(cli.approval_delay_ms)),
        max_retries: cli.max_retries,
    };

    let summary = demo::run(options, config.engine, cancel).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
