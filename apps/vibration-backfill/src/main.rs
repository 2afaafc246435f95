mod auth;
mod cli;
mod config;
mod error;
mod merge;
mod pipeline;
mod publish;
mod roster;
mod source;
mod window;

#[cfg(test)]
mod test_support;

use crate::cli::Cli;
use crate::config::Config;
use crate::pipeline::Pipeline;
use crate::publish::LizardClient;
use crate::source::ConnxtClient;
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

const LOG_FILE_NAME: &str = "vibration_backfill.log";

fn init_tracing(log_dir: &Path) -> Result<()> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    fs::create_dir_all(log_dir)
        .with_context(|| format!("failed to create log dir {}", log_dir.display()))?;
    let log_path = log_dir.join(LOG_FILE_NAME);
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,vibration_backfill=info".into());
    let console_layer = tracing_subscriber::fmt::layer().with_target(true);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(log_file))
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let log_dir = cli.log_dir.clone().unwrap_or_else(|| config.log_dir.clone());
    init_tracing(&log_dir)?;

    // CoNNXT is only reachable directly; never route through a proxy.
    let http = reqwest::Client::builder().no_proxy().build()?;
    let connxt = ConnxtClient::new(http.clone(), &config.connxt_base_url, &config.connxt_client_id);
    let lizard = LizardClient::new(
        http,
        &config.lizard_base_url,
        &config.lizard_username,
        &config.lizard_api_key,
    );

    let plan = cli.plan();
    tracing::info!(
        days = plan.days,
        window_hours = plan.window_hours,
        start_offset = plan.start_offset,
        devices = config.roster.len(),
        "starting vibration sensor backfill"
    );

    let pipeline = Pipeline::new(&connxt, &connxt, &lizard, &config.roster);
    pipeline.run_backfill(Utc::now(), &plan).await?;
    Ok(())
}
