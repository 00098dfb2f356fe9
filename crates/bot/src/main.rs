mod bootstrap;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracknote_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use tracknote_core::config::LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let cancel = CancellationToken::new();
    let app = bootstrap::bootstrap_with_config(config, cancel.clone())?;
    let bootstrap::Application { config, runner } = app;

    tracing::info!(
        reply_limit = config.summarizer.reply_limit,
        command_keyword = %config.summarizer.command_keyword,
        "starting event handler"
    );

    let pump = tokio::spawn(async move { runner.start().await });

    wait_for_shutdown().await?;
    tracing::info!("shutdown signal received, gracefully shutting down");
    cancel.cancel();

    match pump.await {
        Ok(result) => result?,
        Err(join_error) => anyhow::bail!("socket loop panicked: {join_error}"),
    }

    tracing::info!("shutdown complete");
    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
