mod bootstrap;

use anyhow::Result;
use helpdevil_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use helpdevil_core::config::LogFormat::*;
    use tracing::Level;

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

    let app = bootstrap::bootstrap_with_config(config).await?;

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        teams_connected = app.registry.tracked_count().await,
        "helpdevil-server started"
    );

    tokio::select! {
        result = app.runner.start() => {
            result?;
            tracing::info!(
                event_name = "system.server.realtime_finished",
                correlation_id = "shutdown",
                "realtime runner finished"
            );
        }
        result = wait_for_shutdown() => {
            result?;
        }
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "helpdevil-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
