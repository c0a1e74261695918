use std::path::PathBuf;
use std::sync::Arc;

use ambientd::config::LogLevel;
use ambientd::Config;
use ambientd::Engine;
use anyhow::Context;
use clap::Parser;
use tokio::sync::oneshot;
use tracing::error;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "ambientd",
    version,
    about = "Dims the lights while Kodi plays video"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(default_value = "ambientd.toml")]
    config: PathBuf,

    /// Override the log level from the config file
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_file(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    tracing_subscriber::fmt()
        .with_env_filter(config.logging.env_filter())
        .init();

    info!("ambientd starting");
    info!("Loaded config from: {}", cli.config.display());

    let mut engine = Engine::new();
    engine.register_integrations_from_config(&config);
    engine.register_apps_from_config(&config);
    let engine = Arc::new(engine);

    let (api_shutdown_tx, api_shutdown_rx) = oneshot::channel();
    let api_task = config.api.clone().map(|api| {
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = ambientd::api::serve(api.listen, api.port, engine, api_shutdown_rx).await
            {
                error!("HTTP API server failed: {}", e);
            }
        })
    });

    info!("Press Ctrl+C to exit");
    tokio::select! {
        result = engine.run() => {
            if let Err(e) = result {
                error!("Engine stopped: {}", e);
            }
        }
        signal = tokio::signal::ctrl_c() => match signal {
            Ok(()) => info!("Received shutdown signal"),
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        },
    }

    if let Some(task) = api_task {
        let _ = api_shutdown_tx.send(());
        if let Err(e) = task.await {
            error!("HTTP API task failed: {}", e);
        }
    }

    info!("ambientd shutdown complete");
    Ok(())
}
