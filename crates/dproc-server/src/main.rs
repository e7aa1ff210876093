//! dproc server - main entry point

use std::time::Duration;

use anyhow::Result;
use dproc_common::logging::{init_logging, LogConfig};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use dproc_server::{api, config::Config, pipeline::Pipeline};

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("dproc-server")
        .filter_directives("dproc_server=debug,dproc_convert=info,tower_http=debug,sqlx=info")
        .build();

    // Environment variables take precedence
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    let _log_guard = init_logging(&log_config)?;

    info!("Starting dproc server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let pipeline = Pipeline::build(&config).await?;
    let shutdown = pipeline.shutdown_token();
    let app = api::create_router(pipeline.feature_state(), &config);
    let workers = pipeline.start();

    tokio::spawn(cancel_on_signal(shutdown.clone()));

    api::serve(&config, app, shutdown.clone()).await?;
    shutdown.cancel();

    let timeout = Duration::from_secs(config.server.shutdown_timeout_secs);
    info!("Waiting up to {} seconds for workers to finish", timeout.as_secs());
    if tokio::time::timeout(timeout, workers.join()).await.is_err() {
        warn!("Workers did not stop in time, exiting anyway");
    }

    info!("Server shut down gracefully");
    Ok(())
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
        _ = shutdown.cancelled() => return,
    }

    shutdown.cancel();
}
