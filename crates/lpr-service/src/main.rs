use anyhow::Result;
use lpr_service::{api, LprServiceConfig, LprServiceState};
use telemetry::LogConfig;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment
    let config = LprServiceConfig::from_env()?;

    // Initialize telemetry (logging and metrics)
    let _log_guard = telemetry::init_structured_logging(
        LogConfig::new("lpr-service").with_node_id(config.node_id.clone()),
    )?;
    telemetry::metrics::init();

    info!("Starting LPR Service...");
    info!(
        "LPR Service configuration: bind={}, node_id={}, model_config={:?}",
        config.bind_addr, config.node_id, config.model_config
    );

    // Load the recognition model once; every request shares it
    let state = LprServiceState::load(&config).await?;
    if !state.is_ready() {
        warn!("Serving without a recognition model; /readyz reports not ready");
    }

    // Build HTTP router
    let app = api::router(state);

    // Bind and serve
    info!("Binding to {}", config.bind_addr);
    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("LPR Service listening on {}", config.bind_addr);

    // Run with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("LPR Service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Shutting down gracefully...");
}
