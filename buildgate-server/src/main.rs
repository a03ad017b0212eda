//! buildgate HTTP server binary

use anyhow::Context;
use buildgate_server::{router, AppState, ServerConfig};
use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    buildgate_server::tracing::init_logging(config.debug, config.log_format)?;

    info!("Starting buildgate server v{}", env!("CARGO_PKG_VERSION"));

    let state = AppState::from_config(&config).context("Failed to initialize gate")?;
    info!(
        "Loaded {} author policies from {}",
        state.policies.len(),
        config.policy_file.display()
    );
    if state.debug.is_enabled() {
        info!("Debug mode enabled: request payloads will be logged");
    }

    buildgate_server::metrics::init_metrics();
    if let Some(address) = config.metrics_address {
        buildgate_server::metrics::init_prometheus(address)?;
        info!("Prometheus metrics on http://{}/metrics", address);
    }
    buildgate_server::metrics::set_policy_entries(state.policies.len());

    let app = router(state.clone());

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("server listening on address {}", listener.local_addr()?);

    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install CTRL+C signal handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, shutting down gracefully...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    info!("Server shutdown complete after {}s", state.uptime_seconds());
    Ok(())
}
