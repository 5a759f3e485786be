//! Attune daemon - routes notifications around the user's cognitive state
//!
//! Evaluates per-session state on a timer, keeps the energy ledger and
//! serves the HTTP API.

use anyhow::{Context, Result};
use attune_shared::VERSION;
use attuned::{logging, server, AppState, Config, LoggingGateway, Stores};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Logging before config so load warnings are visible
    let log_handle = logging::init();
    let config = Config::load();
    log_handle.apply_level(&config.daemon.log_level);

    info!("[BOOT] Attune daemon v{} starting...", VERSION);
    info!(
        "[BOOT] Config loaded (state every {}s, budget every {}s, window {}h)",
        config.evaluation.state_interval_secs,
        config.evaluation.budget_interval_secs,
        config.budget.window_hours
    );

    let state = AppState::new(&config, Stores::in_memory(), Arc::new(LoggingGateway));
    info!("[BOOT] Stores ready (in-memory)");

    info!("[READY] attuned operational");

    server::run(state, &config.daemon.bind_addr, shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutting down gracefully");
}
