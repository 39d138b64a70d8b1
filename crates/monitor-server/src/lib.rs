//! # XSI Monitor Server
//!
//! HTTP service around [`xsi_monitor_core`]: it keeps the admin credential in
//! SQLite, exposes start/stop/status endpoints for the agent monitor and
//! accepts pushed XSI event documents on `POST /xsi/events`.
//!
//! ## Routes
//!
//! | Method | Path                 | Purpose                                  |
//! |--------|----------------------|------------------------------------------|
//! | POST   | `/monitoring/start`  | Validate the token, subscribe, start loop |
//! | POST   | `/monitoring/stop`   | Stop the running monitor                 |
//! | GET    | `/monitoring/status` | Session, counters, active calls          |
//! | GET    | `/health`            | Database and monitor liveness            |
//! | POST   | `/xsi/events`        | Push channel for event documents         |

pub mod config;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;
pub mod token_store;

use std::sync::Arc;

use tracing::{info, warn};
use xsi_monitor_core::{BlockedCallerPolicy, EventDispatcher};

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use state::AppState;
pub use token_store::{AdminToken, SqliteTokenStore};

/// Dispatcher configured from the routing section of the monitor config
pub fn dispatcher_for(config: &ServerConfig) -> EventDispatcher {
    let routing = &config.monitor.routing;
    if routing.blocked_callers.is_empty() {
        EventDispatcher::new()
    } else {
        info!(
            "Blocking {} caller number(s); diverting to {}",
            routing.blocked_callers.len(),
            routing.block_destination
        );
        EventDispatcher::new()
            .with_routing_policy(Arc::new(BlockedCallerPolicy::from_config(routing)))
    }
}

/// Bind, optionally start monitoring, and serve until Ctrl+C
pub async fn serve(config: ServerConfig) -> Result<()> {
    let state = AppState::from_config(&config, dispatcher_for(&config)).await?;
    let app = routes::router(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("🚀 XSI monitor listening on {}", listener.local_addr()?);

    if config.autostart {
        let outcome = state.supervisor.start_monitoring().await;
        if !outcome.is_success() {
            warn!("Agent monitoring not started at boot: {:?}", outcome);
        }
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.supervisor.stop().await;
    info!("👋 XSI monitor shut down");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("🛑 Shutdown requested"),
        Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
    }
}
