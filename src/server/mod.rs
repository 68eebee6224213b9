//! HTTP surface of the service.
//!
//! This module provides:
//! - The axum router with guest-only and authenticated route groups
//! - Request handlers mapping pipeline errors onto HTTP statuses
//! - Shared application state and the serve loop with graceful shutdown

mod handlers;

pub use handlers::*;

use std::sync::Arc;

use axum::routing::get;
use axum::{middleware, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::config::HttpConfig;
use crate::error::{AppError, AppResult};
use crate::health::HealthChecker;
use crate::spoty::Spoty;

/// Build metadata served by `/api/version` and printed by `spoty version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub name: String,
    pub version: String,
    pub service: String,
}

impl BuildInfo {
    /// Metadata of this binary, reported under `service`.
    pub fn current(service: impl Into<String>) -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            service: service.into(),
        }
    }

    /// Pretty JSON rendering, the same document `/api/version` returns.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub spoty: Arc<Spoty>,
    pub checker: Arc<HealthChecker>,
    pub build: BuildInfo,
}

impl AppState {
    /// Bundle the pipeline, health checker and build metadata.
    pub fn new(spoty: Arc<Spoty>, checker: Arc<HealthChecker>, build: BuildInfo) -> Self {
        Self {
            spoty,
            checker,
            build,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let guest = Router::new()
        .route("/api/authenticate", get(authenticate))
        .route("/api/callback", get(callback))
        .route_layer(middleware::from_fn_with_state(state.clone(), guest_only));

    let authenticated = Router::new()
        .route("/api/current", get(current_track))
        .route("/api/current/images", get(current_track_images))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            authenticated_only,
        ));

    Router::new()
        .route("/", get(health))
        .route("/api/version", get(version))
        .merge(guest)
        .merge(authenticated)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the router until Ctrl-C or SIGTERM.
pub async fn run(config: &HttpConfig, state: AppState) -> AppResult<()> {
    let addr = config.addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Server {
            message: format!("failed to bind {addr}: {e}"),
        })?;

    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Server {
            message: e.to_string(),
        })?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
