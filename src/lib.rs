//! # Spoty
//!
//! A small HTTP service exposing the Spotify track currently playing for one
//! authorized account, with the track's album artwork enriched by dominant
//! colors.
//!
//! ## Features
//!
//! - **Authorization**: one OAuth authorization-code flow per process, bound to
//!   a per-process correlation token
//! - **Current Track**: served through a bounded TTL cache
//! - **Image Enrichment**: concurrent fetch and dominant-color analysis of
//!   every album image, with per-image failure isolation
//! - **Health**: subsystems register periodic probes; `/` reports the aggregate
//!
//! ## Architecture
//!
//! ```text
//! HTTP client → axum router → Spoty pipeline → Spotify Web API (HTTP)
//!                                  ↓
//!                     bounded TTL caches, image fan-out
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use spoty::health::{HealthChecker, HealthRegistry};
//! use spoty::server::{self, AppState, BuildInfo};
//! use spoty::spotify::SpotifyAuthenticator;
//! use spoty::spoty::{HttpImageFetcher, Session, Spoty};
//! use spoty::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let auth = SpotifyAuthenticator::new(&config.spotify, config.request.clone())?;
//!     let fetcher = Arc::new(HttpImageFetcher::new(&config.image)?);
//!     let registry = HealthRegistry::new();
//!     let spoty = Spoty::new(Session::new(Arc::new(auth)), &config.cache, fetcher, &registry)?;
//!     let checker = HealthChecker::start(registry.compile_schedule());
//!     let state = AppState::new(Arc::new(spoty), Arc::new(checker), BuildInfo::current("spoty"));
//!     server::run(&config.http, state).await?;
//!     Ok(())
//! }
//! ```

/// Bounded, cost-aware TTL cache.
pub mod cache;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Health probe registry and periodic checker.
pub mod health;
/// HTTP routes, handlers and serve loop.
pub mod server;
/// Spotify Web API client and types.
pub mod spotify;
/// Current-track pipeline, session state and image enrichment.
pub mod spoty;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::AppState;
pub use spoty::Spoty;
