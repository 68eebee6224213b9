//! Spotify Web API collaborators.
//!
//! - [`Authenticator`]: builds the authorize URL and exchanges codes for a
//!   session handle.
//! - [`PlayerApi`]: the authorized session handle used by the pipeline.
//!
//! [`SpotifyAuthenticator`] and [`SpotifyClient`] are the HTTP
//! implementations; tests substitute their own.

mod auth;
mod client;
mod types;

pub use auth::*;
pub use client::*;
pub use types::*;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SpotifyResult;

/// Scopes requested during authorization.
pub const SCOPES: &[&str] = &["user-read-currently-playing", "user-read-playback-state"];

/// Authorized access to the player endpoints of one account.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlayerApi: Send + Sync {
    /// Playback state, `None` when no device is active.
    async fn player_state(&self) -> SpotifyResult<Option<PlayerState>>;

    /// Currently playing item, `None` when nothing is playing.
    async fn currently_playing(&self) -> SpotifyResult<Option<CurrentlyPlaying>>;

    /// Profile of the authorized user.
    async fn current_user(&self) -> SpotifyResult<User>;
}

/// OAuth authorization-code flow.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Redirect target embedding `state` as the correlation token.
    fn authorize_url(&self, state: &str) -> String;

    /// Exchange an authorization code for a session handle.
    async fn exchange_code(&self, code: &str) -> SpotifyResult<Arc<dyn PlayerApi>>;
}
