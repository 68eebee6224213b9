//! Track enrichment pipeline.
//!
//! [`Spoty`] serves the currently playing track through a short-TTL cache and
//! enriches the track's album artwork with dominant colors:
//!
//! ```text
//! current track:  authorized? → cache → playing? → Spotify → cache (5s)
//! track images:   valid track? → cache → fan-out fetch+analyze → join → cache (5s)
//! ```
//!
//! It also contributes the `spoty` probe to the [`HealthRegistry`], failing
//! while the session is not authorized.

mod color;
mod images;
mod session;

pub use color::*;
pub use images::*;
pub use session::*;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::cache::BoundedCache;
use crate::config::CacheConfig;
use crate::error::{AuthorizationResult, CacheResult, SpotyError, SpotyResult};
use crate::health::{HealthRegistry, Probe};
use crate::spotify::{CallbackParams, Track};

/// TTL of every cached pipeline result.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5);

/// Cache key of the currently playing track.
pub const CURRENT_TRACK_KEY: &str = "current_track";

/// Name of the probe registered with the health registry.
pub const HEALTH_CHECK_NAME: &str = "spoty";

/// Session-bound enrichment pipeline.
pub struct Spoty {
    session: Session,
    tracks: BoundedCache<Track>,
    images: BoundedCache<Vec<TrackImage>>,
    fetcher: Arc<dyn ImageFetcher>,
}

impl Spoty {
    /// Create the pipeline and register its health probe.
    ///
    /// # Errors
    /// Returns a cache error when the configured bounds are degenerate.
    pub fn new(
        session: Session,
        cache: &CacheConfig,
        fetcher: Arc<dyn ImageFetcher>,
        health: &HealthRegistry,
    ) -> CacheResult<Self> {
        let spoty = Self {
            session,
            tracks: BoundedCache::new(cache.max_keys, cache.max_cost)?,
            images: BoundedCache::new(cache.max_keys, cache.max_cost)?,
            fetcher,
        };

        health.register_checks([spoty.check()]);

        Ok(spoty)
    }

    /// Session backing this pipeline.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Whether the session completed authorization.
    pub fn is_authorized(&self) -> bool {
        self.session.is_authorized()
    }

    /// Consent URL carrying the session's correlation token.
    pub fn authorize_url(&self) -> String {
        self.session.authorize_url()
    }

    /// Finish the OAuth callback. See [`Session::complete_authorization`].
    pub async fn complete_authorization(&self, params: &CallbackParams) -> AuthorizationResult<()> {
        self.session.complete_authorization(params).await
    }

    /// Cache of the currently playing track.
    pub fn tracks_cache(&self) -> &BoundedCache<Track> {
        &self.tracks
    }

    /// Cache of enriched images, keyed by [`images_cache_key`].
    pub fn images_cache(&self) -> &BoundedCache<Vec<TrackImage>> {
        &self.images
    }

    /// Currently playing track, served from cache for [`DEFAULT_TTL`].
    ///
    /// # Errors
    /// - [`SpotyError::NotAuthenticated`] before authorization
    /// - [`SpotyError::NothingPlaying`] when playback is stopped or unknown
    /// - [`SpotyError::Upstream`] when the Spotify call fails
    pub async fn track_currently_playing(&self) -> SpotyResult<Track> {
        let client = self.session.client().ok_or(SpotyError::NotAuthenticated)?;

        if let Some(track) = self.tracks.get(CURRENT_TRACK_KEY) {
            debug!(track = ?track.id, "Found cached track");
            return Ok(track);
        }

        if !self.session.is_playing().await {
            debug!("No track currently playing");
            return Err(SpotyError::NothingPlaying);
        }

        let playing = client.currently_playing().await.map_err(|e| {
            error!(error = %e, "Failed to retrieve currently playing track");
            SpotyError::Upstream(e)
        })?;

        let track = playing
            .and_then(|playing| playing.into_track())
            .ok_or(SpotyError::NothingPlaying)?;

        self.tracks
            .set_with_ttl(CURRENT_TRACK_KEY, track.clone(), 0, DEFAULT_TTL);

        Ok(track)
    }

    /// Album images of `track` with their dominant colors.
    ///
    /// Per-image failures are reported on the individual results; the call
    /// itself only fails for a track without an identifier.
    pub async fn track_images(&self, track: &Track) -> SpotyResult<Vec<TrackImage>> {
        let id = track
            .id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SpotyError::InvalidInput {
                message: "invalid track".to_string(),
            })?;

        let key = images_cache_key(id);

        if let Some(images) = self.images.get(&key) {
            debug!(key = %key, count = images.len(), "Found cached images");
            return Ok(images);
        }

        let images = enrich_all(&self.fetcher, &track.album.images).await;

        self.images.set_with_ttl(key, images.clone(), 0, DEFAULT_TTL);

        Ok(images)
    }

    /// Health probe reporting whether the session is authorized.
    pub fn check(&self) -> Probe {
        let session = self.session.clone();

        Probe::new(HEALTH_CHECK_NAME, move || {
            let authorized = session.is_authorized();
            async move {
                if authorized {
                    Ok(())
                } else {
                    Err(anyhow::Error::new(SpotyError::NotAuthenticated))
                }
            }
        })
        .with_refresh_period(Duration::from_secs(10))
        .with_initial_delay(Duration::from_secs(10))
        .with_timeout(Duration::from_secs(5))
    }
}

/// Cache key for the enriched images of the track with `track_id`.
pub fn images_cache_key(track_id: &str) -> String {
    format!("track_{}_images", normalize_track_id(track_id))
}

/// UpperCamelCase form of an identifier: separators (`_`, `-`, `.`, space)
/// are dropped and the letter after a separator or digit is uppercased.
pub fn normalize_track_id(id: &str) -> String {
    let mut normalized = String::with_capacity(id.len());
    let mut capitalize_next = true;

    for c in id.trim().chars() {
        if c.is_ascii_alphabetic() {
            if capitalize_next {
                normalized.push(c.to_ascii_uppercase());
            } else {
                normalized.push(c);
            }
            capitalize_next = false;
        } else if c.is_ascii_digit() {
            normalized.push(c);
            capitalize_next = true;
        } else {
            capitalize_next = matches!(c, '_' | ' ' | '-' | '.');
        }
    }

    normalized
}
