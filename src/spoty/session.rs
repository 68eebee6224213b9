//! Authorization state of the process.
//!
//! A [`Session`] mints one correlation token at construction and transitions
//! from unauthorized to authorized exactly once. The session handle is
//! published atomically, so readers either see no handle or a complete one.

use std::sync::{Arc, OnceLock};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AuthorizationError, AuthorizationResult};
use crate::spotify::{Authenticator, CallbackParams, PlayerApi};

struct SessionInner {
    authenticator: Arc<dyn Authenticator>,
    state: String,
    client: OnceLock<Arc<dyn PlayerApi>>,
}

/// Shared handle to the single authorization state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Create an unauthorized session with a fresh correlation token.
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                authenticator,
                state: Uuid::new_v4().to_string(),
                client: OnceLock::new(),
            }),
        }
    }

    /// Correlation token bound to the authorize redirect.
    pub fn state(&self) -> &str {
        &self.inner.state
    }

    /// Whether an authorized client has been published.
    pub fn is_authorized(&self) -> bool {
        self.inner.client.get().is_some()
    }

    /// Authorized session handle, if any.
    pub fn client(&self) -> Option<Arc<dyn PlayerApi>> {
        self.inner.client.get().cloned()
    }

    /// Redirect target for the upstream consent page.
    pub fn authorize_url(&self) -> String {
        self.inner.authenticator.authorize_url(&self.inner.state)
    }

    /// Validate the OAuth callback, exchange its code and authorize the session.
    ///
    /// # Errors
    /// Any [`AuthorizationError`]; the session is left unchanged.
    pub async fn complete_authorization(&self, params: &CallbackParams) -> AuthorizationResult<()> {
        if self.is_authorized() {
            return Err(AuthorizationError::AlreadyAuthorized);
        }

        if params.state.as_deref() != Some(self.inner.state.as_str()) {
            warn!("Authorization callback state mismatch");
            return Err(AuthorizationError::StateMismatch);
        }

        if let Some(reason) = &params.error {
            warn!(reason = %reason, "Authorization denied");
            return Err(AuthorizationError::Denied {
                reason: reason.clone(),
            });
        }

        let code = params
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or(AuthorizationError::MissingCode)?;

        let client = self
            .inner
            .authenticator
            .exchange_code(code)
            .await
            .map_err(AuthorizationError::Exchange)?;

        let user = client
            .current_user()
            .await
            .map_err(AuthorizationError::UserLookup)?;

        self.inner
            .client
            .set(client)
            .map_err(|_| AuthorizationError::AlreadyAuthorized)?;

        info!(user = %user.id, "Spotify session authorized");
        Ok(())
    }

    /// Best-effort playback state. Any failure reads as "not playing".
    pub async fn is_playing(&self) -> bool {
        let Some(client) = self.client() else {
            return false;
        };

        match client.player_state().await {
            Ok(state) => state.is_some_and(|s| s.is_playing),
            Err(e) => {
                debug!(error = %e, "Could not query playback state");
                false
            }
        }
    }
}
