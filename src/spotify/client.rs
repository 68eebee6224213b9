use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::types::{CurrentlyPlaying, PlayerState, Token, User};
use super::{PlayerApi, SpotifyAuthenticator};
use crate::error::{SpotifyError, SpotifyResult};

/// Refresh the access token when it expires within this margin.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(30);

/// Upper bound of a single exponential backoff step.
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Authorized Spotify Web API client for one account
pub struct SpotifyClient {
    auth: SpotifyAuthenticator,
    token: Mutex<Token>,
}

/// Delay before retry number `retry` (1-based): `base_ms * 2^(retry - 1)`,
/// saturating and capped at [`MAX_BACKOFF`].
fn backoff_delay(base_ms: u64, retry: u32) -> Duration {
    let factor = 2_u64
        .checked_pow(retry.saturating_sub(1))
        .unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor)).min(MAX_BACKOFF)
}

/// Outcome of a single request attempt.
enum Attempt<T> {
    Done(Option<T>),
    /// Rate limited; the server asked to wait this long.
    RetryAfter(Duration, SpotifyError),
}

impl SpotifyClient {
    /// Create a client from a freshly issued token
    pub fn new(auth: SpotifyAuthenticator, token: Token) -> Self {
        Self {
            auth,
            token: Mutex::new(token),
        }
    }

    async fn access_token(&self) -> SpotifyResult<String> {
        let mut token = self.token.lock().await;

        if token.expires_within(TOKEN_REFRESH_MARGIN) {
            if let Some(refresh_token) = token.refresh_token.clone() {
                let mut fresh = self.auth.refresh(&refresh_token).await?;
                if fresh.refresh_token.is_none() {
                    fresh.refresh_token = Some(refresh_token);
                }
                *token = fresh;
                info!("Spotify access token refreshed");
            }
        }

        Ok(token.access_token.clone())
    }

    /// GET a Web API path with automatic retry. `204 No Content` yields `None`.
    async fn get<T: DeserializeOwned>(&self, path: &str) -> SpotifyResult<Option<T>> {
        let url = format!("{}{}", self.auth.api_url(), path);
        let request_config = self.auth.request_config();

        let mut last_error = None;
        let mut retries = 0;
        let mut wait = None;

        while retries <= request_config.max_retries {
            if retries > 0 {
                let delay = wait
                    .take()
                    .unwrap_or_else(|| backoff_delay(request_config.retry_delay_ms, retries));
                warn!(
                    path = %path,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying Spotify request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.execute_request(&url).await {
                Ok(Attempt::Done(value)) => {
                    debug!(
                        path = %path,
                        latency_ms = start.elapsed().as_millis(),
                        "Spotify request succeeded"
                    );
                    return Ok(value);
                }
                Ok(Attempt::RetryAfter(delay, e)) => {
                    warn!(path = %path, delay_ms = delay.as_millis(), "Spotify rate limit hit");
                    wait = Some(delay);
                    last_error = Some(e);
                    retries += 1;
                }
                Err(e) if e.is_retryable() => {
                    error!(
                        path = %path,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "Spotify request failed"
                    );
                    last_error = Some(e);
                    retries += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Err(SpotifyError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries: retries.saturating_sub(1),
        })
    }

    /// Execute a single request (internal)
    async fn execute_request<T: DeserializeOwned>(&self, url: &str) -> SpotifyResult<Attempt<T>> {
        let access_token = self.access_token().await?;

        let response = self
            .auth
            .http()
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SpotifyError::Timeout {
                        timeout_ms: self.auth.request_config().timeout_ms,
                    }
                } else {
                    SpotifyError::Http(e)
                }
            })?;

        let status = response.status();

        if status == StatusCode::NO_CONTENT {
            return Ok(Attempt::Done(None));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let delay = retry_after(&response);
            let error_body = response.text().await.unwrap_or_default();
            return Ok(Attempt::RetryAfter(
                delay,
                SpotifyError::Api {
                    status: status.as_u16(),
                    message: error_body,
                },
            ));
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(SpotifyError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let value: T = response
            .json()
            .await
            .map_err(|e| SpotifyError::InvalidResponse {
                message: format!("Failed to parse response: {}", e),
            })?;

        Ok(Attempt::Done(Some(value)))
    }
}

fn retry_after(response: &Response) -> Duration {
    let seconds = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(1);

    Duration::from_secs(seconds)
}

#[async_trait]
impl PlayerApi for SpotifyClient {
    async fn player_state(&self) -> SpotifyResult<Option<PlayerState>> {
        self.get("/me/player").await
    }

    async fn currently_playing(&self) -> SpotifyResult<Option<CurrentlyPlaying>> {
        self.get("/me/player/currently-playing").await
    }

    async fn current_user(&self) -> SpotifyResult<User> {
        self.get("/me")
            .await?
            .ok_or_else(|| SpotifyError::InvalidResponse {
                message: "empty user profile response".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_retry() {
        assert_eq!(backoff_delay(100, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(100, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(100, 4), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_saturates_for_large_retry_counts() {
        assert_eq!(backoff_delay(1000, 64), MAX_BACKOFF);
        assert_eq!(backoff_delay(1000, u32::MAX), MAX_BACKOFF);
        assert_eq!(backoff_delay(u64::MAX, 2), MAX_BACKOFF);
    }
}
