use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use tracing::{debug, info};

use super::types::{Token, TokenResponse};
use super::{Authenticator, PlayerApi, SpotifyClient, SCOPES};
use crate::config::{RequestConfig, SpotifyConfig};
use crate::error::{SpotifyError, SpotifyResult};

/// Spotify accounts service client for the authorization-code flow.
#[derive(Clone)]
pub struct SpotifyAuthenticator {
    client: Client,
    config: SpotifyConfig,
    request_config: RequestConfig,
}

impl SpotifyAuthenticator {
    /// Create a new authenticator
    pub fn new(config: &SpotifyConfig, request_config: RequestConfig) -> SpotifyResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(SpotifyError::Http)?;

        let mut config = config.clone();
        config.accounts_url = config.accounts_url.trim_end_matches('/').to_string();
        config.api_url = config.api_url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            config,
            request_config,
        })
    }

    /// Web API base URL the issued clients talk to.
    pub fn api_url(&self) -> &str {
        &self.config.api_url
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn request_config(&self) -> &RequestConfig {
        &self.request_config
    }

    /// Obtain a new access token with a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> SpotifyResult<Token> {
        debug!("Refreshing Spotify access token");
        self.request_token(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> SpotifyResult<Token> {
        let url = format!("{}/api/token", self.config.accounts_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SpotifyError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    SpotifyError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(SpotifyError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let token: TokenResponse =
            response
                .json()
                .await
                .map_err(|e| SpotifyError::InvalidResponse {
                    message: format!("Failed to parse token response: {}", e),
                })?;

        Ok(Token::from_response(token))
    }
}

#[async_trait]
impl Authenticator for SpotifyAuthenticator {
    fn authorize_url(&self, state: &str) -> String {
        let base = format!("{}/authorize", self.config.accounts_url);
        let scope = SCOPES.join(" ");
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", self.config.redirect_url.as_str()),
            ("scope", scope.as_str()),
            ("state", state),
        ];

        match Url::parse_with_params(&base, &params) {
            Ok(url) => url.into(),
            // invalid accounts_url
            Err(_) => base,
        }
    }

    async fn exchange_code(&self, code: &str) -> SpotifyResult<Arc<dyn PlayerApi>> {
        let token = self
            .request_token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_url.as_str()),
            ])
            .await?;

        info!("Spotify authorization code exchanged");

        Ok(Arc::new(SpotifyClient::new(self.clone(), token)))
    }
}
