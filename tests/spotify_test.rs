//! Integration tests for the Spotify client
//!
//! Tests the authorization-code exchange, token refresh and the retrying
//! Web API client using wiremock for request/response mocking.

use std::sync::Arc;

use serde_json::json;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use spoty::config::{RequestConfig, SpotifyConfig};
use spoty::error::SpotifyError;
use spoty::spotify::{Authenticator, PlayerApi, SpotifyAuthenticator};

/// Create an authenticator whose accounts and API hosts are the mock server
fn create_test_authenticator(base_url: &str, max_retries: u32) -> SpotifyAuthenticator {
    let config = SpotifyConfig {
        client_id: "test-client".to_string(),
        client_secret: "test-secret".to_string(),
        accounts_url: base_url.to_string(),
        api_url: format!("{}/v1", base_url),
        redirect_url: "http://localhost:13337/api/callback".to_string(),
    };

    let request_config = RequestConfig {
        timeout_ms: 2000,
        max_retries,
        retry_delay_ms: 10,
    };

    SpotifyAuthenticator::new(&config, request_config).expect("Failed to create authenticator")
}

async fn mount_token_exchange(server: &MockServer, expires_in: u64) {
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "token_type": "Bearer",
            "expires_in": expires_in,
            "refresh_token": "refresh-1",
            "scope": "user-read-currently-playing user-read-playback-state"
        })))
        .expect(1)
        .mount(server)
        .await;
}

/// Authorize against the mock server and return the issued client
async fn authorized_client(server: &MockServer, max_retries: u32) -> Arc<dyn PlayerApi> {
    mount_token_exchange(server, 3600).await;
    create_test_authenticator(&server.uri(), max_retries)
        .exchange_code("auth-code")
        .await
        .expect("code exchange should succeed")
}

fn track_json() -> serde_json::Value {
    json!({
        "id": "4uLU6hMCjMI75M1A2tKUQC",
        "name": "Never Gonna Give You Up",
        "duration_ms": 213573,
        "explicit": false,
        "album": {
            "id": "6N9PS4QXF1D0OWPk0Sxtb4",
            "name": "Whenever You Need Somebody",
            "images": [
                {"url": "https://i.scdn.co/image/640", "height": 640, "width": 640},
                {"url": "https://i.scdn.co/image/64", "height": 64, "width": 64}
            ]
        },
        "artists": [{"id": "0gxyHStUsqpMadRV0Di1Qt", "name": "Rick Astley"}]
    })
}

#[cfg(test)]
mod authorization_tests {
    use super::*;

    #[tokio::test]
    async fn test_exchange_code_uses_basic_auth() {
        let mock_server = MockServer::start().await;

        // base64("test-client:test-secret")
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(header(
                "Authorization",
                "Basic dGVzdC1jbGllbnQ6dGVzdC1zZWNyZXQ=",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-1",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let auth = create_test_authenticator(&mock_server.uri(), 0);
        assert!(auth.exchange_code("auth-code").await.is_ok());
    }

    #[tokio::test]
    async fn test_exchange_code_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid authorization code"
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let auth = create_test_authenticator(&mock_server.uri(), 0);
        let result = auth.exchange_code("stale-code").await;

        match result {
            Err(SpotifyError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert!(message.contains("invalid_grant"));
            }
            other => panic!("Expected Api error, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_before_request() {
        let mock_server = MockServer::start().await;

        // already inside the refresh margin
        mount_token_exchange(&mock_server, 0).await;

        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "access-2",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/me"))
            .and(header("Authorization", "Bearer access-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "listener",
                "display_name": "Listener"
            })))
            .expect(2)
            .mount(&mock_server)
            .await;

        let client = create_test_authenticator(&mock_server.uri(), 0)
            .exchange_code("auth-code")
            .await
            .unwrap();

        let user = client.current_user().await.unwrap();
        assert_eq!(user.id, "listener");

        // second call reuses the refreshed token
        client.current_user().await.unwrap();
    }
}

#[cfg(test)]
mod player_tests {
    use super::*;

    #[tokio::test]
    async fn test_currently_playing_track() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/me/player/currently-playing"))
            .and(header("Authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "timestamp": 1700000000000_i64,
                "progress_ms": 42000,
                "is_playing": true,
                "currently_playing_type": "track",
                "item": track_json()
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = authorized_client(&mock_server, 0).await;
        let playing = client.currently_playing().await.unwrap().unwrap();
        assert!(playing.is_playing);

        let track = playing.into_track().unwrap();
        assert_eq!(track.id.as_deref(), Some("4uLU6hMCjMI75M1A2tKUQC"));
        assert_eq!(track.album.images.len(), 2);
        assert_eq!(track.album.images[0].width, Some(640));
    }

    #[tokio::test]
    async fn test_currently_playing_no_content() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/me/player/currently-playing"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = authorized_client(&mock_server, 0).await;
        assert!(client.currently_playing().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_episode_is_not_a_track() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/me/player/currently-playing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "is_playing": true,
                "currently_playing_type": "episode",
                "item": {"id": "episode-1", "show": {"name": "A Podcast"}}
            })))
            .mount(&mock_server)
            .await;

        let client = authorized_client(&mock_server, 0).await;
        let playing = client.currently_playing().await.unwrap().unwrap();
        assert!(playing.into_track().is_none());
    }

    #[tokio::test]
    async fn test_player_state() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/me/player"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "is_playing": false,
                "shuffle_state": true,
                "repeat_state": "off",
                "device": {"id": "d1", "name": "Desktop", "type": "Computer", "volume_percent": 50}
            })))
            .mount(&mock_server)
            .await;

        let client = authorized_client(&mock_server, 0).await;
        let state = client.player_state().await.unwrap().unwrap();
        assert!(!state.is_playing);
        assert!(state.shuffle_state);
        assert_eq!(state.device.unwrap().name, "Desktop");
    }
}

#[cfg(test)]
mod retry_tests {
    use super::*;

    #[tokio::test]
    async fn test_retry_on_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/me"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "listener"})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = authorized_client(&mock_server, 2).await;
        assert_eq!(client.current_user().await.unwrap().id, "listener");
    }

    #[tokio::test]
    async fn test_retry_after_rate_limit() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/me/player"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/v1/me/player"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"is_playing": true})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = authorized_client(&mock_server, 1).await;
        let state = client.player_state().await.unwrap().unwrap();
        assert!(state.is_playing);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/me/player"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(3)
            .mount(&mock_server)
            .await;

        let client = authorized_client(&mock_server, 2).await;

        match client.player_state().await {
            Err(SpotifyError::Unavailable { retries, message }) => {
                assert_eq!(retries, 2);
                assert!(message.contains("500"));
            }
            other => panic!("Expected Unavailable, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/me"))
            .respond_with(ResponseTemplate::new(401).set_body_string("token revoked"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = authorized_client(&mock_server, 3).await;

        match client.current_user().await {
            Err(SpotifyError::Api { status, .. }) => assert_eq!(status, 401),
            other => panic!("Expected Api error, got {:?}", other.err()),
        }
    }
}
