//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides. Note that Config::from_env() also loads
//! from .env file via dotenvy, so these tests focus on override behavior.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use serial_test::serial;
use spoty::config::{Config, LogFormat};
use spoty::AppError;
use std::env;

fn set_credentials() {
    env::set_var("SPOTIFY_CLIENT_ID", "test-client-id");
    env::set_var("SPOTIFY_CLIENT_SECRET", "test-client-secret");
}

#[test]
#[serial]
fn test_config_from_env_defaults() {
    set_credentials();

    let config = Config::from_env().unwrap();
    assert_eq!(config.spotify.client_id, "test-client-id");
    assert_eq!(config.spotify.accounts_url, "https://accounts.spotify.com");
    assert_eq!(config.spotify.api_url, "https://api.spotify.com/v1");
    assert_eq!(config.http.host, "localhost");
    assert_eq!(config.http.port, 13337);
    assert_eq!(
        config.spotify.redirect_url,
        "http://localhost:13337/api/callback"
    );
    assert_eq!(config.cache.max_keys, 64);
    assert_eq!(config.image.timeout_ms, 5000);
    assert_eq!(config.service_name, "spoty");
}

#[test]
#[serial]
fn test_config_missing_client_id() {
    set_credentials();
    env::set_var("SPOTIFY_CLIENT_ID", "");

    let result = Config::from_env();
    match result {
        Err(AppError::Config { message }) => assert!(message.contains("SPOTIFY_CLIENT_ID")),
        other => panic!("Expected config error, got {:?}", other.map(|_| ())),
    }

    // Restore
    set_credentials();
}

#[test]
#[serial]
fn test_config_from_env_custom_http() {
    set_credentials();
    env::set_var("HTTP_SERVER_HOST", "0.0.0.0");
    env::set_var("HTTP_SERVER_PORT", "8080");

    let config = Config::from_env().unwrap();
    assert_eq!(config.http.addr(), "0.0.0.0:8080");
    // redirect follows the bind address unless set explicitly
    assert_eq!(config.spotify.redirect_url, "http://0.0.0.0:8080/api/callback");

    env::set_var("SPOTIFY_REDIRECT_URL", "https://spoty.example/api/callback");
    let config = Config::from_env().unwrap();
    assert_eq!(config.spotify.redirect_url, "https://spoty.example/api/callback");

    // Restore defaults
    env::remove_var("HTTP_SERVER_HOST");
    env::remove_var("HTTP_SERVER_PORT");
    env::remove_var("SPOTIFY_REDIRECT_URL");
}

#[test]
#[serial]
fn test_config_from_env_custom_cache() {
    set_credentials();
    env::set_var("CACHE_MAX_KEYS", "8");
    env::set_var("CACHE_MAX_COST", "4096");

    let config = Config::from_env().unwrap();
    assert_eq!(config.cache.max_keys, 8);
    assert_eq!(config.cache.max_cost, 4096);

    env::remove_var("CACHE_MAX_KEYS");
    env::remove_var("CACHE_MAX_COST");
}

#[test]
#[serial]
fn test_config_from_env_custom_request() {
    set_credentials();
    env::set_var("REQUEST_TIMEOUT_MS", "60000");
    env::set_var("MAX_RETRIES", "5");
    env::set_var("RETRY_DELAY_MS", "2000");
    env::set_var("IMAGE_TIMEOUT_MS", "1500");

    let config = Config::from_env().unwrap();
    assert_eq!(config.request.timeout_ms, 60000);
    assert_eq!(config.request.max_retries, 5);
    assert_eq!(config.request.retry_delay_ms, 2000);
    assert_eq!(config.image.timeout_ms, 1500);

    env::remove_var("REQUEST_TIMEOUT_MS");
    env::remove_var("MAX_RETRIES");
    env::remove_var("RETRY_DELAY_MS");
    env::remove_var("IMAGE_TIMEOUT_MS");
}

#[test]
#[serial]
fn test_config_invalid_number_uses_default() {
    set_credentials();
    env::set_var("HTTP_SERVER_PORT", "not-a-port");

    let config = Config::from_env().unwrap();
    // Should fall back to default
    assert_eq!(config.http.port, 13337);

    env::remove_var("HTTP_SERVER_PORT");
}

#[test]
#[serial]
fn test_config_log_format() {
    set_credentials();
    env::remove_var("LOG_FORMAT");
    env::set_var("PROD", "true");

    let config = Config::from_env().unwrap();
    assert!(config.prod);
    assert_eq!(config.logging.format, LogFormat::Json);

    env::set_var("LOG_FORMAT", "pretty");
    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Pretty);

    env::remove_var("PROD");
    env::remove_var("LOG_FORMAT");
}

#[test]
#[serial]
fn test_config_from_env_log_level() {
    set_credentials();
    env::set_var("LOG_LEVEL", "debug");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.level, "debug");

    env::remove_var("LOG_LEVEL");
}
