use std::env;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub spotify: SpotifyConfig,
    pub http: HttpConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
    pub image: ImageConfig,
    pub prod: bool,
    pub service_name: String,
}

/// Spotify OAuth and Web API configuration
#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub accounts_url: String,
    pub api_url: String,
    pub redirect_url: String,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

/// Bounded cache configuration.
///
/// The bounds apply per key-space: the current-track cache and the images
/// cache each get `max_keys` entries and `max_cost` units, so the process
/// holds at most twice these values.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_keys: usize,
    pub max_cost: u64,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Upstream HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Album image fetch configuration
#[derive(Debug, Clone)]
pub struct ImageConfig {
    pub timeout_ms: u64,
    /// Largest accepted image body in bytes.
    pub max_bytes: u64,
}

impl HttpConfig {
    /// Socket address string the server binds to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let prod = env::var("PROD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(false);

        let http = HttpConfig {
            host: env::var("HTTP_SERVER_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: parse_or("HTTP_SERVER_PORT", 13337),
        };

        let spotify = SpotifyConfig {
            client_id: required("SPOTIFY_CLIENT_ID")?,
            client_secret: required("SPOTIFY_CLIENT_SECRET")?,
            accounts_url: env::var("SPOTIFY_ACCOUNTS_URL")
                .unwrap_or_else(|_| "https://accounts.spotify.com".to_string()),
            api_url: env::var("SPOTIFY_API_URL")
                .unwrap_or_else(|_| "https://api.spotify.com/v1".to_string()),
            redirect_url: env::var("SPOTIFY_REDIRECT_URL")
                .unwrap_or_else(|_| format!("http://{}/api/callback", http.addr())),
        };

        let cache = CacheConfig {
            max_keys: parse_or("CACHE_MAX_KEYS", 64),
            max_cost: parse_or("CACHE_MAX_COST", 1_000_000),
        };

        let default_format = if prod { "json" } else { "pretty" };
        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| default_format.to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: parse_or("REQUEST_TIMEOUT_MS", 10000),
            max_retries: parse_or("MAX_RETRIES", 3),
            retry_delay_ms: parse_or("RETRY_DELAY_MS", 1000),
        };

        let image = ImageConfig {
            timeout_ms: parse_or("IMAGE_TIMEOUT_MS", 5000),
            max_bytes: parse_or("IMAGE_MAX_BYTES", 10 * 1024 * 1024),
        };

        Ok(Config {
            spotify,
            http,
            cache,
            logging,
            request,
            image,
            prod,
            service_name: service_name(),
        })
    }
}

/// Service name reported in logs and build info. Needs no credentials.
pub fn service_name() -> String {
    env::var("SERVICE_NAME").unwrap_or_else(|_| "spoty".to_string())
}

fn required(key: &str) -> Result<String, AppError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::Config {
            message: format!("{} is required", key),
        }),
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_keys: 64,
            max_cost: 1_000_000,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            max_bytes: 10 * 1024 * 1024,
        }
    }
}
