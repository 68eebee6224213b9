use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Spotify error: {0}")]
    Spotify(#[from] SpotifyError),

    #[error("Spoty error: {0}")]
    Spoty(#[from] SpotyError),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Server error: {message}")]
    Server { message: String },
}

/// Cache construction errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid cache bounds: max_items={max_items}, max_cost={max_cost}")]
    InvalidBounds { max_items: usize, max_cost: u64 },
}

/// Spotify Web API errors
#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error("Spotify unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SpotifyError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SpotifyError::Api { status, .. } => *status == 429 || *status >= 500,
            SpotifyError::Timeout { .. } => true,
            SpotifyError::Http(e) => e.is_connect() || e.is_timeout(),
            SpotifyError::Unavailable { .. } | SpotifyError::InvalidResponse { .. } => false,
        }
    }
}

/// Track enrichment pipeline errors
#[derive(Debug, Error)]
pub enum SpotyError {
    #[error("spoty not authenticated")]
    NotAuthenticated,

    #[error("no track currently playing")]
    NothingPlaying,

    #[error("Upstream error: {0}")]
    Upstream(#[from] SpotifyError),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },
}

/// OAuth callback errors. Authorization state is unchanged whenever one is returned.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("you are already authenticated")]
    AlreadyAuthorized,

    #[error("state mismatch")]
    StateMismatch,

    #[error("authorization denied: {reason}")]
    Denied { reason: String },

    #[error("missing authorization code")]
    MissingCode,

    #[error("could not retrieve token: {0}")]
    Exchange(#[source] SpotifyError),

    #[error("could not retrieve current user: {0}")]
    UserLookup(#[source] SpotifyError),
}

/// Per-image failures. These end up as data on the enrichment result.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("fetch failed: {message}")]
    Fetch { message: String },

    #[error("unexpected status {status}")]
    Status { status: u16 },

    #[error("image body exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for cache construction
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type alias for Spotify operations
pub type SpotifyResult<T> = Result<T, SpotifyError>;

/// Result type alias for pipeline operations
pub type SpotyResult<T> = Result<T, SpotyError>;

/// Result type alias for authorization
pub type AuthorizationResult<T> = Result<T, AuthorizationError>;
