//! Album image enrichment.
//!
//! Every artwork variant of a track is fetched and analyzed on its own task.
//! A failing variant becomes a [`TrackImage`] carrying an error message; it
//! never fails its siblings or the enclosing call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use super::color::{self, Rgba};
use crate::config::ImageConfig;
use crate::error::ImageError;
use crate::spotify::Image;

/// Message for images whose bytes could not be fetched.
pub const RETRIEVE_ERROR: &str = "could not retrieve album image";
/// Message for images whose bytes could not be decoded.
pub const PROCESS_ERROR: &str = "could not process album image";

/// Bounded-timeout byte fetcher for image URLs.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Raw bytes behind `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError>;
}

/// [`ImageFetcher`] over HTTP. Bodies larger than the configured limit are
/// refused before they are fully buffered.
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: Client,
    max_bytes: u64,
}

impl HttpImageFetcher {
    /// Build the HTTP client with the configured timeout and size limit.
    pub fn new(config: &ImageConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            max_bytes: config.max_bytes,
        })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ImageError::Fetch {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Status {
                status: status.as_u16(),
            });
        }

        let too_large = ImageError::TooLarge {
            limit: self.max_bytes,
        };
        if response
            .content_length()
            .is_some_and(|length| length > self.max_bytes)
        {
            return Err(too_large);
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| ImageError::Fetch {
            message: e.to_string(),
        })? {
            if body.len() as u64 + chunk.len() as u64 > self.max_bytes {
                return Err(too_large);
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}

/// Color data or the reason it is missing. Exactly one is ever present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ImageOutcome {
    Colored {
        #[serde(rename = "dominantColor")]
        dominant_color: Rgba,
        #[serde(rename = "hexColor")]
        hex_color: String,
    },
    Failed {
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

/// One album image augmented with its dominant color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
    #[serde(flatten)]
    pub outcome: ImageOutcome,
}

impl TrackImage {
    /// Result carrying the dominant color of `image`.
    pub fn colored(image: &Image, color: Rgba) -> Self {
        Self::with_outcome(
            image,
            ImageOutcome::Colored {
                dominant_color: color,
                hex_color: color.to_hex(),
            },
        )
    }

    /// Result reporting why `image` could not be analyzed.
    pub fn failed(image: &Image, message: impl Into<String>) -> Self {
        Self::with_outcome(
            image,
            ImageOutcome::Failed {
                error_message: message.into(),
            },
        )
    }

    fn with_outcome(image: &Image, outcome: ImageOutcome) -> Self {
        Self {
            url: image.url.clone(),
            width: image.width.unwrap_or_default(),
            height: image.height.unwrap_or_default(),
            outcome,
        }
    }

    /// Dominant color, absent for failed images.
    pub fn dominant_color(&self) -> Option<Rgba> {
        match &self.outcome {
            ImageOutcome::Colored { dominant_color, .. } => Some(*dominant_color),
            ImageOutcome::Failed { .. } => None,
        }
    }

    /// `#RRGGBB` form of the dominant color.
    pub fn hex_color(&self) -> Option<&str> {
        match &self.outcome {
            ImageOutcome::Colored { hex_color, .. } => Some(hex_color),
            ImageOutcome::Failed { .. } => None,
        }
    }

    /// Failure message, absent for analyzed images.
    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            ImageOutcome::Colored { .. } => None,
            ImageOutcome::Failed { error_message } => Some(error_message),
        }
    }
}

async fn enrich(fetcher: Arc<dyn ImageFetcher>, image: Image) -> TrackImage {
    let bytes = match fetcher.fetch(&image.url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(url = %image.url, error = %e, "{}", RETRIEVE_ERROR);
            return TrackImage::failed(&image, RETRIEVE_ERROR);
        }
    };

    match tokio::task::spawn_blocking(move || color::analyze(&bytes)).await {
        Ok(Ok(color)) => {
            debug!(url = %image.url, hex = %color.to_hex(), "Album image analyzed");
            TrackImage::colored(&image, color)
        }
        Ok(Err(e)) => {
            warn!(url = %image.url, error = %e, "{}", PROCESS_ERROR);
            TrackImage::failed(&image, PROCESS_ERROR)
        }
        Err(e) => {
            warn!(url = %image.url, error = %e, "Image analysis task failed");
            TrackImage::failed(&image, PROCESS_ERROR)
        }
    }
}

/// Fetch and analyze every image concurrently, waiting for all of them.
///
/// Returns one result per input image.
pub async fn enrich_all(fetcher: &Arc<dyn ImageFetcher>, images: &[Image]) -> Vec<TrackImage> {
    let handles: Vec<_> = images
        .iter()
        .map(|image| {
            let task = tokio::spawn(enrich(Arc::clone(fetcher), image.clone()));
            (image, task)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (image, task) in handles {
        match task.await {
            Ok(result) => results.push(result),
            Err(e) => {
                warn!(url = %image.url, error = %e, "Image enrichment task failed");
                results.push(TrackImage::failed(image, PROCESS_ERROR));
            }
        }
    }

    results
}
