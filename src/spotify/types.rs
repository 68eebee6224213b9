use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Album artwork variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub width: Option<u32>,
}

impl Image {
    /// Create an image descriptor with known dimensions.
    pub fn new(url: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            url: url.into(),
            height: Some(height),
            width: Some(width),
        }
    }
}

/// Artist reference embedded in tracks and albums.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleArtist {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub uri: Option<String>,
}

/// Album reference embedded in a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleAlbum {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub album_type: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub artists: Vec<SimpleArtist>,
    #[serde(default)]
    pub images: Vec<Image>,
}

/// Full track object as returned by the Web API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Absent for local files.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub album: SimpleAlbum,
    #[serde(default)]
    pub artists: Vec<SimpleArtist>,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub popularity: Option<u32>,
    #[serde(default)]
    pub preview_url: Option<String>,
    #[serde(default)]
    pub track_number: Option<u32>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub external_urls: HashMap<String, String>,
}

/// Item of the currently-playing response. Episodes and ads are kept opaque.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PlayingItem {
    Track(Box<Track>),
    Other(serde_json::Value),
}

/// Response of `GET /me/player/currently-playing`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentlyPlaying {
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub progress_ms: Option<u64>,
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub currently_playing_type: Option<String>,
    #[serde(default)]
    pub item: Option<PlayingItem>,
}

impl CurrentlyPlaying {
    /// The playing track, if the item is one.
    pub fn into_track(self) -> Option<Track> {
        match self.item? {
            PlayingItem::Track(track) => Some(*track),
            PlayingItem::Other(_) => None,
        }
    }
}

/// Playback device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub volume_percent: Option<u32>,
}

/// Response of `GET /me/player`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub device: Option<Device>,
    #[serde(default)]
    pub shuffle_state: bool,
    #[serde(default)]
    pub repeat_state: Option<String>,
    #[serde(default)]
    pub progress_ms: Option<u64>,
}

/// Response of `GET /me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Response of the accounts token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Bearer token held by an authorized client.
#[derive(Debug, Clone)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Instant,
}

impl Token {
    /// Build a token from a token endpoint response received now.
    pub fn from_response(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: Instant::now() + Duration::from_secs(response.expires_in),
        }
    }

    /// Whether the token expires within `margin`.
    pub fn expires_within(&self, margin: Duration) -> bool {
        Instant::now() + margin >= self.expires_at
    }
}

/// Query parameters Spotify sends to the OAuth redirect.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_track_deserialization() {
        let track: Track = serde_json::from_value(json!({
            "id": "4uLU6hMCjMI75M1A2tKUQC",
            "name": "Never Gonna Give You Up",
            "album": {
                "id": "6XhjNHCyCDyyGJRM5mg40G",
                "name": "Whenever You Need Somebody",
                "images": [
                    {"url": "https://i.scdn.co/image/640", "height": 640, "width": 640},
                    {"url": "https://i.scdn.co/image/64", "height": null, "width": null}
                ]
            },
            "artists": [{"id": "0gxyHStUsqpMadRV0Di1Qt", "name": "Rick Astley"}],
            "duration_ms": 213573,
            "explicit": false
        }))
        .unwrap();

        assert_eq!(track.id.as_deref(), Some("4uLU6hMCjMI75M1A2tKUQC"));
        assert_eq!(track.album.images.len(), 2);
        assert_eq!(track.album.images[0].width, Some(640));
        assert_eq!(track.album.images[1].height, None);
    }

    #[test]
    fn test_currently_playing_episode_is_not_a_track() {
        let playing: CurrentlyPlaying = serde_json::from_value(json!({
            "is_playing": true,
            "currently_playing_type": "episode",
            "item": {"id": "ep1", "name": "Some Episode", "show": {"name": "Show"}}
        }))
        .unwrap();

        assert!(playing.is_playing);
        assert!(playing.into_track().is_none());
    }

    #[test]
    fn test_currently_playing_without_item() {
        let playing: CurrentlyPlaying =
            serde_json::from_value(json!({"is_playing": false, "item": null})).unwrap();
        assert!(playing.into_track().is_none());
    }

    #[test]
    fn test_token_expiry() {
        let token = Token::from_response(TokenResponse {
            access_token: "abc".to_string(),
            token_type: Some("Bearer".to_string()),
            expires_in: 3600,
            refresh_token: Some("refresh".to_string()),
            scope: None,
        });

        assert!(!token.expires_within(Duration::from_secs(30)));
        assert!(token.expires_within(Duration::from_secs(7200)));
    }
}
