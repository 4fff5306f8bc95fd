use crate::errors::{AppError, Result};
use url::Url;

/// Spotify ids are 22 base-62 characters.
const SPOTIFY_ID_LEN: usize = 22;

#[derive(Debug, Default, Clone)]
pub struct InputValidator;

impl InputValidator {
    pub fn new() -> Self {
        Self
    }

    /// Accepts `https://open.spotify.com/playlist/<id>` links (query strings
    /// such as `?si=...` and locale prefixes such as `/intl-de/` allowed) and
    /// `spotify:playlist:<id>` URIs.
    pub fn validate_playlist_url(&self, url: &str) -> Result<()> {
        self.playlist_id(url).map(|_| ())
    }

    /// Extracts the playlist id from a link accepted by [`validate_playlist_url`](Self::validate_playlist_url).
    pub fn playlist_id(&self, url: &str) -> Result<String> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AppError::Validation("Playlist link cannot be empty".to_string()));
        }

        if let Some(id) = url.strip_prefix("spotify:playlist:") {
            return Self::check_id(id);
        }

        let parsed_url = Url::parse(url)
            .map_err(|e| AppError::Validation(format!("Invalid URL: {}", e)))?;

        if !matches!(parsed_url.scheme(), "http" | "https") {
            return Err(AppError::Validation(format!(
                "Unsupported scheme: {}",
                parsed_url.scheme()
            )));
        }

        let host = parsed_url.host_str()
            .ok_or_else(|| AppError::Validation("URL must have a host".to_string()))?;
        if host != "open.spotify.com" {
            return Err(AppError::Validation(format!("Not a Spotify link: {}", host)));
        }

        let segments: Vec<&str> = parsed_url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        let segments = match segments.as_slice() {
            [locale, rest @ ..] if locale.starts_with("intl-") => rest.to_vec(),
            all => all.to_vec(),
        };

        match segments.as_slice() {
            ["playlist", id] => Self::check_id(id),
            _ => Err(AppError::Validation(format!(
                "Not a playlist link: {}",
                parsed_url.path()
            ))),
        }
    }

    fn check_id(id: &str) -> Result<String> {
        if id.len() == SPOTIFY_ID_LEN && id.chars().all(|c| c.is_ascii_alphanumeric()) {
            Ok(id.to_string())
        } else {
            Err(AppError::Validation(format!("Invalid playlist id: {}", id)))
        }
    }
}
