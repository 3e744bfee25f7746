//! Extracts canonical YouTube video ids from user supplied locators.

use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocatorError {
    #[error("not a recognized YouTube URL: {0}")]
    InvalidUrl(String),
    #[error("no video id found in {0}")]
    IdNotFound(String),
}

/// Parsed locator: the canonical id plus the input exactly as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoLocator {
    pub video_id: String,
    pub source_url: String,
}

impl VideoLocator {
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

pub fn parse_locator(input: &str) -> Result<VideoLocator, LocatorError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(LocatorError::InvalidUrl(input.to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };
    let url = Url::parse(&candidate).map_err(|_| LocatorError::InvalidUrl(input.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LocatorError::InvalidUrl(input.to_string()));
    }
    let host = url
        .host_str()
        .ok_or_else(|| LocatorError::InvalidUrl(input.to_string()))?
        .to_ascii_lowercase();

    let video_id = if host == "youtu.be" {
        first_segment(&url)
    } else if is_youtube_host(&host) {
        id_from_youtube_path(&url)
    } else {
        return Err(LocatorError::InvalidUrl(input.to_string()));
    };

    match video_id {
        Some(video_id) if is_valid_id(&video_id) => Ok(VideoLocator {
            video_id,
            source_url: input.to_string(),
        }),
        _ => Err(LocatorError::IdNotFound(input.to_string())),
    }
}

fn is_youtube_host(host: &str) -> bool {
    matches!(
        host,
        "youtube.com"
            | "www.youtube.com"
            | "m.youtube.com"
            | "music.youtube.com"
            | "youtube-nocookie.com"
            | "www.youtube-nocookie.com"
    )
}

fn id_from_youtube_path(url: &Url) -> Option<String> {
    let mut segments = url.path_segments()?;
    match segments.next()? {
        "watch" => url
            .query_pairs()
            .find(|(key, _)| key == "v")
            .map(|(_, value)| value.trim().to_string()),
        "embed" | "v" | "shorts" => segments.next().map(|segment| segment.trim().to_string()),
        _ => None,
    }
}

fn first_segment(url: &Url) -> Option<String> {
    url.path_segments()?
        .next()
        .map(|segment| segment.trim().to_string())
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
