use async_trait::async_trait;
use serde::Deserialize;

use super::{MetadataError, VideoInfo, VideoMetadataProvider, describe_ureq_error, run_blocking};
use crate::locator::VideoLocator;

const OEMBED_ENDPOINT: &str = "https://www.youtube.com/oembed";

#[derive(Deserialize)]
struct OEmbedResponse {
    #[serde(default)]
    title: Option<String>,
}

/// Resolves titles through YouTube's public oEmbed endpoint.
///
/// oEmbed answers 404 for ids that never existed and 401/403 for private,
/// removed or embed-restricted videos, which gives a clean split between
/// "not found", "unavailable" and plain transport failures.
#[derive(Clone)]
pub struct OEmbedMetadataProvider {
    agent: ureq::Agent,
}

impl OEmbedMetadataProvider {
    pub fn new(agent: ureq::Agent) -> Self {
        Self { agent }
    }

    fn fetch_blocking(agent: &ureq::Agent, watch_url: &str) -> Result<VideoInfo, MetadataError> {
        let response = agent
            .get(OEMBED_ENDPOINT)
            .query("url", watch_url)
            .query("format", "json")
            .call()
            .map_err(map_ureq_error)?;
        let body: OEmbedResponse = response
            .into_json()
            .map_err(|err| MetadataError::Other(format!("decoding oEmbed response: {err}")))?;
        title_from_response(body)
    }
}

#[async_trait]
impl VideoMetadataProvider for OEmbedMetadataProvider {
    async fn fetch_info(&self, locator: &VideoLocator) -> Result<VideoInfo, MetadataError> {
        let agent = self.agent.clone();
        let watch_url = locator.watch_url();
        run_blocking(
            move || Self::fetch_blocking(&agent, &watch_url),
            MetadataError::Other,
        )
        .await
    }
}

fn map_ureq_error(err: ureq::Error) -> MetadataError {
    match err {
        ureq::Error::Status(404, _) => MetadataError::NotFound,
        ureq::Error::Status(401 | 403, _) => MetadataError::Unavailable,
        other => MetadataError::Other(describe_ureq_error(other)),
    }
}

fn title_from_response(body: OEmbedResponse) -> Result<VideoInfo, MetadataError> {
    body.title
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .map(|title| VideoInfo { title })
        .ok_or_else(|| MetadataError::Other("video information not found".into()))
}
