//! External collaborators consumed by the orchestrator.
//!
//! Each collaborator is a trait so the service can be wired with the real HTTP
//! clients in production and with in-memory doubles in tests. The HTTP clients
//! share one blocking `ureq::Agent`; calls are moved onto the blocking pool so
//! they never stall the async runtime.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::locator::VideoLocator;

pub mod captions;
pub mod generation;
pub mod metadata;

pub use captions::YoutubeCaptionProvider;
pub use generation::OpenAiGenerator;
pub use metadata::OEmbedMetadataProvider;

const USER_AGENT: &str = concat!("tubescribe/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInfo {
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetadataError {
    #[error("video not found")]
    NotFound,
    #[error("video unavailable")]
    Unavailable,
    #[error("metadata request failed: {0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionSegment {
    pub text: String,
}

/// Result of a caption lookup. `NoCaptions` and `ProviderFailed` both mean
/// "no transcript" to the orchestrator; they stay distinct for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptionOutcome {
    Available(Vec<CaptionSegment>),
    NoCaptions,
    ProviderFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("generation request failed: {0}")]
    Request(String),
    #[error("generation response malformed: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait VideoMetadataProvider: Send + Sync {
    async fn fetch_info(&self, locator: &VideoLocator) -> Result<VideoInfo, MetadataError>;
}

#[async_trait]
pub trait CaptionProvider: Send + Sync {
    async fn fetch_captions(&self, video_id: &str, lang: &str) -> CaptionOutcome;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, GenerationError>;
}

/// Builds the agent shared by every HTTP provider. The timeout bounds each
/// request end to end; nothing is retried.
pub fn http_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
}

/// Runs a blocking HTTP call on the blocking pool and flattens join failures
/// into the caller's error type.
async fn run_blocking<T, E>(
    task: impl FnOnce() -> Result<T, E> + Send + 'static,
    on_join_error: impl FnOnce(String) -> E,
) -> Result<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(result) => result,
        Err(err) => Err(on_join_error(err.to_string())),
    }
}

fn describe_ureq_error(err: ureq::Error) -> String {
    match err {
        ureq::Error::Status(code, response) => {
            format!("HTTP {code} from {}", response.get_url())
        }
        ureq::Error::Transport(transport) => transport.to_string(),
    }
}
