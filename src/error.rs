use thiserror::Error;

use crate::locator::LocatorError;
use crate::providers::GenerationError;

/// Fatal outcomes of a transcript resolution. Degraded outcomes (missing
/// captions, failed transcript generation) never reach this type.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("invalid video locator: {0}")]
    InvalidInput(#[from] LocatorError),

    #[error("YouTube video is unavailable.")]
    VideoUnavailable,

    #[error("Error fetching video information.")]
    MetadataFetchFailed { reason: String },

    #[error("Error generating summary.")]
    SummaryFailed(#[source] GenerationError),

    #[error("persisting transcript failed")]
    PersistenceFailed(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
