//! Axum surface over the transcript service.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::error;

use crate::error::OrchestratorError;
use crate::orchestrator::{TranscriptOutcome, TranscriptService};
use crate::store::TranscriptRecord;

pub const MISSING_URL_MESSAGE: &str = "videoUrl is missing in the request body.";
pub const INVALID_URL_MESSAGE: &str = "Please enter a valid YouTube video URL.";
pub const INVALID_LIMIT_MESSAGE: &str = "limit must be a non-negative integer.";
const INTERNAL_MESSAGE: &str = "Internal server error.";
const DEFAULT_LIST_LIMIT: usize = 50;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TranscriptService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/transcripts", post(create_transcript).get(list_transcripts))
        .route("/transcripts/{video_id}", get(get_transcript))
        .fallback(fallback)
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateTranscriptRequest {
    #[serde(rename = "videoUrl", default)]
    pub video_url: Option<String>,
}

/// Body returned for both freshly created and already stored transcripts.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEnvelope {
    pub message: &'static str,
    pub video_id: String,
    pub title: String,
    pub video_url: String,
    pub transcript: Option<String>,
    pub summary: Option<String>,
}

impl From<TranscriptOutcome> for TranscriptEnvelope {
    fn from(outcome: TranscriptOutcome) -> Self {
        let TranscriptRecord {
            video_id,
            title,
            source_url,
            transcript,
            summary,
            ..
        } = outcome.record;
        Self {
            message: outcome.status.message(),
            video_id,
            title,
            video_url: source_url,
            transcript,
            summary,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

/// JSON error body. Client errors use the `error` key, server-side failures
/// use `message`, matching what existing clients of the endpoint read.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    field: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            field: "error",
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            field: "error",
            message: message.into(),
        }
    }

    fn failure(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            field: "message",
            message: message.into(),
        }
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::InvalidInput(_) => Self::bad_request(INVALID_URL_MESSAGE),
            OrchestratorError::VideoUnavailable => {
                Self::failure(StatusCode::NOT_FOUND, err.to_string())
            }
            OrchestratorError::MetadataFetchFailed { .. } | OrchestratorError::SummaryFailed(_) => {
                Self::failure(StatusCode::BAD_GATEWAY, err.to_string())
            }
            OrchestratorError::PersistenceFailed(ref source) => {
                error!(error = ?source, "transcript request failed");
                Self::failure(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = Map::new();
        body.insert(self.field.to_string(), Value::String(self.message));
        (self.status, Json(Value::Object(body))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn create_transcript(
    State(state): State<AppState>,
    payload: Result<Json<CreateTranscriptRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TranscriptEnvelope>)> {
    let video_url = payload
        .ok()
        .and_then(|Json(request)| request.video_url)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(MISSING_URL_MESSAGE))?;

    let outcome = state.service.resolve(&video_url).await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome.into())))
}

async fn list_transcripts(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<Vec<TranscriptRecord>>> {
    let Query(params) = params.map_err(|_| ApiError::bad_request(INVALID_LIMIT_MESSAGE))?;
    let records = state
        .service
        .recent(params.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await?;
    Ok(Json(records))
}

async fn get_transcript(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<TranscriptRecord>> {
    state
        .service
        .lookup(&video_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("transcript not found"))
}

async fn fallback() -> ApiError {
    ApiError::not_found("endpoint not found")
}
