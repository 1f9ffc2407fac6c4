//! Top-level error for the Ingest Orchestrator's HTTP boundary (§7): the
//! point where `StoreError`/`MatcherError` converge into a single stable
//! kind, mirroring the teacher's per-crate `RouterError`/`PlatformError`
//! convention of owning one `IntoResponse` impl per surface.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("request body must contain at least one alert")]
    EmptyBatch,

    #[error("batch size {0} exceeds the maximum of {1}")]
    BatchTooLarge(usize, usize),

    #[error("storage error: {0}")]
    Store(#[from] ah_store::StoreError),

    #[error("silence matcher error: {0}")]
    Matcher(#[from] ah_matcher::MatcherError),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self {
            IngestError::EmptyBatch | IngestError::BatchTooLarge(_, _) => {
                (StatusCode::BAD_REQUEST, "INVALID_BATCH")
            }
            IngestError::Store(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORE_ERROR"),
            IngestError::Matcher(_) => (StatusCode::INTERNAL_SERVER_ERROR, "MATCHER_ERROR"),
        };

        let body = ErrorResponse { error: kind.to_string(), message: self.to_string() };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
