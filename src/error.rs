use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Failure categories surfaced to callers of the staging pipeline.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    SourceMissing(String),
    #[error("{0}")]
    IncompleteAsset(String),
    #[error("{0}")]
    UnsupportedFormat(String),
    #[error("{0}")]
    QuotaExceeded(String),
    #[error("{0}")]
    Timeout(String),
    #[error("AI processing returned an empty image")]
    EmptyGeneration,
    #[error("unrecognized AI response payload: {0}")]
    UnknownResponsePayload(String),
    #[error("AI processing failed: {0}")]
    Generation(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("database error: {0}")]
    Database(String),
}

impl StagingError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::SourceMissing(_) => "source_missing",
            Self::IncompleteAsset(_) => "incomplete_asset",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::QuotaExceeded(_) => "quota_exceeded",
            Self::Timeout(_) => "timeout",
            Self::EmptyGeneration => "empty_generation",
            Self::UnknownResponsePayload(_) => "unknown_response_payload",
            Self::Generation(_) => "generation_error",
            Self::Storage(_) => "storage_error",
            Self::Database(_) => "database_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::UnsupportedFormat(_) | Self::IncompleteAsset(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) | Self::SourceMissing(_) => StatusCode::NOT_FOUND,
            Self::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage(err.to_string())
    }

    pub fn database(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }
}

/// Reclassifies a raw inference backend failure message.
pub fn classify_backend_error(message: &str) -> StagingError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("5012") || lower.contains("bytes_type") {
        return StagingError::UnsupportedFormat(
            "Image format not supported by AI model. Please use PNG or JPEG format.".to_string(),
        );
    }
    if lower.contains("not found") {
        return StagingError::SourceMissing(
            "Image file not found in storage. Please re-upload the image.".to_string(),
        );
    }
    if lower.contains("quota") || lower.contains("limit") {
        return StagingError::QuotaExceeded(
            "AI processing quota exceeded. Please try again later.".to_string(),
        );
    }
    if lower.contains("timeout") || lower.contains("timed out") {
        return StagingError::Timeout(format!("AI processing timed out: {message}"));
    }
    StagingError::Generation(message.to_string())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse<'a> {
    error: String,
    code: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_id: Option<&'a str>,
}

impl IntoResponse for StagingError {
    fn into_response(self) -> Response {
        JobFailure::detached(self).into_response()
    }
}

/// A classified error, optionally tied to the job row it was recorded on.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct JobFailure {
    pub job_id: Option<String>,
    #[source]
    pub source: StagingError,
}

impl JobFailure {
    pub fn detached(source: StagingError) -> Self {
        Self {
            job_id: None,
            source,
        }
    }

    pub fn for_job(job_id: impl Into<String>, source: StagingError) -> Self {
        Self {
            job_id: Some(job_id.into()),
            source,
        }
    }
}

impl From<StagingError> for JobFailure {
    fn from(source: StagingError) -> Self {
        Self::detached(source)
    }
}

impl IntoResponse for JobFailure {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.source.to_string(),
            code: self.source.code(),
            job_id: self.job_id.as_deref(),
        };
        (self.source.status(), Json(body)).into_response()
    }
}
