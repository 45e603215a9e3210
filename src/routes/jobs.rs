use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::{JobFailure, StagingError};
use crate::models::{JobDescription, JobStatus};
use crate::routes::{RequestContext, SharedState};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreated {
    pub job_id: String,
    pub status: JobStatus,
    pub output_asset_id: Option<String>,
    pub output_key: Option<String>,
}

/// Submits a job and waits for it to reach a terminal status.
pub async fn create_job(
    State(state): State<SharedState>,
    request: RequestContext,
    body: Result<Json<JobDescription>, JsonRejection>,
) -> Result<Json<JobCreated>, JobFailure> {
    let Json(description) =
        body.map_err(|err| StagingError::Validation(format!("invalid job request: {err}")))?;
    let job = state
        .pipeline
        .submit(&request.user_email, description, request.log_context())
        .await?;
    Ok(Json(JobCreated {
        job_id: job.id,
        status: job.status,
        output_asset_id: job.output_asset_id,
        output_key: job.output_key,
    }))
}

pub async fn get_job(
    State(state): State<SharedState>,
    Path(job_id): Path<String>,
) -> Result<Json<Value>, StagingError> {
    let job = state
        .pipeline
        .repo()
        .get_job(&job_id)
        .await
        .map_err(StagingError::database)?
        .ok_or_else(|| StagingError::NotFound(format!("Job not found: {job_id}")))?;
    Ok(Json(json!({ "job": job })))
}
