use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::StagingError;
use crate::models::JobStatus;
use crate::routes::SharedState;

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<JobStatus>,
}

pub async fn list_jobs(
    State(state): State<SharedState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Json<Value>, StagingError> {
    let jobs = state
        .pipeline
        .repo()
        .list_jobs(query.status)
        .await
        .map_err(StagingError::database)?;
    Ok(Json(json!({ "jobs": jobs })))
}
