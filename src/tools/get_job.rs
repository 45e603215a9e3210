use rmcp::{
    ErrorData as McpError,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content},
    schemars::JsonSchema,
};
use serde::Deserialize;

use crate::{error::StagingError, routes::AppState, tools::to_mcp_error};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetJobRequest {
    #[schemars(description = "Job id returned by stage_image")]
    pub job_id: String,
}

pub async fn get_job(
    state: &AppState,
    Parameters(request): Parameters<GetJobRequest>,
) -> Result<CallToolResult, McpError> {
    let job = state
        .pipeline
        .repo()
        .get_job(&request.job_id)
        .await
        .map_err(|err| to_mcp_error(&StagingError::database(err), Some(&request.job_id)))?
        .ok_or_else(|| {
            to_mcp_error(
                &StagingError::NotFound(format!("Job not found: {}", request.job_id)),
                None,
            )
        })?;
    let json = serde_json::to_string(&job).map_err(|err| {
        McpError::internal_error(
            "serialize job failed",
            Some(serde_json::Value::String(err.to_string())),
        )
    })?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
