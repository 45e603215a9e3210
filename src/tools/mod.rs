pub mod get_job;
pub mod stage_image;

use rmcp::{ErrorData as McpError, model::CallToolResult, model::Content};
use serde::Serialize;

use crate::error::StagingError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResponse {
    pub job_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub text: String,
}

impl ToolResponse {
    pub fn into_result(self) -> Result<CallToolResult, McpError> {
        let json = serde_json::to_string(&self).map_err(|err| {
            McpError::internal_error(
                "serialize tool response failed",
                Some(serde_json::Value::String(err.to_string())),
            )
        })?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

/// Caller mistakes become invalid-params errors; everything else is internal.
pub fn to_mcp_error(err: &StagingError, job_id: Option<&str>) -> McpError {
    let data = Some(serde_json::json!({
        "code": err.code(),
        "jobId": job_id,
    }));
    match err {
        StagingError::Validation(_)
        | StagingError::NotFound(_)
        | StagingError::IncompleteAsset(_)
        | StagingError::UnsupportedFormat(_) => McpError::invalid_params(err.to_string(), data),
        _ => McpError::internal_error(err.to_string(), data),
    }
}

pub use get_job::{GetJobRequest, get_job};
pub use stage_image::{StageImageRequest, stage_image};
