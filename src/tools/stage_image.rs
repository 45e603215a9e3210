use rmcp::{
    ErrorData as McpError,
    handler::server::wrapper::Parameters,
    model::CallToolResult,
    schemars::JsonSchema,
};
use serde::Deserialize;

use crate::{
    ids::rid,
    logging::LogContext,
    models::{GenerationOptions, JobDescription, JobMode},
    routes::AppState,
    tools::{ToolResponse, to_mcp_error},
};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct StageImageRequest {
    #[schemars(description = "text-to-image or image-to-image. Default image-to-image")]
    pub mode: Option<JobMode>,
    #[schemars(description = "Asset id of the uploaded room photo, required for image-to-image")]
    pub original_asset_id: Option<String>,
    #[schemars(
        description = "Style keyword for image-to-image (modern, vintage, industrial, scandinavian, luxury, japandi) or the full prompt for text-to-image"
    )]
    pub style: String,
    #[schemars(description = "Optional generation parameters")]
    pub options: Option<GenerationOptions>,
}

impl From<StageImageRequest> for JobDescription {
    fn from(request: StageImageRequest) -> Self {
        Self {
            mode: request.mode,
            original_asset_id: request.original_asset_id,
            style: request.style,
            options: request.options,
        }
    }
}

pub async fn stage_image(
    state: &AppState,
    Parameters(request): Parameters<StageImageRequest>,
) -> Result<CallToolResult, McpError> {
    let ctx = LogContext::new()
        .with("request_id", rid("mcp_"))
        .with("user", state.dev_user_email.clone());
    match state
        .pipeline
        .submit(&state.dev_user_email, request.into(), ctx)
        .await
    {
        Ok(job) => ToolResponse {
            url: job
                .output_asset_id
                .as_deref()
                .map(|id| format!("{}/api/assets/{id}", state.public_base_url)),
            job_id: job.id,
            status: "succeeded".to_string(),
            error: None,
            text: "Image staged. Show it with ![](url).".to_string(),
        }
        .into_result(),
        Err(failure) => match failure.job_id.as_deref() {
            Some(job_id) => ToolResponse {
                job_id: job_id.to_string(),
                status: "failed".to_string(),
                url: None,
                error: Some(failure.source.to_string()),
                text: format!("Staging failed ({}).", failure.source.code()),
            }
            .into_result(),
            None => Err(to_mcp_error(&failure.source, None)),
        },
    }
}
