use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};

use crate::routes::SharedState;
use crate::tools::{GetJobRequest, StageImageRequest};

#[derive(Clone)]
pub struct ImageStagingServer {
    tool_router: ToolRouter<Self>,
    state: SharedState,
}

impl ImageStagingServer {
    pub fn new(state: SharedState) -> Self {
        Self {
            tool_router: Self::tool_router(),
            state,
        }
    }
}

#[tool_router]
impl ImageStagingServer {
    #[tool(
        description = "Stage a room photo in an interior style (image-to-image), or generate an image from a prompt (text-to-image). Upload the photo through the HTTP API first and pass its asset id. Generation can take a while; show the result with ![](url)"
    )]
    async fn stage_image(
        &self,
        Parameters(request): Parameters<StageImageRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::stage_image(&self.state, Parameters(request)).await
    }

    #[tool(description = "Look up a staging job's status, output key and error")]
    async fn get_job(
        &self,
        Parameters(request): Parameters<GetJobRequest>,
    ) -> Result<CallToolResult, McpError> {
        crate::tools::get_job(&self.state, Parameters(request)).await
    }
}

#[tool_handler]
impl ServerHandler for ImageStagingServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
