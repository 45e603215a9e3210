use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, info};

use crate::ai::{UnconditionedRequest, decode_payload};
use crate::routes::SharedState;

const SANITY_PROMPT: &str = "a simple red square on a white background";

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true }))
}

/// Runs one small text-to-image generation to prove the backend answers.
pub async fn ai_sanity_check(State(state): State<SharedState>) -> Response {
    let pipeline = &state.pipeline;
    let request = UnconditionedRequest {
        model: pipeline.normalizer().text_model().to_string(),
        prompt: SANITY_PROMPT.to_string(),
        steps: 4,
        aspect_ratio: "1:1".to_string(),
    };
    let outcome = match pipeline
        .dispatcher()
        .backend()
        .generate_unconditioned(request)
        .await
    {
        Ok(payload) => decode_payload(payload).await.map_err(|err| err.to_string()),
        Err(err) => Err(format!("{err:#}")),
    };
    match outcome {
        Ok(bytes) => {
            info!(bytes = bytes.len(), "AI sanity check passed");
            Json(json!({ "ok": true, "got": !bytes.is_empty() })).into_response()
        }
        Err(message) => {
            error!(error = %message, "AI sanity check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": message })),
            )
                .into_response()
        }
    }
}
