use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::ai::backend::{
    ConditionedRequest, InferenceBackend, Payload, UnconditionedRequest,
};

pub const DEFAULT_API_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

#[derive(Debug, Deserialize)]
struct Envelope {
    success: Option<bool>,
    result: Option<Value>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<i64>,
    message: Option<String>,
}

fn format_errors(errors: &[ApiError]) -> String {
    let messages: Vec<String> = errors
        .iter()
        .map(|err| match (err.code, err.message.as_deref()) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (Some(code), None) => code.to_string(),
            (None, Some(message)) => message.to_string(),
            (None, None) => "unknown error".to_string(),
        })
        .collect();
    messages.join("; ")
}

async fn assert_ok_response(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<Envelope>(&text)
        .ok()
        .filter(|envelope| !envelope.errors.is_empty())
        .map(|envelope| format_errors(&envelope.errors))
        .unwrap_or(text);
    Err(anyhow!("Workers AI request failed: {status} {detail}"))
}

/// Output size for an aspect ratio keyword; unknown ratios are square.
pub fn aspect_dimensions(aspect_ratio: &str) -> (u32, u32) {
    match aspect_ratio.trim() {
        "16:9" => (1344, 768),
        "9:16" => (768, 1344),
        "4:3" => (1024, 768),
        "3:4" => (768, 1024),
        _ => (1024, 1024),
    }
}

fn conditioned_body(request: &ConditionedRequest) -> Value {
    let mut body = json!({
        "prompt": request.prompt,
        "image": request.image.to_vec(),
        "strength": request.strength,
    });
    if !request.negative_prompt.trim().is_empty() {
        body["negative_prompt"] = json!(request.negative_prompt);
    }
    let params = &request.params;
    if let Some(guidance) = params.cfg_scale {
        body["guidance"] = json!(guidance);
    }
    if let Some(steps) = params.steps {
        body["num_steps"] = json!(steps);
    }
    if let Some(seed) = params.seed {
        body["seed"] = json!(seed);
    }
    if let Some(ref scheduler) = params.sampler {
        body["scheduler"] = json!(scheduler);
    }
    body
}

fn unconditioned_body(request: &UnconditionedRequest) -> Value {
    let (width, height) = aspect_dimensions(&request.aspect_ratio);
    json!({
        "prompt": request.prompt,
        "num_steps": request.steps,
        "width": width,
        "height": height,
    })
}

/// Cloudflare Workers AI over its REST API.
#[derive(Clone, Debug)]
pub struct WorkersAiClient {
    http: Client,
    base_url: String,
    account_id: String,
    api_token: String,
}

impl WorkersAiClient {
    pub fn new(
        base_url: impl Into<String>,
        account_id: impl Into<String>,
        api_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            account_id: account_id.into(),
            api_token: api_token.into(),
        })
    }

    fn run_url(&self, model: &str) -> String {
        format!(
            "{}/accounts/{}/ai/run/{}",
            self.base_url.trim_end_matches('/'),
            self.account_id,
            model.trim_start_matches('/')
        )
    }

    async fn run(&self, model: &str, body: Value) -> Result<Payload> {
        let url = self.run_url(model);
        debug!(%url, "calling Workers AI");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    anyhow!("Workers AI request timed out: {err}")
                } else {
                    anyhow!("Workers AI request failed: {err}")
                }
            })?;
        let response = assert_ok_response(response).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if content_type.starts_with("image/") || content_type.starts_with("application/octet-stream")
        {
            let stream = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(anyhow::Error::from))
                .boxed();
            return Ok(Payload::Stream(stream));
        }

        let envelope: Envelope = response.json().await?;
        if envelope.success == Some(false) {
            return Err(anyhow!(
                "Workers AI returned an error: {}",
                format_errors(&envelope.errors)
            ));
        }
        Ok(Payload::Object(envelope.result.unwrap_or(Value::Null)))
    }
}

#[async_trait]
impl InferenceBackend for WorkersAiClient {
    async fn generate_conditioned(&self, request: ConditionedRequest) -> Result<Payload> {
        let body = conditioned_body(&request);
        self.run(&request.model, body).await
    }

    async fn generate_unconditioned(&self, request: UnconditionedRequest) -> Result<Payload> {
        let body = unconditioned_body(&request);
        self.run(&request.model, body).await
    }
}
