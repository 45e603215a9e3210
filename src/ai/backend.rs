use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Byte chunks delivered by a streaming inference response.
pub type ChunkStream = BoxStream<'static, Result<Bytes>>;

/// Every response shape an inference backend is known to produce.
pub enum Payload {
    /// A complete image in one buffer.
    Bytes(Bytes),
    /// An image delivered as a sequence of chunks, in arrival order.
    Stream(ChunkStream),
    /// A JSON object carrying the image in an `image` or `images` field.
    Object(serde_json::Value),
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
            Self::Object(value) => f.debug_tuple("Object").field(value).finish(),
        }
    }
}

/// Tuning knobs forwarded to the image-conditioned model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvancedParams {
    pub cfg_scale: Option<f32>,
    pub steps: Option<u32>,
    pub seed: Option<u64>,
    pub sampler: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ConditionedRequest {
    pub model: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub image: Bytes,
    pub strength: f32,
    pub params: AdvancedParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnconditionedRequest {
    pub model: String,
    pub prompt: String,
    pub steps: u32,
    pub aspect_ratio: String,
}

/// The hosted inference service.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    async fn generate_conditioned(&self, request: ConditionedRequest) -> Result<Payload>;
    async fn generate_unconditioned(&self, request: UnconditionedRequest) -> Result<Payload>;
}
