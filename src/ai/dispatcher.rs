use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use crate::ai::backend::{ConditionedRequest, InferenceBackend, UnconditionedRequest};
use crate::ai::decode::decode_payload;
use crate::ai::normalizer::GenerationRequest;
use crate::error::{StagingError, classify_backend_error};
use crate::logging::LogContext;

pub const OUTPUT_CONTENT_TYPE: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPath {
    Conditioned,
    Unconditioned,
}

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub bytes: Bytes,
    pub content_type: String,
    pub path: GenerationPath,
}

/// Runs a [`GenerationRequest`] against the backend, falling back from the
/// image-conditioned model to plain text-to-image at most once.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn InferenceBackend>,
    fallback_model: String,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn InferenceBackend>, fallback_model: impl Into<String>) -> Self {
        Self {
            backend,
            fallback_model: fallback_model.into(),
        }
    }

    pub fn backend(&self) -> &Arc<dyn InferenceBackend> {
        &self.backend
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
        ctx: &LogContext,
    ) -> Result<GenerationResult, StagingError> {
        if let Some(source) = request.source() {
            match self.conditioned(request, source.clone()).await {
                Ok(bytes) => {
                    info!(ctx = %ctx, model = %request.model, bytes = bytes.len(), "conditioned generation succeeded");
                    return Ok(GenerationResult {
                        bytes,
                        content_type: OUTPUT_CONTENT_TYPE.to_string(),
                        path: GenerationPath::Conditioned,
                    });
                }
                Err(err) => {
                    warn!(ctx = %ctx, model = %request.model, error = %err, "conditioned generation failed, falling back to text-to-image");
                }
            }
        }

        let model = if request.source().is_some() {
            self.fallback_model.clone()
        } else {
            request.model.clone()
        };
        let unconditioned = UnconditionedRequest {
            model,
            prompt: request.prompt.clone(),
            steps: request.steps,
            aspect_ratio: request.aspect_ratio.clone(),
        };
        debug!(ctx = %ctx, model = %unconditioned.model, steps = unconditioned.steps, aspect_ratio = %unconditioned.aspect_ratio, "running unconditioned generation");
        let payload = self
            .backend
            .generate_unconditioned(unconditioned)
            .await
            .map_err(|err| classify_backend_error(&format!("{err:#}")))?;
        let bytes = decode_payload(payload).await?;
        info!(ctx = %ctx, bytes = bytes.len(), "unconditioned generation succeeded");
        Ok(GenerationResult {
            bytes,
            content_type: OUTPUT_CONTENT_TYPE.to_string(),
            path: GenerationPath::Unconditioned,
        })
    }

    async fn conditioned(
        &self,
        request: &GenerationRequest,
        image: Bytes,
    ) -> Result<Bytes, StagingError> {
        let payload = self
            .backend
            .generate_conditioned(ConditionedRequest {
                model: request.model.clone(),
                prompt: request.prompt.clone(),
                negative_prompt: request.negative_prompt.clone(),
                image,
                strength: request.strength,
                params: request.params.clone(),
            })
            .await
            .map_err(|err| classify_backend_error(&format!("{err:#}")))?;
        decode_payload(payload).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::ai::backend::Payload;
    use crate::ai::normalizer::Normalizer;
    use crate::models::{Asset, AssetKind, GenerationOptions, JobMode};

    type Scripted = Result<Payload>;

    #[derive(Default)]
    struct ScriptedBackend {
        conditioned: Mutex<VecDeque<Scripted>>,
        unconditioned: Mutex<VecDeque<Scripted>>,
        conditioned_calls: Mutex<Vec<ConditionedRequest>>,
        unconditioned_calls: Mutex<Vec<UnconditionedRequest>>,
    }

    impl ScriptedBackend {
        fn conditioned_then(self, result: Scripted) -> Self {
            self.conditioned.lock().unwrap().push_back(result);
            self
        }

        fn unconditioned_then(self, result: Scripted) -> Self {
            self.unconditioned.lock().unwrap().push_back(result);
            self
        }
    }

    #[async_trait]
    impl InferenceBackend for ScriptedBackend {
        async fn generate_conditioned(&self, request: ConditionedRequest) -> Result<Payload> {
            self.conditioned_calls.lock().unwrap().push(request);
            self.conditioned
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("no scripted conditioned response")))
        }

        async fn generate_unconditioned(&self, request: UnconditionedRequest) -> Result<Payload> {
            self.unconditioned_calls.lock().unwrap().push(request);
            self.unconditioned
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(anyhow!("no scripted unconditioned response")))
        }
    }

    fn image_request(options: GenerationOptions) -> GenerationRequest {
        let mut asset = Asset::pending(
            "owner@example.com".into(),
            AssetKind::Original,
            "room.png".into(),
            "image/png".into(),
        );
        asset.storage_key = Some(asset.reserved_key());
        Normalizer::default()
            .normalize(
                JobMode::ImageToImage,
                "scandinavian",
                Some(&options),
                Some(&asset.id),
                Some(&asset),
            )
            .unwrap()
            .with_source(Bytes::from_static(b"source-pixels"))
            .unwrap()
    }

    fn png_bytes() -> Payload {
        Payload::Bytes(Bytes::from_static(b"\x89PNGgenerated"))
    }

    #[tokio::test]
    async fn conditioned_success_skips_fallback() {
        let backend = Arc::new(ScriptedBackend::default().conditioned_then(Ok(png_bytes())));
        let dispatcher = Dispatcher::new(backend.clone(), "fallback-model");
        let result = dispatcher
            .generate(&image_request(GenerationOptions::default()), &LogContext::new())
            .await
            .unwrap();

        assert_eq!(result.path, GenerationPath::Conditioned);
        assert_eq!(result.content_type, "image/png");
        assert_eq!(&result.bytes[..], b"\x89PNGgenerated");
        let calls = backend.conditioned_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(&calls[0].image[..], b"source-pixels");
        assert_eq!(calls[0].strength, 0.6);
        assert!(backend.unconditioned_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn conditioned_failure_falls_back_once_with_same_prompt() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .conditioned_then(Err(anyhow!("AiError: 5012: bytes_type expected")))
                .unconditioned_then(Ok(Payload::Object(json!({ "image": [1, 2, 3] })))),
        );
        let dispatcher = Dispatcher::new(backend.clone(), "fallback-model");
        let request = image_request(GenerationOptions {
            steps: Some(8),
            aspect_ratio: Some("4:3".into()),
            ..Default::default()
        });
        let result = dispatcher
            .generate(&request, &LogContext::new())
            .await
            .unwrap();

        assert_eq!(result.path, GenerationPath::Unconditioned);
        assert_eq!(&result.bytes[..], &[1, 2, 3]);
        let calls = backend.unconditioned_calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![UnconditionedRequest {
                model: "fallback-model".into(),
                prompt: request.prompt.clone(),
                steps: 8,
                aspect_ratio: "4:3".into(),
            }]
        );
    }

    #[tokio::test]
    async fn undecodable_conditioned_output_also_falls_back() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .conditioned_then(Ok(Payload::Object(json!({ "image": "" }))))
                .unconditioned_then(Ok(png_bytes())),
        );
        let dispatcher = Dispatcher::new(backend.clone(), "fallback-model");
        let result = dispatcher
            .generate(&image_request(GenerationOptions::default()), &LogContext::new())
            .await
            .unwrap();
        assert_eq!(result.path, GenerationPath::Unconditioned);
        assert_eq!(backend.unconditioned_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn text_requests_go_straight_to_unconditioned_with_defaults() {
        let backend = Arc::new(ScriptedBackend::default().unconditioned_then(Ok(png_bytes())));
        let dispatcher = Dispatcher::new(backend.clone(), "fallback-model");
        let request = Normalizer::default()
            .normalize(JobMode::TextToImage, "a red chair", None, None, None)
            .unwrap();
        dispatcher
            .generate(&request, &LogContext::new())
            .await
            .unwrap();

        assert!(backend.conditioned_calls.lock().unwrap().is_empty());
        let calls = backend.unconditioned_calls.lock().unwrap();
        assert_eq!(calls[0].model, request.model);
        assert_eq!(calls[0].steps, 4);
        assert_eq!(calls[0].aspect_ratio, "1:1");
    }

    #[tokio::test]
    async fn final_failure_is_classified_without_another_attempt() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .conditioned_then(Err(anyhow!("model exploded")))
                .unconditioned_then(Err(anyhow!("daily quota exceeded"))),
        );
        let dispatcher = Dispatcher::new(backend.clone(), "fallback-model");
        let err = dispatcher
            .generate(&image_request(GenerationOptions::default()), &LogContext::new())
            .await
            .unwrap_err();

        assert!(matches!(err, StagingError::QuotaExceeded(_)));
        assert_eq!(backend.conditioned_calls.lock().unwrap().len(), 1);
        assert_eq!(backend.unconditioned_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_fallback_output_is_an_empty_generation() {
        let backend = Arc::new(
            ScriptedBackend::default()
                .unconditioned_then(Ok(Payload::Object(json!({ "images": [] })))),
        );
        let dispatcher = Dispatcher::new(backend, "fallback-model");
        let request = Normalizer::default()
            .normalize(JobMode::TextToImage, "a red chair", None, None, None)
            .unwrap();
        assert!(matches!(
            dispatcher.generate(&request, &LogContext::new()).await,
            Err(StagingError::EmptyGeneration)
        ));
    }
}
