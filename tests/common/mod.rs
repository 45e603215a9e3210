#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;

use image_staging_rmcp::{
    ai::{ConditionedRequest, Dispatcher, InferenceBackend, Normalizer, Payload, UnconditionedRequest},
    db::MemoryRepository,
    pipeline::Pipeline,
    routes::{AppState, api_router},
    storage::MemoryObjectStore,
};

pub const BASE_URL: &str = "http://staging.test";
pub const DEV_USER: &str = "dev@example.com";

type Respond = Box<dyn Fn() -> Result<Payload> + Send + Sync>;

/// Inference backend answering from fixed closures and recording every call.
pub struct StubBackend {
    conditioned: Respond,
    unconditioned: Respond,
    pub conditioned_calls: Mutex<Vec<ConditionedRequest>>,
    pub unconditioned_calls: Mutex<Vec<UnconditionedRequest>>,
}

impl StubBackend {
    pub fn new(
        conditioned: impl Fn() -> Result<Payload> + Send + Sync + 'static,
        unconditioned: impl Fn() -> Result<Payload> + Send + Sync + 'static,
    ) -> Self {
        Self {
            conditioned: Box::new(conditioned),
            unconditioned: Box::new(unconditioned),
            conditioned_calls: Mutex::new(Vec::new()),
            unconditioned_calls: Mutex::new(Vec::new()),
        }
    }

    /// Both paths fail; for requests that must never reach the backend.
    pub fn unreachable() -> Self {
        Self::new(
            || Err(anyhow!("conditioned backend should not be called")),
            || Err(anyhow!("unconditioned backend should not be called")),
        )
    }

    pub fn call_count(&self) -> usize {
        self.conditioned_calls.lock().unwrap().len() + self.unconditioned_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl InferenceBackend for StubBackend {
    async fn generate_conditioned(&self, request: ConditionedRequest) -> Result<Payload> {
        self.conditioned_calls.lock().unwrap().push(request);
        (self.conditioned)()
    }

    async fn generate_unconditioned(&self, request: UnconditionedRequest) -> Result<Payload> {
        self.unconditioned_calls.lock().unwrap().push(request);
        (self.unconditioned)()
    }
}

pub struct TestApp {
    pub router: Router,
    pub repo: Arc<MemoryRepository>,
    pub objects: Arc<MemoryObjectStore>,
    pub backend: Arc<StubBackend>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

pub fn app(backend: StubBackend) -> TestApp {
    let repo = Arc::new(MemoryRepository::new());
    let objects = Arc::new(MemoryObjectStore::new());
    let backend = Arc::new(backend);
    let pipeline = Pipeline::new(
        repo.clone(),
        objects.clone(),
        Normalizer::default(),
        Dispatcher::new(backend.clone(), "@cf/test/fallback"),
    );
    let router = api_router(Arc::new(AppState {
        pipeline,
        public_base_url: BASE_URL.to_string(),
        dev_user_email: DEV_USER.to_string(),
    }));
    TestApp {
        router,
        repo,
        objects,
        backend,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, value: Value) -> TestResponse {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Presign, upload and commit `bytes`; returns the asset id.
    pub async fn upload(&self, file_name: &str, mime: &str, bytes: Vec<u8>) -> String {
        let presign = self
            .post_json(
                "/api/uploads/presign",
                serde_json::json!({ "filename": file_name, "mime": mime }),
            )
            .await;
        assert_eq!(presign.status, StatusCode::OK);
        let asset_id = presign.json()["assetId"].as_str().unwrap().to_string();

        let put = self
            .send(
                Request::put(format!("/api/uploads/{asset_id}"))
                    .header(header::CONTENT_TYPE, mime)
                    .body(Body::from(bytes))
                    .unwrap(),
            )
            .await;
        assert_eq!(put.status, StatusCode::OK);

        let commit = self
            .post_json(
                "/api/uploads/commit",
                serde_json::json!({ "assetId": asset_id }),
            )
            .await;
        assert_eq!(commit.status, StatusCode::OK);
        asset_id
    }
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_pixel(width, height, image::Rgb([120, 110, 100]));
    let mut output = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut output), image::ImageFormat::Png)
        .unwrap();
    output
}

pub fn bytes_payload(bytes: &'static [u8]) -> Result<Payload> {
    Ok(Payload::Bytes(Bytes::from_static(bytes)))
}
