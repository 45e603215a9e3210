pub mod admin;
pub mod assets;
pub mod diag;
pub mod identity;
pub mod jobs;
pub mod uploads;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::pipeline::Pipeline;

pub use identity::{ACCESS_EMAIL_HEADER, RequestContext};

pub struct AppState {
    pub pipeline: Pipeline,
    /// Origin used when handing out upload URLs, without a trailing slash.
    pub public_base_url: String,
    pub dev_user_email: String,
}

pub type SharedState = Arc<AppState>;

/// Every `/api` route, bound to `state`.
pub fn api_router(state: SharedState) -> Router {
    Router::new()
        .route("/api/health", get(diag::health))
        .route("/api/diag/ai", get(diag::ai_sanity_check))
        .route("/api/uploads/presign", post(uploads::presign))
        .route("/api/uploads/commit", post(uploads::commit))
        .route(
            "/api/uploads/{asset_id}",
            put(uploads::upload_raw).post(uploads::upload_multipart),
        )
        .route("/api/assets/{asset_id}", get(assets::download))
        .route("/api/jobs", post(jobs::create_job))
        .route("/api/jobs/{job_id}", get(jobs::get_job))
        .route("/api/admin/jobs", get(admin::list_jobs))
        .with_state(state)
}
