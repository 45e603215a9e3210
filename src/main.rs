use std::sync::Arc;

use anyhow::Result;
use axum::extract::DefaultBodyLimit;
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use image_staging_rmcp::{
    ai::{Dispatcher, Normalizer, WorkersAiClient},
    config::AppConfig,
    db::FileRepository,
    mcp_server::ImageStagingServer,
    pipeline::Pipeline,
    routes::{AppState, api_router},
    storage::LocalFileStorage,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    let bind_address = config.bind_address();
    let mcp_path = config.mcp_path();

    let backend = WorkersAiClient::new(
        config.ai_base_url.clone(),
        config.account_id.clone(),
        config.api_token.clone(),
        config.ai_timeout,
    )?;
    let pipeline = Pipeline::new(
        Arc::new(FileRepository::new(config.data_dir.join("db"))),
        Arc::new(LocalFileStorage::new(config.data_dir.join("objects"))),
        Normalizer::new(config.image_model.clone(), config.fallback_model.clone()),
        Dispatcher::new(Arc::new(backend), config.fallback_model.clone()),
    );
    let state = Arc::new(AppState {
        pipeline,
        public_base_url: config.public_base_url.clone(),
        dev_user_email: config.dev_user_email.clone(),
    });

    let state_for_service = state.clone();
    let service = StreamableHttpService::new(
        move || Ok(ImageStagingServer::new(state_for_service.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );
    let router = api_router(state)
        .nest_service(&mcp_path, service)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());
    let tcp_listener = tokio::net::TcpListener::bind(&bind_address).await?;

    info!(
        data_dir = %config.data_dir.display(),
        "Image staging server started at http://{}{}",
        bind_address,
        mcp_path
    );

    axum::serve(tcp_listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
