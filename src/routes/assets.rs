use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};

use crate::error::StagingError;
use crate::routes::SharedState;
use crate::storage::compute_hash;

const CACHE_CONTROL: &str = "public, max-age=31536000";

/// Streams a stored asset back with long-lived caching headers.
pub async fn download(
    State(state): State<SharedState>,
    Path(asset_id): Path<String>,
) -> Result<Response, StagingError> {
    let pipeline = &state.pipeline;
    let asset = pipeline
        .repo()
        .get_asset(&asset_id)
        .await
        .map_err(StagingError::database)?
        .ok_or_else(|| StagingError::NotFound(format!("Asset not found: {asset_id}")))?;
    let key = asset.storage_key.as_deref().ok_or_else(|| {
        StagingError::NotFound(format!("Asset {asset_id} has no stored file"))
    })?;
    let object = pipeline
        .objects()
        .get(key)
        .await
        .map_err(StagingError::storage)?
        .ok_or_else(|| StagingError::NotFound(format!("Stored file missing: {key}")))?;

    let etag = asset
        .checksum
        .clone()
        .unwrap_or_else(|| compute_hash(&object.bytes));
    let content_type = object.content_type.unwrap_or(asset.mime);
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_LENGTH, object.bytes.len().to_string()),
            (header::CACHE_CONTROL, CACHE_CONTROL.to_string()),
            (header::ETAG, format!("\"{etag}\"")),
        ],
        Body::from(object.bytes),
    )
        .into_response())
}
