use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, Path, State, rejection::JsonRejection},
    http::{HeaderMap, header},
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::error::StagingError;
use crate::image_processing::{detect_mime_type, get_dimensions};
use crate::models::{Asset, AssetKind};
use crate::routes::{RequestContext, SharedState};
use crate::storage::{compute_hash, get_extension_from_mime_type, sanitize_file_name};

#[derive(Debug, Deserialize)]
pub struct PresignRequest {
    pub filename: String,
    pub mime: String,
    pub kind: Option<AssetKind>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresignResponse {
    pub upload_url: String,
    pub storage_key: String,
    pub asset_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub asset_id: String,
    pub meta: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub asset_id: String,
    pub storage_key: String,
    pub bytes: usize,
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, StagingError> {
    body.map(|Json(value)| value)
        .map_err(|err| StagingError::Validation(format!("invalid request body: {err}")))
}

/// Reserves an asset row and hands back where its bytes should be sent.
pub async fn presign(
    State(state): State<SharedState>,
    request: RequestContext,
    body: Result<Json<PresignRequest>, JsonRejection>,
) -> Result<Json<PresignResponse>, StagingError> {
    let body = json_body(body)?;
    let mime = body.mime.trim().to_ascii_lowercase();
    if !mime.starts_with("image/") {
        return Err(StagingError::Validation(format!(
            "mime must be an image type, got {:?}",
            body.mime
        )));
    }
    if body.filename.trim().is_empty() {
        return Err(StagingError::Validation("filename is required".to_string()));
    }
    let mut file_name = sanitize_file_name(&body.filename);
    if !file_name.contains('.') {
        file_name = format!("{file_name}.{}", get_extension_from_mime_type(&mime));
    }

    let asset = Asset::pending(
        request.user_email.clone(),
        body.kind.unwrap_or_default(),
        file_name,
        mime,
    );
    state
        .pipeline
        .repo()
        .insert_asset(&asset)
        .await
        .map_err(StagingError::database)?;
    info!(asset_id = %asset.id, user = %request.user_email, "upload reserved");

    Ok(Json(PresignResponse {
        upload_url: format!("{}/api/uploads/{}", state.public_base_url, asset.id),
        storage_key: asset.reserved_key(),
        asset_id: asset.id,
    }))
}

async fn store_upload(
    state: &SharedState,
    asset_id: &str,
    bytes: Bytes,
) -> Result<Json<UploadResponse>, StagingError> {
    if bytes.is_empty() {
        return Err(StagingError::Validation("upload body is empty".to_string()));
    }
    let pipeline = &state.pipeline;
    let mut asset = pipeline
        .repo()
        .get_asset(asset_id)
        .await
        .map_err(StagingError::database)?
        .ok_or_else(|| StagingError::NotFound(format!("Asset not found: {asset_id}")))?;
    // Assets are immutable once they have bytes; outputs belong to their job.
    if asset.kind == AssetKind::Output || asset.storage_key.is_some() {
        return Err(StagingError::Validation(format!(
            "Asset {asset_id} is already uploaded and cannot be replaced"
        )));
    }

    let key = asset.reserved_key();
    pipeline
        .objects()
        .put(&key, &bytes, &asset.mime)
        .await
        .map_err(StagingError::storage)?;
    asset.storage_key = Some(key.clone());
    asset.bytes = Some(bytes.len() as u64);
    pipeline
        .repo()
        .update_asset(&asset)
        .await
        .map_err(StagingError::database)?;
    info!(%asset_id, %key, bytes = bytes.len(), "upload stored");

    Ok(Json(UploadResponse {
        asset_id: asset.id,
        storage_key: key,
        bytes: bytes.len(),
    }))
}

/// `PUT` with the raw image as the request body.
pub async fn upload_raw(
    State(state): State<SharedState>,
    Path(asset_id): Path<String>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<Json<UploadResponse>, StagingError> {
    if let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    {
        if !content_type.starts_with("image/") && content_type != "application/octet-stream" {
            return Err(StagingError::Validation(format!(
                "unsupported upload content type: {content_type}"
            )));
        }
    }
    store_upload(&state, &asset_id, bytes).await
}

/// `POST` with a multipart form carrying the image in a `file` field.
pub async fn upload_multipart(
    State(state): State<SharedState>,
    Path(asset_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, StagingError> {
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                if let Some(content_type) = field.content_type() {
                    if !content_type.starts_with("image/") {
                        return Err(StagingError::Validation(format!(
                            "unsupported upload content type: {content_type}"
                        )));
                    }
                }
                let bytes = field.bytes().await.map_err(|err| {
                    StagingError::Validation(format!("reading upload failed: {err}"))
                })?;
                return store_upload(&state, &asset_id, bytes).await;
            }
            Ok(None) => break,
            Err(err) => {
                return Err(StagingError::Validation(format!(
                    "reading form failed: {err}"
                )));
            }
        }
    }
    Err(StagingError::Validation("no file field in upload".to_string()))
}

/// Measures the stored object and records its size, dimensions and checksum.
pub async fn commit(
    State(state): State<SharedState>,
    body: Result<Json<CommitRequest>, JsonRejection>,
) -> Result<Json<Value>, StagingError> {
    let body = json_body(body)?;
    let pipeline = &state.pipeline;
    let mut asset = pipeline
        .repo()
        .get_asset(&body.asset_id)
        .await
        .map_err(StagingError::database)?
        .ok_or_else(|| StagingError::NotFound(format!("Asset not found: {}", body.asset_id)))?;
    let key = asset.storage_key.clone().ok_or_else(|| {
        StagingError::NotFound(format!("Asset {} has no uploaded file", asset.id))
    })?;
    let object = pipeline
        .objects()
        .get(&key)
        .await
        .map_err(StagingError::storage)?
        .ok_or_else(|| StagingError::NotFound(format!("Uploaded file missing: {key}")))?;

    match get_dimensions(&object.bytes, &asset.mime) {
        Ok((width, height)) => {
            asset.width = Some(width);
            asset.height = Some(height);
        }
        Err(err) => warn!(asset_id = %asset.id, error = %err, "could not measure upload"),
    }
    if let Some(sniffed) = detect_mime_type(&object.bytes) {
        if sniffed != asset.mime {
            warn!(asset_id = %asset.id, declared = %asset.mime, %sniffed, "declared mime differs from content");
        }
    }
    asset.bytes = Some(object.bytes.len() as u64);
    asset.checksum = Some(compute_hash(&object.bytes));
    if let Some(meta) = body.meta {
        asset.meta = meta;
    }
    pipeline
        .repo()
        .update_asset(&asset)
        .await
        .map_err(StagingError::database)?;
    info!(asset_id = %asset.id, width = ?asset.width, height = ?asset.height, "upload committed");

    Ok(Json(json!({ "ok": true, "asset": asset })))
}
