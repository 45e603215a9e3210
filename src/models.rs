use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::{ASSET_PREFIX, JOB_PREFIX, rid};

/// Source reference recorded on text-to-image jobs, which have no original asset.
pub const TEXT_TO_IMAGE_SENTINEL: &str = "text-to-image-placeholder";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum JobMode {
    TextToImage,
    #[default]
    ImageToImage,
}

impl JobMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TextToImage => "text-to-image",
            Self::ImageToImage => "image-to-image",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Per-request generation parameters, all optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationOptions {
    #[schemars(description = "Prompt override for image-to-image styles")]
    pub prompt: Option<String>,
    #[schemars(description = "Things the image should avoid")]
    pub negative_prompt: Option<String>,
    #[schemars(description = "How far the result may drift from the source image, 0..1")]
    pub strength: Option<f32>,
    #[schemars(description = "Workers AI model id")]
    pub model: Option<String>,
    pub mode: Option<JobMode>,
    #[schemars(description = "Classifier-free guidance scale")]
    pub cfg_scale: Option<f32>,
    #[schemars(description = "Sampling steps")]
    pub steps: Option<u32>,
    pub seed: Option<u64>,
    #[schemars(description = "Sampler / scheduler name")]
    pub sampler: Option<String>,
    #[schemars(description = "Output aspect ratio: 1:1, 16:9, 9:16, 4:3 or 3:4")]
    pub aspect_ratio: Option<String>,
}

/// What a caller submits to start a job.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobDescription {
    #[schemars(description = "text-to-image or image-to-image (default)")]
    pub mode: Option<JobMode>,
    #[schemars(description = "Asset id of the uploaded room photo, required for image-to-image")]
    pub original_asset_id: Option<String>,
    #[schemars(description = "Style keyword (image-to-image) or the literal prompt (text-to-image)")]
    #[serde(default)]
    pub style: String,
    pub options: Option<GenerationOptions>,
}

impl JobDescription {
    pub fn mode(&self) -> JobMode {
        self.mode
            .or_else(|| self.options.as_ref().and_then(|options| options.mode))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub user_email: String,
    pub original_asset_id: String,
    pub mode: JobMode,
    pub style: String,
    pub prompt: String,
    pub negative_prompt: String,
    pub model: String,
    #[serde(default)]
    pub options: GenerationOptions,
    pub status: JobStatus,
    pub output_key: Option<String>,
    pub output_asset_id: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn queued(
        user_email: String,
        original_asset_id: Option<String>,
        mode: JobMode,
        style: String,
        prompt: String,
        negative_prompt: String,
        model: String,
        options: GenerationOptions,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: rid(JOB_PREFIX),
            user_email,
            original_asset_id: original_asset_id
                .unwrap_or_else(|| TEXT_TO_IMAGE_SENTINEL.to_string()),
            mode,
            style,
            prompt,
            negative_prompt,
            model,
            options,
            status: JobStatus::Queued,
            output_key: None,
            output_asset_id: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    #[default]
    Original,
    Output,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Output => "output",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub id: String,
    pub user_email: String,
    pub kind: AssetKind,
    pub file_name: String,
    /// Set once the object bytes have landed in the object store.
    pub storage_key: Option<String>,
    pub mime: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub bytes: Option<u64>,
    pub checksum: Option<String>,
    #[serde(default)]
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Asset {
    /// An asset row reserved by presign; bytes have not been uploaded yet.
    pub fn pending(user_email: String, kind: AssetKind, file_name: String, mime: String) -> Self {
        Self {
            id: rid(ASSET_PREFIX),
            user_email,
            kind,
            file_name,
            storage_key: None,
            mime,
            width: None,
            height: None,
            bytes: None,
            checksum: None,
            meta: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn output(
        user_email: String,
        storage_key: String,
        mime: String,
        width: Option<u32>,
        height: Option<u32>,
        bytes: u64,
    ) -> Self {
        let file_name = storage_key
            .rsplit('/')
            .next()
            .unwrap_or(storage_key.as_str())
            .to_string();
        Self {
            id: rid(ASSET_PREFIX),
            user_email,
            kind: AssetKind::Output,
            file_name,
            storage_key: Some(storage_key),
            mime,
            width,
            height,
            bytes: Some(bytes),
            checksum: None,
            meta: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    /// Key the upload for this asset is written under.
    pub fn reserved_key(&self) -> String {
        format!("{}/{}-{}", self.kind.as_str(), self.id, self.file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_falls_back_to_options_then_image_to_image() {
        let mut description = JobDescription::default();
        assert_eq!(description.mode(), JobMode::ImageToImage);

        description.options = Some(GenerationOptions {
            mode: Some(JobMode::TextToImage),
            ..Default::default()
        });
        assert_eq!(description.mode(), JobMode::TextToImage);

        description.mode = Some(JobMode::ImageToImage);
        assert_eq!(description.mode(), JobMode::ImageToImage);
    }

    #[test]
    fn description_parses_wire_names() {
        let description: JobDescription = serde_json::from_value(serde_json::json!({
            "mode": "text-to-image",
            "style": "a red chair",
            "options": { "negative_prompt": "people", "aspect_ratio": "16:9", "cfg_scale": 7.5 }
        }))
        .unwrap();
        assert_eq!(description.mode(), JobMode::TextToImage);
        let options = description.options.unwrap();
        assert_eq!(options.negative_prompt.as_deref(), Some("people"));
        assert_eq!(options.aspect_ratio.as_deref(), Some("16:9"));
        assert_eq!(options.cfg_scale, Some(7.5));
    }

    #[test]
    fn text_jobs_record_the_sentinel_source() {
        let job = Job::queued(
            "dev@example.com".into(),
            None,
            JobMode::TextToImage,
            "a red chair".into(),
            "a red chair".into(),
            "blurry".into(),
            "@cf/black-forest-labs/flux-1-schnell".into(),
            GenerationOptions::default(),
        );
        assert_eq!(job.original_asset_id, TEXT_TO_IMAGE_SENTINEL);
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.id.starts_with("job_"));
    }

    #[test]
    fn reserved_key_uses_kind_and_id() {
        let asset = Asset::pending(
            "dev@example.com".into(),
            AssetKind::Original,
            "room.jpg".into(),
            "image/jpeg".into(),
        );
        assert_eq!(asset.reserved_key(), format!("original/{}-room.jpg", asset.id));
    }
}
