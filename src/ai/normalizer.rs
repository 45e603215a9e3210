use bytes::Bytes;

use crate::ai::backend::AdvancedParams;
use crate::error::StagingError;
use crate::image_processing::{SUPPORTED_SOURCE_MIMES, is_supported_source_mime};
use crate::models::{Asset, GenerationOptions, JobMode};

pub const DEFAULT_IMAGE_MODEL: &str = "@cf/black-forest-labs/flux-1-schnell";
pub const DEFAULT_TEXT_MODEL: &str = "@cf/black-forest-labs/flux-1-schnell";
pub const DEFAULT_STRENGTH: f32 = 0.6;
pub const DEFAULT_STEPS: u32 = 4;
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

const TEXT_NEGATIVE_PROMPT: &str = "blurry, low quality, distorted, ugly, bad anatomy";
const STYLE_NEGATIVE_PROMPT: &str =
    "clutter, artifacts, distorted geometry, poor lighting, low quality";

const STYLE_PROMPTS: &[(&str, &str)] = &[
    (
        "modern",
        "modern interior design, clean lines, minimalist, contemporary furniture, bright lighting",
    ),
    (
        "vintage",
        "vintage interior design, retro furniture, warm colors, classic elements, nostalgic atmosphere",
    ),
    (
        "industrial",
        "industrial interior design, exposed brick, metal fixtures, raw materials, urban loft style",
    ),
    (
        "scandinavian",
        "scandinavian interior design, light wood, white walls, cozy textiles, hygge atmosphere",
    ),
    (
        "luxury",
        "luxury interior design, high-end furniture, elegant decor, premium materials, sophisticated lighting",
    ),
    (
        "japandi",
        "japandi interior design, warm wood, linen, neutral palette, low profile furniture, zen, soft ambient light",
    ),
];

/// Canned prompt for a style keyword; unknown styles get the `modern` phrase.
pub fn style_prompt(style: &str) -> &'static str {
    let key = style.trim().to_ascii_lowercase();
    STYLE_PROMPTS
        .iter()
        .find(|(name, _)| *name == key)
        .or_else(|| STYLE_PROMPTS.first())
        .map(|(_, prompt)| *prompt)
        .unwrap_or_default()
}

/// Canonical input for the dispatcher.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub mode: JobMode,
    pub prompt: String,
    pub negative_prompt: String,
    pub model: String,
    pub strength: f32,
    pub params: AdvancedParams,
    pub steps: u32,
    pub aspect_ratio: String,
    source: Option<Bytes>,
}

impl GenerationRequest {
    pub fn source(&self) -> Option<&Bytes> {
        self.source.as_ref()
    }

    /// Attaches source pixels. Only image-to-image requests carry them.
    pub fn with_source(mut self, bytes: Bytes) -> Result<Self, StagingError> {
        if self.mode != JobMode::ImageToImage {
            return Err(StagingError::Validation(
                "source pixels are only accepted for image-to-image jobs".to_string(),
            ));
        }
        self.source = Some(bytes);
        Ok(self)
    }
}

/// Turns a job description into a [`GenerationRequest`]. Pure; no I/O.
#[derive(Debug, Clone)]
pub struct Normalizer {
    image_model: String,
    text_model: String,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL)
    }
}

impl Normalizer {
    pub fn new(image_model: impl Into<String>, text_model: impl Into<String>) -> Self {
        Self {
            image_model: image_model.into(),
            text_model: text_model.into(),
        }
    }

    pub fn text_model(&self) -> &str {
        &self.text_model
    }

    /// `asset` is the looked-up source for image-to-image jobs; `asset_id`
    /// is what the caller referenced, used in error messages.
    pub fn normalize(
        &self,
        mode: JobMode,
        style: &str,
        options: Option<&GenerationOptions>,
        asset_id: Option<&str>,
        asset: Option<&Asset>,
    ) -> Result<GenerationRequest, StagingError> {
        let defaults = GenerationOptions::default();
        let options = options.unwrap_or(&defaults);

        let (prompt, negative_prompt, default_model) = match mode {
            JobMode::TextToImage => {
                let prompt = style.trim();
                if prompt.is_empty() {
                    return Err(StagingError::Validation(
                        "prompt is required for text-to-image jobs".to_string(),
                    ));
                }
                (prompt.to_string(), TEXT_NEGATIVE_PROMPT, &self.text_model)
            }
            JobMode::ImageToImage => {
                let asset_id = asset_id.map(str::trim).filter(|id| !id.is_empty()).ok_or_else(|| {
                    StagingError::Validation(
                        "originalAssetId is required for image-to-image jobs".to_string(),
                    )
                })?;
                let asset = asset.ok_or_else(|| {
                    StagingError::NotFound(format!("Asset not found: {asset_id}"))
                })?;
                if asset.storage_key.is_none() {
                    return Err(StagingError::IncompleteAsset(format!(
                        "Asset {asset_id} has no uploaded file yet"
                    )));
                }
                if !is_supported_source_mime(&asset.mime) {
                    return Err(StagingError::UnsupportedFormat(format!(
                        "Unsupported image format: {}. Supported formats: {}",
                        asset.mime,
                        SUPPORTED_SOURCE_MIMES.join(", ")
                    )));
                }
                let prompt = options
                    .prompt
                    .as_deref()
                    .map(str::trim)
                    .filter(|prompt| !prompt.is_empty())
                    .unwrap_or_else(|| style_prompt(style));
                (prompt.to_string(), STYLE_NEGATIVE_PROMPT, &self.image_model)
            }
        };

        let negative_prompt = options
            .negative_prompt
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(negative_prompt)
            .to_string();
        let model = options
            .model
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(default_model)
            .to_string();
        let strength = options.strength.unwrap_or(DEFAULT_STRENGTH);
        if !(0.0..=1.0).contains(&strength) {
            return Err(StagingError::Validation(format!(
                "strength must be between 0 and 1, got {strength}"
            )));
        }

        Ok(GenerationRequest {
            mode,
            prompt,
            negative_prompt,
            model,
            strength,
            params: AdvancedParams {
                cfg_scale: options.cfg_scale,
                steps: options.steps,
                seed: options.seed,
                sampler: options.sampler.clone(),
            },
            steps: options.steps.unwrap_or(DEFAULT_STEPS),
            aspect_ratio: options
                .aspect_ratio
                .clone()
                .unwrap_or_else(|| DEFAULT_ASPECT_RATIO.to_string()),
            source: None,
        })
    }
}
