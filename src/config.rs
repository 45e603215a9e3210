use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, anyhow};

use crate::ai::normalizer::{DEFAULT_IMAGE_MODEL, DEFAULT_TEXT_MODEL};
use crate::ai::workers_ai::DEFAULT_API_BASE_URL;

const DEFAULT_PORT: u16 = 8787;
const DEFAULT_AI_TIMEOUT_SECS: u64 = 120;
const DEFAULT_DEV_USER_EMAIL: &str = "dev@example.com";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub data_dir: PathBuf,
    pub public_base_url: String,
    pub account_id: String,
    pub api_token: String,
    pub ai_base_url: String,
    pub ai_timeout: Duration,
    pub image_model: String,
    pub fallback_model: String,
    pub dev_user_email: String,
    pub secret_key: Option<String>,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let require = |key: &str| get(key).ok_or_else(|| anyhow!("missing {key}"));

        let port = match get("PORT") {
            Some(value) => value
                .parse::<u16>()
                .map_err(|err| anyhow!("invalid PORT {value:?}: {err}"))?,
            None => DEFAULT_PORT,
        };
        let ai_timeout_secs = match get("AI_TIMEOUT_SECS") {
            Some(value) => value
                .parse::<u64>()
                .map_err(|err| anyhow!("invalid AI_TIMEOUT_SECS {value:?}: {err}"))?,
            None => DEFAULT_AI_TIMEOUT_SECS,
        };
        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(value) => value
                .parse::<usize>()
                .map_err(|err| anyhow!("invalid MAX_UPLOAD_BYTES {value:?}: {err}"))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };
        let public_base_url = get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://0.0.0.0:{port}"))
            .trim_end_matches('/')
            .to_string();
        url::Url::parse(&public_base_url)
            .map_err(|err| anyhow!("invalid PUBLIC_BASE_URL {public_base_url:?}: {err}"))?;

        Ok(Self {
            port,
            data_dir: get("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(default_data_dir),
            public_base_url,
            account_id: require("CF_ACCOUNT_ID")?,
            api_token: require("CF_API_TOKEN")?,
            ai_base_url: get("CF_AI_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            ai_timeout: Duration::from_secs(ai_timeout_secs),
            image_model: get("IMAGE_MODEL").unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            fallback_model: get("FALLBACK_MODEL")
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            dev_user_email: get("DEV_USER_EMAIL")
                .unwrap_or_else(|| DEFAULT_DEV_USER_EMAIL.to_string()),
            secret_key: get("SECRET_KEY"),
            max_upload_bytes,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn mcp_path(&self) -> String {
        match self.secret_key.as_deref() {
            Some(value) => format!("/{value}/mcp"),
            None => "/mcp".to_string(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    let mut base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.push("image-staging");
    base
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    const CREDENTIALS: [(&str, &str); 2] = [("CF_ACCOUNT_ID", "acct"), ("CF_API_TOKEN", "token")];

    #[test]
    fn defaults_apply() {
        let config = config(&CREDENTIALS).unwrap();
        assert_eq!(config.port, 8787);
        assert_eq!(config.public_base_url, "http://0.0.0.0:8787");
        assert_eq!(config.ai_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.ai_timeout, Duration::from_secs(120));
        assert_eq!(config.dev_user_email, "dev@example.com");
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.mcp_path(), "/mcp");
        assert!(config.data_dir.ends_with("image-staging"));
    }

    #[test]
    fn credentials_are_required() {
        let err = config(&[("CF_ACCOUNT_ID", "acct"), ("CF_API_TOKEN", "  ")]).unwrap_err();
        assert!(err.to_string().contains("CF_API_TOKEN"));
        assert!(config(&[]).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.extend([
            ("PORT", "9000"),
            ("PUBLIC_BASE_URL", "https://stage.example.com/"),
            ("SECRET_KEY", "s3cret"),
            ("AI_TIMEOUT_SECS", "30"),
            ("DATA_DIR", "/tmp/staging"),
        ]);
        let config = config(&pairs).unwrap();
        assert_eq!(config.bind_address(), "0.0.0.0:9000");
        assert_eq!(config.public_base_url, "https://stage.example.com");
        assert_eq!(config.mcp_path(), "/s3cret/mcp");
        assert_eq!(config.ai_timeout, Duration::from_secs(30));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/staging"));
    }

    #[test]
    fn bad_numbers_are_errors() {
        let mut pairs = CREDENTIALS.to_vec();
        pairs.push(("PORT", "eighty"));
        assert!(config(&pairs).is_err());
    }
}
