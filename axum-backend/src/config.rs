use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

pub const DEFAULT_IMAGE_MODEL: &str =
    "stability-ai/sdxl:39ed52f2a78e934b3ba6e2a89f5b1c712de7dfea535525255b1aa35c5565e08b";
pub const DEFAULT_TEXT_MODEL: &str =
    "meta/meta-llama-3-70b-instruct:4b83ab0198ad37a14f287d35e64dd545f8c99f6c952713e88494a2a4a10cc657";

const DEFAULT_ALLOWED_ORIGINS: &str =
    "http://localhost:3000,http://127.0.0.1:3000,http://localhost:8080,http://127.0.0.1:8080";

/// Server settings, read once at startup from the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub allowed_origins: Vec<String>,
    pub replicate_api_token: Option<String>,
    pub replicate_api_url: String,
    pub image_model: String,
    pub text_model: String,
    pub replicate_timeout: Duration,
    pub replicate_poll_interval: Duration,
    /// Upper bound for request bodies (uploads and export payloads) and
    /// for remote images downloaded on export
    pub max_upload_bytes: usize,
    /// Per-request timeout when export downloads a remote image
    pub fetch_timeout: Duration,
    pub static_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            allowed_origins: split_origins(DEFAULT_ALLOWED_ORIGINS),
            replicate_api_token: None,
            replicate_api_url: replicate_client::DEFAULT_BASE_URL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            replicate_timeout: Duration::from_secs(120),
            replicate_poll_interval: Duration::from_millis(1000),
            max_upload_bytes: 10 * 1024 * 1024,
            fetch_timeout: Duration::from_secs(30),
            static_dir: None,
        }
    }
}

impl AppConfig {
    /// Build the config from process environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            allowed_origins: get("ALLOWED_ORIGINS")
                .map(|v| split_origins(&v))
                .unwrap_or(defaults.allowed_origins),
            replicate_api_token: get("REPLICATE_API_TOKEN"),
            replicate_api_url: get("REPLICATE_API_URL").unwrap_or(defaults.replicate_api_url),
            image_model: get("IMAGE_MODEL").unwrap_or(defaults.image_model),
            text_model: get("TEXT_MODEL").unwrap_or(defaults.text_model),
            replicate_timeout: parse_number("REPLICATE_TIMEOUT_SECS", get("REPLICATE_TIMEOUT_SECS"))
                .map(Duration::from_secs)
                .unwrap_or(defaults.replicate_timeout),
            replicate_poll_interval: parse_number("REPLICATE_POLL_MS", get("REPLICATE_POLL_MS"))
                .map(Duration::from_millis)
                .unwrap_or(defaults.replicate_poll_interval),
            max_upload_bytes: parse_number("MAX_UPLOAD_BYTES", get("MAX_UPLOAD_BYTES"))
                .map(|n| n as usize)
                .unwrap_or(defaults.max_upload_bytes),
            fetch_timeout: parse_number("FETCH_TIMEOUT_SECS", get("FETCH_TIMEOUT_SECS"))
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch_timeout),
            static_dir: get("STATIC_DIR").map(PathBuf::from),
        }
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number(key: &str, value: Option<String>) -> Option<u64> {
    let value = value?;
    match value.parse::<u64>() {
        Ok(n) => Some(n),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a non-negative integer", key, value);
            None
        }
    }
}
