use std::sync::Arc;

use replicate_client::{ModelRunner, ReplicateClient};

use crate::config::AppConfig;
use crate::error::{ApiError, ApiResult};

/// Shared, read-only state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    /// `None` when no provider token is configured; AI endpoints then answer 500
    pub models: Option<Arc<dyn ModelRunner>>,
    /// Plain HTTP client for fetching remote result images on export
    pub http: reqwest::Client,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> Self {
        let models = config.replicate_api_token.clone().map(|token| {
            let client = ReplicateClient::new(token)
                .with_base_url(config.replicate_api_url.clone())
                .with_timeout(config.replicate_timeout)
                .with_poll_interval(config.replicate_poll_interval);
            Arc::new(client) as Arc<dyn ModelRunner>
        });
        Self::new(config, models)
    }

    pub fn new(config: AppConfig, models: Option<Arc<dyn ModelRunner>>) -> Self {
        Self {
            config: Arc::new(config),
            models,
            http: reqwest::Client::new(),
        }
    }

    pub fn models(&self) -> ApiResult<Arc<dyn ModelRunner>> {
        self.models
            .clone()
            .ok_or_else(|| ApiError::Configuration("REPLICATE_API_TOKEN is not configured".to_string()))
    }
}
