use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

mod error;
mod output;

pub use error::ReplicateError;
pub use output::ModelOutput;

pub const DEFAULT_BASE_URL: &str = "https://api.replicate.com/v1";

/// Anything that can run a hosted model on a JSON input and hand back its output.
///
/// The backend only talks to this trait so handlers can be exercised without a network.
#[async_trait]
pub trait ModelRunner: Send + Sync {
    async fn run(&self, model: &str, input: Value) -> Result<ModelOutput, ReplicateError>;
}

/// `owner/name[:version]` as accepted by the Replicate API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub owner: String,
    pub name: String,
    pub version: Option<String>,
}

impl ModelRef {
    pub fn parse(identifier: &str) -> Result<Self, ReplicateError> {
        let (path, version) = match identifier.split_once(':') {
            Some((path, version)) if !version.is_empty() => (path, Some(version.to_string())),
            Some(_) => return Err(ReplicateError::InvalidModel(identifier.to_string())),
            None => (identifier, None),
        };

        let (owner, name) = path
            .split_once('/')
            .filter(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'))
            .ok_or_else(|| ReplicateError::InvalidModel(identifier.to_string()))?;

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            version,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Prediction {
    #[serde(default)]
    id: String,
    status: String,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Debug, Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

impl Prediction {
    fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "succeeded" | "failed" | "canceled")
    }

    fn into_output(self) -> Result<ModelOutput, ReplicateError> {
        if self.status == "succeeded" {
            return Ok(ModelOutput::new(self.output));
        }

        let message = match self.error {
            Some(Value::String(s)) => s,
            Some(other) if !other.is_null() => other.to_string(),
            _ => "no error message".to_string(),
        };
        Err(ReplicateError::PredictionFailed {
            status: self.status,
            message,
        })
    }
}

/// Client for the Replicate predictions API
pub struct ReplicateClient {
    client: Client,
    api_token: String,
    base_url: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl ReplicateClient {
    /// Create a client with the default endpoint, 1s polling and a 120s overall timeout
    pub fn new(api_token: String) -> Self {
        Self {
            client: Client::new(),
            api_token,
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_millis(1000),
            timeout: Duration::from_secs(120),
        }
    }

    /// Create from the REPLICATE_API_TOKEN environment variable
    pub fn from_env() -> Result<Self, ReplicateError> {
        let token = std::env::var("REPLICATE_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ReplicateError::MissingToken)?;
        Ok(Self::new(token))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn create_url(&self, model: &ModelRef) -> String {
        match model.version {
            Some(_) => format!("{}/predictions", self.base_url),
            None => format!("{}/models/{}/{}/predictions", self.base_url, model.owner, model.name),
        }
    }

    async fn decode(response: reqwest::Response) -> Result<Prediction, ReplicateError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await?;
            warn!("Replicate API error: {} - {}", status, body);
            return Err(ReplicateError::Api { status, body });
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ReplicateError::Decode(format!("{}. Response: {}", e, body)))
    }

    async fn create_prediction(&self, model: &ModelRef, input: Value) -> Result<Prediction, ReplicateError> {
        let mut body = serde_json::json!({ "input": input });
        if let Some(version) = &model.version {
            body["version"] = Value::String(version.clone());
        }

        let response = self
            .client
            .post(self.create_url(model))
            .bearer_auth(&self.api_token)
            .header("Prefer", "wait")
            .json(&body)
            .send()
            .await?;

        Self::decode(response).await
    }

    async fn fetch_prediction(&self, url: &str) -> Result<Prediction, ReplicateError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        Self::decode(response).await
    }
}

#[async_trait]
impl ModelRunner for ReplicateClient {
    async fn run(&self, model: &str, input: Value) -> Result<ModelOutput, ReplicateError> {
        let model_ref = ModelRef::parse(model)?;
        info!("Sending prediction request to Replicate (model: {}/{})", model_ref.owner, model_ref.name);

        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut prediction = self.create_prediction(&model_ref, input).await?;

        let mut poll_url: Option<String> = None;

        while !prediction.is_terminal() {
            // later responses may omit `urls`; keep the last one seen
            if let Some(url) = prediction.urls.take().and_then(|urls| urls.get) {
                poll_url = Some(url);
            }
            let url = poll_url
                .as_deref()
                .ok_or_else(|| ReplicateError::Decode("prediction has no polling URL".to_string()))?;

            if tokio::time::Instant::now() + self.poll_interval > deadline {
                warn!("Prediction {} timed out in status {}", prediction.id, prediction.status);
                return Err(ReplicateError::Timeout(self.timeout.as_secs()));
            }

            tokio::time::sleep(self.poll_interval).await;
            debug!("Polling prediction {} (status: {})", prediction.id, prediction.status);
            prediction = self.fetch_prediction(url).await?;
        }

        info!("Prediction {} finished with status {}", prediction.id, prediction.status);
        prediction.into_output()
    }
}
