use reqwest::StatusCode;
use thiserror::Error;

/// Failures talking to the hosted model provider
#[derive(Debug, Error)]
pub enum ReplicateError {
    #[error("REPLICATE_API_TOKEN is not configured")]
    MissingToken,

    #[error("Invalid model identifier: {0}")]
    InvalidModel(String),

    #[error("Replicate API error: {status} - {body}")]
    Api { status: StatusCode, body: String },

    #[error("Prediction {status}: {message}")]
    PredictionFailed { status: String, message: String },

    #[error("Prediction did not finish within {0} seconds")]
    Timeout(u64),

    #[error("Request to Replicate failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected response from Replicate: {0}")]
    Decode(String),
}

impl ReplicateError {
    /// True when the provider refused the call because the account is out of credit.
    pub fn is_credit_exhausted(&self) -> bool {
        if let ReplicateError::Api { status, .. } = self {
            if *status == StatusCode::PAYMENT_REQUIRED {
                return true;
            }
        }
        is_credit_message(&self.to_string())
    }
}

/// Phrases the provider uses when an account runs out of credit
fn is_credit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("insufficient credit") || lower.contains("payment required")
}
