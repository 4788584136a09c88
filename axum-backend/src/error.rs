//! HTTP-facing error type shared by every handler

use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use replicate_client::ReplicateError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed client input
    #[error("{error}: {details}")]
    BadRequest { error: String, details: String },

    /// The server is missing something it needs to reach the model provider
    #[error("API configuration error: {0}")]
    Configuration(String),

    /// A call to the hosted model failed
    #[error("{context}: {source}")]
    Provider {
        context: String,
        #[source]
        source: ReplicateError,
    },

    #[error("{context}: {details}")]
    Internal { context: String, details: String },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub details: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_credit_error: Option<bool>,
}

impl ApiError {
    pub fn bad_request(error: impl Into<String>, details: impl Into<String>) -> Self {
        ApiError::BadRequest {
            error: error.into(),
            details: details.into(),
        }
    }

    pub fn provider(context: impl Into<String>, source: ReplicateError) -> Self {
        ApiError::Provider {
            context: context.into(),
            source,
        }
    }

    pub fn internal(context: impl Into<String>, details: impl ToString) -> Self {
        ApiError::Internal {
            context: context.into(),
            details: details.to_string(),
        }
    }

    pub fn is_credit_error(&self) -> bool {
        match self {
            ApiError::Provider { source, .. } => source.is_credit_exhausted(),
            _ => false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            _ if self.is_credit_error() => StatusCode::PAYMENT_REQUIRED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorResponse {
        let (error, details) = match self {
            ApiError::BadRequest { error, details } => (error.clone(), details.clone()),
            ApiError::Configuration(details) => ("API configuration error".to_string(), details.clone()),
            ApiError::Provider { context, source } => (context.clone(), source.to_string()),
            ApiError::Internal { context, details } => (context.clone(), details.clone()),
        };

        ErrorResponse {
            error,
            details,
            timestamp: chrono::Utc::now().to_rfc3339(),
            is_credit_error: self.is_credit_error().then_some(true),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self);
        }
        (status, Json(self.body())).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request("Invalid request body", rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::bad_request("Invalid form data", rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
