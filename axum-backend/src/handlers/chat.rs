use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::prompt::{chat_conversation, clean_chat_response, ChatMessage, SYSTEM_PROMPT};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    /// Accepted for compatibility; the text model does not see images
    #[serde(default)]
    pub image_data: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
    pub timestamp: String,
}

/// POST /api/chat
pub async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<Json<ChatResponse>> {
    let Json(request) = payload?;
    info!(
        "Chat request received: message_length={}, history_length={}, has_image={}",
        request.message.as_deref().map(str::len).unwrap_or(0),
        request.history.len(),
        request.image_data.is_some()
    );

    let models = state.models()?;

    let message = request
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::bad_request("No message provided", "Please type a message"))?;

    let conversation = chat_conversation(message, &request.history);
    let input = serde_json::json!({
        "prompt": conversation,
        "max_tokens": 1000,
        "temperature": 0.7,
        "top_p": 0.9,
        "top_k": 50,
        "repeat_penalty": 1,
        "system_prompt": SYSTEM_PROMPT,
    });

    info!("Calling text model ({})", state.config.text_model);
    let output = models
        .run(&state.config.text_model, input)
        .await
        .map_err(|e| ApiError::provider("Failed to process chat message", e))?;

    let response = clean_chat_response(&output.text());
    info!("Chat response length: {}", response.len());

    Ok(Json(ChatResponse {
        success: true,
        response,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }))
}
