use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::options::parse_options_lenient;
use crate::prompt::{modify_prompt, MODIFY_NEGATIVE_PROMPT};
use crate::state::AppState;
use crate::upload::UploadForm;

const FAILURE: &str = "Failed to modify image";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyImageResponse {
    pub success: bool,
    pub modified_image: Value,
    pub prompt: String,
}

/// POST /api/modify-image
///
/// Multipart form: `image`, `prompt` (free text edit request), optional `options`.
pub async fn modify_image_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ModifyImageResponse>> {
    info!("Modify image request received");

    let mut form = UploadForm::read(multipart?).await?;
    let prompt = form.field("prompt").map(str::trim).unwrap_or("").to_string();

    info!(
        "Received data: has_image={}, prompt_length={}, has_options={}",
        form.has_image(),
        prompt.len(),
        form.field("options").is_some()
    );

    let image = form.take_image("Please upload an image to modify")?;
    if prompt.is_empty() {
        return Err(ApiError::bad_request(
            "No prompt provided",
            "Please describe the modifications you want",
        ));
    }
    let models = state.models()?;

    let options = parse_options_lenient(form.field("options"));
    let enhanced = modify_prompt(&prompt, &options);

    info!("Starting AI modification (model: {})", state.config.image_model);
    let input = serde_json::json!({
        "image": image.to_data_url(),
        "prompt": enhanced,
        "negative_prompt": MODIFY_NEGATIVE_PROMPT,
        "num_inference_steps": 25,
        "guidance_scale": 8.0,
        "scheduler": "K_EULER",
    });

    let output = models
        .run(&state.config.image_model, input)
        .await
        .map_err(|e| ApiError::provider(FAILURE, e))?;

    let modified_image = output.first().clone();
    if modified_image.is_null() {
        return Err(ApiError::internal(FAILURE, "model returned no image"));
    }
    info!("AI modification completed");

    Ok(Json(ModifyImageResponse {
        success: true,
        modified_image,
        prompt,
    }))
}
