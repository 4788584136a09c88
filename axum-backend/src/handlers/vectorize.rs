use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::basic_vectorizer::{vectorize_basic, BasicVectorization, VectorizeError};
use crate::error::{ApiError, ApiResult};
use crate::options::{parse_options, VectorizationOptions};
use crate::prompt::{vectorize_prompt, VECTORIZE_NEGATIVE_PROMPT};
use crate::state::AppState;
use crate::upload::{UploadForm, UploadedImage};

const FAILURE: &str = "Failed to vectorize image";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorizeMode {
    Basic,
    Ai,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorizeResponse {
    pub success: bool,
    pub mode: VectorizeMode,
    pub vectorized_image: Value,
    pub options: VectorizationOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<BasicVectorization>,
}

/// POST /api/vectorize
///
/// Multipart form: `image` (file), `options` (JSON), `useAI` ("true" for the hosted model).
pub async fn vectorize_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<VectorizeResponse>> {
    info!("Vectorization request received");

    let mut form = UploadForm::read(multipart?).await?;
    let use_ai = form
        .field("useAI")
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    info!(
        "Received data: has_image={}, image_size={}, has_options={}, use_ai={}",
        form.has_image(),
        form.image_size(),
        form.field("options").is_some(),
        use_ai
    );

    let image = form.take_image("Please upload an image to vectorize")?;

    if use_ai {
        let models = state.models()?;
        let options = read_options(&form)?;
        vectorize_with_model(&state, models.as_ref(), image, options).await
    } else {
        let options = read_options(&form)?;
        vectorize_locally(image, options).await
    }
}

fn read_options(form: &UploadForm) -> ApiResult<VectorizationOptions> {
    let options = parse_options(form.field("options")).map_err(|e| {
        warn!("Failed to parse options: {}", e);
        ApiError::bad_request("Invalid options format", "Could not parse vectorization options")
    })?;
    info!("Vectorization options: {:?}", options);
    Ok(options)
}

async fn vectorize_locally(
    image: UploadedImage,
    options: VectorizationOptions,
) -> ApiResult<Json<VectorizeResponse>> {
    let opts = options.clone();
    let result = tokio::task::spawn_blocking(move || vectorize_basic(&image.bytes, &opts))
        .await
        .map_err(|e| ApiError::internal(FAILURE, e))?
        .map_err(|e| match e {
            VectorizeError::Decode(_) | VectorizeError::Empty => {
                warn!("Basic vectorization rejected the image: {}", e);
                ApiError::bad_request("Invalid image", e.to_string())
            }
        })?;

    info!(
        "Basic vectorization complete: {}x{} grid, {} colors, {} rects",
        result.grid_width,
        result.grid_height,
        result.palette.len(),
        result.rect_count
    );

    Ok(Json(VectorizeResponse {
        success: true,
        mode: VectorizeMode::Basic,
        vectorized_image: Value::String(result.to_data_url()),
        message: Some(format!(
            "Basic mode: {} colors, {} shapes",
            result.palette.len(),
            result.rect_count
        )),
        options,
        stats: Some(result),
    }))
}

async fn vectorize_with_model(
    state: &AppState,
    models: &dyn replicate_client::ModelRunner,
    image: UploadedImage,
    options: VectorizationOptions,
) -> ApiResult<Json<VectorizeResponse>> {
    let prompt = vectorize_prompt(&options);
    info!("Starting AI vectorization (model: {})", state.config.image_model);

    let input = serde_json::json!({
        "image": image.to_data_url(),
        "prompt": prompt,
        "negative_prompt": VECTORIZE_NEGATIVE_PROMPT,
        "num_inference_steps": 30,
        "guidance_scale": 7.5,
        "scheduler": "K_EULER",
    });

    let output = models
        .run(&state.config.image_model, input)
        .await
        .map_err(|e| ApiError::provider(FAILURE, e))?;

    let result = output.first().clone();
    if result.is_null() {
        return Err(ApiError::internal(FAILURE, "model returned no image"));
    }
    info!("AI vectorization completed");

    Ok(Json(VectorizeResponse {
        success: true,
        mode: VectorizeMode::Ai,
        vectorized_image: result,
        options,
        message: None,
        stats: None,
    }))
}
