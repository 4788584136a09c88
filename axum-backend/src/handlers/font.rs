use axum::{
    extract::{multipart::MultipartRejection, Multipart, State},
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ApiResult;
use crate::prompt::{font_fallback_analysis, FONT_ANALYSIS_PROMPT};
use crate::state::AppState;
use crate::upload::UploadForm;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FontResponse {
    pub success: bool,
    pub analysis: String,
    /// Same text as `analysis`; the chat panel reads this key
    pub font_analysis: String,
    pub timestamp: String,
}

impl FontResponse {
    fn new(analysis: String) -> Self {
        Self {
            success: true,
            font_analysis: analysis.clone(),
            analysis,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// POST /api/recognize-font
///
/// Provider failures are not surfaced as errors: the client gets generic
/// font-matching advice instead.
pub async fn recognize_font_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<FontResponse>> {
    info!("Font recognition request received");

    let mut form = UploadForm::read(multipart?).await?;
    info!(
        "Received data: has_image={}, image_size={}",
        form.has_image(),
        form.image_size()
    );

    let image = form.take_image("Please upload an image with text to analyze")?;
    let models = state.models()?;

    info!("Starting font analysis (model: {})", state.config.text_model);
    let input = serde_json::json!({
        "prompt": FONT_ANALYSIS_PROMPT,
        "image": image.to_data_url(),
        "max_tokens": 1500,
        "temperature": 0.3,
        "top_p": 0.9,
    });

    match models.run(&state.config.text_model, input).await {
        Ok(output) => {
            let analysis = output.text();
            info!("Font analysis completed ({} chars)", analysis.len());
            Ok(Json(FontResponse::new(analysis)))
        }
        Err(e) => {
            warn!("Font recognition error: {}", e);
            Ok(Json(FontResponse::new(font_fallback_analysis(&e.to_string()))))
        }
    }
}
