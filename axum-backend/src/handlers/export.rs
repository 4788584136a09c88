use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::export::{decode_image_data, render, ExportFormat};
use crate::options::VectorizationOptions;
use crate::state::AppState;

const FAILURE: &str = "Failed to export image";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    #[serde(default)]
    pub image_data: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub options: Option<VectorizationOptions>,
}

/// POST /api/export
///
/// `imageData` is a data URL, bare base64, or the http(s) URL an image model returned.
pub async fn export_handler(
    State(state): State<AppState>,
    payload: Result<Json<ExportRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = payload?;
    let format = ExportFormat::parse(request.format.as_deref());
    info!("Export request received (format: {})", format.extension());

    let image_data = request
        .image_data
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| ApiError::bad_request("No image data provided", "Vectorize an image before exporting"))?;

    let image = if image_data.starts_with("http://") || image_data.starts_with("https://") {
        fetch_remote(&state, image_data).await?
    } else {
        decode_image_data(image_data).map_err(|e| {
            warn!("Export payload rejected: {}", e);
            ApiError::bad_request("Invalid image data", e.to_string())
        })?
    };

    let options = request.options.unwrap_or_default();
    let export = render(format, &image, &options);
    info!("Exported {} bytes as {}", export.bytes.len(), export.mime_type());

    Ok((
        [
            (header::CONTENT_TYPE, export.mime_type().to_string()),
            (header::CONTENT_DISPOSITION, export.content_disposition()),
        ],
        export.bytes,
    )
        .into_response())
}

/// Download a remote result image, bounded by the configured timeout and body limit
async fn fetch_remote(state: &AppState, url: &str) -> ApiResult<Vec<u8>> {
    let limit = state.config.max_upload_bytes;
    info!("Fetching remote image for export: {}", url);

    let mut response = state
        .http
        .get(url)
        .timeout(state.config.fetch_timeout)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| ApiError::internal(FAILURE, e))?;

    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(too_large(limit));
    }

    let mut bytes = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| ApiError::internal(FAILURE, e))?
    {
        if bytes.len() + chunk.len() > limit {
            return Err(too_large(limit));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

fn too_large(limit: usize) -> ApiError {
    warn!("Remote export image exceeds {} bytes", limit);
    ApiError::bad_request("Image too large", format!("Remote image exceeds {} bytes", limit))
}
