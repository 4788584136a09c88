use std::collections::HashMap;

use axum::extract::Multipart;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;

use crate::error::{ApiError, ApiResult};

/// Image file taken from a multipart upload, with a verified MIME type
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl UploadedImage {
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

/// Fields of a multipart form; the `image` part is kept as raw bytes
#[derive(Debug, Default)]
pub struct UploadForm {
    image: Option<(Option<String>, Vec<u8>)>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = UploadForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request("Invalid form data", e.to_string()))?
        {
            let name = field.name().unwrap_or("").to_string();
            if name == "image" {
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request("Invalid form data", e.to_string()))?;
                if !data.is_empty() {
                    form.image = Some((content_type, data.to_vec()));
                }
            } else if !name.is_empty() {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request("Invalid form data", e.to_string()))?;
                form.fields.insert(name, text);
            }
        }

        Ok(form)
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    pub fn image_size(&self) -> usize {
        self.image.as_ref().map(|(_, bytes)| bytes.len()).unwrap_or(0)
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Take the uploaded image, or fail with a 400 carrying `details`
    pub fn take_image(&mut self, details: &str) -> ApiResult<UploadedImage> {
        let (declared, bytes) = self
            .image
            .take()
            .ok_or_else(|| ApiError::bad_request("No image provided", details))?;

        let mime_type = resolve_mime(declared.as_deref(), &bytes).ok_or_else(|| {
            ApiError::bad_request(
                "Unsupported image format",
                "Please upload a PNG, JPEG, GIF, WebP or BMP image",
            )
        })?;

        Ok(UploadedImage { bytes, mime_type })
    }
}

/// Accept the browser's declared type when it is a supported raster format,
/// sniff the bytes when the type is missing or generic.
fn resolve_mime(declared: Option<&str>, bytes: &[u8]) -> Option<&'static str> {
    let declared = declared.map(|t| t.trim().to_ascii_lowercase());
    match declared.as_deref() {
        Some("image/png") => Some("image/png"),
        Some("image/jpeg") | Some("image/jpg") => Some("image/jpeg"),
        Some("image/gif") => Some("image/gif"),
        Some("image/webp") => Some("image/webp"),
        Some("image/bmp") | Some("image/x-ms-bmp") => Some("image/bmp"),
        None | Some("") | Some("application/octet-stream") => match image::guess_format(bytes).ok()? {
            ImageFormat::Png => Some("image/png"),
            ImageFormat::Jpeg => Some("image/jpeg"),
            ImageFormat::Gif => Some("image/gif"),
            ImageFormat::WebP => Some("image/webp"),
            ImageFormat::Bmp => Some("image/bmp"),
            _ => None,
        },
        Some(_) => None,
    }
}
