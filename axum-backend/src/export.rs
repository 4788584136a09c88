//! Download encodings for a vectorized result.
//!
//! Only PNG and SVG are real files. PDF, EPS, DXF and AI are fixed text
//! templates around the base64 payload so users get something with the
//! right extension; they are not valid documents for those formats.

use base64::{
    alphabet,
    engine::{general_purpose::STANDARD, DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::options::VectorizationOptions;

pub const EXPORT_BASENAME: &str = "armandos-vector";
const CANVAS_SIZE: u32 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Png,
    Svg,
    Pdf,
    Eps,
    Dxf,
    Ai,
}

impl ExportFormat {
    /// Unknown or missing formats fall back to PNG
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("svg") => ExportFormat::Svg,
            Some("pdf") => ExportFormat::Pdf,
            Some("eps") => ExportFormat::Eps,
            Some("dxf") => ExportFormat::Dxf,
            Some("ai") => ExportFormat::Ai,
            _ => ExportFormat::Png,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Svg => "svg",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Eps => "eps",
            ExportFormat::Dxf => "dxf",
            ExportFormat::Ai => "ai",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Svg => "image/svg+xml",
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Eps => "application/postscript",
            ExportFormat::Dxf => "application/dxf",
            ExportFormat::Ai => "application/illustrator",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.{}", EXPORT_BASENAME, self.extension())
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Image data is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
}

/// A rendered download
#[derive(Debug, Clone)]
pub struct Export {
    pub bytes: Vec<u8>,
    pub format: ExportFormat,
}

impl Export {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.format.file_name())
    }
}

/// Strip an optional `data:<mime>;base64,` prefix and decode the payload
pub fn decode_image_data(image_data: &str) -> Result<Vec<u8>, ExportError> {
    let trimmed = image_data.trim();
    let payload = match trimmed.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map(|(_, data)| data).unwrap_or(rest),
        None => trimmed,
    };
    // Browser-style decoding: whitespace ignored, URL-safe alphabet and missing padding accepted
    let normalized: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();
    Ok(LENIENT.decode(normalized)?)
}

const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

pub fn render(format: ExportFormat, image: &[u8], options: &VectorizationOptions) -> Export {
    let bytes = match format {
        ExportFormat::Png => image.to_vec(),
        ExportFormat::Svg if looks_like_svg(image) => image.to_vec(),
        ExportFormat::Svg => svg_wrapper(image, options).into_bytes(),
        ExportFormat::Pdf => pdf_template(image).into_bytes(),
        ExportFormat::Eps => eps_template(image, options).into_bytes(),
        ExportFormat::Dxf => dxf_template().into_bytes(),
        ExportFormat::Ai => ai_template(image, &chrono::Utc::now().to_rfc3339()).into_bytes(),
    };

    Export { bytes, format }
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(512)];
    String::from_utf8_lossy(head).contains("<svg")
}

fn svg_wrapper(image: &[u8], options: &VectorizationOptions) -> String {
    let size = CANVAS_SIZE;
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink"
     width="{size}" height="{size}" viewBox="0 0 {size} {size}">
  <desc>Armando's Vector - AI Generated</desc>
  <image width="{size}" height="{size}" xlink:href="data:image/png;base64,{data}"/>
  <metadata>
    <armandos-vector>
      <mode>{mode}</mode>
      <detail>{detail}%</detail>
      <colors>{colors}</colors>
      <print-optimized>{print}</print-optimized>
    </armandos-vector>
  </metadata>
</svg>"#,
        data = STANDARD.encode(image),
        mode = mode_name(options),
        detail = options.detail_level,
        colors = options.color_count,
        print = if options.optimize_for_print { "yes" } else { "no" },
    )
}

fn pdf_template(image: &[u8]) -> String {
    let size = CANVAS_SIZE;
    format!(
        "%PDF-1.4
1 0 obj
<<
/Type /Catalog
/Pages 2 0 R
>>
endobj

2 0 obj
<<
/Type /Pages
/Kids [3 0 R]
/Count 1
>>
endobj

3 0 obj
<<
/Type /Page
/Parent 2 0 R
/MediaBox [0 0 {size} {size}]
/Contents 4 0 R
/Resources << /XObject << /Im1 5 0 R >> >>
>>
endobj

4 0 obj
<<
/Length 100
>>
stream
q
{size} 0 0 {size} 0 0 cm
/Im1 Do
Q
endstream
endobj

5 0 obj
<<
/Type /XObject
/Subtype /Image
/Width {size}
/Height {size}
/ColorSpace /DeviceRGB
/BitsPerComponent 8
/Filter /DCTDecode
/Length {len}
>>
stream
{data}
endstream
endobj

xref
0 6
0000000000 65535 f
0000000009 00000 n
0000000058 00000 n
0000000115 00000 n
0000000214 00000 n
0000000321 00000 n
trailer
<<
/Size 6
/Root 1 0 R
>>
startxref
{startxref}
%%EOF",
        len = image.len(),
        data = STANDARD.encode(image),
        startxref = 1000 + image.len(),
    )
}

fn eps_template(image: &[u8], options: &VectorizationOptions) -> String {
    let size = CANVAS_SIZE;
    format!(
        "%!PS-Adobe-3.0 EPSF-3.0
%%BoundingBox: 0 0 {size} {size}
%%Creator: Armando's Vector AI
%%Title: Vectorized Image
%%EndComments

% Image data (base64 encoded)
/armandos-vector-data ({data}) def

% Metadata
/ArmandosVectorMode ({mode}) def
/ArmandosVectorDetail {detail} def
/ArmandosVectorColors {colors} def

% Drawing commands
{size} {size} scale
0 0 1 setrgbcolor
fill

showpage
%%EOF",
        data = STANDARD.encode(image),
        mode = mode_name(options),
        detail = options.detail_level,
        colors = options.color_count,
    )
}

fn dxf_template() -> String {
    let extent = format!("{}.0", CANVAS_SIZE);
    [
        "0", "SECTION", "2", "HEADER", "9", "$ACADVER", "1", "AC1009", "0", "ENDSEC",
        "0", "SECTION", "2", "ENTITIES", "0", "IMAGE", "8", "0",
        "10", "0.0", "20", "0.0", "30", "0.0",
        "11", extent.as_str(), "21", extent.as_str(), "31", "0.0",
        "0", "ENDSEC", "0", "EOF",
    ]
    .join("\n")
}

fn ai_template(image: &[u8], generated_at: &str) -> String {
    let size = CANVAS_SIZE;
    format!(
        "%!PS-Adobe-3.0
%%Creator: Armando's Vector AI
%%Title: Vectorized Design
%%BoundingBox: 0 0 {size} {size}

% Adobe Illustrator compatible format
% Image reference: data:image/png;base64,{data}

% Metadata
% Mode: Vector
% Generated: {generated_at}

showpage
%%EOF",
        data = STANDARD.encode(image),
    )
}

fn mode_name(options: &VectorizationOptions) -> String {
    serde_json::to_value(options.mode)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "standard".to_string())
}
