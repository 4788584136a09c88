use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const MIN_COLOR_COUNT: u32 = 2;
pub const MAX_COLOR_COUNT: u32 = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorizationMode {
    #[default]
    Standard,
    Artistic,
    Logo,
    Photo,
    Sketch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Positive,
    Negative,
}

/// User-selected knobs sent alongside an upload.
///
/// Deserialization is per-field lenient: an unknown mode, a `null`, or a
/// value of the wrong type leaves that field at its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawOptions")]
pub struct VectorizationOptions {
    pub mode: VectorizationMode,
    pub color_mode: ColorMode,
    /// 0-100
    pub detail_level: u32,
    /// 0-100
    pub smoothness: u32,
    pub color_count: u32,
    pub preserve_colors: bool,
    pub remove_background: bool,
    pub optimize_for_print: bool,
}

impl Default for VectorizationOptions {
    fn default() -> Self {
        Self {
            mode: VectorizationMode::Standard,
            color_mode: ColorMode::Positive,
            detail_level: 75,
            smoothness: 50,
            color_count: 16,
            preserve_colors: true,
            remove_background: false,
            optimize_for_print: false,
        }
    }
}

impl VectorizationOptions {
    pub fn clamped_color_count(&self) -> u32 {
        self.color_count.clamp(MIN_COLOR_COUNT, MAX_COLOR_COUNT)
    }

    pub fn clamped_detail_level(&self) -> u32 {
        self.detail_level.min(100)
    }

    pub fn is_negative(&self) -> bool {
        self.color_mode == ColorMode::Negative
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOptions {
    #[serde(default, deserialize_with = "lenient")]
    mode: Option<VectorizationMode>,
    #[serde(default, deserialize_with = "lenient")]
    color_mode: Option<ColorMode>,
    #[serde(default, deserialize_with = "lenient_number")]
    detail_level: Option<u32>,
    #[serde(default, deserialize_with = "lenient_number")]
    smoothness: Option<u32>,
    #[serde(default, deserialize_with = "lenient_number")]
    color_count: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    preserve_colors: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    remove_background: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    optimize_for_print: Option<bool>,
}

impl From<RawOptions> for VectorizationOptions {
    fn from(raw: RawOptions) -> Self {
        let defaults = Self::default();
        Self {
            mode: raw.mode.unwrap_or(defaults.mode),
            color_mode: raw.color_mode.unwrap_or(defaults.color_mode),
            detail_level: raw.detail_level.unwrap_or(defaults.detail_level),
            smoothness: raw.smoothness.unwrap_or(defaults.smoothness),
            color_count: raw.color_count.unwrap_or(defaults.color_count),
            preserve_colors: raw.preserve_colors.unwrap_or(defaults.preserve_colors),
            remove_background: raw.remove_background.unwrap_or(defaults.remove_background),
            optimize_for_print: raw.optimize_for_print.unwrap_or(defaults.optimize_for_print),
        }
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Any finite JSON number, rounded and saturated into `u32`
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_f64()
        .filter(|n| n.is_finite())
        .map(|n| n.round().clamp(0.0, u32::MAX as f64) as u32))
}

#[derive(Debug, Error)]
#[error("Could not parse vectorization options: {0}")]
pub struct OptionsError(#[from] serde_json::Error);

/// Parse the `options` form field. Absent or blank input yields the defaults.
pub fn parse_options(raw: Option<&str>) -> Result<VectorizationOptions, OptionsError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(VectorizationOptions::default()),
        Some(json) => Ok(serde_json::from_str(json)?),
    }
}

/// Like [`parse_options`] but never fails; used where options are only advisory.
pub fn parse_options_lenient(raw: Option<&str>) -> VectorizationOptions {
    parse_options(raw).unwrap_or_default()
}
