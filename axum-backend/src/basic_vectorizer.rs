//! Basic (offline) vectorization: a rectangle mosaic built from the most
//! frequent quantized colors of a downsampled bitmap.

use std::collections::HashMap;
use std::fmt::Write as _;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{imageops::FilterType, DynamicImage, GenericImageView, RgbaImage};
use serde::Serialize;
use thiserror::Error;

use crate::options::VectorizationOptions;

/// Maximum Euclidean RGB distance between a cell and a palette color for the cell to be drawn
pub const MATCH_THRESHOLD: f64 = 48.0;

const MIN_GRID_CELLS: u32 = 32;
const GRID_CELL_RANGE: u32 = 224;
const ALPHA_CUTOFF: u8 = 128;

#[derive(Debug, Error)]
pub enum VectorizeError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Image has no pixels")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaletteEntry {
    pub color: String,
    pub pixel_count: usize,
    pub rect_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicVectorization {
    #[serde(skip)]
    pub svg: String,
    pub width: u32,
    pub height: u32,
    pub grid_width: u32,
    pub grid_height: u32,
    pub rect_count: usize,
    pub palette: Vec<PaletteEntry>,
}

impl BasicVectorization {
    pub fn to_data_url(&self) -> String {
        format!("data:image/svg+xml;base64,{}", STANDARD.encode(self.svg.as_bytes()))
    }
}

/// One retained histogram bucket
#[derive(Debug, Clone)]
struct Bucket {
    key: [u8; 3],
    count: usize,
    color: [u8; 3],
}

/// Decode `image_bytes` and run the mosaic sampler on it
pub fn vectorize_basic(
    image_bytes: &[u8],
    options: &VectorizationOptions,
) -> Result<BasicVectorization, VectorizeError> {
    let img = image::load_from_memory(image_bytes)?;
    vectorize_image(&img, options)
}

pub fn vectorize_image(
    img: &DynamicImage,
    options: &VectorizationOptions,
) -> Result<BasicVectorization, VectorizeError> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(VectorizeError::Empty);
    }

    let (grid_width, grid_height) = grid_size(width, height, options.clamped_detail_level());
    let sampled = image::imageops::resize(&img.to_rgba8(), grid_width, grid_height, FilterType::Nearest);
    let cells = sample_cells(&sampled, options.is_negative());

    let color_count = options.clamped_color_count();
    let bucket_width = (256 / color_count).max(1) as u8;
    let mut buckets = rank_buckets(&cells, bucket_width);
    buckets.truncate(color_count as usize);

    if options.remove_background && !buckets.is_empty() {
        buckets.remove(0);
    }

    let cell_w = width as f64 / grid_width as f64;
    let cell_h = height as f64 / grid_height as f64;

    let mut svg = String::new();
    let _ = writeln!(svg, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" shape-rendering="crispEdges">"#,
        w = width,
        h = height
    );
    if !options.remove_background {
        let background = if options.is_negative() { "#000000" } else { "#ffffff" };
        let _ = writeln!(
            svg,
            r#"  <rect width="{}" height="{}" fill="{}"/>"#,
            width, height, background
        );
    }

    let mut palette = Vec::with_capacity(buckets.len());
    let mut rect_count = 0;

    for bucket in &buckets {
        let hex = hex_color(bucket.color);
        let mut rects = 0;
        let _ = writeln!(svg, r#"  <g fill="{}">"#, hex);

        for gy in 0..grid_height {
            for gx in 0..grid_width {
                let Some(pixel) = cells[(gy * grid_width + gx) as usize] else {
                    continue;
                };
                if color_distance(pixel, bucket.color) <= MATCH_THRESHOLD {
                    let _ = writeln!(
                        svg,
                        r#"    <rect x="{}" y="{}" width="{}" height="{}"/>"#,
                        fmt_coord(gx as f64 * cell_w),
                        fmt_coord(gy as f64 * cell_h),
                        fmt_coord(cell_w),
                        fmt_coord(cell_h)
                    );
                    rects += 1;
                }
            }
        }

        let _ = writeln!(svg, "  </g>");
        rect_count += rects;
        palette.push(PaletteEntry {
            color: hex,
            pixel_count: bucket.count,
            rect_count: rects,
        });
    }

    svg.push_str("</svg>\n");

    Ok(BasicVectorization {
        svg,
        width,
        height,
        grid_width,
        grid_height,
        rect_count,
        palette,
    })
}

/// Grid dimensions: the long side gets 32..=256 cells depending on detail,
/// never more cells than the image has pixels.
pub fn grid_size(width: u32, height: u32, detail_level: u32) -> (u32, u32) {
    let long_side = width.max(height);
    let target = (MIN_GRID_CELLS + detail_level.min(100) * GRID_CELL_RANGE / 100).min(long_side);
    let scale = target as f64 / long_side as f64;

    let grid_w = ((width as f64 * scale).round() as u32).max(1);
    let grid_h = ((height as f64 * scale).round() as u32).max(1);
    (grid_w, grid_h)
}

fn sample_cells(sampled: &RgbaImage, invert: bool) -> Vec<Option<[u8; 3]>> {
    sampled
        .pixels()
        .map(|p| {
            if p[3] < ALPHA_CUTOFF {
                None
            } else if invert {
                Some([255 - p[0], 255 - p[1], 255 - p[2]])
            } else {
                Some([p[0], p[1], p[2]])
            }
        })
        .collect()
}

/// Histogram of quantized colors, most frequent first. Each bucket's color is
/// the rounded mean of its member cells.
fn rank_buckets(cells: &[Option<[u8; 3]>], bucket_width: u8) -> Vec<Bucket> {
    let mut sums: HashMap<[u8; 3], (usize, [u64; 3])> = HashMap::new();

    for pixel in cells.iter().flatten() {
        let key = [
            pixel[0] / bucket_width,
            pixel[1] / bucket_width,
            pixel[2] / bucket_width,
        ];
        let entry = sums.entry(key).or_insert((0, [0; 3]));
        entry.0 += 1;
        for (acc, channel) in entry.1.iter_mut().zip(pixel) {
            *acc += *channel as u64;
        }
    }

    let mut buckets: Vec<Bucket> = sums
        .into_iter()
        .map(|(key, (count, sum))| {
            let mean = |c: u64| ((c as f64 / count as f64).round() as u64).min(255) as u8;
            Bucket {
                key,
                count,
                color: [mean(sum[0]), mean(sum[1]), mean(sum[2])],
            }
        })
        .collect();

    buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    buckets
}

fn color_distance(a: [u8; 3], b: [u8; 3]) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| {
            let d = x as f64 - y as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

fn hex_color(c: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", c[0], c[1], c[2])
}

/// Two decimals at most, without trailing zeros
fn fmt_coord(v: f64) -> String {
    let s = format!("{:.2}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
