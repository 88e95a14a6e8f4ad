//! Pixel-level helpers shared by the image analyzers, the palette extractor
//! and the report renderer.

use base64::Engine;
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

use crate::error::{AnalyzerError, Result};

/// Where a screenshot comes from: a file on disk or an inline `data:` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScreenshotSource {
    Path(PathBuf),
    DataUri(String),
}

impl ScreenshotSource {
    pub fn from_raw(raw: &str) -> Self {
        if raw.starts_with("data:") {
            ScreenshotSource::DataUri(raw.to_string())
        } else {
            ScreenshotSource::Path(PathBuf::from(raw))
        }
    }
}

impl From<&Path> for ScreenshotSource {
    fn from(value: &Path) -> Self {
        ScreenshotSource::Path(value.to_path_buf())
    }
}

impl From<PathBuf> for ScreenshotSource {
    fn from(value: PathBuf) -> Self {
        ScreenshotSource::Path(value)
    }
}

pub fn load_rgb(source: &ScreenshotSource) -> Result<RgbImage> {
    let bytes = match source {
        ScreenshotSource::Path(path) => std::fs::read(path)?,
        ScreenshotSource::DataUri(uri) => parse_data_uri(uri)
            .map(|(_, data)| data)
            .ok_or_else(|| AnalyzerError::InvalidConfiguration("malformed data uri".to_string()))?,
    };
    let decoded = image::load_from_memory(&bytes)?;
    Ok(decoded.to_rgb8())
}

pub(crate) fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, data_part) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|m| !m.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.contains("base64") {
        base64::engine::general_purpose::STANDARD
            .decode(data_part.trim())
            .ok()?
    } else {
        data_part.as_bytes().to_vec()
    };
    Some((mime, data))
}

/// Shrinks so the longest side is at most `max_side`. Never enlarges.
pub(crate) fn downscale_longest(image: &RgbImage, max_side: u32) -> Cow<'_, RgbImage> {
    let (w, h) = image.dimensions();
    let longest = w.max(h);
    if longest == 0 || longest <= max_side {
        return Cow::Borrowed(image);
    }
    let scale = max_side as f64 / longest as f64;
    let nw = ((w as f64 * scale) as u32).max(1);
    let nh = ((h as f64 * scale) as u32).max(1);
    Cow::Owned(image::imageops::resize(image, nw, nh, FilterType::Lanczos3))
}

/// Resamples to an exact width, keeping the aspect ratio (height >= 1).
pub(crate) fn resize_to_width(image: &RgbImage, width: u32, filter: FilterType) -> RgbImage {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 || w == width {
        return image.clone();
    }
    let height = ((h as f64 * width as f64 / w as f64) as u32).max(1);
    image::imageops::resize(image, width.max(1), height, filter)
}

fn srgb_to_linear(channel: u8) -> f64 {
    let c = channel as f64 / 255.0;
    if c <= 0.03928 {
        c / 12.92
    } else {
        libm::pow((c + 0.055) / 1.055, 2.4)
    }
}

/// WCAG relative luminance in `0.0..=1.0`.
pub(crate) fn relative_luminance(pixel: &Rgb<u8>) -> f64 {
    let [r, g, b] = pixel.0;
    0.2126 * srgb_to_linear(r) + 0.7152 * srgb_to_linear(g) + 0.0722 * srgb_to_linear(b)
}

/// Hue in `0.0..1.0`, saturation and value in `0.0..=1.0`. Achromatic
/// pixels report hue 0.
pub(crate) fn rgb_to_hsv(pixel: &Rgb<u8>) -> (f64, f64, f64) {
    let [r, g, b] = pixel.0.map(|c| c as f64 / 255.0);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let s = if max > 0.0 { delta / max } else { 0.0 };
    if delta <= 0.0 {
        return (0.0, s, max);
    }
    let h = if max == r {
        ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        (b - r) / delta + 2.0
    } else {
        (r - g) / delta + 4.0
    };
    ((h / 6.0).rem_euclid(1.0), s, max)
}

/// ITU-R 601 luma, the classic 8-bit grayscale conversion.
pub(crate) fn luma(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0.map(|c| c as u32);
    ((r * 299 + g * 587 + b * 114 + 500) / 1000) as u8
}

/// Sobel gradient magnitude over a row-major grayscale buffer. Borders
/// replicate the nearest pixel.
#[cfg_attr(not(feature = "edge-accents"), allow(dead_code))]
pub(crate) fn sobel_magnitude(gray: &[f32], width: usize, height: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; width * height];
    if width == 0 || height == 0 || gray.len() < width * height {
        return out;
    }
    let at = |x: isize, y: isize| -> f32 {
        let cx = x.clamp(0, width as isize - 1) as usize;
        let cy = y.clamp(0, height as isize - 1) as usize;
        gray[cy * width + cx]
    };
    for y in 0..height as isize {
        for x in 0..width as isize {
            let gx = (at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2.0 * at(x - 1, y) + at(x - 1, y + 1));
            let gy = (at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2.0 * at(x, y - 1) + at(x + 1, y - 1));
            out[y as usize * width + x as usize] = libm::sqrtf(gx * gx + gy * gy);
        }
    }
    out
}
