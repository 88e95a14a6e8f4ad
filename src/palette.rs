//! Palette extraction: dominant colors by adaptive quantization, plus small
//! saturated accents (brand colors, CTAs) and accents found along edges
//! (logos, icons) that a pure frequency ranking would drop.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::raster::{downscale_longest, rgb_to_hsv};

const DOMINANT_MAX_SIDE: u32 = 768;
const SATURATED_MAX_SIDE: u32 = 600;
const SATURATED_LIMIT: usize = 8;
const SATURATED_MIN_S: f64 = 0.48;
const SATURATED_MIN_V: f64 = 0.24;
const MAX_ENTRIES: usize = 28;
const MAX_QUANTIZED_COLORS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaletteOptions {
    pub max_colors: usize,
    pub min_percent: f64,
}

impl Default for PaletteOptions {
    fn default() -> Self {
        Self {
            max_colors: 16,
            min_percent: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaletteEntry {
    pub hex: String,
    /// Share of the downscaled image; 0.0 for accent entries.
    pub percent: f64,
    pub rgb: [u8; 3],
}

impl PaletteEntry {
    fn new(rgb: [u8; 3], percent: f64) -> Self {
        Self {
            hex: hex_of(rgb),
            percent,
            rgb,
        }
    }
}

pub fn hex_of([r, g, b]: [u8; 3]) -> String {
    format!("#{r:02X}{g:02X}{b:02X}")
}

pub fn extract_palette(raster: &RgbImage, options: &PaletteOptions) -> Vec<PaletteEntry> {
    let (w, h) = raster.dimensions();
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let base = downscale_longest(raster, DOMINANT_MAX_SIDE);

    let dominant = dominant_colors(&base, options);
    let saturated = saturated_colors(&base);
    let edge = edge_accent_colors(&base);
    tracing::debug!(
        dominant = dominant.len(),
        saturated = saturated.len(),
        edge = edge.len(),
        "palette passes"
    );

    let mut out: Vec<PaletteEntry> = Vec::new();
    for entry in dominant.into_iter().chain(saturated).chain(edge) {
        if out.iter().any(|seen| seen.hex == entry.hex) {
            continue;
        }
        out.push(entry);
        if out.len() >= MAX_ENTRIES {
            break;
        }
    }

    if out.is_empty() {
        if let Some((rgb, _)) = ranked_counts(base.pixels().map(|p| p.0)).into_iter().next() {
            out.push(PaletteEntry::new(rgb, 100.0));
        }
    }
    out
}

/// Counts colors and orders them most frequent first, ties by ascending RGB.
fn ranked_counts(pixels: impl Iterator<Item = [u8; 3]>) -> Vec<([u8; 3], u32)> {
    let mut counts: HashMap<[u8; 3], u32> = HashMap::new();
    for rgb in pixels {
        *counts.entry(rgb).or_insert(0) += 1;
    }
    let mut ranked: Vec<([u8; 3], u32)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
}

fn dominant_colors(base: &RgbImage, options: &PaletteOptions) -> Vec<PaletteEntry> {
    let total = base.width() as u64 * base.height() as u64;
    if total == 0 {
        return Vec::new();
    }
    let max_colors = options.max_colors.clamp(1, MAX_QUANTIZED_COLORS);

    let mut histogram = ranked_counts(base.pixels().map(|p| p.0));
    histogram.sort_by(|a, b| a.0.cmp(&b.0));
    let boxes = median_cut(histogram, max_colors);

    let mut quantized: HashMap<[u8; 3], u64> = HashMap::new();
    for color_box in &boxes {
        *quantized.entry(color_box.mean()).or_insert(0) += color_box.population();
    }
    let mut ranked: Vec<([u8; 3], u64)> = quantized.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    ranked
        .into_iter()
        .take(max_colors)
        .filter_map(|(rgb, count)| {
            let pct = count as f64 / total as f64 * 100.0;
            (pct >= options.min_percent)
                .then(|| PaletteEntry::new(rgb, (pct * 100.0).round() / 100.0))
        })
        .collect()
}

struct ColorBox {
    colors: Vec<([u8; 3], u32)>,
}

impl ColorBox {
    fn population(&self) -> u64 {
        self.colors.iter().map(|(_, n)| *n as u64).sum()
    }

    /// Widest channel and its extent.
    fn widest_channel(&self) -> (usize, u8) {
        let mut best = (0usize, 0u8);
        for channel in 0..3 {
            let lo = self.colors.iter().map(|(c, _)| c[channel]).min().unwrap_or(0);
            let hi = self.colors.iter().map(|(c, _)| c[channel]).max().unwrap_or(0);
            if hi - lo > best.1 {
                best = (channel, hi - lo);
            }
        }
        best
    }

    fn mean(&self) -> [u8; 3] {
        let population = self.population().max(1);
        let mut sums = [0u64; 3];
        for (rgb, n) in &self.colors {
            for channel in 0..3 {
                sums[channel] += rgb[channel] as u64 * *n as u64;
            }
        }
        sums.map(|sum| ((sum + population / 2) / population).min(255) as u8)
    }

    /// Splits at the pixel-weighted median of the widest channel. Both halves
    /// keep at least one distinct color.
    fn split(mut self) -> (ColorBox, ColorBox) {
        let (channel, _) = self.widest_channel();
        self.colors
            .sort_by(|a, b| a.0[channel].cmp(&b.0[channel]).then(a.0.cmp(&b.0)));
        let half = self.population() / 2;
        let mut acc = 0u64;
        let mut cut = 1usize;
        for (idx, (_, n)) in self.colors.iter().enumerate() {
            acc += *n as u64;
            if acc >= half {
                cut = idx + 1;
                break;
            }
        }
        let cut = cut.clamp(1, self.colors.len() - 1);
        let upper = self.colors.split_off(cut);
        (self, ColorBox { colors: upper })
    }
}

fn median_cut(histogram: Vec<([u8; 3], u32)>, max_boxes: usize) -> Vec<ColorBox> {
    let mut boxes = vec![ColorBox { colors: histogram }];
    while boxes.len() < max_boxes {
        // Widest splittable box first; population, then position, break ties.
        let candidate = boxes
            .iter()
            .enumerate()
            .filter(|(_, b)| b.colors.len() > 1)
            .max_by(|(ia, a), (ib, b)| {
                a.widest_channel()
                    .1
                    .cmp(&b.widest_channel().1)
                    .then(a.population().cmp(&b.population()))
                    .then(ib.cmp(ia))
            })
            .map(|(idx, _)| idx);
        let Some(idx) = candidate else {
            break;
        };
        let (lower, upper) = boxes.swap_remove(idx).split();
        boxes.push(lower);
        boxes.push(upper);
    }
    boxes
}

fn saturated_colors(base: &RgbImage) -> Vec<PaletteEntry> {
    let sample = downscale_longest(base, SATURATED_MAX_SIDE);
    let picked = sample.pixels().filter(|p| {
        let (_, s, v) = rgb_to_hsv(p);
        s >= SATURATED_MIN_S && v >= SATURATED_MIN_V
    });
    ranked_counts(picked.map(|p| p.0))
        .into_iter()
        .take(SATURATED_LIMIT)
        .map(|(rgb, _)| PaletteEntry::new(rgb, 0.0))
        .collect()
}

#[cfg(feature = "edge-accents")]
fn edge_accent_colors(base: &RgbImage) -> Vec<PaletteEntry> {
    use crate::raster::{luma, sobel_magnitude};

    const EDGE_MAX_SIDE: u32 = 640;
    const EDGE_QUANTILE: f64 = 0.88;
    const EDGE_LIMIT: usize = 10;
    const EDGE_MIN_S: f64 = 0.42;
    const EDGE_MIN_V: f64 = 0.20;

    let sample = downscale_longest(base, EDGE_MAX_SIDE);
    let (w, h) = (sample.width() as usize, sample.height() as usize);
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let gray: Vec<f32> = sample.pixels().map(|p| luma(p) as f32 / 255.0).collect();
    let magnitude = sobel_magnitude(&gray, w, h);
    let threshold = quantile(&magnitude, EDGE_QUANTILE);

    let picked = sample
        .pixels()
        .zip(magnitude.iter())
        .filter(|(_, m)| **m >= threshold)
        .map(|(p, _)| p)
        .filter(|p| {
            let (_, s, v) = rgb_to_hsv(p);
            s >= EDGE_MIN_S && v >= EDGE_MIN_V
        });
    ranked_counts(picked.map(|p| p.0))
        .into_iter()
        .take(EDGE_LIMIT)
        .map(|(rgb, _)| PaletteEntry::new(rgb, 0.0))
        .collect()
}

#[cfg(not(feature = "edge-accents"))]
fn edge_accent_colors(_base: &RgbImage) -> Vec<PaletteEntry> {
    Vec::new()
}

/// Linear-interpolated quantile, `q` in `0.0..=1.0`.
#[cfg_attr(not(feature = "edge-accents"), allow(dead_code))]
fn quantile(values: &[f32], q: f64) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = (pos - lo as f64) as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}
