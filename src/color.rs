use image::RgbImage;
use image::imageops::FilterType;
use serde::Serialize;

use crate::category::{CategoryMeta, SubScore};
use crate::raster::{relative_luminance, resize_to_width, rgb_to_hsv};

const REFERENCE_WIDTH: u32 = 256;
const HUE_BINS: usize = 12;
// A bin counts as present once it holds more than 0.05% of the pixels.
const HUE_BIN_MIN_SHARE: f64 = 0.0005;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ColorMeta {
    pub contrast_sd: f64,
    pub hue_diversity: f64,
    pub sampled_pixels: usize,
}

/// Luminance spread and hue diversity of the rendered page.
pub fn analyze_colors(raster: &RgbImage) -> SubScore {
    let (width, height) = raster.dimensions();
    if width == 0 || height == 0 {
        return SubScore::new(0.0, CategoryMeta::ColorContrast(ColorMeta::default()));
    }

    let sample = resize_to_width(raster, REFERENCE_WIDTH, FilterType::Triangle);
    let total = sample.width() as usize * sample.height() as usize;

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut bins = [0usize; HUE_BINS];
    for pixel in sample.pixels() {
        let lum = relative_luminance(pixel);
        sum += lum;
        sum_sq += lum * lum;

        // Hue quantized the way an 8-bit HSV channel stores it, binned over 0..=255.
        let (hue, _, _) = rgb_to_hsv(pixel);
        let hue_byte = (hue * 255.0).floor().clamp(0.0, 255.0);
        let bin = ((hue_byte / 255.0) * HUE_BINS as f64) as usize;
        bins[bin.min(HUE_BINS - 1)] += 1;
    }

    let mean = sum / total as f64;
    let variance = (sum_sq / total as f64 - mean * mean).max(0.0);
    let contrast = libm::sqrt(variance);

    let threshold = total as f64 * HUE_BIN_MIN_SHARE;
    let present = bins.iter().filter(|&&n| n as f64 > threshold).count();
    let diversity = present as f64 / HUE_BINS as f64;

    let raw = contrast * 180.0 + diversity * 40.0;
    tracing::debug!(contrast, diversity, raw, "color analysis");
    SubScore::new(
        raw,
        CategoryMeta::ColorContrast(ColorMeta {
            contrast_sd: contrast,
            hue_diversity: diversity,
            sampled_pixels: total,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn meta(score: &SubScore) -> &ColorMeta {
        match &score.meta {
            CategoryMeta::ColorContrast(meta) => meta,
            other => panic!("unexpected meta {other:?}"),
        }
    }

    #[test]
    fn uniform_image_scores_near_zero() {
        let img = RgbImage::from_pixel(300, 200, Rgb([240, 240, 240]));
        let score = analyze_colors(&img);
        assert!(score.value <= 5, "got {}", score.value);
        assert!(meta(&score).contrast_sd < 1e-9);
        assert_eq!(meta(&score).sampled_pixels, 256 * 170);
    }

    #[test]
    fn black_and_white_halves_have_high_contrast() {
        let img = RgbImage::from_fn(256, 64, |x, _| {
            if x < 128 { Rgb([0, 0, 0]) } else { Rgb([255, 255, 255]) }
        });
        let score = analyze_colors(&img);
        // sd of a 50/50 split between 0 and 1 is 0.5.
        assert!((meta(&score).contrast_sd - 0.5).abs() < 0.02);
        assert!(score.value >= 90);
    }

    #[test]
    fn more_hues_raise_diversity() {
        let mono = RgbImage::from_pixel(256, 32, Rgb([200, 30, 30]));
        let rainbow = RgbImage::from_fn(256, 32, |x, _| match x / 43 {
            0 => Rgb([220, 30, 30]),
            1 => Rgb([220, 220, 30]),
            2 => Rgb([30, 220, 30]),
            3 => Rgb([30, 220, 220]),
            4 => Rgb([30, 30, 220]),
            _ => Rgb([220, 30, 220]),
        });
        let a = analyze_colors(&mono);
        let b = analyze_colors(&rainbow);
        assert!(meta(&b).hue_diversity > meta(&a).hue_diversity);
    }

    #[test]
    fn empty_raster_is_zero() {
        let score = analyze_colors(&RgbImage::new(0, 0));
        assert_eq!(score.value, 0);
        assert_eq!(meta(&score), &ColorMeta::default());
    }
}
