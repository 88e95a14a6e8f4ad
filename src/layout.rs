use image::RgbImage;
use serde::Serialize;

use crate::category::{CategoryMeta, SubScore};
use crate::dom::{self, DISPLAY_RE};
use crate::raster::luma;

const SECTION_SELECTOR: &str = "section, article, main, nav, aside, header, footer";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutMeta {
    pub grid_flex_hints: usize,
    pub sections: usize,
    pub paragraphs: usize,
    pub uses_grid: bool,
    pub uses_flex: bool,
    /// Share of near-white or near-black pixels, only when a raster is given.
    pub whitespace_pct: Option<f64>,
}

/// Structure score from grid/flex hints and semantic sectioning. The optional
/// raster only feeds the whitespace estimate in the metadata.
pub fn analyze_layout(html: &str, raster: Option<&RgbImage>) -> SubScore {
    let document = dom::parse(html);

    let mut grid_flex_hints = 0usize;
    let mut uses_grid = false;
    let mut uses_flex = false;
    for element in dom::elements(&document) {
        let class = dom::attr(&element, "class").unwrap_or_default();
        let style = dom::attr(&element, "style").unwrap_or_default();
        let class_grid = class.contains("grid");
        let class_flex = class.contains("flex");
        let mut style_grid = false;
        let mut style_flex = false;
        for cap in DISPLAY_RE.captures_iter(&style) {
            if cap[2].eq_ignore_ascii_case("grid") {
                style_grid = true;
            } else {
                style_flex = true;
            }
        }
        if class_grid || class_flex || style_grid || style_flex {
            grid_flex_hints += 1;
        }
        uses_grid |= class_grid || style_grid;
        uses_flex |= class_flex || style_flex;
    }

    let sections = dom::count(&document, SECTION_SELECTOR);
    let paragraphs = dom::count(&document, "p");

    let raw = 40.0
        + (grid_flex_hints as f64 * 2.0).min(30.0)
        + (sections as f64 * 3.0).min(30.0);
    let meta = LayoutMeta {
        grid_flex_hints,
        sections,
        paragraphs,
        uses_grid,
        uses_flex,
        whitespace_pct: raster.and_then(whitespace_pct),
    };
    tracing::debug!(grid_flex_hints, sections, paragraphs, raw, "layout analysis");
    SubScore::new(raw, CategoryMeta::LayoutStructure(meta))
}

/// Percentage (2 decimals) of pixels whose luma is above 240 or below 16.
pub fn whitespace_pct(raster: &RgbImage) -> Option<f64> {
    let total = raster.width() as u64 * raster.height() as u64;
    if total == 0 {
        return None;
    }
    let extremes = raster
        .pixels()
        .filter(|p| {
            let l = luma(p);
            l > 240 || l < 16
        })
        .count() as f64;
    Some((extremes / total as f64 * 10_000.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn meta(score: &SubScore) -> &LayoutMeta {
        match &score.meta {
            CategoryMeta::LayoutStructure(meta) => meta,
            other => panic!("unexpected meta {other:?}"),
        }
    }

    #[test]
    fn unstructured_page_scores_forty() {
        let score = analyze_layout("<div><p>a</p><p>b</p></div>", None);
        assert_eq!(score.value, 40);
        assert_eq!(meta(&score).paragraphs, 2);
        assert_eq!(meta(&score).whitespace_pct, None);
    }

    #[test]
    fn sections_and_hints_add_up() {
        let html = r#"
            <header></header><nav></nav><main class="grid grid-cols-3">
              <section class="flex"></section><article style="display: grid"></article>
            </main><footer></footer>"#;
        let score = analyze_layout(html, None);
        let meta = meta(&score);
        assert_eq!(meta.sections, 6);
        assert_eq!(meta.grid_flex_hints, 3);
        assert!(meta.uses_grid && meta.uses_flex);
        // 40 + 3*2 + 6*3
        assert_eq!(score.value, 64);
    }

    #[test]
    fn contributions_are_capped() {
        let body: String = (0..40).map(|_| "<section class='flex'></section>").collect();
        let score = analyze_layout(&body, None);
        assert_eq!(score.value, 100);
    }

    #[test]
    fn whitespace_counts_both_extremes() {
        let img = RgbImage::from_fn(10, 10, |x, _| match x {
            0..=3 => Rgb([255, 255, 255]),
            4..=5 => Rgb([0, 0, 0]),
            _ => Rgb([128, 128, 128]),
        });
        assert_eq!(whitespace_pct(&img), Some(60.0));
        let score = analyze_layout("<p>x</p>", Some(&img));
        assert_eq!(meta(&score).whitespace_pct, Some(60.0));
        assert_eq!(whitespace_pct(&RgbImage::new(0, 0)), None);
    }
}
