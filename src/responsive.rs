use serde::Serialize;
use std::collections::BTreeMap;

use crate::category::{CategoryMeta, SubScore};
use crate::dom::{self, MEDIA_RE};

/// Utility-framework breakpoint prefixes (`md:flex`, `2xl:hidden`, ...).
pub const BREAKPOINTS: [&str; 5] = ["sm", "md", "lg", "xl", "2xl"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponsiveMeta {
    pub viewport: bool,
    pub media_queries: usize,
    pub breakpoints: BTreeMap<String, usize>,
}

impl ResponsiveMeta {
    pub fn breakpoint_hints(&self) -> usize {
        self.breakpoints.values().sum()
    }
}

pub fn analyze_responsive(html: &str) -> SubScore {
    let document = dom::parse(html);

    let viewport = dom::select_all(&document, "meta[name]").iter().any(|meta| {
        dom::attr(meta, "name")
            .map(|name| name.trim().eq_ignore_ascii_case("viewport"))
            .unwrap_or(false)
    });

    let mut media_queries = MEDIA_RE.find_iter(&dom::stylesheet_text(&document)).count();
    for style in dom::inline_styles(&document) {
        media_queries += MEDIA_RE.find_iter(&style).count();
    }

    let mut breakpoints: BTreeMap<String, usize> = BREAKPOINTS
        .iter()
        .map(|name| (name.to_string(), 0))
        .collect();
    for token in dom::class_tokens(&document) {
        let Some((prefix, rest)) = token.split_once(':') else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }
        if let Some(count) = breakpoints.get_mut(prefix) {
            *count += 1;
        }
    }

    let meta = ResponsiveMeta {
        viewport,
        media_queries,
        breakpoints,
    };
    let hints = meta.media_queries + meta.breakpoint_hints();
    let raw = 50.0 + if viewport { 25.0 } else { -10.0 } + (hints as f64 * 0.5).min(35.0);
    tracing::debug!(viewport, hints, raw, "responsive analysis");
    SubScore::new(raw, CategoryMeta::Responsive(meta))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(score: &SubScore) -> &ResponsiveMeta {
        match &score.meta {
            CategoryMeta::Responsive(meta) => meta,
            other => panic!("unexpected meta {other:?}"),
        }
    }

    #[test]
    fn missing_viewport_scores_forty() {
        let score = analyze_responsive("<p>desktop only</p>");
        assert_eq!(score.value, 40);
        assert!(!meta(&score).viewport);
    }

    #[test]
    fn viewport_meta_is_case_insensitive() {
        let score = analyze_responsive(r#"<meta name="Viewport" content="width=device-width">"#);
        assert!(meta(&score).viewport);
        assert_eq!(score.value, 75);
    }

    #[test]
    fn breakpoints_are_tracked_per_prefix() {
        let html = r#"
            <style>@media (max-width: 600px) { p { margin: 0 } } @media print {}</style>
            <div class="md:flex lg:grid 2xl:hidden xl:block hover:underline sm:"></div>"#;
        let score = analyze_responsive(html);
        let meta = meta(&score);
        assert_eq!(meta.media_queries, 2);
        assert_eq!(meta.breakpoints["md"], 1);
        assert_eq!(meta.breakpoints["xl"], 1);
        assert_eq!(meta.breakpoints["2xl"], 1);
        assert_eq!(meta.breakpoints["sm"], 0);
        // 50 - 10 + round((2 + 4) * 0.5)
        assert_eq!(score.value, 43);
    }

    #[test]
    fn hint_bonus_is_capped() {
        let classes: Vec<String> = (0..200).map(|i| format!("md:p-{i}")).collect();
        let html = format!(
            "<meta name=viewport content=x><div class=\"{}\"></div>",
            classes.join(" ")
        );
        assert_eq!(analyze_responsive(&html).value, 100);
    }
}
