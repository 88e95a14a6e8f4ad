use serde::Serialize;

use crate::category::{CategoryMeta, SubScore};
use crate::dom::{self, FONT_FAMILY_RE, FONT_SIZE_RE, GOOGLE_FAMILY_RE, TEXT_SIZE_CLASS_RE};

const MAX_FAMILIES: usize = 8;
const MAX_SIZES: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TypographyMeta {
    pub headings: usize,
    /// Counts for `h1` through `h6`.
    pub heading_levels: [usize; 6],
    pub has_h1: bool,
    pub has_h2: bool,
    pub sized_elements: usize,
    pub families: Vec<String>,
    pub sizes: Vec<String>,
}

pub fn analyze_typography(html: &str) -> SubScore {
    let document = dom::parse(html);

    let mut heading_levels = [0usize; 6];
    for (idx, slot) in heading_levels.iter_mut().enumerate() {
        *slot = dom::count(&document, &format!("h{}", idx + 1));
    }
    let headings: usize = heading_levels.iter().sum();
    let has_h1 = heading_levels[0] > 0;
    let has_h2 = heading_levels[1] > 0;
    let sized_elements = dom::count(&document, r#"[style*="font-size"], [class*="text-"]"#);

    let mut raw = 50.0;
    raw += if has_h1 { 10.0 } else { -10.0 };
    if has_h2 {
        raw += 8.0;
    }
    raw += (headings as f64 * 3.0).min(20.0);
    raw += (sized_elements as f64 * 0.5).min(20.0);

    let meta = TypographyMeta {
        headings,
        heading_levels,
        has_h1,
        has_h2,
        sized_elements,
        families: font_families(&document),
        sizes: font_sizes(&document),
    };
    tracing::debug!(headings, has_h1, has_h2, sized_elements, raw, "typography analysis");
    SubScore::new(raw, CategoryMeta::Typography(meta))
}

fn font_families(document: &kuchiki::NodeRef) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();

    for link in dom::select_all(document, "link[href]") {
        let href = dom::attr(&link, "href").unwrap_or_default();
        if href.contains("fonts.googleapis.com") {
            for cap in GOOGLE_FAMILY_RE.captures_iter(&href) {
                found.push(cap[1].replace('+', " "));
            }
        }
        if href.contains("use.typekit.net") {
            found.push("Adobe Fonts (Typekit)".to_string());
        }
    }

    let stylesheet = dom::stylesheet_text(document);
    for cap in FONT_FAMILY_RE.captures_iter(&stylesheet) {
        found.push(cap[1].trim().to_string());
    }
    for style in dom::inline_styles(document) {
        for cap in FONT_FAMILY_RE.captures_iter(&style) {
            found.push(cap[1].trim().to_string());
        }
    }

    let classes = dom::class_tokens(document);
    for (hint, family) in [
        ("font-sans", "sans-serif"),
        ("font-serif", "serif"),
        ("font-mono", "monospace"),
    ] {
        if classes.iter().any(|c| c == hint) {
            found.push(family.to_string());
        }
    }

    // Split stacks like "Inter, system-ui" and dedup case-insensitively.
    let mut out: Vec<String> = Vec::new();
    for stack in found {
        for part in stack.split(',') {
            let name = part.trim().trim_matches(|c| c == '\'' || c == '"').trim();
            if name.is_empty() || out.iter().any(|seen| seen.eq_ignore_ascii_case(name)) {
                continue;
            }
            out.push(name.to_string());
        }
    }
    out.truncate(MAX_FAMILIES);
    out
}

fn font_sizes(document: &kuchiki::NodeRef) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let stylesheet = dom::stylesheet_text(document);
    for cap in FONT_SIZE_RE.captures_iter(&stylesheet) {
        found.push(format!("{}{}", &cap[1], cap[2].to_ascii_lowercase()));
    }
    for style in dom::inline_styles(document) {
        for cap in FONT_SIZE_RE.captures_iter(&style) {
            found.push(format!("{}{}", &cap[1], cap[2].to_ascii_lowercase()));
        }
    }
    for class in dom::class_tokens(document) {
        if let Some(cap) = TEXT_SIZE_CLASS_RE.captures(&class) {
            found.push(format!("text-{}", &cap[1]));
        }
    }

    let mut out: Vec<String> = Vec::new();
    for size in found {
        if !out.contains(&size) {
            out.push(size);
        }
        if out.len() >= MAX_SIZES {
            break;
        }
    }
    out
}
