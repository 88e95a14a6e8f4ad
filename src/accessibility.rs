use serde::Serialize;

use crate::category::{CategoryMeta, SubScore};
use crate::dom;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AccessibilityMeta {
    pub images_total: usize,
    pub images_with_alt: usize,
    pub images_without_alt: usize,
    pub aria_attrs: usize,
    pub roles: usize,
    pub labels: usize,
}

pub fn analyze_accessibility(html: &str) -> SubScore {
    let document = dom::parse(html);

    let images = dom::select_all(&document, "img");
    let images_total = images.len();
    let images_with_alt = images
        .iter()
        .filter(|img| {
            dom::attr(img, "alt")
                .map(|alt| !alt.trim().is_empty())
                .unwrap_or(false)
        })
        .count();

    // Attribute names are open-ended (aria-label, aria-describedby, ...), so
    // match on the prefix instead of a fixed list.
    let mut aria_attrs = 0usize;
    let mut roles = 0usize;
    for element in dom::elements(&document) {
        let attrs = element.attributes.borrow();
        aria_attrs += attrs
            .map
            .keys()
            .filter(|name| is_aria_attribute(&name.local))
            .count();
        if attrs.contains("role") {
            roles += 1;
        }
    }
    let labels = dom::count(&document, "label");

    let alt_ratio = images_with_alt as f64 / images_total.max(1) as f64;
    let hints = (aria_attrs + roles + labels) as f64;
    let raw = 40.0 + (alt_ratio * 30.0).min(30.0) + hints.min(30.0);
    let meta = AccessibilityMeta {
        images_total,
        images_with_alt,
        images_without_alt: images_total - images_with_alt,
        aria_attrs,
        roles,
        labels,
    };
    tracing::debug!(
        images_total,
        images_with_alt,
        aria_attrs,
        roles,
        labels,
        raw,
        "accessibility analysis"
    );
    SubScore::new(raw, CategoryMeta::Accessibility(meta))
}

/// Attribute names may carry any characters, so compare bytes rather than
/// slicing the str.
fn is_aria_attribute(name: &str) -> bool {
    name.as_bytes()
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(b"aria-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(score: &SubScore) -> &AccessibilityMeta {
        match &score.meta {
            CategoryMeta::Accessibility(meta) => meta,
            other => panic!("unexpected meta {other:?}"),
        }
    }

    #[test]
    fn images_without_alt_score_forty() {
        let score = analyze_accessibility("<img src=a.png><img src=b.png alt=''>");
        assert_eq!(score.value, 40);
        assert_eq!(meta(&score).images_without_alt, 2);
    }

    #[test]
    fn page_without_images_gets_no_alt_credit() {
        assert_eq!(analyze_accessibility("<p>text</p>").value, 40);
    }

    #[test]
    fn aria_prefix_roles_and_labels_count() {
        let html = r#"
            <button aria-label="Close" ARIA-Expanded="false" role="button">x</button>
            <nav role="navigation" aria-describedby="d"></nav>
            <label for="q">Search</label><input id="q" data-aria="no">
            <img src="logo.png" alt="Logo"><img src="x.png">"#;
        let score = analyze_accessibility(html);
        let meta = meta(&score);
        assert_eq!(meta.aria_attrs, 3);
        assert_eq!(meta.roles, 2);
        assert_eq!(meta.labels, 1);
        assert_eq!(meta.images_with_alt, 1);
        // 40 + 15 + 6
        assert_eq!(score.value, 61);
    }

    #[test]
    fn non_ascii_attribute_names_are_tolerated() {
        let score = analyze_accessibility("<div aaaa\u{e9}=\"x\" aria-\u{e9}t\u{e9}=\"y\">");
        assert_eq!(meta(&score).aria_attrs, 1);
        assert!(is_aria_attribute("ARIA-hidden"));
        assert!(!is_aria_attribute("aaaa\u{e9}"));
        assert!(!is_aria_attribute("\u{e9}"));
        assert!(!is_aria_attribute("aria"));
    }

    #[test]
    fn full_marks_cap_at_hundred() {
        let labels: String = (0..40).map(|i| format!("<label>{i}</label>")).collect();
        let html = format!("<img alt=a src=a>{labels}");
        assert_eq!(analyze_accessibility(&html).value, 100);
    }
}
