//! Best-effort signal extraction from page markup.
//!
//! Everything here is heuristic: class-name substring scans, regexes over
//! inline styles and stylesheet text, attribute-name prefix matching. The
//! parser (html5ever through kuchiki) accepts any input, so malformed markup
//! only ever yields fewer signals.

use kuchiki::iter::NodeIterator;
use kuchiki::traits::TendrilSink;
use kuchiki::{ElementData, NodeDataRef, NodeRef};
use regex::Regex;
use std::sync::LazyLock;

pub(crate) static FONT_FAMILY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)font-family\s*:\s*([^;}{]+)").expect("font-family regex"));

pub(crate) static FONT_SIZE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)font-size\s*:\s*([0-9.]+)(px|rem|em|%)").expect("font-size regex")
});

pub(crate) static TEXT_SIZE_CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^text-([xsmlg0-9.-]+)$").expect("text size class regex"));

pub(crate) static DISPLAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)display\s*:\s*(inline-)?(grid|flex)\b").expect("display regex")
});

pub(crate) static GOOGLE_FAMILY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"family=([^:&]+)").expect("google fonts regex"));

pub(crate) static MEDIA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)@media\b").expect("media regex"));

pub(crate) type Element = NodeDataRef<ElementData>;

pub(crate) fn parse(html: &str) -> NodeRef {
    kuchiki::parse_html().one(html)
}

pub(crate) fn elements(document: &NodeRef) -> impl Iterator<Item = Element> + '_ {
    document.descendants().elements()
}

/// Elements matching a CSS selector; an unsupported selector matches nothing.
pub(crate) fn select_all(document: &NodeRef, selector: &str) -> Vec<Element> {
    match document.select(selector) {
        Ok(iter) => iter.collect(),
        Err(()) => Vec::new(),
    }
}

pub(crate) fn count(document: &NodeRef, selector: &str) -> usize {
    select_all(document, selector).len()
}

pub(crate) fn exists(document: &NodeRef, selector: &str) -> bool {
    document.select_first(selector).is_ok()
}

pub(crate) fn attr(element: &Element, name: &str) -> Option<String> {
    element.attributes.borrow().get(name).map(str::to_string)
}

/// Every whitespace-separated class token in document order.
pub(crate) fn class_tokens(document: &NodeRef) -> Vec<String> {
    let mut out = Vec::new();
    for element in elements(document) {
        if let Some(class) = attr(&element, "class") {
            out.extend(class.split_whitespace().map(str::to_string));
        }
    }
    out
}

pub(crate) fn inline_styles(document: &NodeRef) -> Vec<String> {
    elements(document)
        .filter_map(|element| attr(&element, "style"))
        .collect()
}

/// Concatenated text of all `<style>` blocks.
pub(crate) fn stylesheet_text(document: &NodeRef) -> String {
    select_all(document, "style")
        .iter()
        .map(|style| style.as_node().text_contents())
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn local_name(element: &Element) -> String {
    element.name.local.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_markup_still_parses() {
        let doc = parse("<div class='a b'><p>unclosed <span style='font-size: 12px'>");
        assert_eq!(class_tokens(&doc), vec!["a", "b"]);
        assert_eq!(inline_styles(&doc).len(), 1);
        let empty = parse("");
        assert!(class_tokens(&empty).is_empty());
        assert!(!exists(&empty, "h1"));
    }

    #[test]
    fn invalid_selector_matches_nothing() {
        let doc = parse("<p>x</p>");
        assert_eq!(count(&doc, "p[["), 0);
        assert_eq!(count(&doc, "p"), 1);
    }

    #[test]
    fn stylesheet_text_joins_blocks() {
        let doc = parse("<style>a{}</style><body><style>@media (x){}</style></body>");
        let text = stylesheet_text(&doc);
        assert!(text.contains("a{}") && text.contains("@media"));
    }

    #[test]
    fn display_regex_tolerates_spacing() {
        assert!(DISPLAY_RE.is_match("display : grid"));
        assert!(DISPLAY_RE.is_match("DISPLAY:inline-flex"));
        assert!(!DISPLAY_RE.is_match("display: block"));
    }
}
