use serde::{Deserialize, Serialize};
use std::fmt;

use crate::accessibility::AccessibilityMeta;
use crate::color::ColorMeta;
use crate::layout::LayoutMeta;
use crate::responsive::ResponsiveMeta;
use crate::typography::TypographyMeta;

/// Scored design categories, declared in report display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Typography", alias = "typography")]
    Typography,
    #[serde(rename = "Color & Contrast", alias = "color_contrast", alias = "color")]
    ColorContrast,
    #[serde(rename = "Layout & Structure", alias = "layout_structure", alias = "layout")]
    LayoutStructure,
    #[serde(rename = "Responsive", alias = "responsive")]
    Responsive,
    #[serde(rename = "Accessibility", alias = "accessibility")]
    Accessibility,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Typography,
        Category::ColorContrast,
        Category::LayoutStructure,
        Category::Responsive,
        Category::Accessibility,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Category::Typography => "Typography",
            Category::ColorContrast => "Color & Contrast",
            Category::LayoutStructure => "Layout & Structure",
            Category::Responsive => "Responsive",
            Category::Accessibility => "Accessibility",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Category::Typography => "typography",
            Category::ColorContrast => "color_contrast",
            Category::LayoutStructure => "layout_structure",
            Category::Responsive => "responsive",
            Category::Accessibility => "accessibility",
        }
    }

    /// Accepts display names case-insensitively, or snake_case keys.
    pub fn from_name(raw: &str) -> Option<Category> {
        let raw = raw.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(raw) || c.key().eq_ignore_ascii_case(raw))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CategoryMeta {
    Typography(TypographyMeta),
    ColorContrast(ColorMeta),
    LayoutStructure(LayoutMeta),
    Responsive(ResponsiveMeta),
    Accessibility(AccessibilityMeta),
}

impl CategoryMeta {
    pub fn category(&self) -> Category {
        match self {
            CategoryMeta::Typography(_) => Category::Typography,
            CategoryMeta::ColorContrast(_) => Category::ColorContrast,
            CategoryMeta::LayoutStructure(_) => Category::LayoutStructure,
            CategoryMeta::Responsive(_) => Category::Responsive,
            CategoryMeta::Accessibility(_) => Category::Accessibility,
        }
    }
}

/// One analyzer's result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubScore {
    pub category: Category,
    pub value: u8,
    pub meta: CategoryMeta,
}

impl SubScore {
    pub(crate) fn new(raw: f64, meta: CategoryMeta) -> Self {
        Self {
            category: meta.category(),
            value: clamp_score(raw),
            meta,
        }
    }
}

/// Rounds and clamps a heuristic total into `0..=100`.
pub(crate) fn clamp_score(raw: f64) -> u8 {
    if !raw.is_finite() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}
