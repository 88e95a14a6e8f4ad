//! Weighted aggregation of the per-category analyzers, score labels and
//! threshold-driven recommendations.

use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::accessibility::analyze_accessibility;
use crate::category::{Category, CategoryMeta, SubScore, clamp_score};
use crate::color::analyze_colors;
use crate::error::{AnalyzerError, Result};
use crate::layout::analyze_layout;
use crate::responsive::analyze_responsive;
use crate::typography::analyze_typography;

const WEIGHT_SUM_TOLERANCE: f64 = 0.02;

#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable(BTreeMap<Category, f64>);

impl Default for WeightTable {
    fn default() -> Self {
        Self(BTreeMap::from([
            (Category::Typography, 0.25),
            (Category::ColorContrast, 0.20),
            (Category::LayoutStructure, 0.20),
            (Category::Responsive, 0.20),
            (Category::Accessibility, 0.15),
        ]))
    }
}

impl WeightTable {
    pub fn new(weights: BTreeMap<Category, f64>) -> Self {
        Self(weights)
    }

    /// Builds a table from display-name (or snake_case) keys. Unknown keys are
    /// rejected; completeness is checked by [`WeightTable::validate`].
    pub fn from_named(weights: &BTreeMap<String, f64>) -> Result<Self> {
        let mut out = BTreeMap::new();
        for (name, weight) in weights {
            let category = Category::from_name(name).ok_or_else(|| {
                AnalyzerError::InvalidConfiguration(format!("unknown weight category '{name}'"))
            })?;
            out.insert(category, *weight);
        }
        Ok(Self(out))
    }

    pub fn validate(&self) -> Result<()> {
        for category in Category::ALL {
            let Some(weight) = self.0.get(&category) else {
                return Err(AnalyzerError::MissingWeight(category));
            };
            if !weight.is_finite() || *weight < 0.0 {
                return Err(AnalyzerError::InvalidConfiguration(format!(
                    "weight for '{category}' must be a finite non-negative number, got {weight}"
                )));
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            tracing::warn!(sum, "category weights do not sum to 1.0");
        }
        Ok(())
    }

    pub fn get(&self, category: Category) -> Option<f64> {
        self.0.get(&category).copied()
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelThreshold {
    pub min_score: u8,
    pub label: String,
}

impl LabelThreshold {
    pub fn new(min_score: u8, label: impl Into<String>) -> Self {
        Self {
            min_score,
            label: label.into(),
        }
    }
}

/// Descending thresholds ending at 0, so every score maps to a label.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelTable {
    entries: Vec<LabelThreshold>,
}

impl Default for LabelTable {
    fn default() -> Self {
        Self {
            entries: default_label_thresholds(),
        }
    }
}

pub(crate) fn default_label_thresholds() -> Vec<LabelThreshold> {
    vec![
        LabelThreshold::new(90, "Outstanding"),
        LabelThreshold::new(80, "Excellent"),
        LabelThreshold::new(70, "Good"),
        LabelThreshold::new(60, "Fair"),
        LabelThreshold::new(0, "Needs Improvement"),
    ]
}

impl LabelTable {
    pub fn new(entries: Vec<LabelThreshold>) -> Result<Self> {
        let Some(last) = entries.last() else {
            return Err(AnalyzerError::InvalidConfiguration(
                "label table is empty".to_string(),
            ));
        };
        if last.min_score != 0 {
            return Err(AnalyzerError::InvalidConfiguration(format!(
                "last label threshold must be 0, got {}",
                last.min_score
            )));
        }
        if entries
            .windows(2)
            .any(|pair| pair[0].min_score <= pair[1].min_score)
        {
            return Err(AnalyzerError::InvalidConfiguration(
                "label thresholds must be strictly descending".to_string(),
            ));
        }
        Ok(Self { entries })
    }

    pub fn label_for(&self, score: u8) -> &str {
        self.entries
            .iter()
            .find(|entry| score >= entry.min_score)
            .map(|entry| entry.label.as_str())
            .unwrap_or("")
    }

    pub fn entries(&self) -> &[LabelThreshold] {
        &self.entries
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub scores: BTreeMap<Category, u8>,
    pub meta: BTreeMap<Category, CategoryMeta>,
    pub overall: u8,
    pub label: String,
}

impl ScoreBreakdown {
    pub fn score(&self, category: Category) -> Option<u8> {
        self.scores.get(&category).copied()
    }

    /// `(display name, value)` pairs in category order, as the report table
    /// expects them.
    pub fn named_scores(&self) -> Vec<(String, f64)> {
        self.scores
            .iter()
            .map(|(category, value)| (category.name().to_string(), *value as f64))
            .collect()
    }
}

pub fn make_scores(raster: &RgbImage, html: &str, weights: &WeightTable) -> Result<ScoreBreakdown> {
    make_scores_with_labels(raster, html, weights, &LabelTable::default())
}

/// Runs every analyzer and folds their results into a weighted overall
/// score. Weights are validated before any analyzer runs.
pub fn make_scores_with_labels(
    raster: &RgbImage,
    html: &str,
    weights: &WeightTable,
    labels: &LabelTable,
) -> Result<ScoreBreakdown> {
    weights.validate()?;

    let ((typography, color), (layout, (responsive, accessibility))) = rayon::join(
        || rayon::join(|| analyze_typography(html), || analyze_colors(raster)),
        || {
            rayon::join(
                || analyze_layout(html, Some(raster)),
                || {
                    rayon::join(
                        || analyze_responsive(html),
                        || analyze_accessibility(html),
                    )
                },
            )
        },
    );

    Ok(assemble(
        [typography, color, layout, responsive, accessibility],
        weights,
        labels,
    ))
}

fn assemble(parts: [SubScore; 5], weights: &WeightTable, labels: &LabelTable) -> ScoreBreakdown {
    let mut scores = BTreeMap::new();
    let mut meta = BTreeMap::new();
    let mut weighted = 0.0f64;
    for part in parts {
        weighted += weights.get(part.category).unwrap_or(0.0) * part.value as f64;
        scores.insert(part.category, part.value);
        meta.insert(part.category, part.meta);
    }
    let overall = clamp_score(weighted);
    let label = labels.label_for(overall).to_string();
    tracing::debug!(overall, label = %label, "scores assembled");
    ScoreBreakdown {
        scores,
        meta,
        overall,
        label,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TipRule {
    pub category: Category,
    /// The tip fires when the category scores strictly below this value.
    pub threshold: u8,
    pub text: String,
}

impl TipRule {
    pub fn new(category: Category, threshold: u8, text: impl Into<String>) -> Self {
        Self {
            category,
            threshold,
            text: text.into(),
        }
    }
}

pub(crate) const ALL_GOOD_TIP: &str =
    "Great job! Minor polish only: audit interactive focus styles and motion preferences.";

pub(crate) fn default_tip_rules() -> Vec<TipRule> {
    vec![
        TipRule::new(
            Category::Typography,
            80,
            "Improve typographic hierarchy and legibility (ensure clear H1/H2, adequate font sizes, and line-height).",
        ),
        TipRule::new(
            Category::LayoutStructure,
            80,
            "Optimize whitespace and layout structure; use semantic sections and consistent spacing.",
        ),
        TipRule::new(
            Category::ColorContrast,
            80,
            "Increase color contrast and reduce overly similar hues to enhance readability.",
        ),
        TipRule::new(
            Category::Responsive,
            90,
            "Add or refine responsive breakpoints and viewport meta for small screens.",
        ),
        TipRule::new(
            Category::Accessibility,
            85,
            "Add ARIA labels, ensure alt text on images, and improve keyboard navigation focus states.",
        ),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct TipRules {
    pub rules: Vec<TipRule>,
    pub all_good: String,
}

impl Default for TipRules {
    fn default() -> Self {
        Self {
            rules: default_tip_rules(),
            all_good: ALL_GOOD_TIP.to_string(),
        }
    }
}

/// One tip per rule whose category scores below its threshold, in rule
/// order. A category missing from the breakdown counts as 0. Never empty.
pub fn recommendations(breakdown: &ScoreBreakdown, rules: &TipRules) -> Vec<String> {
    let mut tips: Vec<String> = rules
        .rules
        .iter()
        .filter(|rule| breakdown.score(rule.category).unwrap_or(0) < rule.threshold)
        .map(|rule| rule.text.clone())
        .collect();
    if tips.is_empty() {
        tips.push(rules.all_good.clone());
    }
    tips
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use proptest::prelude::*;

    fn breakdown_with(values: [u8; 5]) -> ScoreBreakdown {
        ScoreBreakdown {
            scores: Category::ALL.into_iter().zip(values).collect(),
            meta: BTreeMap::new(),
            overall: 0,
            label: String::new(),
        }
    }

    #[test]
    fn missing_weight_fails_before_analysis() {
        let mut weights = BTreeMap::new();
        weights.insert("Typography".to_string(), 0.25);
        weights.insert("Color & Contrast".to_string(), 0.20);
        weights.insert("Layout & Structure".to_string(), 0.20);
        weights.insert("Responsive".to_string(), 0.35);
        let table = WeightTable::from_named(&weights).expect("known keys");
        let err = make_scores(&RgbImage::new(4, 4), "<p>x</p>", &table).expect_err("missing");
        assert!(matches!(err, AnalyzerError::MissingWeight(Category::Accessibility)));
        assert!(err.is_configuration());
    }

    #[test]
    fn unknown_and_negative_weights_are_rejected() {
        let weights = BTreeMap::from([("Motion".to_string(), 1.0)]);
        assert!(matches!(
            WeightTable::from_named(&weights),
            Err(AnalyzerError::InvalidConfiguration(_))
        ));

        let mut table = WeightTable::default();
        table.0.insert(Category::Responsive, -0.2);
        assert!(matches!(
            table.validate(),
            Err(AnalyzerError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn default_labels() {
        let labels = LabelTable::default();
        assert_eq!(labels.label_for(95), "Outstanding");
        assert_eq!(labels.label_for(90), "Outstanding");
        assert_eq!(labels.label_for(89), "Excellent");
        assert_eq!(labels.label_for(70), "Good");
        assert_eq!(labels.label_for(60), "Fair");
        assert_eq!(labels.label_for(33), "Needs Improvement");
        assert_eq!(labels.label_for(0), "Needs Improvement");
    }

    #[test]
    fn label_table_requires_descending_thresholds_ending_at_zero() {
        assert!(LabelTable::new(vec![LabelThreshold::new(50, "Ok")]).is_err());
        assert!(LabelTable::new(Vec::new()).is_err());
        assert!(
            LabelTable::new(vec![
                LabelThreshold::new(50, "Ok"),
                LabelThreshold::new(50, "Same"),
                LabelThreshold::new(0, "Low"),
            ])
            .is_err()
        );
        let table = LabelTable::new(vec![
            LabelThreshold::new(50, "Ok"),
            LabelThreshold::new(0, "Low"),
        ])
        .expect("valid");
        assert_eq!(table.label_for(49), "Low");
    }

    #[test]
    fn bare_page_with_flat_screenshot() {
        let raster = RgbImage::from_pixel(320, 240, Rgb([245, 245, 245]));
        let breakdown =
            make_scores(&raster, "<html><body><p>hi</p></body></html>", &WeightTable::default())
                .expect("scores");
        assert_eq!(breakdown.score(Category::Typography), Some(40));
        assert_eq!(breakdown.score(Category::LayoutStructure), Some(40));
        assert_eq!(breakdown.score(Category::Responsive), Some(40));
        assert_eq!(breakdown.score(Category::Accessibility), Some(40));
        let color = breakdown.score(Category::ColorContrast).expect("color");
        assert!(color <= 5);
        assert_eq!(breakdown.meta.len(), 5);
        assert!(breakdown.overall <= 34 && breakdown.overall >= 32);
        assert_eq!(breakdown.label, "Needs Improvement");
        assert_eq!(recommendations(&breakdown, &TipRules::default()).len(), 5);
    }

    #[test]
    fn overall_is_weighted_and_rounded() {
        let parts = [
            (Category::Typography, 80u8),
            (Category::ColorContrast, 61),
            (Category::LayoutStructure, 70),
            (Category::Responsive, 75),
            (Category::Accessibility, 99),
        ];
        let subs = parts.map(|(category, value)| SubScore {
            category,
            value,
            meta: CategoryMeta::Responsive(Default::default()),
        });
        let breakdown = assemble(subs, &WeightTable::default(), &LabelTable::default());
        // 20 + 12.2 + 14 + 15 + 14.85 = 76.05
        assert_eq!(breakdown.overall, 76);
        assert_eq!(breakdown.label, "Good");
    }

    #[test]
    fn tips_follow_rule_order() {
        let tips = recommendations(&breakdown_with([79, 80, 95, 95, 84]), &TipRules::default());
        assert_eq!(tips.len(), 2);
        assert!(tips[0].starts_with("Improve typographic hierarchy"));
        assert!(tips[1].starts_with("Add ARIA labels"));

        let tips = recommendations(&breakdown_with([90, 90, 90, 90, 90]), &TipRules::default());
        assert_eq!(tips, vec![ALL_GOOD_TIP.to_string()]);
    }

    #[test]
    fn responsive_threshold_is_ninety() {
        let tips = recommendations(&breakdown_with([100, 100, 100, 89, 100]), &TipRules::default());
        assert_eq!(tips.len(), 1);
        assert!(tips[0].contains("viewport"));
    }

    proptest! {
        #[test]
        fn overall_stays_in_range(values in proptest::array::uniform5(0u8..=100)) {
            let parts: Vec<SubScore> = Category::ALL
                .into_iter()
                .zip(values)
                .map(|(category, value)| SubScore {
                    category,
                    value,
                    meta: CategoryMeta::Responsive(Default::default()),
                })
                .collect();
            let parts: [SubScore; 5] = parts.try_into().expect("five parts");
            let breakdown = assemble(parts, &WeightTable::default(), &LabelTable::default());
            prop_assert!(breakdown.overall <= 100);
            let lo = *values.iter().min().expect("non-empty");
            let hi = *values.iter().max().expect("non-empty");
            prop_assert!(breakdown.overall >= lo && breakdown.overall <= hi);
        }

        #[test]
        fn every_score_has_a_label(score in 0u8..=100) {
            prop_assert!(!LabelTable::default().label_for(score).is_empty());
        }

        #[test]
        fn tips_are_never_empty(values in proptest::array::uniform5(0u8..=100)) {
            let tips = recommendations(&breakdown_with(values), &TipRules::default());
            prop_assert!(!tips.is_empty() && tips.len() <= 5);
        }
     }

    /// Tag and attribute soup: unbalanced tags, non-ASCII names, stray
    /// quotes, stylesheet fragments.
    fn markup_soup() -> impl Strategy<Value = String> {
        let name = "[a-zA-Z0-9\u{e9}\u{df}\u{4e2d}\u{1f600}:_-]{1,9}";
        let fragment = prop_oneof![
            (name, name, "[^\"]{0,12}")
                .prop_map(|(tag, attr, value)| format!("<{tag} {attr}=\"{value}\">")),
            name.prop_map(|tag| format!("</{tag}>")),
            ".{0,16}",
            Just("<img alt".to_string()),
            Just("<div class='md:flex text-lg grid' style='display: grid; font-size: 1e9px'>"
                .to_string()),
            Just("<style>@media (max-width: 1px) { a { font-family: \"".to_string()),
            Just("<meta name=viewport><h1><h2 aria-x role>".to_string()),
        ];
        proptest::collection::vec(fragment, 0..24).prop_map(|parts| parts.concat())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn analyzers_accept_arbitrary_text(html in any::<String>()) {
            for score in [
                analyze_typography(&html),
                analyze_layout(&html, None),
                analyze_responsive(&html),
                analyze_accessibility(&html),
            ] {
                prop_assert!(score.value <= 100);
            }
        }

        #[test]
        fn analyzers_accept_markup_soup(html in markup_soup()) {
            let raster = RgbImage::from_pixel(6, 6, Rgb([200, 30, 60]));
            let breakdown = make_scores(&raster, &html, &WeightTable::default())
                .expect("default weights are valid");
            prop_assert_eq!(breakdown.scores.len(), 5);
            prop_assert!(breakdown.scores.values().all(|value| *value <= 100));
            prop_assert!(breakdown.overall <= 100);
        }
    }
}
