//! Analyzer configuration. Every field has a default, so an empty JSON object
//! is a complete configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::category::Category;
use crate::error::{AnalyzerError, Result};
use crate::palette::PaletteOptions;
use crate::scoring::{
    ALL_GOOD_TIP, LabelTable, LabelThreshold, TipRule, TipRules, WeightTable,
    default_label_thresholds, default_tip_rules,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Category display names (or snake_case keys) to weights.
    pub weights: BTreeMap<String, f64>,
    pub labels: Vec<LabelThreshold>,
    pub tips: Vec<TipRule>,
    pub all_good_tip: String,
    pub palette: PaletteOptions,
    pub capture_timeout_secs: u64,
    pub history_capacity: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            weights: Category::ALL
                .into_iter()
                .map(|category| {
                    let weight = WeightTable::default().get(category).unwrap_or(0.0);
                    (category.name().to_string(), weight)
                })
                .collect(),
            labels: default_label_thresholds(),
            tips: default_tip_rules(),
            all_good_tip: ALL_GOOD_TIP.to_string(),
            palette: PaletteOptions::default(),
            capture_timeout_secs: 75,
            history_capacity: 50,
        }
    }
}

impl AnalyzerConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Resolved and validated weights.
    pub fn weight_table(&self) -> Result<WeightTable> {
        let table = WeightTable::from_named(&self.weights)?;
        table.validate()?;
        Ok(table)
    }

    pub fn label_table(&self) -> Result<LabelTable> {
        LabelTable::new(self.labels.clone())
    }

    pub fn tip_rules(&self) -> Result<TipRules> {
        if self.all_good_tip.trim().is_empty() {
            return Err(AnalyzerError::InvalidConfiguration(
                "all_good_tip must not be empty".to_string(),
            ));
        }
        if let Some(rule) = self.tips.iter().find(|rule| rule.text.trim().is_empty()) {
            return Err(AnalyzerError::InvalidConfiguration(format!(
                "tip for '{}' has no text",
                rule.category
            )));
        }
        Ok(TipRules {
            rules: self.tips.clone(),
            all_good: self.all_good_tip.clone(),
        })
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs.max(1))
    }

    /// Checks every resolved form at once.
    pub fn validate(&self) -> Result<()> {
        self.weight_table()?;
        self.label_table()?;
        self.tip_rules()?;
        if self.palette.max_colors == 0 {
            return Err(AnalyzerError::InvalidConfiguration(
                "palette.max_colors must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_is_default() {
        let config = AnalyzerConfig::from_json_str("{}").expect("parse");
        assert_eq!(config, AnalyzerConfig::default());
        assert!(config.validate().is_ok());
        assert_eq!(config.capture_timeout(), Duration::from_secs(75));
        assert_eq!(config.history_capacity, 50);
        let weights = config.weight_table().expect("weights");
        assert_eq!(weights.get(Category::Typography), Some(0.25));
        assert!((weights.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let raw = r#"{
            "palette": { "max_colors": 8 },
            "tips": [
                { "category": "Typography", "threshold": 70, "text": "Use a clear H1." },
                { "category": "responsive", "threshold": 95, "text": "Add breakpoints." }
            ]
        }"#;
        let config = AnalyzerConfig::from_json_str(raw).expect("parse");
        assert_eq!(config.palette.max_colors, 8);
        assert_eq!(config.palette.min_percent, 0.5);
        let rules = config.tip_rules().expect("rules");
        assert_eq!(rules.rules.len(), 2);
        assert_eq!(rules.rules[1].category, Category::Responsive);
        assert_eq!(config.labels.len(), 5);
    }

    #[test]
    fn missing_weight_is_reported() {
        let raw = r#"{ "weights": {
            "Typography": 0.3, "Color & Contrast": 0.3,
            "Layout & Structure": 0.2, "Responsive": 0.2
        } }"#;
        let config = AnalyzerConfig::from_json_str(raw).expect("parse");
        assert!(matches!(
            config.weight_table(),
            Err(AnalyzerError::MissingWeight(Category::Accessibility))
        ));
    }

    #[test]
    fn bad_labels_and_json_are_errors() {
        let config = AnalyzerConfig::from_json_str(
            r#"{ "labels": [ { "min_score": 50, "label": "Pass" } ] }"#,
        )
        .expect("parse");
        assert!(matches!(
            config.label_table(),
            Err(AnalyzerError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            AnalyzerConfig::from_json_str("{ not json"),
            Err(AnalyzerError::Json(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("analyzer.json");
        std::fs::write(&path, r#"{ "capture_timeout_secs": 10 }"#).expect("write");
        let config = AnalyzerConfig::from_path(&path).expect("load");
        assert_eq!(config.capture_timeout(), Duration::from_secs(10));
    }
}
