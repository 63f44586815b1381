use super::traits::{ConfigManifest, ConfigSection, FieldManifest};
use crate::error::TapholdError;
use crate::types::Mode;
use serde::{Deserialize, Serialize};

/// Scoring parameters of the fitness evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessConfig {
    /// Hold recall below which the imbalance penalty applies. Unset means the
    /// mode's default.
    pub min_positive_recall: Option<f64>,
    pub penalty_scale: f64,
    /// Errors larger than this count as this much.
    pub max_error_considered: f64,
    pub min_overlap_ms: Option<f64>,
    pub max_overlap_ms: Option<f64>,
    /// Node count at which the complexity term saturates.
    pub max_node_count: usize,
    pub sample_per_program: bool,
    pub sample_size: usize,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            min_positive_recall: None,
            penalty_scale: 200_000.0,
            max_error_considered: 100_000.0,
            min_overlap_ms: Some(39.0),
            max_overlap_ms: Some(232.0),
            max_node_count: 333,
            sample_per_program: false,
            sample_size: 32_768,
        }
    }
}

impl FitnessConfig {
    pub fn min_positive_recall_for(&self, mode: Mode) -> f64 {
        self.min_positive_recall
            .unwrap_or_else(|| mode.default_min_positive_recall())
    }
}

impl ConfigSection for FitnessConfig {
    fn section_name() -> &'static str {
        "fitness"
    }

    fn validate(&self) -> Result<(), TapholdError> {
        if let Some(recall) = self.min_positive_recall {
            if !(0.0..=1.0).contains(&recall) {
                return Err(TapholdError::Configuration(
                    "min_positive_recall must be between 0 and 1".to_string(),
                ));
            }
        }
        if !(self.penalty_scale >= 0.0) {
            return Err(TapholdError::Configuration(
                "penalty_scale must not be negative".to_string(),
            ));
        }
        if !(self.max_error_considered > 0.0) {
            return Err(TapholdError::Configuration(
                "max_error_considered must be positive".to_string(),
            ));
        }
        if let (Some(min), Some(max)) = (self.min_overlap_ms, self.max_overlap_ms) {
            if min > max {
                return Err(TapholdError::Configuration(format!(
                    "min_overlap_ms ({}) exceeds max_overlap_ms ({})",
                    min, max
                )));
            }
        }
        if self.max_node_count == 0 {
            return Err(TapholdError::Configuration(
                "max_node_count must be at least 1".to_string(),
            ));
        }
        if self.sample_per_program && self.sample_size < 2 {
            return Err(TapholdError::Configuration(
                "sample_size must be at least 2 when sampling".to_string(),
            ));
        }
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        ConfigManifest {
            section: "Fitness".to_string(),
            fields: vec![
                FieldManifest::new(
                    "min_positive_recall",
                    "float?",
                    serde_json::json!(self.min_positive_recall),
                    "Hold recall below which the imbalance penalty applies",
                )
                .range(Some(0.0), Some(1.0)),
                FieldManifest::new(
                    "penalty_scale",
                    "float",
                    serde_json::json!(self.penalty_scale),
                    "Loss added per unit of missing hold recall",
                )
                .range(Some(0.0), None),
                FieldManifest::new(
                    "max_error_considered",
                    "float",
                    serde_json::json!(self.max_error_considered),
                    "Cap on a single sample's error",
                ),
                FieldManifest::new(
                    "min_overlap_ms",
                    "float?",
                    serde_json::json!(self.min_overlap_ms),
                    "Lower clamp of the estimated overlap",
                ),
                FieldManifest::new(
                    "max_overlap_ms",
                    "float?",
                    serde_json::json!(self.max_overlap_ms),
                    "Upper clamp of the estimated overlap",
                ),
                FieldManifest::new(
                    "max_node_count",
                    "integer",
                    serde_json::json!(self.max_node_count),
                    "Tree size at which the complexity term saturates",
                )
                .range(Some(1.0), None),
                FieldManifest::new(
                    "sample_per_program",
                    "bool",
                    serde_json::json!(self.sample_per_program),
                    "Score each candidate on a random sample instead of the full data",
                ),
                FieldManifest::new(
                    "sample_size",
                    "integer",
                    serde_json::json!(self.sample_size),
                    "Rows per sample, split over both halves of the data",
                )
                .range(Some(2.0), None),
            ],
        }
    }
}
