use super::traits::{ConfigManifest, ConfigSection, FieldManifest};
use crate::error::TapholdError;
use crate::types::TrainCol;
use serde::{Deserialize, Serialize};

/// How hand-written seed formulas are ranked before refinement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedingConfig {
    /// Seeds kept and reported after ranking.
    pub keep_best: usize,
    /// Hill-climb the constants of the best seed.
    pub refine_best: bool,
    /// Column whose first occurrence in the best seed is replaced by the
    /// integer constant that scores best. Unset skips the search.
    pub initial_value_column: Option<TrainCol>,
    pub initial_value_from: i64,
    pub initial_value_to: i64,
    /// Bisect the range instead of scanning it in steps of 100.
    pub initial_value_binary_search: bool,
}

impl Default for SeedingConfig {
    fn default() -> Self {
        Self {
            keep_best: 10,
            refine_best: false,
            initial_value_column: None,
            initial_value_from: 0,
            initial_value_to: 200,
            initial_value_binary_search: false,
        }
    }
}

impl ConfigSection for SeedingConfig {
    fn section_name() -> &'static str {
        "seeding"
    }

    fn validate(&self) -> Result<(), TapholdError> {
        if self.keep_best == 0 {
            return Err(TapholdError::Configuration(
                "keep_best must be at least 1".to_string(),
            ));
        }
        if self.initial_value_from > self.initial_value_to {
            return Err(TapholdError::Configuration(format!(
                "initial_value_from ({}) must not exceed initial_value_to ({})",
                self.initial_value_from, self.initial_value_to
            )));
        }
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        ConfigManifest {
            section: "Seeding".to_string(),
            fields: vec![
                FieldManifest::new(
                    "keep_best",
                    "integer",
                    serde_json::json!(self.keep_best),
                    "Seed formulas kept after ranking",
                )
                .range(Some(1.0), None),
                FieldManifest::new(
                    "refine_best",
                    "bool",
                    serde_json::json!(self.refine_best),
                    "Refine the constants of the best seed",
                ),
                FieldManifest::new(
                    "initial_value_column",
                    "column?",
                    serde_json::json!(self.initial_value_column),
                    "Column replaced by the best scoring constant, no search when unset",
                ),
                FieldManifest::new(
                    "initial_value_from",
                    "integer",
                    serde_json::json!(self.initial_value_from),
                    "First value tried for the column",
                ),
                FieldManifest::new(
                    "initial_value_to",
                    "integer",
                    serde_json::json!(self.initial_value_to),
                    "Last value tried for the column",
                ),
                FieldManifest::new(
                    "initial_value_binary_search",
                    "bool",
                    serde_json::json!(self.initial_value_binary_search),
                    "Bisect the value range instead of scanning it",
                ),
            ],
        }
    }
}
