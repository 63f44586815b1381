use super::traits::{ConfigManifest, ConfigSection, FieldManifest};
use crate::error::TapholdError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinementConfig {
    /// Consecutive failed tries after which a run stops. Unset runs until
    /// stopped from outside.
    pub max_iterations_without_improvement: Option<usize>,
    /// Failed tries before a progress report is emitted.
    pub report_after_tries: usize,
    pub initial_divisor: f64,
    pub min_constant: f64,
    pub max_constant: f64,
    pub seed: Option<u64>,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            max_iterations_without_improvement: None,
            report_after_tries: 100,
            initial_divisor: 100.0,
            min_constant: -50_000.0,
            max_constant: 50_000.0,
            seed: None,
        }
    }
}

impl RefinementConfig {
    pub fn iteration_limit(&self) -> usize {
        self.max_iterations_without_improvement.unwrap_or(usize::MAX)
    }
}

impl ConfigSection for RefinementConfig {
    fn section_name() -> &'static str {
        "refinement"
    }

    fn validate(&self) -> Result<(), TapholdError> {
        if !(0.01..=100.0).contains(&self.initial_divisor) {
            return Err(TapholdError::Configuration(
                "initial_divisor must be between 0.01 and 100".to_string(),
            ));
        }
        if !(self.min_constant < self.max_constant) {
            return Err(TapholdError::Configuration(format!(
                "min_constant ({}) must be below max_constant ({})",
                self.min_constant, self.max_constant
            )));
        }
        if self.max_iterations_without_improvement == Some(0) {
            return Err(TapholdError::Configuration(
                "max_iterations_without_improvement must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        ConfigManifest {
            section: "Refinement".to_string(),
            fields: vec![
                FieldManifest::new(
                    "max_iterations_without_improvement",
                    "integer?",
                    serde_json::json!(self.max_iterations_without_improvement),
                    "Consecutive failed tries after which refinement stops",
                )
                .range(Some(1.0), None),
                FieldManifest::new(
                    "report_after_tries",
                    "integer",
                    serde_json::json!(self.report_after_tries),
                    "Failed tries before the current best is reported",
                ),
                FieldManifest::new(
                    "initial_divisor",
                    "float",
                    serde_json::json!(self.initial_divisor),
                    "Starting step divisor, larger means smaller steps",
                )
                .range(Some(0.01), Some(100.0)),
                FieldManifest::new(
                    "min_constant",
                    "float",
                    serde_json::json!(self.min_constant),
                    "Lower bound of refined constants",
                ),
                FieldManifest::new(
                    "max_constant",
                    "float",
                    serde_json::json!(self.max_constant),
                    "Upper bound of refined constants",
                ),
                FieldManifest::new(
                    "seed",
                    "integer?",
                    serde_json::json!(self.seed),
                    "RNG seed, random when unset",
                ),
            ],
        }
    }
}
