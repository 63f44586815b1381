use super::traits::{ConfigManifest, ConfigSection, FieldManifest};
use crate::error::TapholdError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backend {
    /// Straight-line bitmask arithmetic, no branches.
    Branchless,
    /// One nested conditional expression.
    Ternary,
}

/// Target language flavour of the emitted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dialect {
    /// C with `bool`/`true`/`false` and `uint8_t` results.
    Boolean,
    /// Plain numeric results, every literal fractional.
    Numeric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenConfig {
    pub backend: Backend,
    /// Emit leaf probabilities instead of class labels.
    pub output_probability: bool,
    pub dialect: Dialect,
    /// Depth the trees were induced with, documented in the output.
    pub max_depth: usize,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Ternary,
            output_probability: false,
            dialect: Dialect::Boolean,
            max_depth: 7,
        }
    }
}

impl CodegenConfig {
    /// Label leaves in the boolean dialect may collapse into bare comparisons.
    pub fn is_optimizable(&self) -> bool {
        self.dialect == Dialect::Boolean && !self.output_probability
    }
}

impl ConfigSection for CodegenConfig {
    fn section_name() -> &'static str {
        "codegen"
    }

    fn validate(&self) -> Result<(), TapholdError> {
        if self.backend == Backend::Branchless && self.output_probability {
            return Err(TapholdError::Configuration(
                "the branchless backend needs class-label leaves".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(TapholdError::Configuration(
                "max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    fn to_manifest(&self) -> ConfigManifest {
        ConfigManifest {
            section: "Codegen".to_string(),
            fields: vec![
                FieldManifest::new(
                    "backend",
                    "enum",
                    serde_json::json!(self.backend),
                    "Branchless or Ternary",
                ),
                FieldManifest::new(
                    "output_probability",
                    "bool",
                    serde_json::json!(self.output_probability),
                    "Leaves return hold probabilities",
                ),
                FieldManifest::new(
                    "dialect",
                    "enum",
                    serde_json::json!(self.dialect),
                    "Boolean or Numeric literals",
                ),
                FieldManifest::new(
                    "max_depth",
                    "integer",
                    serde_json::json!(self.max_depth),
                    "Tree depth noted in the generated doc comment",
                )
                .range(Some(1.0), None),
            ],
        }
    }
}
