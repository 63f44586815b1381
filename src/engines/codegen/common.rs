use crate::config::{CodegenConfig, Dialect};
use crate::engines::codegen::decision_tree::posteriori;
use crate::error::{Result, TapholdError};
use crate::types::{Mode, TrainCol};

pub const INDENTATION: &str = "  ";

/// Ordered feature names a decision tree's indices refer to.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSchema {
    names: Vec<String>,
    fractional: Vec<bool>,
    columns: Vec<TrainCol>,
}

impl FeatureSchema {
    /// Schema of plain names, all rendered as integral values.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let fractional = vec![false; names.len()];
        Self {
            names,
            fractional,
            columns: Vec::new(),
        }
    }

    /// Marks the named features as naturally fractional.
    pub fn with_fractional(mut self, fractional: &[&str]) -> Self {
        for (name, flag) in self.names.iter().zip(self.fractional.iter_mut()) {
            if fractional.contains(&name.as_str()) {
                *flag = true;
            }
        }
        self
    }

    /// The columns a predictor for `mode` may read, in column order.
    pub fn for_mode(mode: Mode) -> Self {
        let columns = TrainCol::enabled_for(mode);
        Self {
            names: columns.iter().map(|c| c.name().to_string()).collect(),
            fractional: columns.iter().map(|c| c.is_fractional()).collect(),
            columns,
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, index: usize) -> Result<&str> {
        self.names
            .get(index)
            .map(String::as_str)
            .ok_or(TapholdError::FeatureOutOfRange {
                index,
                limit: self.names.len(),
            })
    }

    pub fn is_fractional(&self, index: usize) -> bool {
        self.fractional.get(index).copied().unwrap_or(false)
    }

    /// Picks this schema's features out of a full training row.
    pub fn project(&self, row: &[f64]) -> Result<Vec<f64>> {
        if self.columns.len() != self.names.len() {
            return Err(TapholdError::Codegen(
                "schema was not built from training columns".to_string(),
            ));
        }
        Ok(self.columns.iter().map(|c| row[c.index()]).collect())
    }
}

/// `f32` literal with the C suffix, e.g. `37.5f`.
pub fn float_literal(value: f64) -> String {
    format!("{:?}f", value as f32)
}

/// Threshold as written in a comparison against `feature`.
///
/// Integral features compare against the floor of the threshold, which keeps
/// `x <= t` exact for whole-number inputs.
pub fn format_threshold(value: f64, fractional: bool, config: &CodegenConfig) -> String {
    if fractional || config.dialect == Dialect::Numeric {
        float_literal(value)
    } else {
        format!("{}", value.floor() as i64)
    }
}

/// Integral outputs print as integers, anything else as a float literal.
pub fn format_output(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        float_literal(value)
    }
}

/// Token for a leaf: its hold probability or its raw output.
pub fn leaf_token(output: f64, counts: &[usize], config: &CodegenConfig) -> String {
    if config.output_probability && counts.len() >= 2 {
        // index 1 is the hold class
        return float_literal(posteriori(counts)[1]);
    }
    if config.output_probability {
        return float_literal(output);
    }
    format_output(output)
}

/// `0`/`1` become `false`/`true` where the function returns `bool`.
pub fn num_to_bool(token: &str, config: &CodegenConfig) -> String {
    if !config.is_optimizable() {
        return token.to_string();
    }
    match token {
        "0" => "false".to_string(),
        "1" => "true".to_string(),
        other => other.to_string(),
    }
}

pub fn return_type(config: &CodegenConfig) -> &'static str {
    if config.output_probability {
        return "float";
    }
    match config.dialect {
        Dialect::Boolean => "bool",
        Dialect::Numeric => "int",
    }
}

/// Type of the intermediate values of the branchless backend.
pub fn result_type(config: &CodegenConfig) -> &'static str {
    match config.dialect {
        Dialect::Boolean => "uint8_t",
        Dialect::Numeric => "int",
    }
}

pub fn header(mode: Mode, config: &CodegenConfig) -> String {
    format!(
        "{} {}(void) {{",
        return_type(config),
        mode.prediction_function_name()
    )
}

/// `@return` line of the doc comment.
pub fn return_doc(mode: Mode, config: &CodegenConfig) -> &'static str {
    if mode.is_overlap_estimation() {
        "float predicted overlap time in ms."
    } else if config.output_probability {
        "float probability that the key is held."
    } else {
        "whether the key is held."
    }
}
