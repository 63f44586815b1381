use serde::{Deserialize, Serialize};

use crate::engines::evaluation::expression::Predictor;
use crate::error::{Result, TapholdError};

/// A node of an induced binary decision tree.
///
/// Splits route a row to `true_child` when `row[feature] <= threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecisionTreeNode {
    Split {
        feature: usize,
        threshold: f64,
        true_child: Box<DecisionTreeNode>,
        false_child: Box<DecisionTreeNode>,
    },
    Leaf {
        /// Class label (or regression value) of the leaf.
        output: f64,
        /// Training rows per class that ended up here.
        #[serde(default)]
        counts: Vec<usize>,
    },
}

impl DecisionTreeNode {
    pub fn split(feature: usize, threshold: f64, true_child: DecisionTreeNode, false_child: DecisionTreeNode) -> Self {
        Self::Split {
            feature,
            threshold,
            true_child: Box::new(true_child),
            false_child: Box::new(false_child),
        }
    }

    pub fn leaf(output: f64) -> Self {
        Self::Leaf {
            output,
            counts: Vec::new(),
        }
    }

    pub fn leaf_with_counts(output: f64, counts: Vec<usize>) -> Self {
        Self::Leaf { output, counts }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }

    /// Output of the leaf `features` ends up in.
    pub fn predict(&self, features: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match node {
                Self::Split {
                    feature,
                    threshold,
                    true_child,
                    false_child,
                } => {
                    node = if features[*feature] <= *threshold {
                        true_child.as_ref()
                    } else {
                        false_child.as_ref()
                    };
                }
                Self::Leaf { output, .. } => return *output,
            }
        }
    }

    /// Number of splits on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        match self {
            Self::Split {
                true_child,
                false_child,
                ..
            } => 1 + true_child.depth().max(false_child.depth()),
            Self::Leaf { .. } => 0,
        }
    }

    pub fn node_count(&self) -> usize {
        match self {
            Self::Split {
                true_child,
                false_child,
                ..
            } => 1 + true_child.node_count() + false_child.node_count(),
            Self::Leaf { .. } => 1,
        }
    }

    /// Fails on the first split whose feature is not below `feature_count`
    /// or whose threshold is not finite.
    pub fn validate(&self, feature_count: usize) -> Result<()> {
        match self {
            Self::Split {
                feature,
                threshold,
                true_child,
                false_child,
            } => {
                if *feature >= feature_count {
                    return Err(TapholdError::FeatureOutOfRange {
                        index: *feature,
                        limit: feature_count,
                    });
                }
                if !threshold.is_finite() {
                    return Err(TapholdError::InvalidExpression(format!(
                        "split threshold {} is not finite",
                        threshold
                    )));
                }
                true_child.validate(feature_count)?;
                false_child.validate(feature_count)
            }
            Self::Leaf { .. } => Ok(()),
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Smoothed class probabilities of a leaf: `(count[i] + 1) / (total + classes)`.
pub fn posteriori(counts: &[usize]) -> Vec<f64> {
    let total: usize = counts.iter().sum();
    let denominator = (total + counts.len()) as f64;
    counts
        .iter()
        .map(|c| (*c as f64 + 1.0) / denominator)
        .collect()
}

impl Predictor for DecisionTreeNode {
    fn predict(&self, features: &[f64]) -> f64 {
        DecisionTreeNode::predict(self, features)
    }

    fn node_count(&self) -> usize {
        DecisionTreeNode::node_count(self)
    }
}
