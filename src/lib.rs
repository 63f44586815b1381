//! Refinement and compilation of tap/hold predictors for keyboard firmware.
//!
//! Expression trees are scored by [`FitnessEvaluator`] and their constants
//! refined by [`HillClimber`]; induced decision trees are lowered to C by
//! [`TreeCompiler`]. Improvements found along the way travel through a
//! [`ReportQueue`] to a reporting consumer.

pub mod config;
pub mod data;
pub mod engines;
pub mod error;
pub mod functions;
pub mod types;
pub mod utils;

pub use config::{AppConfig, ConfigManager};
pub use data::{Dataset, FeatureEngineer, RawEvent};
pub use engines::codegen::{DecisionTreeNode, FeatureSchema, TreeCompiler};
pub use engines::evaluation::{FitnessEvaluator, FnPredictor, OutputStats, Predictor};
pub use engines::generation::{
    ExpressionNode, FormulaParser, HillClimber, ImprovementTracker, LogReporter, RefinementResult,
    ReportQueue, SeedRanker, SeedingOutcome,
};
pub use error::{Result, TapholdError};
pub use types::{ClassCounts, FeatureVector, Mode, TrainCol};
