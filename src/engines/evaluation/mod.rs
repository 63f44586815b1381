pub mod expression;
pub mod fitness;

pub use expression::{FnPredictor, OutputStats, Predictor};
pub use fitness::FitnessEvaluator;
