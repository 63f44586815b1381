pub mod dataset;
pub mod features;

pub use dataset::Dataset;
pub use features::{FeatureEngineer, RawEvent};
