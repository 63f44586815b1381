pub mod traits;
pub mod fitness;
pub mod refinement;
pub mod codegen;
pub mod seeding;
pub mod manager;

pub use manager::{AppConfig, ConfigManager};
pub use fitness::FitnessConfig;
pub use refinement::RefinementConfig;
pub use codegen::{Backend, CodegenConfig, Dialect};
pub use seeding::SeedingConfig;
pub use traits::ConfigSection;
