use thiserror::Error;

#[derive(Error, Debug)]
pub enum TapholdError {
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Unknown variable '{0}' (not enabled for the active mode)")]
    UnknownVariable(String),

    #[error("Feature index {index} is outside the active schema ({limit} features)")]
    FeatureOutOfRange { index: usize, limit: usize },

    #[error("Invalid raw event: {0}")]
    InvalidEvent(String),

    #[error("Fitness is not finite: {0}")]
    NonFiniteFitness(f64),

    #[error("Codegen error: {0}")]
    Codegen(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Config source error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("TOML error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, TapholdError>;
