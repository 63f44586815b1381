use super::{
    codegen::CodegenConfig, fitness::FitnessConfig, refinement::RefinementConfig,
    seeding::SeedingConfig, traits::{ConfigManifest, ConfigSection},
};
use crate::error::TapholdError;
use crate::types::Mode;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Prefix of environment overrides, e.g. `TAPHOLD_FITNESS__SAMPLE_SIZE=4096`.
pub const ENV_PREFIX: &str = "TAPHOLD";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: Mode,
    pub fitness: FitnessConfig,
    pub refinement: RefinementConfig,
    pub codegen: CodegenConfig,
    pub seeding: SeedingConfig,
}

impl AppConfig {
    pub fn for_mode(mode: Mode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), TapholdError> {
        self.fitness.validate()?;
        self.refinement.validate()?;
        self.codegen.validate()?;
        self.seeding.validate()?;
        if let Some(col) = self.seeding.initial_value_column {
            if !col.may_use_in(self.mode) {
                return Err(TapholdError::Configuration(format!(
                    "initial_value_column {} is not available in mode {}",
                    col.name(),
                    self.mode
                )));
            }
        }
        Ok(())
    }

    pub fn manifests(&self) -> Vec<ConfigManifest> {
        vec![
            self.fitness.to_manifest(),
            self.refinement.to_manifest(),
            self.codegen.to_manifest(),
            self.seeding.to_manifest(),
        ]
    }

    pub fn section_names() -> [&'static str; 4] {
        [
            FitnessConfig::section_name(),
            RefinementConfig::section_name(),
            CodegenConfig::section_name(),
            SeedingConfig::section_name(),
        ]
    }
}

pub struct ConfigManager {
    config: Arc<RwLock<AppConfig>>,
}

impl ConfigManager {
    pub fn new() -> Self {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Layers the TOML file (if given) and `TAPHOLD_*` environment variables
    /// over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, TapholdError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        log::debug!("Loaded configuration for mode {}", config.mode);
        Ok(Self::with_config(config))
    }

    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<(), TapholdError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)
            .map_err(|e| TapholdError::Configuration(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        *self.config.write().unwrap_or_else(|e| e.into_inner()) = config;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), TapholdError> {
        let toml_str = toml::to_string_pretty(&self.get())?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn get(&self) -> AppConfig {
        self.config.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Applies `f` and keeps the result only if it validates.
    pub fn update<F>(&self, f: F) -> Result<(), TapholdError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut config = self.config.write().unwrap_or_else(|e| e.into_inner());
        let mut updated = config.clone();
        f(&mut updated);
        updated.validate()?;
        *config = updated;
        Ok(())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
