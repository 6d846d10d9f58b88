//! Configuration loading.
//!
//! Values are layered: type defaults, then `<config_dir>/<name>.json`, then
//! environment variables named `<PREFIX>_<NAME>_<KEY>`. Environment values are
//! parsed as JSON first and fall back to plain strings.

use crate::error::{CtError, Result};
use crate::types::EngineConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment prefix used for engine configuration overrides.
pub const ENV_PREFIX: &str = "ELEMENTS_CT";

/// Name of the engine configuration file, without extension.
pub const ENGINE_CONFIG_NAME: &str = "engine";

/// Configuration source priority (higher number = higher priority)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigSource {
    Default = 0,
    File = 1,
    Environment = 2,
}

/// Configuration manager for handling multiple configuration sources
pub struct ConfigManager {
    config_dir: PathBuf,
    environment_prefix: String,
    loaded_configs: HashMap<String, serde_json::Value>,
}

impl ConfigManager {
    pub fn new(config_dir: PathBuf, environment_prefix: &str) -> Self {
        Self {
            config_dir,
            environment_prefix: environment_prefix.to_string(),
            loaded_configs: HashMap::new(),
        }
    }

    /// Load configuration from defaults, file and environment, in that order
    pub fn load_config<T>(&mut self, config_name: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de> + Serialize + Default,
    {
        let mut config_value = serde_json::to_value(T::default())?;

        let config_file_path = self.config_path(config_name);
        if config_file_path.exists() {
            let file_config = self.load_from_file(&config_file_path)?;
            self.merge_config_values(&mut config_value, file_config, ConfigSource::File);
        }

        let env_config = self.load_from_environment(config_name);
        self.merge_config_values(&mut config_value, env_config, ConfigSource::Environment);

        let final_config: T = serde_json::from_value(config_value.clone()).map_err(|e| {
            CtError::invalid_argument(format!("Failed to deserialize config '{}': {}", config_name, e))
        })?;

        self.loaded_configs.insert(config_name.to_string(), config_value);
        Ok(final_config)
    }

    pub fn save_config<T>(&self, config_name: &str, config: &T) -> Result<()>
    where
        T: Serialize,
    {
        if !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir)?;
        }

        let config_file_path = self.config_path(config_name);
        let config_json = serde_json::to_string_pretty(config)?;
        fs::write(&config_file_path, config_json)?;

        log::info!("Configuration '{}' saved to {:?}", config_name, config_file_path);
        Ok(())
    }

    pub fn config_exists(&self, config_name: &str) -> bool {
        self.config_path(config_name).exists()
    }

    /// Raw JSON of a configuration loaded earlier through this manager
    pub fn loaded(&self, config_name: &str) -> Option<&serde_json::Value> {
        self.loaded_configs.get(config_name)
    }

    fn config_path(&self, config_name: &str) -> PathBuf {
        self.config_dir.join(format!("{}.json", config_name))
    }

    fn load_from_file(&self, file_path: &Path) -> Result<serde_json::Value> {
        let content = fs::read_to_string(file_path)?;
        serde_json::from_str(&content).map_err(|e| {
            CtError::invalid_argument(format!("Failed to parse config file {:?}: {}", file_path, e))
        })
    }

    fn load_from_environment(&self, config_name: &str) -> serde_json::Value {
        let mut env_config = serde_json::Map::new();
        let prefix = format!("{}_{}_", self.environment_prefix, config_name.to_uppercase());

        for (key, value) in env::vars() {
            if let Some(config_key) = key.strip_prefix(&prefix) {
                let parsed_value = serde_json::from_str(&value)
                    .unwrap_or(serde_json::Value::String(value));
                env_config.insert(config_key.to_lowercase(), parsed_value);
            }
        }

        serde_json::Value::Object(env_config)
    }

    fn merge_config_values(
        &self,
        base: &mut serde_json::Value,
        overlay: serde_json::Value,
        source: ConfigSource,
    ) {
        match (base, overlay) {
            (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
                for (key, value) in overlay_map {
                    log::trace!("config key '{}' set from {:?}", key, source);
                    base_map.insert(key, value);
                }
            }
            (base, overlay) => {
                *base = overlay;
            }
        }
    }
}

impl EngineConfig {
    /// Load the engine configuration from `config_dir/engine.json` and
    /// `ELEMENTS_CT_ENGINE_*` environment variables.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let mut manager = ConfigManager::new(config_dir.to_path_buf(), ENV_PREFIX);
        let mut config: EngineConfig = manager.load_config(ENGINE_CONFIG_NAME)?;
        if config.data_dir.is_none() {
            config.data_dir = Some(config_dir.to_path_buf());
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_descriptor_depth == 0
            || self.max_descriptor_depth > crate::descriptor::DEFAULT_MAX_DEPTH
        {
            return Err(CtError::invalid_argument(format!(
                "max_descriptor_depth must be between 1 and {}",
                crate::descriptor::DEFAULT_MAX_DEPTH
            )));
        }
        Ok(())
    }
}
