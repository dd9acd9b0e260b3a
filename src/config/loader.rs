//! Load config from a JSON file or the environment and resolve it.

use crate::config::resolved::EntityTableRegistry;
use crate::config::{validate, FieldsConfig};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// Path of the JSON config file.
pub const CONFIG_PATH_ENV: &str = "CUSTOM_FIELDS_CONFIG";
/// Overrides `schema_module`.
pub const SCHEMA_MODULE_ENV: &str = "CUSTOM_FIELDS_SCHEMA_MODULE";

/// Build the table registry from config (validates first).
pub fn resolve(config: &FieldsConfig) -> Result<EntityTableRegistry, ConfigError> {
    validate(config)?;
    let tables: HashMap<String, Vec<String>> = config
        .entity_tables
        .iter()
        .map(|(entity_type, spec)| {
            (
                entity_type.clone(),
                spec.names().into_iter().map(String::from).collect(),
            )
        })
        .collect();
    Ok(EntityTableRegistry::new(tables))
}

pub fn load_from_file(path: impl AsRef<Path>) -> Result<FieldsConfig, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    parse(&raw)
}

pub fn parse(raw: &str) -> Result<FieldsConfig, ConfigError> {
    serde_json::from_str(raw).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Reads the file named by `CUSTOM_FIELDS_CONFIG` (defaults when unset) then applies `CUSTOM_FIELDS_SCHEMA_MODULE`.
pub fn load_from_env() -> Result<FieldsConfig, ConfigError> {
    let mut config = match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.trim().is_empty() => load_from_file(path.trim())?,
        _ => {
            tracing::warn!("{} not set; no entity tables configured", CONFIG_PATH_ENV);
            FieldsConfig::default()
        }
    };
    if let Ok(module) = std::env::var(SCHEMA_MODULE_ENV) {
        if !module.trim().is_empty() {
            config.schema_module = module.trim().to_string();
        }
    }
    Ok(config)
}
