//! Config validation: entity types and table identifiers.

use crate::config::FieldsConfig;
use crate::error::ConfigError;
use regex::Regex;
use std::collections::HashSet;

/// Plain or schema-qualified PostgreSQL identifier.
const TABLE_NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$";

pub fn validate(config: &FieldsConfig) -> Result<(), ConfigError> {
    let table_re = Regex::new(TABLE_NAME_PATTERN).map_err(|e| ConfigError::Validation(e.to_string()))?;

    if !table_re.is_match(&config.schema_module) || config.schema_module.contains('.') {
        return Err(ConfigError::Validation(format!(
            "schema_module must be a plain identifier: {}",
            config.schema_module
        )));
    }
    if config.default_page_limit == 0 || config.default_page_limit > config.max_page_limit {
        return Err(ConfigError::Validation(
            "default_page_limit must be between 1 and max_page_limit".into(),
        ));
    }

    for (entity_type, spec) in &config.entity_tables {
        if entity_type.trim().is_empty() {
            return Err(ConfigError::Validation("entity type must not be empty".into()));
        }
        let names = spec.names();
        if names.is_empty() {
            return Err(ConfigError::Validation(format!(
                "entity type '{}' has no tables",
                entity_type
            )));
        }
        let mut seen = HashSet::new();
        for table in names {
            if !table_re.is_match(table) {
                return Err(ConfigError::InvalidTableName {
                    entity_type: entity_type.clone(),
                    table: table.to_string(),
                });
            }
            if !seen.insert(table.to_lowercase()) {
                return Err(ConfigError::DuplicateTable {
                    entity_type: entity_type.clone(),
                    table: table.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableSpec;

    #[test]
    fn accepts_plain_and_qualified_names() {
        let cfg = FieldsConfig::default()
            .with_tables("user", TableSpec::Single("users".into()))
            .with_tables("item", TableSpec::Many(vec!["item".into(), "archive.item".into()]));
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn rejects_bad_tables() {
        let bad = FieldsConfig::default().with_tables("user", TableSpec::Single("users; drop".into()));
        assert!(matches!(validate(&bad), Err(ConfigError::InvalidTableName { .. })));

        let dup = FieldsConfig::default()
            .with_tables("user", TableSpec::Many(vec!["users".into(), "USERS".into()]));
        assert!(matches!(validate(&dup), Err(ConfigError::DuplicateTable { .. })));

        let empty = FieldsConfig::default().with_tables("user", TableSpec::Many(vec![]));
        assert!(matches!(validate(&empty), Err(ConfigError::Validation(_))));

        let blank = FieldsConfig::default().with_tables(" ", TableSpec::Single("users".into()));
        assert!(matches!(validate(&blank), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn rejects_bad_schema_module_and_limits() {
        let mut cfg = FieldsConfig::default();
        cfg.schema_module = "a.b".into();
        assert!(validate(&cfg).is_err());

        let mut cfg = FieldsConfig::default();
        cfg.default_page_limit = 2000;
        assert!(validate(&cfg).is_err());
    }
}
