//! Raw config types matching the JSON config file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_SCHEMA_MODULE: &str = "mod_custom_fields";
pub const DEFAULT_HELP_TEXT_MAX_LENGTH: usize = 100;
pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const DEFAULT_MAX_PAGE_LIMIT: u32 = 1000;

/// Backing tables of one entity type: a single table name or a list of names.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableSpec {
    Single(String),
    Many(Vec<String>),
}

impl TableSpec {
    pub fn names(&self) -> Vec<&str> {
        match self {
            TableSpec::Single(s) => vec![s.as_str()],
            TableSpec::Many(v) => v.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldsConfig {
    /// entityType -> physical tables holding that entity's records.
    #[serde(default)]
    pub entity_tables: BTreeMap<String, TableSpec>,
    #[serde(default = "default_schema_module")]
    pub schema_module: String,
    #[serde(default = "default_help_text_max_length")]
    pub help_text_max_length: usize,
    /// entityType -> allowed `displayInAccordion` values.
    #[serde(default = "default_display_in_accordion")]
    pub display_in_accordion: BTreeMap<String, Vec<String>>,
    #[serde(default = "default_page_limit")]
    pub default_page_limit: u32,
    #[serde(default = "default_max_page_limit")]
    pub max_page_limit: u32,
}

impl Default for FieldsConfig {
    fn default() -> Self {
        FieldsConfig {
            entity_tables: BTreeMap::new(),
            schema_module: default_schema_module(),
            help_text_max_length: default_help_text_max_length(),
            display_in_accordion: default_display_in_accordion(),
            default_page_limit: default_page_limit(),
            max_page_limit: default_max_page_limit(),
        }
    }
}

impl FieldsConfig {
    pub fn with_tables(mut self, entity_type: &str, tables: TableSpec) -> Self {
        self.entity_tables.insert(entity_type.to_string(), tables);
        self
    }

    /// Requested limit, defaulted and capped.
    pub fn page_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_page_limit)
            .min(self.max_page_limit)
    }
}

fn default_schema_module() -> String {
    DEFAULT_SCHEMA_MODULE.into()
}

fn default_help_text_max_length() -> usize {
    DEFAULT_HELP_TEXT_MAX_LENGTH
}

fn default_page_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

fn default_max_page_limit() -> u32 {
    DEFAULT_MAX_PAGE_LIMIT
}

fn default_display_in_accordion() -> BTreeMap<String, Vec<String>> {
    let user = [
        "user_information",
        "extended_information",
        "contact_information",
        "default",
        "fees_fines",
        "loans",
        "requests",
    ];
    let mut m = BTreeMap::new();
    m.insert("user".to_string(), user.iter().map(|s| s.to_string()).collect());
    m
}
