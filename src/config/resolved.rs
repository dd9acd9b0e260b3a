//! Resolved table registry: config validated and flattened for runtime lookup.

use std::collections::HashMap;

/// entityType -> ordered backing tables. Built once by `resolve`.
#[derive(Clone, Debug, Default)]
pub struct EntityTableRegistry {
    tables: HashMap<String, Vec<String>>,
}

impl EntityTableRegistry {
    pub(crate) fn new(tables: HashMap<String, Vec<String>>) -> Self {
        EntityTableRegistry { tables }
    }

    /// Unknown entity types have no tables.
    pub fn tables_for(&self, entity_type: &str) -> &[String] {
        self.tables.get(entity_type).map(|v| v.as_slice()).unwrap_or(&[])
    }
}
