//! Tenant identity: validated tenant id and the per-tenant schema derived from it.

use crate::error::AppError;
use std::fmt;

/// Longest PostgreSQL identifier; the schema name is built from the tenant id plus a module suffix.
const MAX_TENANT_ID_LEN: usize = 40;

/// Tenant id, lower-cased and restricted to `[a-z0-9_]` so it is safe to embed in schema names.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tenant(String);

impl Tenant {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Schema holding this tenant's tables, e.g. `diku_mod_custom_fields`.
    pub fn schema_name(&self, module: &str) -> String {
        format!("{}_{}", self.0, module).to_lowercase()
    }
}

impl std::str::FromStr for Tenant {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().to_lowercase();
        if id.is_empty() {
            return Err(AppError::BadRequest("tenant id is required".into()));
        }
        if id.len() > MAX_TENANT_ID_LEN {
            return Err(AppError::BadRequest(format!(
                "tenant id must be at most {} characters",
                MAX_TENANT_ID_LEN
            )));
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(AppError::BadRequest(format!(
                "invalid tenant id: {} (expected letters, digits or '_')",
                s
            )));
        }
        Ok(Tenant(id))
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
