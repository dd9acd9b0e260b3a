//! Custom fields SDK: tenant-scoped custom field definitions kept in sync with JSONB entity records.

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod model;
pub mod response;
pub mod routes;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;
pub mod tenant;

pub use config::{load_from_env, load_from_file, resolve, EntityTableRegistry, FieldsConfig, TableSpec};
pub use error::{AppError, ConfigError};
pub use model::{FieldDefinition, FieldType};
pub use response::{success_many, success_one, success_page};
pub use routes::{app_routes, common_routes, fields_routes};
pub use service::{CustomFields, CustomFieldsService, RequestContext};
pub use state::AppState;
pub use store::{
    ensure_database_exists, ensure_tenant_tables, MemoryStore, NoOpRecordStore, PgDefinitionRepository, PgRecordStore,
};
pub use tenant::Tenant;
