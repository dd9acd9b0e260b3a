//! Storage seams: the definition repository and the per-table record store.
//!
//! Every method takes an optional caller-supplied transaction; `None` runs the statement on its own.

mod memory;
mod noop;
mod postgres;
mod records;
mod schema;

pub use memory::{MemoryStore, MemoryTx};
pub use noop::NoOpRecordStore;
pub use postgres::{PgDefinitionRepository, PgTx};
pub use records::PgRecordStore;
pub use schema::{ensure_database_exists, ensure_tenant_tables};

use crate::error::AppError;
use crate::model::{DefinitionPage, DefinitionQuery, FieldDefinition};
use crate::tenant::Tenant;
use async_trait::async_trait;

#[async_trait]
pub trait Transactional: Send + Sync + 'static {
    type Tx: Send + 'static;

    async fn begin(&self) -> Result<Self::Tx, AppError>;
    async fn commit(&self, tx: Self::Tx) -> Result<(), AppError>;
    async fn rollback(&self, tx: Self::Tx) -> Result<(), AppError>;
}

#[async_trait]
pub trait DefinitionRepository: Transactional {
    /// Insert; a duplicate id or refId is `AppError::Conflict`.
    async fn save(
        &self,
        tenant: &Tenant,
        definition: &FieldDefinition,
        tx: Option<&mut Self::Tx>,
    ) -> Result<(), AppError>;

    async fn find_by_id(
        &self,
        tenant: &Tenant,
        id: &str,
        tx: Option<&mut Self::Tx>,
    ) -> Result<Option<FieldDefinition>, AppError>;

    /// Replace by id. Returns false when no definition has that id.
    async fn update(
        &self,
        tenant: &Tenant,
        definition: &FieldDefinition,
        tx: Option<&mut Self::Tx>,
    ) -> Result<bool, AppError>;

    /// Returns false when no definition has that id.
    async fn delete(&self, tenant: &Tenant, id: &str, tx: Option<&mut Self::Tx>) -> Result<bool, AppError>;

    /// Filtered, sorted page plus the total match count. `limit` of `None` reads every match.
    async fn find_by_query(
        &self,
        tenant: &Tenant,
        query: &DefinitionQuery,
        offset: u32,
        limit: Option<u32>,
        tx: Option<&mut Self::Tx>,
    ) -> Result<DefinitionPage, AppError>;

    /// Highest stored `order`, 0 when the tenant has none.
    async fn max_order(&self, tenant: &Tenant, tx: Option<&mut Self::Tx>) -> Result<u32, AppError>;

    /// Highest refId suffix in the slug's family (see `service::ref_id::max_suffix`).
    async fn max_ref_id(&self, tenant: &Tenant, slug: &str, tx: Option<&mut Self::Tx>) -> Result<u32, AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}

/// Statements against one physical table of entity records. Values live at `jsonb.customFields.<refId>`.
#[async_trait]
pub trait RecordStore<Tx: Send + 'static>: Send + Sync + 'static {
    /// Drop the key from every record that has it. Returns rows changed.
    async fn remove_key(&self, tenant: &Tenant, table: &str, ref_id: &str, tx: Option<&mut Tx>) -> Result<u64, AppError>;

    /// Remove the given option ids from every value referencing one; emptied values become JSON null.
    async fn prune_options(
        &self,
        tenant: &Tenant,
        table: &str,
        ref_id: &str,
        removed: &[String],
        multi_select: bool,
        tx: Option<&mut Tx>,
    ) -> Result<u64, AppError>;

    async fn count_with_key(&self, tenant: &Tenant, table: &str, ref_id: &str, tx: Option<&mut Tx>) -> Result<u64, AppError>;

    async fn count_with_option(
        &self,
        tenant: &Tenant,
        table: &str,
        ref_id: &str,
        option_id: &str,
        multi_select: bool,
        tx: Option<&mut Tx>,
    ) -> Result<u64, AppError>;
}
