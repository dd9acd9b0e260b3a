//! PostgreSQL record store: set-based JSONB rewrites and counts over entity tables.

use crate::error::AppError;
use crate::sql::{self, record_table};
use crate::store::postgres::{Conn, PgTx};
use crate::store::RecordStore;
use crate::tenant::Tenant;
use async_trait::async_trait;
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
    schema_module: String,
}

impl PgRecordStore {
    pub fn new(pool: PgPool, schema_module: impl Into<String>) -> Self {
        PgRecordStore {
            pool,
            schema_module: schema_module.into(),
        }
    }

    fn table(&self, tenant: &Tenant, table: &str) -> String {
        record_table(tenant, &self.schema_module, table)
    }
}

#[async_trait]
impl RecordStore<PgTx> for PgRecordStore {
    async fn remove_key(&self, tenant: &Tenant, table: &str, ref_id: &str, tx: Option<&mut PgTx>) -> Result<u64, AppError> {
        let sql = sql::remove_key(&self.table(tenant, table));
        tracing::debug!(sql = %sql, ref_id = %ref_id, "remove custom field values");
        let mut conn = Conn::get(&self.pool, tx).await?;
        let result = sqlx::query(&sql).bind(ref_id).execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    async fn prune_options(
        &self,
        tenant: &Tenant,
        table: &str,
        ref_id: &str,
        removed: &[String],
        multi_select: bool,
        tx: Option<&mut PgTx>,
    ) -> Result<u64, AppError> {
        if removed.is_empty() {
            return Ok(0);
        }
        let sql = sql::prune_options(&self.table(tenant, table), multi_select);
        tracing::debug!(sql = %sql, ref_id = %ref_id, removed = ?removed, "prune option values");
        let mut conn = Conn::get(&self.pool, tx).await?;
        let result = sqlx::query(&sql)
            .bind(ref_id)
            .bind(removed)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count_with_key(&self, tenant: &Tenant, table: &str, ref_id: &str, tx: Option<&mut PgTx>) -> Result<u64, AppError> {
        let sql = sql::count_with_key(&self.table(tenant, table));
        tracing::debug!(sql = %sql, ref_id = %ref_id, "query");
        let mut conn = Conn::get(&self.pool, tx).await?;
        let n: i64 = sqlx::query_scalar(&sql).bind(ref_id).fetch_one(&mut *conn).await?;
        Ok(n.max(0) as u64)
    }

    async fn count_with_option(
        &self,
        tenant: &Tenant,
        table: &str,
        ref_id: &str,
        option_id: &str,
        multi_select: bool,
        tx: Option<&mut PgTx>,
    ) -> Result<u64, AppError> {
        let sql = sql::count_with_option(&self.table(tenant, table), multi_select);
        tracing::debug!(sql = %sql, ref_id = %ref_id, option_id = %option_id, "query");
        let mut conn = Conn::get(&self.pool, tx).await?;
        let n: i64 = sqlx::query_scalar(&sql)
            .bind(ref_id)
            .bind(option_id)
            .fetch_one(&mut *conn)
            .await?;
        Ok(n.max(0) as u64)
    }
}
