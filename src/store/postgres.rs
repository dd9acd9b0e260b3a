//! PostgreSQL definition repository: one `(id, jsonb)` table per tenant schema.

use crate::error::AppError;
use crate::model::{DefinitionPage, DefinitionQuery, FieldDefinition};
use crate::service::ref_id::{max_suffix, ref_id_pattern};
use crate::sql::{self, qualified_table, DEFINITIONS_TABLE};
use crate::store::{DefinitionRepository, Transactional};
use crate::tenant::Tenant;
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres};
use std::ops::{Deref, DerefMut};

pub type PgTx = sqlx::Transaction<'static, Postgres>;

/// Either the caller's transaction or a connection checked out for one statement.
pub(crate) enum Conn<'a> {
    Tx(&'a mut PgConnection),
    Pooled(PoolConnection<Postgres>),
}

impl<'a> Conn<'a> {
    pub(crate) async fn get(pool: &PgPool, tx: Option<&'a mut PgTx>) -> Result<Conn<'a>, AppError> {
        match tx {
            Some(tx) => Ok(Conn::Tx(&mut **tx)),
            None => Ok(Conn::Pooled(pool.acquire().await?)),
        }
    }
}

impl Deref for Conn<'_> {
    type Target = PgConnection;

    fn deref(&self) -> &PgConnection {
        match self {
            Conn::Tx(c) => c,
            Conn::Pooled(c) => c,
        }
    }
}

impl DerefMut for Conn<'_> {
    fn deref_mut(&mut self) -> &mut PgConnection {
        match self {
            Conn::Tx(c) => c,
            Conn::Pooled(c) => c,
        }
    }
}

#[derive(Clone)]
pub struct PgDefinitionRepository {
    pool: PgPool,
    schema_module: String,
}

impl PgDefinitionRepository {
    pub fn new(pool: PgPool, schema_module: impl Into<String>) -> Self {
        PgDefinitionRepository {
            pool,
            schema_module: schema_module.into(),
        }
    }

    fn table(&self, tenant: &Tenant) -> String {
        qualified_table(&tenant.schema_name(&self.schema_module), DEFINITIONS_TABLE)
    }
}

fn definition_id(definition: &FieldDefinition) -> Result<&str, AppError> {
    definition
        .id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("definition id is required".into()))
}

#[async_trait]
impl Transactional for PgDefinitionRepository {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, AppError> {
        Ok(self.pool.begin().await?)
    }

    async fn commit(&self, tx: PgTx) -> Result<(), AppError> {
        Ok(tx.commit().await?)
    }

    async fn rollback(&self, tx: PgTx) -> Result<(), AppError> {
        Ok(tx.rollback().await?)
    }
}

#[async_trait]
impl DefinitionRepository for PgDefinitionRepository {
    async fn save(&self, tenant: &Tenant, definition: &FieldDefinition, tx: Option<&mut PgTx>) -> Result<(), AppError> {
        let id = definition_id(definition)?;
        let sql = sql::insert_definition(&self.table(tenant));
        tracing::debug!(sql = %sql, id = %id, "insert definition");
        let mut conn = Conn::get(&self.pool, tx).await?;
        sqlx::query(&sql)
            .bind(id)
            .bind(Json(definition))
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn find_by_id(
        &self,
        tenant: &Tenant,
        id: &str,
        tx: Option<&mut PgTx>,
    ) -> Result<Option<FieldDefinition>, AppError> {
        let sql = sql::select_definition_by_id(&self.table(tenant));
        tracing::debug!(sql = %sql, id = %id, "query");
        let mut conn = Conn::get(&self.pool, tx).await?;
        let row: Option<(Json<FieldDefinition>,)> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(row.map(|(Json(def),)| def))
    }

    async fn update(&self, tenant: &Tenant, definition: &FieldDefinition, tx: Option<&mut PgTx>) -> Result<bool, AppError> {
        let id = definition_id(definition)?;
        let sql = sql::update_definition(&self.table(tenant));
        tracing::debug!(sql = %sql, id = %id, "update definition");
        let mut conn = Conn::get(&self.pool, tx).await?;
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(Json(definition))
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, tenant: &Tenant, id: &str, tx: Option<&mut PgTx>) -> Result<bool, AppError> {
        let sql = sql::delete_definition(&self.table(tenant));
        tracing::debug!(sql = %sql, id = %id, "delete definition");
        let mut conn = Conn::get(&self.pool, tx).await?;
        let result = sqlx::query(&sql).bind(id).execute(&mut *conn).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_by_query(
        &self,
        tenant: &Tenant,
        query: &DefinitionQuery,
        offset: u32,
        limit: Option<u32>,
        tx: Option<&mut PgTx>,
    ) -> Result<DefinitionPage, AppError> {
        let table = self.table(tenant);
        let select = sql::select_definitions(&table, query, offset, limit);
        let count = sql::count_definitions(&table, query);
        tracing::debug!(sql = %select.sql, params = ?select.params, "query");
        let mut conn = Conn::get(&self.pool, tx).await?;

        let mut q = sqlx::query_as::<_, (Json<FieldDefinition>,)>(&select.sql);
        for p in &select.params {
            q = q.bind(p);
        }
        let rows = q.fetch_all(&mut *conn).await?;

        let mut c = sqlx::query_scalar::<_, i64>(&count.sql);
        for p in &count.params {
            c = c.bind(p);
        }
        let total = c.fetch_one(&mut *conn).await?;

        Ok(DefinitionPage {
            custom_fields: rows.into_iter().map(|(Json(def),)| def).collect(),
            total_records: total.max(0) as u64,
        })
    }

    async fn max_order(&self, tenant: &Tenant, tx: Option<&mut PgTx>) -> Result<u32, AppError> {
        let sql = sql::max_order(&self.table(tenant));
        tracing::debug!(sql = %sql, "query");
        let mut conn = Conn::get(&self.pool, tx).await?;
        let max: i32 = sqlx::query_scalar(&sql).fetch_one(&mut *conn).await?;
        Ok(max.max(0) as u32)
    }

    async fn max_ref_id(&self, tenant: &Tenant, slug: &str, tx: Option<&mut PgTx>) -> Result<u32, AppError> {
        let sql = sql::select_ref_ids_matching(&self.table(tenant));
        let pattern = ref_id_pattern(slug);
        tracing::debug!(sql = %sql, pattern = %pattern, "query");
        let mut conn = Conn::get(&self.pool, tx).await?;
        let ref_ids: Vec<String> = sqlx::query_scalar(&sql)
            .bind(&pattern)
            .fetch_all(&mut *conn)
            .await?;
        max_suffix(slug, ref_ids.iter().map(String::as_str))
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
