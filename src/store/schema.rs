//! DDL bootstrap: database, tenant schema and the definitions table.

use crate::config::FieldsConfig;
use crate::error::AppError;
use crate::sql::{qualified_table, quoted, DEFINITIONS_TABLE};
use crate::tenant::Tenant;
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

/// Create `<tenant>_<schema_module>` and its `custom_fields` table if missing.
/// refId uniqueness is enforced by a unique expression index.
pub async fn ensure_tenant_tables(pool: &PgPool, tenant: &Tenant, config: &FieldsConfig) -> Result<(), AppError> {
    let schema = tenant.schema_name(&config.schema_module);
    let ddl_schema = format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(&schema));
    tracing::debug!(sql = %ddl_schema, "ddl");
    sqlx::query(&ddl_schema).execute(pool).await?;

    let table = qualified_table(&schema, DEFINITIONS_TABLE);
    let ddl_table = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            id TEXT PRIMARY KEY,
            jsonb JSONB NOT NULL
        )
        "#,
        table
    );
    sqlx::query(&ddl_table).execute(pool).await?;

    let ddl_index = format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON {} ((jsonb->>'refId'))",
        quoted("custom_fields_ref_id_idx"),
        table
    );
    sqlx::query(&ddl_index).execute(pool).await?;
    tracing::info!(tenant = %tenant, schema = %schema, "tenant tables ready");
    Ok(())
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await.map_err(AppError::Db)?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await
        .map_err(AppError::Db)?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await
            .map_err(AppError::Db)?;
    }
    Ok(())
}

/// Split `postgres://host/db?opts` into the admin URL (`.../postgres`) and `db`.
fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url.rfind('/').ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))? + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_database_url() {
        let (admin, db) = parse_db_name_from_url("postgres://u:p@localhost:5432/folio?sslmode=disable").unwrap();
        assert_eq!(admin, "postgres://u:p@localhost:5432/postgres");
        assert_eq!(db, "folio");
        assert!(parse_db_name_from_url("nodatabase").is_err());
    }
}
