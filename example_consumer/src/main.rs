//! Example consumer: serves the custom field API over PostgreSQL.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Tenants listed in `TENANTS` (comma separated) get their schema and tables created at startup.

use custom_fields_sdk::{
    app_routes, ensure_database_exists, ensure_tenant_tables, load_from_env, AppState, CustomFieldsService,
    PgDefinitionRepository, PgRecordStore, Tenant,
};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("custom_fields_sdk=info")),
        )
        .init();

    let config = load_from_env()?;
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/custom_fields".into());
    ensure_database_exists(&database_url).await?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let tenants = std::env::var("TENANTS").unwrap_or_else(|_| "diku".into());
    for id in tenants.split(',').filter(|s| !s.trim().is_empty()) {
        let tenant: Tenant = id.parse()?;
        ensure_tenant_tables(&pool, &tenant, &config).await?;
    }

    let repo = Arc::new(PgDefinitionRepository::new(pool.clone(), config.schema_module.clone()));
    let records = Arc::new(PgRecordStore::new(pool, config.schema_module.clone()));
    let service = CustomFieldsService::new(repo, records, config)?;
    let app = app_routes(AppState::new(service));

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("custom fields service listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
