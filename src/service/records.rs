//! Fans field changes and statistics out across every table backing an entity type.

use crate::config::EntityTableRegistry;
use crate::error::AppError;
use crate::model::{FieldDefinition, FieldStatistic, OptionStatistic, RecordUpdate};
use crate::store::RecordStore;
use crate::tenant::Tenant;
use std::sync::Arc;
use tokio::task::JoinSet;

/// One statement, applied to each backing table in turn.
#[derive(Clone, Debug)]
enum TableOp {
    RemoveKey {
        ref_id: String,
    },
    PruneOptions {
        ref_id: String,
        removed: Vec<String>,
        multi_select: bool,
    },
    CountKey {
        ref_id: String,
    },
    CountOption {
        ref_id: String,
        option_id: String,
        multi_select: bool,
    },
}

impl TableOp {
    fn name(&self) -> &'static str {
        match self {
            TableOp::RemoveKey { .. } => "remove_key",
            TableOp::PruneOptions { .. } => "prune_options",
            TableOp::CountKey { .. } => "count_with_key",
            TableOp::CountOption { .. } => "count_with_option",
        }
    }

    async fn run<S, Tx>(&self, store: &S, tenant: &Tenant, table: &str, tx: Option<&mut Tx>) -> Result<u64, AppError>
    where
        S: RecordStore<Tx>,
        Tx: Send + 'static,
    {
        match self {
            TableOp::RemoveKey { ref_id } => store.remove_key(tenant, table, ref_id, tx).await,
            TableOp::PruneOptions {
                ref_id,
                removed,
                multi_select,
            } => {
                store
                    .prune_options(tenant, table, ref_id, removed, *multi_select, tx)
                    .await
            }
            TableOp::CountKey { ref_id } => store.count_with_key(tenant, table, ref_id, tx).await,
            TableOp::CountOption {
                ref_id,
                option_id,
                multi_select,
            } => {
                store
                    .count_with_option(tenant, table, ref_id, option_id, *multi_select, tx)
                    .await
            }
        }
    }
}

pub struct RecordSynchronizer<S> {
    store: Arc<S>,
    registry: Arc<EntityTableRegistry>,
}

impl<S> Clone for RecordSynchronizer<S> {
    fn clone(&self) -> Self {
        RecordSynchronizer {
            store: Arc::clone(&self.store),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<S> RecordSynchronizer<S> {
    pub fn new(store: Arc<S>, registry: Arc<EntityTableRegistry>) -> Self {
        RecordSynchronizer { store, registry }
    }

    /// Run `op` on every table of the entity type and sum the results. With a transaction the
    /// tables run one after another on its connection; without one they run concurrently and the
    /// first failure fails the call (statements that already succeeded stay applied).
    async fn fan_out<Tx>(
        &self,
        tenant: &Tenant,
        entity_type: &str,
        op: TableOp,
        tx: Option<&mut Tx>,
    ) -> Result<u64, AppError>
    where
        S: RecordStore<Tx>,
        Tx: Send + 'static,
    {
        let tables = self.registry.tables_for(entity_type);
        if tables.is_empty() {
            tracing::debug!(tenant = %tenant, entity_type = %entity_type, op = op.name(), "no tables for entity type");
            return Ok(0);
        }

        if let Some(tx) = tx {
            let mut total = 0;
            for table in tables {
                total += op.run(self.store.as_ref(), tenant, table, Some(&mut *tx)).await?;
            }
            return Ok(total);
        }

        let mut set = JoinSet::new();
        for table in tables {
            let store = Arc::clone(&self.store);
            let op = op.clone();
            let tenant = tenant.clone();
            let table = table.clone();
            set.spawn(async move {
                let result = op.run::<S, Tx>(store.as_ref(), &tenant, &table, None).await;
                (table, result)
            });
        }

        let mut total = 0;
        let mut first_err: Option<AppError> = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(n))) => total += n,
                Ok((table, Err(e))) => {
                    tracing::warn!(tenant = %tenant, table = %table, op = op.name(), error = %e, "table statement failed");
                    first_err.get_or_insert(e);
                }
                Err(e) => {
                    tracing::warn!(tenant = %tenant, op = op.name(), error = %e, "table task failed");
                    first_err.get_or_insert(AppError::Store(format!("table task failed: {}", e)));
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(total),
        }
    }

    /// Remove the field's value from every record of its entity type.
    pub async fn delete_all_values<Tx>(
        &self,
        tenant: &Tenant,
        field: &FieldDefinition,
        tx: Option<&mut Tx>,
    ) -> Result<u64, AppError>
    where
        S: RecordStore<Tx>,
        Tx: Send + 'static,
    {
        let op = TableOp::RemoveKey {
            ref_id: field.ref_id_str().to_string(),
        };
        let n = self.fan_out(tenant, &field.entity_type, op, tx).await?;
        tracing::debug!(tenant = %tenant, ref_id = %field.ref_id_str(), records = n, "deleted field values");
        Ok(n)
    }

    /// Drop removed option ids from every stored value of the field.
    pub async fn delete_missing_option_values<Tx>(
        &self,
        tenant: &Tenant,
        update: &RecordUpdate,
        tx: Option<&mut Tx>,
    ) -> Result<u64, AppError>
    where
        S: RecordStore<Tx>,
        Tx: Send + 'static,
    {
        if !update.has_removals() {
            return Ok(0);
        }
        let op = TableOp::PruneOptions {
            ref_id: update.ref_id().to_string(),
            removed: update.removed_option_ids.clone(),
            multi_select: update.is_multi_select(),
        };
        let n = self.fan_out(tenant, &update.field.entity_type, op, tx).await?;
        tracing::debug!(
            tenant = %tenant,
            ref_id = %update.ref_id(),
            removed = ?update.removed_option_ids,
            records = n,
            "pruned option values"
        );
        Ok(n)
    }

    pub async fn retrieve_statistic<Tx>(
        &self,
        tenant: &Tenant,
        field: &FieldDefinition,
        tx: Option<&mut Tx>,
    ) -> Result<FieldStatistic, AppError>
    where
        S: RecordStore<Tx>,
        Tx: Send + 'static,
    {
        let op = TableOp::CountKey {
            ref_id: field.ref_id_str().to_string(),
        };
        let count = self.fan_out(tenant, &field.entity_type, op, tx).await?;
        Ok(FieldStatistic {
            field_id: field.id_str().to_string(),
            entity_type: field.entity_type.clone(),
            count,
        })
    }

    pub async fn retrieve_option_statistic<Tx>(
        &self,
        tenant: &Tenant,
        field: &FieldDefinition,
        option_id: &str,
        tx: Option<&mut Tx>,
    ) -> Result<OptionStatistic, AppError>
    where
        S: RecordStore<Tx>,
        Tx: Send + 'static,
    {
        let op = TableOp::CountOption {
            ref_id: field.ref_id_str().to_string(),
            option_id: option_id.to_string(),
            multi_select: field.is_multi_select(),
        };
        let count = self.fan_out(tenant, &field.entity_type, op, tx).await?;
        Ok(OptionStatistic {
            field_id: field.id_str().to_string(),
            option_id: option_id.to_string(),
            entity_type: field.entity_type.clone(),
            count,
        })
    }
}
