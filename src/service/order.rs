//! Dense 1..N display order.

use crate::error::AppError;
use crate::model::{DefinitionQuery, FieldDefinition};
use crate::store::DefinitionRepository;
use crate::tenant::Tenant;

/// Set `order` to position + 1 and return the indices whose order changed.
pub fn renumber_in_place(definitions: &mut [FieldDefinition]) -> Vec<usize> {
    let mut changed = Vec::new();
    for (i, def) in definitions.iter_mut().enumerate() {
        let order = i as u32 + 1;
        if def.order != Some(order) {
            def.order = Some(order);
            changed.push(i);
        }
    }
    changed
}

/// Reload the tenant's definitions by stored order and persist the ones whose position moved.
pub async fn renumber<R: DefinitionRepository>(repo: &R, tenant: &Tenant, tx: &mut R::Tx) -> Result<usize, AppError> {
    let query = DefinitionQuery::default().with_sort_by_order();
    let mut defs = repo
        .find_by_query(tenant, &query, 0, None, Some(&mut *tx))
        .await?
        .custom_fields;
    let changed = renumber_in_place(&mut defs);
    for &i in &changed {
        repo.update(tenant, &defs[i], Some(&mut *tx)).await?;
    }
    tracing::debug!(tenant = %tenant, changed = changed.len(), "renumbered definitions");
    Ok(changed.len())
}
