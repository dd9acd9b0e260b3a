//! In-process store with the same transactional contract as PostgreSQL: a transaction works on a
//! snapshot and commit publishes it. Backs the service and route tests.

use crate::error::AppError;
use crate::model::{DefinitionPage, DefinitionQuery, FieldDefinition, CUSTOM_FIELDS_KEY};
use crate::service::ref_id::max_suffix;
use crate::store::{DefinitionRepository, RecordStore, Transactional};
use crate::tenant::Tenant;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Clone, Debug, Default)]
struct MemoryState {
    definitions: HashMap<Tenant, Vec<FieldDefinition>>,
    records: HashMap<(Tenant, String), Vec<Value>>,
}

/// Snapshot taken at `begin`; last commit wins.
pub struct MemoryTx {
    staged: MemoryState,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    failing_tables: Arc<Mutex<HashSet<String>>>,
}

fn lock_err<T>(_: T) -> AppError {
    AppError::Store("state lock".into())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(
        &self,
        tx: Option<&mut MemoryTx>,
        f: impl FnOnce(&mut MemoryState) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        match tx {
            Some(tx) => f(&mut tx.staged),
            None => {
                let mut guard = self.state.lock().map_err(lock_err)?;
                f(&mut guard)
            }
        }
    }

    /// Statements against `table` fail from now on.
    #[cfg(test)]
    pub(crate) fn fail_table(&self, table: &str) -> Result<(), AppError> {
        self.failing_tables.lock().map_err(lock_err)?.insert(table.to_string());
        Ok(())
    }

    fn check_table(&self, table: &str) -> Result<(), AppError> {
        if self.failing_tables.lock().map_err(lock_err)?.contains(table) {
            return Err(AppError::Store(format!("table {} unavailable", table)));
        }
        Ok(())
    }

    pub fn insert_record(&self, tenant: &Tenant, table: &str, document: Value) -> Result<(), AppError> {
        self.with_state(None, |s| {
            s.records
                .entry((tenant.clone(), table.to_string()))
                .or_default()
                .push(document);
            Ok(())
        })
    }

    pub fn records(&self, tenant: &Tenant, table: &str) -> Result<Vec<Value>, AppError> {
        self.with_state(None, |s| {
            Ok(s.records
                .get(&(tenant.clone(), table.to_string()))
                .cloned()
                .unwrap_or_default())
        })
    }

    pub fn definitions(&self, tenant: &Tenant) -> Result<Vec<FieldDefinition>, AppError> {
        self.with_state(None, |s| Ok(s.definitions.get(tenant).cloned().unwrap_or_default()))
    }

    /// Apply `f` to the embedded map of every record in the table; returns how many it changed.
    fn rewrite_records(
        &self,
        tenant: &Tenant,
        table: &str,
        tx: Option<&mut MemoryTx>,
        mut f: impl FnMut(&mut serde_json::Map<String, Value>) -> bool,
    ) -> Result<u64, AppError> {
        self.check_table(table)?;
        self.with_state(tx, |s| {
            let mut changed = 0;
            if let Some(docs) = s.records.get_mut(&(tenant.clone(), table.to_string())) {
                for doc in docs.iter_mut() {
                    if let Some(Value::Object(fields)) = doc.get_mut(CUSTOM_FIELDS_KEY) {
                        if f(fields) {
                            changed += 1;
                        }
                    }
                }
            }
            Ok(changed)
        })
    }

    fn count_records(
        &self,
        tenant: &Tenant,
        table: &str,
        tx: Option<&mut MemoryTx>,
        pred: impl Fn(&serde_json::Map<String, Value>) -> bool,
    ) -> Result<u64, AppError> {
        self.check_table(table)?;
        self.with_state(tx, |s| {
            Ok(s.records
                .get(&(tenant.clone(), table.to_string()))
                .map(|docs| {
                    docs.iter()
                        .filter_map(|d| d.get(CUSTOM_FIELDS_KEY).and_then(Value::as_object))
                        .filter(|fields| pred(fields))
                        .count() as u64
                })
                .unwrap_or(0))
        })
    }
}

fn is_option(value: &Value, ids: &[&str]) -> bool {
    value.as_str().map(|s| ids.contains(&s)).unwrap_or(false)
}

/// Single-select matches a string equal to the id; multi-select an array containing it.
fn selects_option(value: &Value, option_ids: &[&str], multi_select: bool) -> bool {
    match (value, multi_select) {
        (Value::Array(items), true) => items.iter().any(|v| is_option(v, option_ids)),
        (Value::String(_), false) => is_option(value, option_ids),
        _ => false,
    }
}

#[async_trait]
impl Transactional for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, AppError> {
        let staged = self.state.lock().map_err(lock_err)?.clone();
        Ok(MemoryTx { staged })
    }

    async fn commit(&self, tx: MemoryTx) -> Result<(), AppError> {
        *self.state.lock().map_err(lock_err)? = tx.staged;
        Ok(())
    }

    async fn rollback(&self, _tx: MemoryTx) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl DefinitionRepository for MemoryStore {
    async fn save(&self, tenant: &Tenant, definition: &FieldDefinition, tx: Option<&mut MemoryTx>) -> Result<(), AppError> {
        let id = definition.id_str();
        if id.is_empty() {
            return Err(AppError::Validation("definition id is required".into()));
        }
        self.with_state(tx, |s| {
            let defs = s.definitions.entry(tenant.clone()).or_default();
            if defs.iter().any(|d| d.id_str() == id) {
                return Err(AppError::Conflict(format!("duplicate id {}", id)));
            }
            let ref_id = definition.ref_id_str();
            if !ref_id.is_empty() && defs.iter().any(|d| d.ref_id_str() == ref_id) {
                return Err(AppError::Conflict(format!("duplicate refId {}", ref_id)));
            }
            defs.push(definition.clone());
            Ok(())
        })
    }

    async fn find_by_id(&self, tenant: &Tenant, id: &str, tx: Option<&mut MemoryTx>) -> Result<Option<FieldDefinition>, AppError> {
        self.with_state(tx, |s| {
            Ok(s.definitions
                .get(tenant)
                .and_then(|defs| defs.iter().find(|d| d.id_str() == id))
                .cloned())
        })
    }

    async fn update(&self, tenant: &Tenant, definition: &FieldDefinition, tx: Option<&mut MemoryTx>) -> Result<bool, AppError> {
        self.with_state(tx, |s| {
            let slot = s
                .definitions
                .get_mut(tenant)
                .and_then(|defs| defs.iter_mut().find(|d| d.id_str() == definition.id_str()));
            match slot {
                Some(existing) => {
                    *existing = definition.clone();
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    async fn delete(&self, tenant: &Tenant, id: &str, tx: Option<&mut MemoryTx>) -> Result<bool, AppError> {
        self.with_state(tx, |s| {
            let Some(defs) = s.definitions.get_mut(tenant) else {
                return Ok(false);
            };
            let before = defs.len();
            defs.retain(|d| d.id_str() != id);
            Ok(defs.len() != before)
        })
    }

    async fn find_by_query(
        &self,
        tenant: &Tenant,
        query: &DefinitionQuery,
        offset: u32,
        limit: Option<u32>,
        tx: Option<&mut MemoryTx>,
    ) -> Result<DefinitionPage, AppError> {
        self.with_state(tx, |s| {
            let mut matched: Vec<FieldDefinition> = s
                .definitions
                .get(tenant)
                .map(|defs| defs.iter().filter(|d| query.matches(d)).cloned().collect())
                .unwrap_or_default();
            matched.sort_by(|a, b| query.compare(a, b));
            let total_records = matched.len() as u64;
            let page = matched
                .into_iter()
                .skip(offset as usize)
                .take(limit.map(|l| l as usize).unwrap_or(usize::MAX))
                .collect();
            Ok(DefinitionPage {
                custom_fields: page,
                total_records,
            })
        })
    }

    async fn max_order(&self, tenant: &Tenant, tx: Option<&mut MemoryTx>) -> Result<u32, AppError> {
        self.with_state(tx, |s| {
            Ok(s.definitions
                .get(tenant)
                .and_then(|defs| defs.iter().filter_map(|d| d.order).max())
                .unwrap_or(0))
        })
    }

    async fn max_ref_id(&self, tenant: &Tenant, slug: &str, tx: Option<&mut MemoryTx>) -> Result<u32, AppError> {
        self.with_state(tx, |s| {
            let defs = s.definitions.get(tenant).map(Vec::as_slice).unwrap_or(&[]);
            max_suffix(slug, defs.iter().map(FieldDefinition::ref_id_str))
        })
    }

    async fn ping(&self) -> Result<(), AppError> {
        let _guard = self.state.lock().map_err(lock_err)?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore<MemoryTx> for MemoryStore {
    async fn remove_key(&self, tenant: &Tenant, table: &str, ref_id: &str, tx: Option<&mut MemoryTx>) -> Result<u64, AppError> {
        self.rewrite_records(tenant, table, tx, |fields| fields.remove(ref_id).is_some())
    }

    async fn prune_options(
        &self,
        tenant: &Tenant,
        table: &str,
        ref_id: &str,
        removed: &[String],
        multi_select: bool,
        tx: Option<&mut MemoryTx>,
    ) -> Result<u64, AppError> {
        let removed: Vec<&str> = removed.iter().map(String::as_str).collect();
        self.rewrite_records(tenant, table, tx, |fields| {
            let Some(value) = fields.get_mut(ref_id) else {
                return false;
            };
            if !selects_option(value, &removed, multi_select) {
                return false;
            }
            let remaining: Vec<Value> = match value {
                Value::Array(items) => items.iter().filter(|v| !is_option(v, &removed)).cloned().collect(),
                _ => Vec::new(),
            };
            *value = if remaining.is_empty() {
                Value::Null
            } else {
                Value::Array(remaining)
            };
            true
        })
    }

    async fn count_with_key(&self, tenant: &Tenant, table: &str, ref_id: &str, tx: Option<&mut MemoryTx>) -> Result<u64, AppError> {
        self.count_records(tenant, table, tx, |fields| fields.contains_key(ref_id))
    }

    async fn count_with_option(
        &self,
        tenant: &Tenant,
        table: &str,
        ref_id: &str,
        option_id: &str,
        multi_select: bool,
        tx: Option<&mut MemoryTx>,
    ) -> Result<u64, AppError> {
        self.count_records(tenant, table, tx, |fields| {
            fields
                .get(ref_id)
                .map(|v| selects_option(v, &[option_id], multi_select))
                .unwrap_or(false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldType;
    use serde_json::json;

    fn tenant() -> Tenant {
        "diku".parse().unwrap()
    }

    fn def(id: &str, ref_id: &str, order: u32) -> FieldDefinition {
        let mut d = FieldDefinition::new(ref_id, FieldType::TextboxShort, "user");
        d.id = Some(id.into());
        d.ref_id = Some(ref_id.into());
        d.order = Some(order);
        d
    }

    #[tokio::test]
    async fn rollback_discards_and_commit_publishes() {
        let store = MemoryStore::new();
        let t = tenant();
        let mut tx = store.begin().await.unwrap();
        store.save(&t, &def("1", "a", 1), Some(&mut tx)).await.unwrap();
        assert!(store.find_by_id(&t, "1", None).await.unwrap().is_none());
        store.rollback(tx).await.unwrap();
        assert!(store.definitions(&t).unwrap().is_empty());

        let mut tx = store.begin().await.unwrap();
        store.save(&t, &def("1", "a", 1), Some(&mut tx)).await.unwrap();
        store.commit(tx).await.unwrap();
        assert!(store.find_by_id(&t, "1", None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn save_rejects_duplicate_id_and_ref_id() {
        let store = MemoryStore::new();
        let t = tenant();
        store.save(&t, &def("1", "a", 1), None).await.unwrap();
        assert!(matches!(store.save(&t, &def("1", "b", 2), None).await, Err(AppError::Conflict(_))));
        assert!(matches!(store.save(&t, &def("2", "a", 2), None).await, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn pages_and_maxima() {
        let store = MemoryStore::new();
        let t = tenant();
        for (id, r, o) in [("1", "dueDate", 2), ("2", "dueDate_2", 1), ("3", "other", 3)] {
            store.save(&t, &def(id, r, o), None).await.unwrap();
        }
        let q = DefinitionQuery::default().with_sort_by_order();
        let page = store.find_by_query(&t, &q, 1, Some(1), None).await.unwrap();
        assert_eq!(page.total_records, 3);
        assert_eq!(page.custom_fields[0].id_str(), "1");
        assert_eq!(store.max_order(&t, None).await.unwrap(), 3);
        assert_eq!(store.max_ref_id(&t, "dueDate", None).await.unwrap(), 2);
        assert_eq!(store.max_ref_id(&t, "fresh", None).await.unwrap(), 0);
        assert!(store.delete(&t, "3", None).await.unwrap());
        assert!(!store.delete(&t, "3", None).await.unwrap());
    }

    #[tokio::test]
    async fn prunes_single_and_multi_values() {
        let store = MemoryStore::new();
        let t = tenant();
        store.insert_record(&t, "users", json!({ "customFields": { "dept": ["opt_1", "opt_2", "opt_3"] } })).unwrap();
        store.insert_record(&t, "users", json!({ "customFields": { "dept": ["opt_2"] } })).unwrap();
        store.insert_record(&t, "users", json!({ "customFields": { "dept": ["opt_4"] } })).unwrap();
        let removed = vec!["opt_2".to_string()];
        let n = store.prune_options(&t, "users", "dept", &removed, true, None).await.unwrap();
        assert_eq!(n, 2);
        let docs = store.records(&t, "users").unwrap();
        assert_eq!(docs[0]["customFields"]["dept"], json!(["opt_1", "opt_3"]));
        assert_eq!(docs[1]["customFields"]["dept"], Value::Null);
        assert_eq!(docs[2]["customFields"]["dept"], json!(["opt_4"]));

        store.insert_record(&t, "items", json!({ "customFields": { "colour": "opt_1" } })).unwrap();
        store.insert_record(&t, "items", json!({ "customFields": { "colour": "opt_2" } })).unwrap();
        let removed = vec!["opt_1".to_string()];
        assert_eq!(store.prune_options(&t, "items", "colour", &removed, false, None).await.unwrap(), 1);
        assert_eq!(store.count_with_key(&t, "items", "colour", None).await.unwrap(), 2);
        assert_eq!(store.count_with_option(&t, "items", "colour", "opt_2", false, None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn failing_table_errors() {
        let store = MemoryStore::new();
        store.fail_table("users").unwrap();
        let err = store.remove_key(&tenant(), "users", "a", None).await.unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
    }
}
