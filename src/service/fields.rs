//! Custom field definitions: single create/update/delete, replace-all reconciliation and statistics.

use crate::config::{resolve, FieldsConfig};
use crate::error::{AppError, ConfigError};
use crate::model::{
    CheckboxField, DefinitionPage, DefinitionQuery, FieldDefinition, FieldStatistic, FieldType, OptionStatistic,
    RecordUpdate, LONG_TEXT_MAX_SIZE, SHORT_TEXT_MAX_SIZE,
};
use crate::service::actor::{created_metadata, updated_metadata, Actor, ActorResolver, HeaderActorResolver, RequestContext};
use crate::service::options::{clear_unissued_option_ids, highest_option_index, prepare_options};
use crate::service::records::RecordSynchronizer;
use crate::service::validation::{ensure_has_option, ensure_immutable_attributes, ensure_selectable, FieldValidator};
use crate::service::{order, ref_id};
use crate::store::{DefinitionRepository, RecordStore};
use crate::tenant::Tenant;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Object-safe service surface used by the HTTP layer.
#[async_trait]
pub trait CustomFields: Send + Sync {
    async fn create(&self, ctx: &RequestContext, definition: FieldDefinition) -> Result<FieldDefinition, AppError>;

    async fn update(&self, ctx: &RequestContext, id: &str, definition: FieldDefinition) -> Result<FieldDefinition, AppError>;

    async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<(), AppError>;

    /// Make the entity type's definitions exactly `desired`, atomically.
    async fn replace_all(
        &self,
        ctx: &RequestContext,
        entity_type: &str,
        desired: Vec<FieldDefinition>,
    ) -> Result<Vec<FieldDefinition>, AppError>;

    async fn find_by_id(&self, tenant: &Tenant, id: &str) -> Result<FieldDefinition, AppError>;

    async fn find_by_query(
        &self,
        tenant: &Tenant,
        query: DefinitionQuery,
        offset: u32,
        limit: Option<u32>,
    ) -> Result<DefinitionPage, AppError>;

    async fn statistic(&self, tenant: &Tenant, id: &str) -> Result<FieldStatistic, AppError>;

    async fn option_statistic(&self, tenant: &Tenant, id: &str, option_id: &str) -> Result<OptionStatistic, AppError>;

    /// Check an entity's `customFields` map against the entity type's definitions.
    async fn validate_custom_fields(
        &self,
        tenant: &Tenant,
        entity_type: &str,
        values: &Map<String, Value>,
    ) -> Result<(), AppError>;

    async fn ping(&self) -> Result<(), AppError>;
}

pub struct CustomFieldsService<R, S> {
    repo: Arc<R>,
    records: RecordSynchronizer<S>,
    actors: Arc<dyn ActorResolver>,
    config: Arc<FieldsConfig>,
}

impl<R, S> CustomFieldsService<R, S>
where
    R: DefinitionRepository,
    S: RecordStore<R::Tx>,
{
    /// Resolves the entity table mapping; invalid config is rejected here.
    pub fn new(repo: Arc<R>, store: Arc<S>, config: FieldsConfig) -> Result<Self, ConfigError> {
        let registry = resolve(&config)?;
        Ok(CustomFieldsService {
            repo,
            records: RecordSynchronizer::new(store, Arc::new(registry)),
            actors: Arc::new(HeaderActorResolver),
            config: Arc::new(config),
        })
    }

    pub fn with_actor_resolver(mut self, actors: impl ActorResolver) -> Self {
        self.actors = Arc::new(actors);
        self
    }

    /// Commit on success, roll back on failure. A failed rollback is logged; the original error wins.
    async fn finish<T>(&self, tx: R::Tx, result: Result<T, AppError>) -> Result<T, AppError> {
        match result {
            Ok(value) => {
                self.repo.commit(tx).await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rb) = self.repo.rollback(tx).await {
                    tracing::warn!(error = %rb, "rollback failed");
                }
                Err(e)
            }
        }
    }

    async fn get(&self, tenant: &Tenant, id: &str, tx: Option<&mut R::Tx>) -> Result<FieldDefinition, AppError> {
        match self.repo.find_by_id(tenant, id, tx).await? {
            Some(def) => Ok(def),
            None => {
                tracing::warn!(tenant = %tenant, id = %id, "custom field not found");
                Err(AppError::NotFound(format!("custom field {}", id)))
            }
        }
    }

    async fn create_in(
        &self,
        tenant: &Tenant,
        mut definition: FieldDefinition,
        actor: &Actor,
        tx: &mut R::Tx,
    ) -> Result<FieldDefinition, AppError> {
        let max = self.repo.max_order(tenant, Some(&mut *tx)).await?;
        definition.order = Some(max + 1);
        self.insert_definition(tenant, definition, actor, tx).await
    }

    /// Assign id, option ids, refId and creator metadata, then save. `order` is set by the caller.
    async fn insert_definition(
        &self,
        tenant: &Tenant,
        mut definition: FieldDefinition,
        actor: &Actor,
        tx: &mut R::Tx,
    ) -> Result<FieldDefinition, AppError> {
        if definition.id.as_deref().map(str::trim).unwrap_or("").is_empty() {
            definition.id = Some(uuid::Uuid::new_v4().to_string());
        }
        normalize(&mut definition);
        if let Some(select) = definition.select_field.as_mut() {
            select.highest_option_id = None;
            clear_unissued_option_ids(select, &[]);
            prepare_options(select, 0);
        }
        definition.metadata = Some(created_metadata(actor));
        let ref_id = ref_id::allocate(self.repo.as_ref(), tenant, &definition.name, Some(&mut *tx)).await?;
        definition.ref_id = Some(ref_id);
        self.repo.save(tenant, &definition, Some(tx)).await?;
        tracing::debug!(
            tenant = %tenant,
            id = %definition.id_str(),
            ref_id = %definition.ref_id_str(),
            "created custom field"
        );
        Ok(definition)
    }

    async fn update_in(
        &self,
        tenant: &Tenant,
        id: &str,
        mut definition: FieldDefinition,
        actor: &Actor,
        tx: &mut R::Tx,
    ) -> Result<FieldDefinition, AppError> {
        let stored = self.get(tenant, id, Some(&mut *tx)).await?;
        definition.order = stored.order;
        self.apply_update(tenant, &stored, definition, actor, tx).await
    }

    /// Persist `definition` over `stored`, keeping id and refId, then prune values of removed options.
    async fn apply_update(
        &self,
        tenant: &Tenant,
        stored: &FieldDefinition,
        mut definition: FieldDefinition,
        actor: &Actor,
        tx: &mut R::Tx,
    ) -> Result<FieldDefinition, AppError> {
        definition.id = stored.id.clone();
        definition.ref_id = stored.ref_id.clone();
        normalize(&mut definition);
        ensure_immutable_attributes(stored, &definition)?;

        let mut record_update = None;
        if definition.is_selectable() {
            let floor = stored.select_field.as_ref().map(highest_option_index).unwrap_or(0);
            let issued = stored.option_ids();
            if let Some(select) = definition.select_field.as_mut() {
                select.highest_option_id = None;
                let cleared = clear_unissued_option_ids(select, &issued);
                if cleared > 0 {
                    tracing::debug!(id = %stored.id_str(), cleared, "discarded option ids not issued by this field");
                }
                prepare_options(select, floor);
            }
            record_update = Some(RecordUpdate::between(stored, &definition));
        }
        definition.metadata = Some(updated_metadata(stored.metadata.as_ref(), actor));

        if !self.repo.update(tenant, &definition, Some(&mut *tx)).await? {
            return Err(AppError::NotFound(format!("custom field {}", stored.id_str())));
        }
        if let Some(update) = record_update.filter(RecordUpdate::has_removals) {
            self.records
                .delete_missing_option_values(tenant, &update, Some(tx))
                .await?;
        }
        tracing::debug!(tenant = %tenant, id = %definition.id_str(), "updated custom field");
        Ok(definition)
    }

    async fn delete_in(&self, tenant: &Tenant, id: &str, tx: &mut R::Tx) -> Result<(), AppError> {
        let stored = self.get(tenant, id, Some(&mut *tx)).await?;
        self.records
            .delete_all_values(tenant, &stored, Some(&mut *tx))
            .await?;
        if !self.repo.delete(tenant, id, Some(&mut *tx)).await? {
            return Err(AppError::NotFound(format!("custom field {}", id)));
        }
        order::renumber(self.repo.as_ref(), tenant, tx).await?;
        tracing::debug!(tenant = %tenant, id = %id, ref_id = %stored.ref_id_str(), "deleted custom field");
        Ok(())
    }

    async fn replace_all_in(
        &self,
        tenant: &Tenant,
        entity_type: &str,
        desired: Vec<FieldDefinition>,
        actor: &Actor,
        tx: &mut R::Tx,
    ) -> Result<Vec<FieldDefinition>, AppError> {
        let query = DefinitionQuery::for_entity_type(entity_type).with_sort_by_order();
        let current: HashMap<String, FieldDefinition> = self
            .repo
            .find_by_query(tenant, &query, 0, None, Some(&mut *tx))
            .await?
            .custom_fields
            .into_iter()
            .map(|d| (d.id_str().to_string(), d))
            .collect();
        let desired_ids: HashSet<&str> = desired.iter().map(FieldDefinition::id_str).collect();

        let mut to_delete: Vec<&FieldDefinition> = current
            .values()
            .filter(|d| !desired_ids.contains(d.id_str()))
            .collect();
        to_delete.sort_by_key(|d| d.order);
        for def in &to_delete {
            if !self.repo.delete(tenant, def.id_str(), Some(&mut *tx)).await? {
                return Err(AppError::NotFound(format!("custom field {}", def.id_str())));
            }
        }

        let mut persisted: Vec<Option<FieldDefinition>> = vec![None; desired.len()];
        let mut inserts = Vec::new();
        let mut updated = 0;
        for (i, def) in desired.into_iter().enumerate() {
            match current.get(def.id_str()) {
                Some(stored) => {
                    persisted[i] = Some(self.apply_update(tenant, stored, def, actor, tx).await?);
                    updated += 1;
                }
                None => inserts.push((i, def)),
            }
        }
        let inserted = inserts.len();
        for (i, def) in inserts {
            persisted[i] = Some(self.insert_definition(tenant, def, actor, tx).await?);
        }

        for def in &to_delete {
            self.records
                .delete_all_values(tenant, def, Some(&mut *tx))
                .await?;
        }

        tracing::info!(
            tenant = %tenant,
            entity_type = %entity_type,
            deleted = to_delete.len(),
            updated,
            inserted,
            "replaced custom fields"
        );
        Ok(persisted.into_iter().flatten().collect())
    }
}

/// Fill type defaults: text format and size, checkbox default, select cardinality.
fn normalize(definition: &mut FieldDefinition) {
    match definition.field_type {
        FieldType::TextboxShort | FieldType::TextboxLong => {
            let default_max = if definition.field_type == FieldType::TextboxShort {
                SHORT_TEXT_MAX_SIZE
            } else {
                LONG_TEXT_MAX_SIZE
            };
            let text = definition.text_field.get_or_insert_with(Default::default);
            if text.max_size.is_none() {
                text.max_size = Some(default_max);
            }
        }
        FieldType::SingleCheckbox => {
            definition.checkbox_field.get_or_insert_with(CheckboxField::default);
        }
        _ => {}
    }
}

#[async_trait]
impl<R, S> CustomFields for CustomFieldsService<R, S>
where
    R: DefinitionRepository,
    S: RecordStore<R::Tx>,
{
    async fn create(&self, ctx: &RequestContext, definition: FieldDefinition) -> Result<FieldDefinition, AppError> {
        let tenant = &ctx.tenant;
        tracing::debug!(tenant = %tenant, name = %definition.name, "create custom field");
        FieldValidator::validate_definition(&definition, &self.config)?;
        let actor = self.actors.resolve(ctx)?;
        let mut tx = self.repo.begin().await?;
        let result = self.create_in(tenant, definition, &actor, &mut tx).await;
        self.finish(tx, result).await
    }

    async fn update(&self, ctx: &RequestContext, id: &str, definition: FieldDefinition) -> Result<FieldDefinition, AppError> {
        let tenant = &ctx.tenant;
        tracing::debug!(tenant = %tenant, id = %id, "update custom field");
        FieldValidator::validate_definition(&definition, &self.config)?;
        let actor = self.actors.resolve(ctx)?;
        let mut tx = self.repo.begin().await?;
        let result = self.update_in(tenant, id, definition, &actor, &mut tx).await;
        self.finish(tx, result).await
    }

    async fn delete(&self, ctx: &RequestContext, id: &str) -> Result<(), AppError> {
        let tenant = &ctx.tenant;
        tracing::debug!(tenant = %tenant, id = %id, "delete custom field");
        let mut tx = self.repo.begin().await?;
        let result = self.delete_in(tenant, id, &mut tx).await;
        self.finish(tx, result).await
    }

    async fn replace_all(
        &self,
        ctx: &RequestContext,
        entity_type: &str,
        mut desired: Vec<FieldDefinition>,
    ) -> Result<Vec<FieldDefinition>, AppError> {
        let tenant = &ctx.tenant;
        tracing::debug!(tenant = %tenant, entity_type = %entity_type, count = desired.len(), "replace custom fields");
        for def in &desired {
            FieldValidator::validate_definition(def, &self.config)?;
            if def.entity_type != entity_type {
                return Err(AppError::Validation(format!(
                    "custom field '{}' has entityType '{}', expected '{}'",
                    def.name, def.entity_type, entity_type
                )));
            }
        }
        let actor = self.actors.resolve(ctx)?;

        let mut seen = HashSet::new();
        for (i, def) in desired.iter_mut().enumerate() {
            def.order = Some(i as u32 + 1);
            if def.id.as_deref().map(str::trim).unwrap_or("").is_empty() {
                def.id = Some(uuid::Uuid::new_v4().to_string());
            }
            if !seen.insert(def.id_str().to_string()) {
                return Err(AppError::Validation(format!("duplicate custom field id {}", def.id_str())));
            }
        }

        let mut tx = self.repo.begin().await?;
        let result = self.replace_all_in(tenant, entity_type, desired, &actor, &mut tx).await;
        self.finish(tx, result).await
    }

    async fn find_by_id(&self, tenant: &Tenant, id: &str) -> Result<FieldDefinition, AppError> {
        self.get(tenant, id, None).await
    }

    async fn find_by_query(
        &self,
        tenant: &Tenant,
        query: DefinitionQuery,
        offset: u32,
        limit: Option<u32>,
    ) -> Result<DefinitionPage, AppError> {
        let query = query.with_sort_by_order();
        let limit = self.config.page_limit(limit);
        tracing::debug!(tenant = %tenant, offset, limit, "find custom fields");
        self.repo
            .find_by_query(tenant, &query, offset, Some(limit), None)
            .await
    }

    async fn statistic(&self, tenant: &Tenant, id: &str) -> Result<FieldStatistic, AppError> {
        let field = self.get(tenant, id, None).await?;
        self.records.retrieve_statistic::<R::Tx>(tenant, &field, None).await
    }

    async fn option_statistic(&self, tenant: &Tenant, id: &str, option_id: &str) -> Result<OptionStatistic, AppError> {
        let field = self.get(tenant, id, None).await?;
        ensure_selectable(&field)?;
        ensure_has_option(&field, option_id)?;
        self.records
            .retrieve_option_statistic::<R::Tx>(tenant, &field, option_id, None)
            .await
    }

    async fn validate_custom_fields(
        &self,
        tenant: &Tenant,
        entity_type: &str,
        values: &Map<String, Value>,
    ) -> Result<(), AppError> {
        let query = DefinitionQuery::for_entity_type(entity_type).with_sort_by_order();
        let defs = self
            .repo
            .find_by_query(tenant, &query, 0, None, None)
            .await?
            .custom_fields;
        FieldValidator::validate_values(values, &defs)
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.repo.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableSpec;
    use crate::model::{EmbeddedValue, SelectOption, SortingOrder, TextFormat};
    use crate::store::MemoryStore;
    use serde_json::json;

    type Service = CustomFieldsService<MemoryStore, MemoryStore>;

    fn setup() -> (Arc<MemoryStore>, Service) {
        let store = Arc::new(MemoryStore::new());
        let config = FieldsConfig::default()
            .with_tables("user", TableSpec::Many(vec!["users".into(), "legacy_users".into()]));
        let service = CustomFieldsService::new(Arc::clone(&store), Arc::clone(&store), config).unwrap();
        (store, service)
    }

    fn tenant() -> Tenant {
        "diku".parse().unwrap()
    }

    fn ctx() -> RequestContext {
        RequestContext::new(tenant()).with_user("u1", Some("admin".into()))
    }

    fn text(name: &str) -> FieldDefinition {
        FieldDefinition::new(name, FieldType::TextboxShort, "user")
    }

    fn radio(name: &str, options: Vec<SelectOption>) -> FieldDefinition {
        FieldDefinition::new(name, FieldType::RadioButton, "user").with_options(options, None)
    }

    #[tokio::test]
    async fn create_allocates_ref_ids_and_dense_order() {
        let (_, service) = setup();
        let first = service
            .create(&ctx(), FieldDefinition::new("Due Date", FieldType::DatePicker, "user"))
            .await
            .unwrap();
        let second = service
            .create(&ctx(), FieldDefinition::new("Due Date", FieldType::DatePicker, "user"))
            .await
            .unwrap();
        assert_eq!(first.ref_id_str(), "dueDate");
        assert_eq!(second.ref_id_str(), "dueDate_2");
        assert_eq!((first.order, second.order), (Some(1), Some(2)));
        assert!(!first.id_str().is_empty());
        assert_ne!(first.id_str(), second.id_str());
        let meta = first.metadata.unwrap();
        assert_eq!(meta.created_by_user_id.as_deref(), Some("u1"));
        assert_eq!(meta.created_by_username.as_deref(), Some("admin"));

        let note = service.create(&ctx(), text("Note")).await.unwrap();
        let tf = note.text_field.unwrap();
        assert_eq!(tf.max_size, Some(150));
        assert_eq!(tf.field_format, TextFormat::Text);
    }

    #[tokio::test]
    async fn create_sorts_then_numbers_options() {
        let (_, service) = setup();
        let def = FieldDefinition::new("Letters", FieldType::SingleSelectDropdown, "user")
            .with_options(vec![SelectOption::new("b"), SelectOption::new("a")], Some(SortingOrder::Asc));
        let created = service.create(&ctx(), def).await.unwrap();
        let options: Vec<_> = created
            .options()
            .iter()
            .map(|o| (o.value.as_str(), o.id.as_deref().unwrap_or("")))
            .collect();
        assert_eq!(options, vec![("a", "opt_1"), ("b", "opt_2")]);
    }

    #[tokio::test]
    async fn create_requires_user_and_letters() {
        let (store, service) = setup();
        let anonymous = RequestContext::new(tenant());
        let err = service.create(&anonymous, text("Note")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let err = service.create(&ctx(), text("123 ?")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.definitions(&tenant()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_rejects_type_change_and_keeps_stored() {
        let (_, service) = setup();
        let created = service.create(&ctx(), text("Note")).await.unwrap();
        let mut changed = created.clone();
        changed.field_type = FieldType::TextboxLong;
        let err = service.update(&ctx(), created.id_str(), changed).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(service.find_by_id(&tenant(), created.id_str()).await.unwrap(), created);

        let mut reformatted = created.clone();
        if let Some(tf) = reformatted.text_field.as_mut() {
            tf.field_format = TextFormat::Email;
        }
        assert!(service.update(&ctx(), created.id_str(), reformatted).await.is_err());
    }

    #[tokio::test]
    async fn update_keeps_ref_id_order_and_option_ids() {
        let (_, service) = setup();
        let created = service
            .create(&ctx(), radio("Colour", vec![SelectOption::new("red"), SelectOption::new("green")]))
            .await
            .unwrap();
        assert_eq!(created.option_ids(), vec!["opt_1", "opt_2"]);

        let mut submitted = radio(
            "Favourite colour",
            vec![
                SelectOption::new("green").with_id("opt_2"),
                SelectOption::new("red").with_id("opt_1"),
                SelectOption::new("blue"),
            ],
        );
        submitted.ref_id = Some("hijacked".into());
        submitted.order = Some(99);
        let editor = RequestContext::new(tenant()).with_user("u2", None);
        let updated = service.update(&editor, created.id_str(), submitted).await.unwrap();

        assert_eq!(updated.ref_id_str(), "colour");
        assert_eq!(updated.order, created.order);
        assert_eq!(updated.name, "Favourite colour");
        assert_eq!(updated.option_ids(), vec!["opt_2", "opt_1", "opt_3"]);
        let meta = updated.metadata.unwrap();
        assert_eq!(meta.created_by_user_id.as_deref(), Some("u1"));
        assert_eq!(meta.updated_by_user_id.as_deref(), Some("u2"));
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let (_, service) = setup();
        let err = service.update(&ctx(), "nope", text("Note")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn removed_options_are_pruned_and_never_reused() {
        let (store, service) = setup();
        let t = tenant();
        let created = service
            .create(&ctx(), radio("Colour", vec![SelectOption::new("red"), SelectOption::new("green")]))
            .await
            .unwrap();
        store.insert_record(&t, "users", json!({ "customFields": { "colour": "opt_2" } })).unwrap();
        store.insert_record(&t, "legacy_users", json!({ "customFields": { "colour": "opt_1" } })).unwrap();

        let only_red = radio("Colour", vec![SelectOption::new("red").with_id("opt_1")]);
        service.update(&ctx(), created.id_str(), only_red).await.unwrap();
        let users = store.records(&t, "users").unwrap();
        assert_eq!(EmbeddedValue::read(&users[0], "colour"), EmbeddedValue::Empty);
        let legacy = store.records(&t, "legacy_users").unwrap();
        assert_eq!(legacy[0]["customFields"]["colour"], json!("opt_1"));

        let with_purple = radio(
            "Colour",
            vec![SelectOption::new("red").with_id("opt_1"), SelectOption::new("purple")],
        );
        let updated = service.update(&ctx(), created.id_str(), with_purple).await.unwrap();
        assert_eq!(updated.option_ids(), vec!["opt_1", "opt_3"]);
    }

    #[tokio::test]
    async fn deleted_option_id_is_not_handed_back() {
        let (store, service) = setup();
        let t = tenant();
        let created = service
            .create(&ctx(), radio("Colour", vec![SelectOption::new("red"), SelectOption::new("green")]))
            .await
            .unwrap();
        let only_red = radio("Colour", vec![SelectOption::new("red").with_id("opt_1")]);
        service.update(&ctx(), created.id_str(), only_red).await.unwrap();
        store.insert_record(&t, "users", json!({ "customFields": { "colour": "opt_2" } })).unwrap();

        let stale = radio(
            "Colour",
            vec![SelectOption::new("red").with_id("opt_1"), SelectOption::new("blue").with_id("opt_2")],
        );
        let updated = service.update(&ctx(), created.id_str(), stale).await.unwrap();
        assert_eq!(updated.option_ids(), vec!["opt_1", "opt_3"]);
        assert_eq!(updated.select_field.unwrap().highest_option_id, Some(3));
        assert!(matches!(
            service.option_statistic(&t, created.id_str(), "opt_2").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn client_option_ids_on_create_are_regenerated() {
        let (_, service) = setup();
        let def = radio(
            "Colour",
            vec![SelectOption::new("red").with_id("opt_7"), SelectOption::new("green").with_id("mine")],
        );
        let created = service.create(&ctx(), def).await.unwrap();
        assert_eq!(created.option_ids(), vec!["opt_1", "opt_2"]);
    }

    #[tokio::test]
    async fn update_rejects_entity_type_change() {
        let (_, service) = setup();
        let created = service.create(&ctx(), text("Note")).await.unwrap();
        let mut moved = created.clone();
        moved.entity_type = "item".into();
        let err = service.update(&ctx(), created.id_str(), moved).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(service.find_by_id(&tenant(), created.id_str()).await.unwrap().entity_type, "user");
    }

    #[tokio::test]
    async fn delete_removes_values_and_renumbers() {
        let (store, service) = setup();
        let t = tenant();
        let a = service.create(&ctx(), text("textbox")).await.unwrap();
        let b = service.create(&ctx(), text("Second")).await.unwrap();
        let c = service.create(&ctx(), text("Third")).await.unwrap();
        store
            .insert_record(&t, "users", json!({ "id": "u", "customFields": { "textbox": "x", "second": "y" } }))
            .unwrap();

        service.delete(&ctx(), a.id_str()).await.unwrap();
        let doc = &store.records(&t, "users").unwrap()[0];
        assert_eq!(doc, &json!({ "id": "u", "customFields": { "second": "y" } }));
        assert_eq!(service.find_by_id(&t, b.id_str()).await.unwrap().order, Some(1));
        assert_eq!(service.find_by_id(&t, c.id_str()).await.unwrap().order, Some(2));
        assert_eq!(service.statistic(&t, b.id_str()).await.unwrap().count, 1);

        let err = service.delete(&ctx(), a.id_str()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_rolls_back_when_a_table_fails() {
        let (store, service) = setup();
        let t = tenant();
        let a = service.create(&ctx(), text("textbox")).await.unwrap();
        store.fail_table("legacy_users").unwrap();
        assert!(service.delete(&ctx(), a.id_str()).await.is_err());
        assert!(service.find_by_id(&t, a.id_str()).await.is_ok());
    }

    #[tokio::test]
    async fn replace_all_deletes_updates_and_inserts() {
        let (store, service) = setup();
        let t = tenant();
        let keep = service.create(&ctx(), text("Keep")).await.unwrap();
        let drop = service.create(&ctx(), text("Drop")).await.unwrap();
        store
            .insert_record(&t, "users", json!({ "customFields": { "keep": "k", "drop": "d" } }))
            .unwrap();

        let mut renamed = keep.clone();
        renamed.name = "Kept".into();
        let result = service
            .replace_all(&ctx(), "user", vec![text("Fresh"), renamed])
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].ref_id_str(), "fresh");
        assert_eq!(result[0].order, Some(1));
        assert_eq!(result[1].id_str(), keep.id_str());
        assert_eq!(result[1].ref_id_str(), "keep");
        assert_eq!(result[1].order, Some(2));
        assert!(matches!(
            service.find_by_id(&t, drop.id_str()).await,
            Err(AppError::NotFound(_))
        ));
        let doc = &store.records(&t, "users").unwrap()[0];
        assert_eq!(doc, &json!({ "customFields": { "keep": "k" } }));
    }

    #[tokio::test]
    async fn replace_all_is_atomic() {
        let (store, service) = setup();
        let t = tenant();
        let keep = service.create(&ctx(), text("Keep")).await.unwrap();
        let drop = service.create(&ctx(), text("Drop")).await.unwrap();
        store
            .insert_record(&t, "users", json!({ "customFields": { "drop": "d" } }))
            .unwrap();

        let mut renamed = keep.clone();
        renamed.name = "Kept".into();
        // "!!!" has no letters, so its insert fails after the delete and the update ran.
        let err = service
            .replace_all(&ctx(), "user", vec![renamed, text("!!!")])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        assert_eq!(service.find_by_id(&t, keep.id_str()).await.unwrap().name, "Keep");
        assert!(service.find_by_id(&t, drop.id_str()).await.is_ok());
        assert_eq!(store.records(&t, "users").unwrap()[0], json!({ "customFields": { "drop": "d" } }));
    }

    #[tokio::test]
    async fn replace_all_rejects_mismatched_entity_type_and_duplicate_ids() {
        let (_, service) = setup();
        let mut other = text("Other");
        other.entity_type = "item".into();
        assert!(matches!(
            service.replace_all(&ctx(), "user", vec![other]).await,
            Err(AppError::Validation(_))
        ));

        let mut a = text("A");
        a.id = Some("same".into());
        let mut b = text("B");
        b.id = Some("same".into());
        assert!(matches!(
            service.replace_all(&ctx(), "user", vec![a, b]).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn option_statistics_check_field_and_option() {
        let (store, service) = setup();
        let t = tenant();
        let dept = FieldDefinition::new("Dept", FieldType::MultiSelectDropdown, "user")
            .with_options(vec![SelectOption::new("a"), SelectOption::new("b")], None);
        let dept = service.create(&ctx(), dept).await.unwrap();
        let note = service.create(&ctx(), text("Note")).await.unwrap();
        store.insert_record(&t, "users", json!({ "customFields": { "dept": ["opt_1", "opt_2"] } })).unwrap();
        store.insert_record(&t, "legacy_users", json!({ "customFields": { "dept": ["opt_2"] } })).unwrap();

        let stat = service.option_statistic(&t, dept.id_str(), "opt_2").await.unwrap();
        assert_eq!(stat.count, 2);
        assert_eq!(stat.entity_type, "user");
        assert!(matches!(
            service.option_statistic(&t, dept.id_str(), "opt_9").await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.option_statistic(&t, note.id_str(), "opt_1").await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(service.statistic(&t, note.id_str()).await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn query_pages_are_sorted_and_capped() {
        let (_, service) = setup();
        let t = tenant();
        for name in ["Alpha", "Beta", "Gamma"] {
            service.create(&ctx(), text(name)).await.unwrap();
        }
        let page = service
            .find_by_query(&t, DefinitionQuery::default(), 1, Some(1))
            .await
            .unwrap();
        assert_eq!(page.total_records, 3);
        assert_eq!(page.custom_fields[0].name, "Beta");

        let desc = DefinitionQuery::default().with_sort_param("name:desc").unwrap();
        let page = service.find_by_query(&t, desc, 0, Some(5000)).await.unwrap();
        let names: Vec<_> = page.custom_fields.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Gamma", "Beta", "Alpha"]);
    }

    #[tokio::test]
    async fn validates_entity_values() {
        let (_, service) = setup();
        let t = tenant();
        let mut due = FieldDefinition::new("Due Date", FieldType::DatePicker, "user");
        due.required = true;
        service.create(&ctx(), due).await.unwrap();

        let ok = json!({ "dueDate": "2024-05-01" });
        assert!(service.validate_custom_fields(&t, "user", ok.as_object().unwrap()).await.is_ok());
        let bad = json!({ "dueDate": "01/05/2024" });
        assert!(service.validate_custom_fields(&t, "user", bad.as_object().unwrap()).await.is_err());
        let missing = json!({});
        assert!(service.validate_custom_fields(&t, "user", missing.as_object().unwrap()).await.is_err());
    }
}
