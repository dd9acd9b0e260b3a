//! Custom field handlers: list, create, replace-all, read, update, delete, statistics and value validation.

use crate::error::AppError;
use crate::model::{DefinitionQuery, FieldDefinition};
use crate::response::{success_many, success_one, success_one_ok, success_page};
use crate::service::RequestContext;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    pub entity_type: Option<String>,
    pub name: Option<String>,
    pub sort_by: Option<String>,
    #[serde(default)]
    pub offset: u32,
    pub limit: Option<u32>,
}

impl ListParams {
    fn query(&self) -> Result<DefinitionQuery, AppError> {
        let query = DefinitionQuery {
            entity_type: self.entity_type.clone().filter(|s| !s.trim().is_empty()),
            name: self.name.clone().filter(|s| !s.trim().is_empty()),
            sort: Vec::new(),
        };
        match self.sort_by.as_deref() {
            Some(sort_by) => query.with_sort_param(sort_by),
            None => Ok(query),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceAllBody {
    pub entity_type: String,
    #[serde(default)]
    pub custom_fields: Vec<FieldDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateBody {
    pub entity_type: String,
    #[serde(default)]
    pub custom_fields: Map<String, Value>,
}

pub async fn list(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let query = params.query()?;
    let page = state
        .fields
        .find_by_query(&ctx.tenant, query, params.offset, params.limit)
        .await?;
    Ok(success_page(page))
}

pub async fn create(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(body): Json<FieldDefinition>,
) -> Result<impl IntoResponse, AppError> {
    let created = state.fields.create(&ctx, body).await?;
    Ok(success_one(created))
}

pub async fn replace_all(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(body): Json<ReplaceAllBody>,
) -> Result<impl IntoResponse, AppError> {
    let persisted = state
        .fields
        .replace_all(&ctx, &body.entity_type, body.custom_fields)
        .await?;
    Ok(success_many(persisted))
}

pub async fn read(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let def = state.fields.find_by_id(&ctx.tenant, &id).await?;
    Ok(success_one_ok(def))
}

pub async fn update(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    Json(body): Json<FieldDefinition>,
) -> Result<StatusCode, AppError> {
    state.fields.update(&ctx, &id, body).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.fields.delete(&ctx, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stats(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let stat = state.fields.statistic(&ctx.tenant, &id).await?;
    Ok(success_one_ok(stat))
}

pub async fn option_stats(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((id, option_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let stat = state
        .fields
        .option_statistic(&ctx.tenant, &id, &option_id)
        .await?;
    Ok(success_one_ok(stat))
}

pub async fn validate(
    State(state): State<AppState>,
    ctx: RequestContext,
    Json(body): Json<ValidateBody>,
) -> Result<StatusCode, AppError> {
    state
        .fields
        .validate_custom_fields(&ctx.tenant, &body.entity_type, &body.custom_fields)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_params_are_ignored() {
        let params = ListParams {
            entity_type: Some(" ".into()),
            name: Some("due".into()),
            ..Default::default()
        };
        let query = params.query().unwrap();
        assert!(query.entity_type.is_none());
        assert_eq!(query.name.as_deref(), Some("due"));
        assert!(query.sort.is_empty());
    }

    #[test]
    fn unknown_sort_key_is_rejected() {
        let params = ListParams {
            sort_by: Some("colour".into()),
            ..Default::default()
        };
        assert!(matches!(params.query(), Err(AppError::BadRequest(_))));
    }
}
