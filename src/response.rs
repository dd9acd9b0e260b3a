//! Standard response envelope helpers.

use crate::model::{DefinitionPage, FieldDefinition};
use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub meta: MetaCount,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
    /// Total matches across all pages; only set for paged listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::CREATED, Json(SuccessOne { data, meta: None }))
}

pub fn success_one_ok<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::OK, Json(SuccessOne { data, meta: None }))
}

pub fn success_many<T: Serialize>(data: Vec<T>) -> (StatusCode, Json<SuccessMany<T>>) {
    let count = data.len() as u64;
    (
        StatusCode::OK,
        Json(SuccessMany {
            data,
            meta: MetaCount { count, total: None },
        }),
    )
}

pub fn success_page(page: DefinitionPage) -> (StatusCode, Json<SuccessMany<FieldDefinition>>) {
    let count = page.custom_fields.len() as u64;
    (
        StatusCode::OK,
        Json(SuccessMany {
            data: page.custom_fields,
            meta: MetaCount {
                count,
                total: Some(page.total_records),
            },
        }),
    )
}
