//! Standard response envelope helpers.

use crate::service::Records;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
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
}

pub fn success_one<T: Serialize>(status: StatusCode, data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (status, Json(SuccessOne { data, meta: None }))
}

pub fn success_many<T: Serialize>(data: Vec<T>) -> (StatusCode, Json<SuccessMany<T>>) {
    let count = data.len() as u64;
    (
        StatusCode::OK,
        Json(SuccessMany {
            data,
            meta: MetaCount { count },
        }),
    )
}

/// `{ "data": { "deleted": n } }`.
pub fn deleted(count: u64) -> (StatusCode, Json<SuccessOne<serde_json::Value>>) {
    success_one(StatusCode::OK, serde_json::json!({ "deleted": count }))
}

/// One record (possibly null) or a counted list, by shape.
pub fn records(records: Records) -> Response {
    match records {
        Records::One(row) => success_one(StatusCode::OK, row).into_response(),
        Records::Many(rows) => success_many(rows).into_response(),
    }
}
