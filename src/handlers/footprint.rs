//! Footprint handlers: model CRUD and association CRUD over the service.
//! Query parameters become equality filters except `limit`, `offset`, `order_by` and `require`.

use crate::association::AssociationResolver;
use crate::config::{IdType, ModelDescriptor};
use crate::criteria::{Criteria, Direction, IdOrCriteria, QueryOptions, Record};
use crate::error::AppError;
use crate::response::{deleted, records, success_one};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

fn parse_id(model: &ModelDescriptor, raw: &str) -> Result<Value, AppError> {
    Ok(match model.id_type {
        IdType::Uuid => {
            let u = uuid::Uuid::parse_str(raw).map_err(|_| AppError::BadRequest("invalid uuid".into()))?;
            Value::String(u.to_string())
        }
        IdType::Increments => {
            let n: i64 = raw.parse().map_err(|_| AppError::BadRequest("invalid id".into()))?;
            Value::Number(n.into())
        }
    })
}

fn body_to_record(value: Value) -> Result<Record, AppError> {
    match value {
        Value::Object(m) => Ok(m),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// Typed value for a filter on `column`, guided by its declared SQL type.
fn query_value_for_column(model: &ModelDescriptor, column: &str, s: &str) -> Value {
    if s.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    let sql_type = if column == model.id_attribute {
        match model.id_type {
            IdType::Increments => "integer".to_string(),
            IdType::Uuid => "uuid".to_string(),
        }
    } else {
        model
            .column(column)
            .map(|c| c.sql_type.to_lowercase())
            .unwrap_or_default()
    };
    if sql_type.contains("int") || sql_type.contains("serial") {
        if let Ok(n) = s.parse::<i64>() {
            return Value::Number(n.into());
        }
    }
    if sql_type.starts_with("double") || sql_type.starts_with("real") || sql_type.starts_with("float") {
        if let Some(n) = s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Value::Number(n);
        }
    }
    if sql_type.starts_with("bool") {
        if s.eq_ignore_ascii_case("true") {
            return Value::Bool(true);
        }
        if s.eq_ignore_ascii_case("false") {
            return Value::Bool(false);
        }
    }
    Value::String(s.to_string())
}

fn parse_number(key: &str, v: &str) -> Result<u32, AppError> {
    v.parse()
        .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer", key)))
}

/// Split query parameters into criteria for `model` and per-call options.
fn criteria_from_query(model: &ModelDescriptor, params: HashMap<String, String>) -> Result<(Criteria, QueryOptions), AppError> {
    let mut criteria = Criteria::new();
    let mut options = QueryOptions::default();
    for (k, v) in params {
        match k.as_str() {
            "limit" => criteria.limit = Some(parse_number(&k, &v)?),
            "offset" => criteria.offset = Some(parse_number(&k, &v)?),
            "require" => options.require = v != "false" && v != "0",
            "order_by" => {
                for part in v.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    criteria = match part.strip_prefix('-') {
                        Some(column) => criteria.order_by(column, Direction::Desc),
                        None => criteria.order_by(part, Direction::Asc),
                    };
                }
            }
            _ => {
                let value = query_value_for_column(model, &k, &v);
                criteria = criteria.where_eq(k.as_str(), value);
            }
        }
    }
    Ok((criteria, options))
}

/// Target model of `relation` and the parsed parent id.
fn relation_target<'a>(
    state: &'a AppState,
    model: &str,
    id: &str,
    relation: &str,
) -> Result<(&'a ModelDescriptor, Value), AppError> {
    let registry = state.service.registry();
    let parent_id = parse_id(registry.resolve(model)?, id)?;
    let handle = AssociationResolver::new(registry).resolve(model, relation, parent_id.clone())?;
    Ok((handle.target, parent_id))
}

pub async fn create(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let values = body_to_record(body)?;
    let row = state.service.create(&model, values, QueryOptions::default()).await?;
    Ok(success_one(StatusCode::CREATED, row))
}

pub async fn find(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let (criteria, options) = criteria_from_query(state.service.registry().resolve(&model)?, params)?;
    let rows = state.service.find(&model, criteria, options).await?;
    Ok(records(rows))
}

pub async fn find_one(
    State(state): State<AppState>,
    Path((model, id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let id = parse_id(state.service.registry().resolve(&model)?, &id)?;
    let row = state.service.find(&model, IdOrCriteria::Id(id), QueryOptions::required()).await?;
    Ok(records(row))
}

pub async fn update(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let (criteria, options) = criteria_from_query(state.service.registry().resolve(&model)?, params)?;
    let values = body_to_record(body)?;
    let rows = state.service.update(&model, criteria, values, options).await?;
    Ok(records(rows))
}

pub async fn update_one(
    State(state): State<AppState>,
    Path((model, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let id = parse_id(state.service.registry().resolve(&model)?, &id)?;
    let values = body_to_record(body)?;
    let row = state.service.update(&model, IdOrCriteria::Id(id), values, QueryOptions::required()).await?;
    Ok(records(row))
}

pub async fn destroy(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let (criteria, options) = criteria_from_query(state.service.registry().resolve(&model)?, params)?;
    let n = state.service.destroy(&model, criteria, options).await?;
    Ok(deleted(n))
}

pub async fn destroy_one(
    State(state): State<AppState>,
    Path((model, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let id = parse_id(state.service.registry().resolve(&model)?, &id)?;
    state.service.destroy(&model, IdOrCriteria::Id(id), QueryOptions::required()).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_association(
    State(state): State<AppState>,
    Path((model, id, relation)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let (_, parent_id) = relation_target(&state, &model, &id, &relation)?;
    let values = body_to_record(body)?;
    let row = state
        .service
        .create_association(&model, parent_id, &relation, values, QueryOptions::default())
        .await?;
    Ok(success_one(StatusCode::CREATED, row))
}

pub async fn find_association(
    State(state): State<AppState>,
    Path((model, id, relation)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, AppError> {
    let (target, parent_id) = relation_target(&state, &model, &id, &relation)?;
    let (criteria, options) = criteria_from_query(target, params)?;
    let rows = state
        .service
        .find_association(&model, parent_id, &relation, criteria, options)
        .await?;
    Ok(records(rows))
}

pub async fn update_association(
    State(state): State<AppState>,
    Path((model, id, relation)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Result<Response, AppError> {
    let (target, parent_id) = relation_target(&state, &model, &id, &relation)?;
    let (criteria, options) = criteria_from_query(target, params)?;
    let values = body_to_record(body)?;
    let rows = state
        .service
        .update_association(&model, parent_id, &relation, criteria, values, options)
        .await?;
    Ok(records(rows))
}

pub async fn destroy_association(
    State(state): State<AppState>,
    Path((model, id, relation)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let (target, parent_id) = relation_target(&state, &model, &id, &relation)?;
    let (criteria, options) = criteria_from_query(target, params)?;
    let n = state
        .service
        .destroy_association(&model, parent_id, &relation, criteria, options)
        .await?;
    Ok(deleted(n))
}
