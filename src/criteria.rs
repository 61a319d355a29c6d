//! Criteria: the canonical filter + pagination shape, and the normalizers that produce it.

use crate::config::ModelDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A record as returned by the store: column name to JSON value.
pub type Record = Map<String, Value>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub direction: Direction,
}

/// Filter and pagination for find/update/destroy. `where` is an equality map; a `null` value means IS NULL.
/// Unknown keys are rejected.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Criteria {
    #[serde(default, rename = "where", skip_serializing_if = "Map::is_empty")]
    pub where_: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub where_not_null: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<OrderBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Equality criteria over `values`.
    pub fn matching(values: Map<String, Value>) -> Self {
        Criteria {
            where_: values,
            ..Self::default()
        }
    }

    pub fn where_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_.insert(column.into(), value.into());
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order_by.push(OrderBy {
            column: column.into(),
            direction,
        });
        self
    }

    /// True when any row filter is present.
    pub fn has_filter(&self) -> bool {
        !self.where_.is_empty() || self.where_not_null.is_some()
    }

    /// True when nothing at all was supplied (no filter, ordering or pagination).
    pub fn is_empty(&self) -> bool {
        !self.has_filter() && self.order_by.is_empty() && self.limit.is_none() && self.offset.is_none()
    }
}

/// Caller input for find/update/destroy: a bare id or structured criteria.
#[derive(Clone, Debug, PartialEq)]
pub enum IdOrCriteria {
    Id(Value),
    Criteria(Criteria),
}

impl IdOrCriteria {
    /// Interpret a JSON value: numbers and strings are ids, objects are criteria, null is empty criteria.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Number(_) | Value::String(_) => Ok(IdOrCriteria::Id(value)),
            Value::Null => Ok(IdOrCriteria::Criteria(Criteria::default())),
            other => Ok(IdOrCriteria::Criteria(serde_json::from_value(other)?)),
        }
    }

    pub fn as_id(&self) -> Option<&Value> {
        match self {
            IdOrCriteria::Id(id) => Some(id),
            IdOrCriteria::Criteria(_) => None,
        }
    }
}

impl Default for IdOrCriteria {
    fn default() -> Self {
        IdOrCriteria::Criteria(Criteria::default())
    }
}

impl From<Criteria> for IdOrCriteria {
    fn from(c: Criteria) -> Self {
        IdOrCriteria::Criteria(c)
    }
}

impl From<i64> for IdOrCriteria {
    fn from(id: i64) -> Self {
        IdOrCriteria::Id(Value::from(id))
    }
}

impl From<&str> for IdOrCriteria {
    fn from(id: &str) -> Self {
        IdOrCriteria::Id(Value::from(id))
    }
}

impl From<String> for IdOrCriteria {
    fn from(id: String) -> Self {
        IdOrCriteria::Id(Value::from(id))
    }
}

impl From<Option<Criteria>> for IdOrCriteria {
    fn from(c: Option<Criteria>) -> Self {
        IdOrCriteria::Criteria(c.unwrap_or_default())
    }
}

/// Per-call options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Page size for this call, overriding the configured default.
    #[serde(default)]
    pub limit: Option<u32>,
    /// Treat a missing single record as `NotFound` instead of an empty result.
    #[serde(default)]
    pub require: bool,
}

impl QueryOptions {
    pub fn required() -> Self {
        QueryOptions {
            limit: None,
            require: true,
        }
    }
}

/// Scalar ids become an equality filter on the model's id attribute; criteria pass through.
pub fn normalize_id_or_criteria(model: &ModelDescriptor, input: IdOrCriteria) -> Criteria {
    match input {
        IdOrCriteria::Id(id) => Criteria::new().where_eq(model.id_attribute.clone(), id),
        IdOrCriteria::Criteria(c) => c,
    }
}

/// Criteria without any filter become "id attribute is not null", which matches every persisted row.
pub fn default_criteria(model: &ModelDescriptor, mut criteria: Criteria) -> Criteria {
    if !criteria.has_filter() {
        criteria.where_not_null = Some(model.id_attribute.clone());
    }
    criteria
}

/// The criteria's own limit wins, then `options.limit`, then `default_limit`.
pub fn with_limit(mut criteria: Criteria, options: &QueryOptions, default_limit: Option<u32>) -> Criteria {
    if criteria.limit.is_none() {
        criteria.limit = options.limit.or(default_limit);
    }
    criteria
}

/// Remove the id attribute and enabled timestamp columns from a write payload.
pub fn strip_auto_values(model: &ModelDescriptor, mut values: Record) -> Record {
    values.retain(|k, _| !model.is_auto_value(k));
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IdType, Timestamps};
    use serde_json::json;
    use std::collections::HashMap;

    fn model(timestamps: Timestamps) -> ModelDescriptor {
        ModelDescriptor {
            name: "Role".into(),
            table_name: "role".into(),
            id_attribute: "id".into(),
            id_type: IdType::Increments,
            timestamps,
            store: "main".into(),
            columns: Vec::new(),
            relations: HashMap::new(),
        }
    }

    fn record(v: Value) -> Record {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn scalar_becomes_id_equality() {
        let m = model(Timestamps::None);
        let c = normalize_id_or_criteria(&m, IdOrCriteria::from(7i64));
        assert_eq!(c.where_.get("id"), Some(&json!(7)));
        let c = normalize_id_or_criteria(&m, IdOrCriteria::from("abc"));
        assert_eq!(c.where_.get("id"), Some(&json!("abc")));
    }

    #[test]
    fn object_criteria_pass_through() {
        let m = model(Timestamps::None);
        let original = Criteria::new().where_eq("name", "a").limit(3);
        let c = normalize_id_or_criteria(&m, original.clone().into());
        assert_eq!(c, original);
    }

    #[test]
    fn empty_criteria_match_every_row() {
        let m = model(Timestamps::None);
        let c = default_criteria(&m, Criteria::default());
        assert_eq!(c.where_not_null.as_deref(), Some("id"));
        assert!(c.where_.is_empty());

        let paged = default_criteria(&m, Criteria::new().limit(5));
        assert_eq!(paged.where_not_null.as_deref(), Some("id"));
        assert_eq!(paged.limit, Some(5));

        let filtered = default_criteria(&m, Criteria::new().where_eq("name", "x"));
        assert!(filtered.where_not_null.is_none());
    }

    #[test]
    fn limit_precedence() {
        let opts = QueryOptions {
            limit: Some(20),
            require: false,
        };
        assert_eq!(with_limit(Criteria::new().limit(2), &opts, Some(100)).limit, Some(2));
        assert_eq!(with_limit(Criteria::new(), &opts, Some(100)).limit, Some(20));
        assert_eq!(with_limit(Criteria::new(), &QueryOptions::default(), Some(100)).limit, Some(100));
        assert_eq!(with_limit(Criteria::new(), &QueryOptions::default(), None).limit, None);
    }

    #[test]
    fn strips_id_and_timestamps() {
        let values = record(json!({
            "id": 9, "name": "a", "created_at": "x", "updated_at": "y"
        }));
        let stripped = strip_auto_values(&model(Timestamps::Default), values.clone());
        assert_eq!(stripped, record(json!({ "name": "a" })));

        let untimed = strip_auto_values(&model(Timestamps::None), values.clone());
        assert_eq!(untimed, record(json!({ "name": "a", "created_at": "x", "updated_at": "y" })));

        let custom = strip_auto_values(
            &model(Timestamps::Custom {
                created: "created_at".into(),
                updated: "changed".into(),
            }),
            values,
        );
        assert_eq!(custom, record(json!({ "name": "a", "updated_at": "y" })));
    }

    #[test]
    fn parses_json_input() {
        assert_eq!(IdOrCriteria::from_json(json!(3)).unwrap(), IdOrCriteria::from(3i64));
        assert_eq!(IdOrCriteria::from_json(Value::Null).unwrap(), IdOrCriteria::default());
        let parsed = IdOrCriteria::from_json(json!({
            "where": { "name": "a" },
            "order_by": [{ "column": "name", "direction": "desc" }],
            "limit": 1
        }))
        .unwrap();
        let expected = Criteria::new().where_eq("name", "a").order_by("name", Direction::Desc).limit(1);
        assert_eq!(parsed, IdOrCriteria::Criteria(expected));
        assert!(IdOrCriteria::from_json(json!([1, 2])).is_err());
    }

    #[test]
    fn rejects_unknown_criteria_keys() {
        assert!(IdOrCriteria::from_json(json!({ "name": "x" })).is_err());
        assert!(IdOrCriteria::from_json(json!({ "wher": { "name": "x" } })).is_err());
        assert!(IdOrCriteria::from_json(json!({})).is_ok());
    }

    #[test]
    fn emptiness() {
        assert!(Criteria::default().is_empty());
        assert!(!Criteria::new().limit(1).is_empty());
        assert!(!Criteria::new().limit(1).has_filter());
        assert!(Criteria::new().where_eq("a", 1).has_filter());
    }
}
