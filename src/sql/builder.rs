//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from a model descriptor and criteria.

use crate::config::{ModelDescriptor, PivotDescriptor};
use crate::criteria::{Criteria, Direction, Record};
use crate::store::Scope;
use serde_json::Value;

/// Alias of the model's table in every SELECT.
const ALIAS: &str = "t";
/// Alias of the pivot table when a query is scoped through one.
const PIVOT_ALIAS: &str = "p";

/// Quote identifier for PostgreSQL (safe: only from config).
pub(crate) fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn aliased(alias: &str, column: &str) -> String {
    format!("{}.{}", quoted(alias), quoted(column))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Placeholder for `v` with an optional cast. Null renders as a literal so it never needs a type.
    fn placeholder(&mut self, v: &Value, cast: Option<&str>) -> String {
        if v.is_null() {
            return "NULL".to_string();
        }
        let n = self.push_param(v.clone());
        match cast {
            Some(t) => format!("${}::{}", n, t),
            None => format!("${}", n),
        }
    }
}

/// FROM clause, joining the pivot when the scope goes through one.
fn from_clause(model: &ModelDescriptor, scope: &Scope) -> String {
    let table = format!("{} AS {}", quoted(&model.table_name), quoted(ALIAS));
    match scope {
        Scope::Through { pivot, .. } => format!(
            "{} INNER JOIN {} AS {} ON {} = {}",
            table,
            quoted(&pivot.table_name),
            quoted(PIVOT_ALIAS),
            aliased(PIVOT_ALIAS, &pivot.child_key),
            aliased(ALIAS, &model.id_attribute)
        ),
        Scope::None | Scope::Column { .. } => table,
    }
}

/// WHERE clause (with leading space) for scope plus criteria filters; empty when there is nothing to filter.
fn where_clause(q: &mut QueryBuf, model: &ModelDescriptor, scope: &Scope, criteria: &Criteria) -> String {
    let mut parts = Vec::new();
    match scope {
        Scope::None => {}
        Scope::Column { column, value } => {
            let ph = q.placeholder(value, model.param_cast(column));
            parts.push(format!("{} = {}", aliased(ALIAS, column), ph));
        }
        Scope::Through { pivot, parent_id } => {
            let ph = q.placeholder(parent_id, pivot.parent_cast);
            parts.push(format!("{} = {}", aliased(PIVOT_ALIAS, &pivot.parent_key), ph));
        }
    }
    for (column, value) in &criteria.where_ {
        if value.is_null() {
            parts.push(format!("{} IS NULL", aliased(ALIAS, column)));
        } else {
            let ph = q.placeholder(value, model.param_cast(column));
            parts.push(format!("{} = {}", aliased(ALIAS, column), ph));
        }
    }
    if let Some(column) = &criteria.where_not_null {
        parts.push(format!("{} IS NOT NULL", aliased(ALIAS, column)));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// ORDER BY the criteria's ordering, falling back to the id attribute for a stable page order.
fn order_clause(model: &ModelDescriptor, criteria: &Criteria) -> String {
    if criteria.order_by.is_empty() {
        return format!(" ORDER BY {} ASC", aliased(ALIAS, &model.id_attribute));
    }
    let parts: Vec<String> = criteria
        .order_by
        .iter()
        .map(|o| {
            let dir = match o.direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            format!("{} {}", aliased(ALIAS, &o.column), dir)
        })
        .collect();
    format!(" ORDER BY {}", parts.join(", "))
}

fn page_clause(criteria: &Criteria) -> String {
    let limit = criteria.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset = criteria.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();
    format!("{}{}", limit, offset)
}

/// `SELECT "t"."id" ...` matching scope and criteria. Paged only when the criteria page.
fn id_subquery(q: &mut QueryBuf, model: &ModelDescriptor, scope: &Scope, criteria: &Criteria) -> String {
    let where_sql = where_clause(q, model, scope, criteria);
    let paged = criteria.limit.is_some() || criteria.offset.is_some();
    let tail = if paged {
        format!("{}{}", order_clause(model, criteria), page_clause(criteria))
    } else {
        String::new()
    };
    format!(
        "SELECT {} FROM {}{}{}",
        aliased(ALIAS, &model.id_attribute),
        from_clause(model, scope),
        where_sql,
        tail
    )
}

/// SET list for `values`, bumping the update timestamp when the model keeps one.
fn set_list(q: &mut QueryBuf, model: &ModelDescriptor, values: &Record) -> Vec<String> {
    let mut sets = Vec::new();
    for (k, v) in values {
        if model.is_auto_value(k) {
            continue;
        }
        let rhs = q.placeholder(v, model.param_cast(k));
        sets.push(format!("{} = {}", quoted(k), rhs));
    }
    if let Some((_, updated)) = model.timestamps.fields() {
        sets.push(format!("{} = NOW()", quoted(updated)));
    }
    sets
}

/// SELECT by id.
pub fn select_by_id(model: &ModelDescriptor, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(id, model.param_cast(&model.id_attribute));
    q.sql = format!(
        "SELECT * FROM {} WHERE {} = {}",
        quoted(&model.table_name),
        quoted(&model.id_attribute),
        ph
    );
    q
}

/// SELECT rows of `model` within `scope` matching `criteria`, ordered and paged.
pub fn select_where(model: &ModelDescriptor, scope: &Scope, criteria: &Criteria) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, model, scope, criteria);
    q.sql = format!(
        "SELECT {}.* FROM {}{}{}{}",
        quoted(ALIAS),
        from_clause(model, scope),
        where_sql,
        order_clause(model, criteria),
        page_clause(criteria)
    );
    q
}

/// INSERT one row. Auto values are never written; timestamps are set by the database.
pub fn insert(model: &ModelDescriptor, values: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for (k, v) in values {
        if model.is_auto_value(k) {
            continue;
        }
        cols.push(quoted(k));
        placeholders.push(q.placeholder(v, model.param_cast(k)));
    }
    if let Some((created, updated)) = model.timestamps.fields() {
        for name in [created, updated] {
            cols.push(quoted(name));
            placeholders.push("NOW()".to_string());
        }
    }
    let table = quoted(&model.table_name);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING *", table)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            table,
            cols.join(", "),
            placeholders.join(", ")
        )
    };
    q
}

/// UPDATE by id. With nothing to set this degrades to a SELECT of the row.
pub fn update_by_id(model: &ModelDescriptor, id: &Value, values: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let sets = set_list(&mut q, model, values);
    if sets.is_empty() {
        return select_by_id(model, id);
    }
    let ph = q.placeholder(id, model.param_cast(&model.id_attribute));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING *",
        quoted(&model.table_name),
        sets.join(", "),
        quoted(&model.id_attribute),
        ph
    );
    q
}

/// UPDATE every row matching scope and criteria, returning the updated rows.
/// With nothing to set this degrades to a SELECT of the matching rows.
pub fn update_where(model: &ModelDescriptor, scope: &Scope, criteria: &Criteria, values: &Record) -> QueryBuf {
    let mut q = QueryBuf::new();
    let sets = set_list(&mut q, model, values);
    if sets.is_empty() {
        return select_where(model, scope, criteria);
    }
    let ids = id_subquery(&mut q, model, scope, criteria);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} IN ({}) RETURNING *",
        quoted(&model.table_name),
        sets.join(", "),
        quoted(&model.id_attribute),
        ids
    );
    q
}

/// DELETE by id.
pub fn delete_by_id(model: &ModelDescriptor, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(id, model.param_cast(&model.id_attribute));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        quoted(&model.table_name),
        quoted(&model.id_attribute),
        ph
    );
    q
}

/// DELETE every row matching scope and criteria.
pub fn delete_where(model: &ModelDescriptor, scope: &Scope, criteria: &Criteria) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ids = id_subquery(&mut q, model, scope, criteria);
    q.sql = format!(
        "DELETE FROM {} WHERE {} IN ({})",
        quoted(&model.table_name),
        quoted(&model.id_attribute),
        ids
    );
    q
}

/// Link `child_id` to `parent_id` in the pivot table.
pub fn insert_pivot(pivot: &PivotDescriptor, parent_id: &Value, child_id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let parent = q.placeholder(parent_id, pivot.parent_cast);
    let child = q.placeholder(child_id, pivot.child_cast);
    q.sql = format!(
        "INSERT INTO {} ({}, {}) VALUES ({}, {})",
        quoted(&pivot.table_name),
        quoted(&pivot.parent_key),
        quoted(&pivot.child_key),
        parent,
        child
    );
    q
}

/// Remove every pivot row of `parent_id`.
pub fn delete_pivot(pivot: &PivotDescriptor, parent_id: &Value) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.placeholder(parent_id, pivot.parent_cast);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        quoted(&pivot.table_name),
        quoted(&pivot.parent_key),
        ph
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnDescriptor, IdType, Timestamps};
    use serde_json::json;
    use std::collections::HashMap;

    fn role(timestamps: Timestamps) -> ModelDescriptor {
        ModelDescriptor {
            name: "Role".into(),
            table_name: "role".into(),
            id_attribute: "id".into(),
            id_type: IdType::Increments,
            timestamps,
            store: "main".into(),
            columns: vec![ColumnDescriptor {
                name: "name".into(),
                sql_type: "varchar(255)".into(),
                nullable: true,
                unique: false,
                default: None,
                references: None,
            }],
            relations: HashMap::new(),
        }
    }

    fn pivot() -> PivotDescriptor {
        PivotDescriptor {
            table_name: "user_role".into(),
            id_attribute: "id".into(),
            parent_key: "user_id".into(),
            child_key: "role_id".into(),
            parent_cast: None,
            child_cast: None,
        }
    }

    fn record(v: Value) -> Record {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn select_with_filters_and_paging() {
        let c = Criteria::new().where_eq("name", "admin").limit(10).offset(20);
        let q = select_where(&role(Timestamps::None), &Scope::None, &c);
        assert_eq!(
            q.sql,
            r#"SELECT "t".* FROM "role" AS "t" WHERE "t"."name" = $1 ORDER BY "t"."id" ASC LIMIT 10 OFFSET 20"#
        );
        assert_eq!(q.params, vec![json!("admin")]);
    }

    #[test]
    fn null_filter_is_is_null() {
        let mut c = Criteria::new().where_eq("name", Value::Null);
        c.where_not_null = Some("id".into());
        let q = select_where(&role(Timestamps::None), &Scope::None, &c);
        assert!(q.sql.contains(r#""t"."name" IS NULL AND "t"."id" IS NOT NULL"#));
        assert!(q.params.is_empty());
    }

    #[test]
    fn column_scope_and_ordering() {
        let scope = Scope::Column {
            column: "user_id".into(),
            value: json!(4),
        };
        let c = Criteria::new().order_by("name", Direction::Desc);
        let q = select_where(&role(Timestamps::None), &scope, &c);
        assert_eq!(
            q.sql,
            r#"SELECT "t".* FROM "role" AS "t" WHERE "t"."user_id" = $1 ORDER BY "t"."name" DESC"#
        );
        assert_eq!(q.params, vec![json!(4)]);
    }

    #[test]
    fn through_scope_joins_pivot() {
        let scope = Scope::Through {
            pivot: pivot(),
            parent_id: json!(1),
        };
        let q = select_where(&role(Timestamps::None), &scope, &Criteria::new());
        assert_eq!(
            q.sql,
            r#"SELECT "t".* FROM "role" AS "t" INNER JOIN "user_role" AS "p" ON "p"."role_id" = "t"."id" WHERE "p"."user_id" = $1 ORDER BY "t"."id" ASC"#
        );
    }

    #[test]
    fn insert_sets_timestamps_in_database() {
        let q = insert(&role(Timestamps::Default), &record(json!({ "id": 5, "name": "a" })));
        assert_eq!(
            q.sql,
            r#"INSERT INTO "role" ("name", "created_at", "updated_at") VALUES ($1, NOW(), NOW()) RETURNING *"#
        );
        assert_eq!(q.params, vec![json!("a")]);

        let empty = insert(&role(Timestamps::None), &Record::new());
        assert_eq!(empty.sql, r#"INSERT INTO "role" DEFAULT VALUES RETURNING *"#);
    }

    #[test]
    fn update_by_id_params_follow_sets() {
        let q = update_by_id(&role(Timestamps::Default), &json!(3), &record(json!({ "name": "b" })));
        assert_eq!(
            q.sql,
            r#"UPDATE "role" SET "name" = $1, "updated_at" = NOW() WHERE "id" = $2 RETURNING *"#
        );
        assert_eq!(q.params, vec![json!("b"), json!(3)]);

        let noop = update_by_id(&role(Timestamps::None), &json!(3), &Record::new());
        assert_eq!(noop.sql, r#"SELECT * FROM "role" WHERE "id" = $1"#);
    }

    #[test]
    fn update_where_targets_matching_ids() {
        let c = Criteria::new().where_eq("name", "a");
        let q = update_where(&role(Timestamps::None), &Scope::None, &c, &record(json!({ "name": null })));
        assert_eq!(
            q.sql,
            r#"UPDATE "role" SET "name" = NULL WHERE "id" IN (SELECT "t"."id" FROM "role" AS "t" WHERE "t"."name" = $1) RETURNING *"#
        );
        assert_eq!(q.params, vec![json!("a")]);
    }

    #[test]
    fn paged_delete_orders_subquery() {
        let c = Criteria::new().limit(2);
        let q = delete_where(&role(Timestamps::None), &Scope::None, &c);
        assert_eq!(
            q.sql,
            r#"DELETE FROM "role" WHERE "id" IN (SELECT "t"."id" FROM "role" AS "t" ORDER BY "t"."id" ASC LIMIT 2)"#
        );
    }

    #[test]
    fn uuid_ids_are_cast() {
        let mut m = role(Timestamps::None);
        m.id_type = IdType::Uuid;
        let q = delete_by_id(&m, &json!("0b7e5d0e-1111-4222-8333-444455556666"));
        assert_eq!(q.sql, r#"DELETE FROM "role" WHERE "id" = $1::uuid"#);
    }

    #[test]
    fn pivot_statements() {
        let q = insert_pivot(&pivot(), &json!(1), &json!(2));
        assert_eq!(q.sql, r#"INSERT INTO "user_role" ("user_id", "role_id") VALUES ($1, $2)"#);
        let q = delete_pivot(&pivot(), &json!(1));
        assert_eq!(q.sql, r#"DELETE FROM "user_role" WHERE "user_id" = $1"#);
    }

    #[test]
    fn identifiers_are_escaped() {
        assert_eq!(quoted(r#"we"ird"#), r#""we""ird""#);
    }
}
