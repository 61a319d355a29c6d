//! In-process store: one map of rows per table behind a lock. Used by tests and the `memory` client.

use super::{Scope, Store};
use crate::config::{IdType, MigrateMode, ModelDescriptor, PivotDescriptor};
use crate::criteria::{Criteria, Direction, Record};
use crate::error::AppError;
use crate::migration;
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Table {
    last_id: i64,
    rows: Vec<Record>,
}

impl Table {
    fn next_id(&mut self, id_type: IdType) -> Value {
        match id_type {
            IdType::Increments => {
                self.last_id += 1;
                Value::from(self.last_id)
            }
            IdType::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
        }
    }
}

type Tables = HashMap<String, Table>;

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, AppError> {
        self.tables
            .read()
            .map_err(|_| AppError::Storage("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, AppError> {
        self.tables
            .write()
            .map_err(|_| AppError::Storage("memory store lock poisoned".into()))
    }
}

fn missing(table: &str) -> AppError {
    AppError::Storage(format!("relation \"{}\" does not exist", table))
}

fn table<'a>(tables: &'a Tables, name: &str) -> Result<&'a Table, AppError> {
    tables.get(name).ok_or_else(|| missing(name))
}

fn table_mut<'a>(tables: &'a mut Tables, name: &str) -> Result<&'a mut Table, AppError> {
    tables.get_mut(name).ok_or_else(|| missing(name))
}

/// Equality as the database sees it: numbers compare by value regardless of representation.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                x == y
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                x == y
            } else {
                x.as_f64() == y.as_f64()
            }
        }
        _ => a == b,
    }
}

fn field<'a>(row: &'a Record, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn matches(row: &Record, criteria: &Criteria) -> bool {
    let equal = criteria.where_.iter().all(|(column, expected)| {
        let actual = field(row, column);
        if expected.is_null() {
            actual.is_null()
        } else {
            !actual.is_null() && values_equal(actual, expected)
        }
    });
    let not_null = criteria
        .where_not_null
        .as_deref()
        .map_or(true, |column| !field(row, column).is_null());
    equal && not_null
}

/// Ascending order with nulls last, matching Postgres defaults.
fn compare(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Bool(_) => 0,
            Value::Number(_) => 1,
            Value::String(_) => 2,
            Value::Array(_) | Value::Object(_) => 3,
            Value::Null => 4,
        }
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => match (x.as_u64(), y.as_u64()) {
                (Some(x), Some(y)) => x.cmp(&y),
                _ => x
                    .as_f64()
                    .partial_cmp(&y.as_f64())
                    .unwrap_or(Ordering::Equal),
            },
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Rows of `model` within `scope`, in table order.
fn scoped<'a>(tables: &'a Tables, model: &ModelDescriptor, scope: &Scope) -> Result<Vec<&'a Record>, AppError> {
    let rows = &table(tables, &model.table_name)?.rows;
    Ok(match scope {
        Scope::None => rows.iter().collect(),
        Scope::Column { column, value } => rows
            .iter()
            .filter(|r| values_equal(field(r, column), value))
            .collect(),
        Scope::Through { pivot, parent_id } => {
            let linked: Vec<&Value> = table(tables, &pivot.table_name)?
                .rows
                .iter()
                .filter(|p| values_equal(field(p, &pivot.parent_key), parent_id))
                .map(|p| field(p, &pivot.child_key))
                .collect();
            rows.iter()
                .filter(|r| {
                    let id = field(r, &model.id_attribute);
                    linked.iter().any(|l| values_equal(l, id))
                })
                .collect()
        }
    })
}

/// Rows matching scope and criteria, ordered and paged.
fn select(tables: &Tables, model: &ModelDescriptor, scope: &Scope, criteria: &Criteria) -> Result<Vec<Record>, AppError> {
    let mut rows: Vec<&Record> = scoped(tables, model, scope)?
        .into_iter()
        .filter(|r| matches(r, criteria))
        .collect();
    if criteria.order_by.is_empty() {
        rows.sort_by(|a, b| compare(field(a, &model.id_attribute), field(b, &model.id_attribute)));
    } else {
        rows.sort_by(|a, b| {
            criteria
                .order_by
                .iter()
                .map(|o| {
                    let ord = compare(field(a, &o.column), field(b, &o.column));
                    match o.direction {
                        Direction::Asc => ord,
                        Direction::Desc => ord.reverse(),
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }
    let offset = criteria.offset.unwrap_or(0) as usize;
    let limit = criteria.limit.map_or(usize::MAX, |n| n as usize);
    Ok(rows.into_iter().skip(offset).take(limit).cloned().collect())
}

fn ids_of(model: &ModelDescriptor, rows: &[Record]) -> Vec<Value> {
    rows.iter().map(|r| field(r, &model.id_attribute).clone()).collect()
}

fn now() -> Value {
    Value::String(chrono::Utc::now().to_rfc3339())
}

/// Build and store a new row: declared columns default to null, auto values are generated.
fn insert_row(table: &mut Table, model: &ModelDescriptor, values: &Record) -> Record {
    let mut row = Record::new();
    for c in &model.columns {
        row.insert(c.name.clone(), Value::Null);
    }
    for (k, v) in values {
        if !model.is_auto_value(k) {
            row.insert(k.clone(), v.clone());
        }
    }
    row.insert(model.id_attribute.clone(), table.next_id(model.id_type));
    if let Some((created, updated)) = model.timestamps.fields() {
        let ts = now();
        row.insert(created.to_string(), ts.clone());
        row.insert(updated.to_string(), ts);
    }
    table.rows.push(row.clone());
    row
}

fn apply(row: &mut Record, model: &ModelDescriptor, values: &Record) {
    for (k, v) in values {
        if !model.is_auto_value(k) {
            row.insert(k.clone(), v.clone());
        }
    }
    if let Some((_, updated)) = model.timestamps.fields() {
        row.insert(updated.to_string(), now());
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn client(&self) -> &'static str {
        "memory"
    }

    async fn fetch_by_id(&self, model: &ModelDescriptor, id: &Value) -> Result<Option<Record>, AppError> {
        let tables = self.read()?;
        Ok(table(&tables, &model.table_name)?
            .rows
            .iter()
            .find(|r| values_equal(field(r, &model.id_attribute), id))
            .cloned())
    }

    async fn fetch_all(&self, model: &ModelDescriptor, scope: &Scope, criteria: &Criteria) -> Result<Vec<Record>, AppError> {
        let tables = self.read()?;
        select(&tables, model, scope, criteria)
    }

    async fn insert(&self, model: &ModelDescriptor, values: &Record) -> Result<Record, AppError> {
        let mut tables = self.write()?;
        Ok(insert_row(table_mut(&mut tables, &model.table_name)?, model, values))
    }

    async fn insert_linked(
        &self,
        model: &ModelDescriptor,
        values: &Record,
        pivot: &PivotDescriptor,
        parent_id: &Value,
    ) -> Result<Record, AppError> {
        let mut tables = self.write()?;
        // Both tables must exist before anything is written.
        table(&tables, &pivot.table_name)?;
        let row = insert_row(table_mut(&mut tables, &model.table_name)?, model, values);
        let link = table_mut(&mut tables, &pivot.table_name)?;
        let mut pivot_row = Record::new();
        pivot_row.insert(pivot.id_attribute.clone(), link.next_id(IdType::Increments));
        pivot_row.insert(pivot.parent_key.clone(), parent_id.clone());
        pivot_row.insert(pivot.child_key.clone(), field(&row, &model.id_attribute).clone());
        link.rows.push(pivot_row);
        Ok(row)
    }

    async fn insert_and_attach(
        &self,
        model: &ModelDescriptor,
        values: &Record,
        owner: &ModelDescriptor,
        owner_id: &Value,
        foreign_key: &str,
    ) -> Result<Record, AppError> {
        let mut tables = self.write()?;
        let owner_exists = table(&tables, &owner.table_name)?
            .rows
            .iter()
            .any(|r| values_equal(field(r, &owner.id_attribute), owner_id));
        if !owner_exists {
            return Err(AppError::NotFound(format!("{} {}", owner.name, owner_id)));
        }
        let row = insert_row(table_mut(&mut tables, &model.table_name)?, model, values);
        let mut link = Record::new();
        link.insert(foreign_key.to_string(), field(&row, &model.id_attribute).clone());
        let owners = table_mut(&mut tables, &owner.table_name)?;
        if let Some(owner_row) = owners
            .rows
            .iter_mut()
            .find(|r| values_equal(field(r, &owner.id_attribute), owner_id))
        {
            apply(owner_row, owner, &link);
        }
        Ok(row)
    }

    async fn update_by_id(&self, model: &ModelDescriptor, id: &Value, values: &Record) -> Result<Option<Record>, AppError> {
        let mut tables = self.write()?;
        let t = table_mut(&mut tables, &model.table_name)?;
        Ok(t.rows
            .iter_mut()
            .find(|r| values_equal(field(r, &model.id_attribute), id))
            .map(|row| {
                apply(row, model, values);
                row.clone()
            }))
    }

    async fn update_where(
        &self,
        model: &ModelDescriptor,
        scope: &Scope,
        criteria: &Criteria,
        values: &Record,
    ) -> Result<Vec<Record>, AppError> {
        let mut tables = self.write()?;
        let ids = ids_of(model, &select(&tables, model, scope, criteria)?);
        let t = table_mut(&mut tables, &model.table_name)?;
        let mut updated = Vec::with_capacity(ids.len());
        for row in t.rows.iter_mut() {
            if ids.iter().any(|id| values_equal(field(row, &model.id_attribute), id)) {
                apply(row, model, values);
                updated.push(row.clone());
            }
        }
        Ok(updated)
    }

    async fn delete_by_id(&self, model: &ModelDescriptor, id: &Value) -> Result<u64, AppError> {
        let mut tables = self.write()?;
        let t = table_mut(&mut tables, &model.table_name)?;
        let before = t.rows.len();
        t.rows.retain(|r| !values_equal(field(r, &model.id_attribute), id));
        Ok((before - t.rows.len()) as u64)
    }

    async fn delete_where(&self, model: &ModelDescriptor, scope: &Scope, criteria: &Criteria) -> Result<u64, AppError> {
        let mut tables = self.write()?;
        let ids = ids_of(model, &select(&tables, model, scope, criteria)?);
        let t = table_mut(&mut tables, &model.table_name)?;
        let before = t.rows.len();
        t.rows
            .retain(|r| !ids.iter().any(|id| values_equal(field(r, &model.id_attribute), id)));
        Ok((before - t.rows.len()) as u64)
    }

    async fn unlink_all(&self, pivot: &PivotDescriptor, parent_id: &Value) -> Result<u64, AppError> {
        let mut tables = self.write()?;
        let t = table_mut(&mut tables, &pivot.table_name)?;
        let before = t.rows.len();
        t.rows
            .retain(|r| !values_equal(field(r, &pivot.parent_key), parent_id));
        Ok((before - t.rows.len()) as u64)
    }

    async fn migrate(&self, mode: MigrateMode, models: &[&ModelDescriptor]) -> Result<(), AppError> {
        let mut tables = self.write()?;
        match mode {
            MigrateMode::None => {}
            MigrateMode::Create => {
                for m in models {
                    tables.entry(m.table_name.clone()).or_default();
                }
            }
            MigrateMode::Drop => {
                for m in models {
                    tables.insert(m.table_name.clone(), Table::default());
                }
            }
            MigrateMode::Alter => return Err(migration::unsupported(mode)),
        }
        Ok(())
    }
}
