//! Storage backends. Each configured store is a connection to one database; models are assigned to a store by name.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{ensure_database_exists, PgStore};

use crate::config::{DatabaseConfig, MigrateMode, ModelDescriptor, PivotDescriptor};
use crate::criteria::{Criteria, Record};
use crate::error::{AppError, ConfigError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Restriction applied on top of criteria: which rows of the target belong to a parent.
#[derive(Clone, Debug, PartialEq)]
pub enum Scope {
    None,
    /// Target rows whose `column` equals `value`.
    Column { column: String, value: Value },
    /// Target rows linked to `parent_id` through the pivot table.
    Through { pivot: PivotDescriptor, parent_id: Value },
}

/// Operations the engine needs from a backend. Write payloads arrive with auto values already stripped.
#[async_trait]
pub trait Store: Send + Sync {
    /// Client name this store was built for (e.g. "postgres").
    fn client(&self) -> &'static str;

    async fn fetch_by_id(&self, model: &ModelDescriptor, id: &Value) -> Result<Option<Record>, AppError>;

    async fn fetch_all(&self, model: &ModelDescriptor, scope: &Scope, criteria: &Criteria) -> Result<Vec<Record>, AppError>;

    async fn insert(&self, model: &ModelDescriptor, values: &Record) -> Result<Record, AppError>;

    /// Insert a row of `model` and link it to `parent_id` in `pivot`, atomically.
    async fn insert_linked(
        &self,
        model: &ModelDescriptor,
        values: &Record,
        pivot: &PivotDescriptor,
        parent_id: &Value,
    ) -> Result<Record, AppError>;

    /// Insert a row of `model` and point `owner.foreign_key` of row `owner_id` at it, atomically.
    async fn insert_and_attach(
        &self,
        model: &ModelDescriptor,
        values: &Record,
        owner: &ModelDescriptor,
        owner_id: &Value,
        foreign_key: &str,
    ) -> Result<Record, AppError>;

    async fn update_by_id(&self, model: &ModelDescriptor, id: &Value, values: &Record) -> Result<Option<Record>, AppError>;

    /// Update all rows in scope matching criteria; returns the rows as updated.
    async fn update_where(
        &self,
        model: &ModelDescriptor,
        scope: &Scope,
        criteria: &Criteria,
        values: &Record,
    ) -> Result<Vec<Record>, AppError>;

    async fn delete_by_id(&self, model: &ModelDescriptor, id: &Value) -> Result<u64, AppError>;

    async fn delete_where(&self, model: &ModelDescriptor, scope: &Scope, criteria: &Criteria) -> Result<u64, AppError>;

    /// Remove every pivot row of `parent_id`. Target rows are left alone.
    async fn unlink_all(&self, pivot: &PivotDescriptor, parent_id: &Value) -> Result<u64, AppError>;

    /// Apply `mode` to the tables of `models`, all in one transaction.
    async fn migrate(&self, mode: MigrateMode, models: &[&ModelDescriptor]) -> Result<(), AppError>;

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn close(&self) {}
}

/// Connected stores by configured name.
#[derive(Clone, Default)]
pub struct StoreRegistry {
    stores: BTreeMap<String, Arc<dyn Store>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, store: Arc<dyn Store>) {
        self.stores.insert(name.into(), store);
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn Store>, AppError> {
        self.stores.get(name).ok_or_else(|| {
            AppError::Config(ConfigError::MissingReference {
                kind: "store",
                id: name.to_string(),
            })
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Store>)> {
        self.stores.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

/// Connect every configured store. Clients were checked during config validation.
pub async fn connect_stores(config: &DatabaseConfig) -> Result<StoreRegistry, AppError> {
    let mut registry = StoreRegistry::new();
    for (name, store) in &config.stores {
        let backend: Arc<dyn Store> = match store.client.to_lowercase().as_str() {
            "postgres" | "pg" => Arc::new(PgStore::connect(name, store).await?),
            "memory" => Arc::new(MemoryStore::new()),
            _ => {
                return Err(ConfigError::UnsupportedClient {
                    store: name.clone(),
                    client: store.client.clone(),
                }
                .into())
            }
        };
        tracing::info!(store = %name, client = backend.client(), "store connected");
        registry.insert(name.clone(), backend);
    }
    Ok(registry)
}
