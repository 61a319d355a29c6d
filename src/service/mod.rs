//! Footprint service: model-agnostic CRUD and association operations over the configured stores.

mod association;
mod crud;

use crate::config::{resolve, FullConfig, ModelDescriptor, ModelRegistry};
use crate::criteria::{QueryOptions, Record};
use crate::error::AppError;
use crate::migration::apply_migrations;
use crate::store::{connect_stores, Store, StoreRegistry};
use serde::Serialize;
use serde_json::Value;

/// Page size for finds when neither the caller nor the config sets one.
pub const DEFAULT_LIMIT: u32 = 100;

/// Result of find/update: one record for id lookups and single-valued relations, a list otherwise.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Records {
    One(Option<Record>),
    Many(Vec<Record>),
}

impl Records {
    /// The single record, or the first of a list.
    pub fn one(self) -> Option<Record> {
        match self {
            Records::One(r) => r,
            Records::Many(rows) => rows.into_iter().next(),
        }
    }

    pub fn many(self) -> Vec<Record> {
        match self {
            Records::One(r) => r.into_iter().collect(),
            Records::Many(rows) => rows,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Records::One(r) => usize::from(r.is_some()),
            Records::Many(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct FootprintService {
    registry: ModelRegistry,
    stores: StoreRegistry,
    default_limit: u32,
}

impl FootprintService {
    pub fn new(registry: ModelRegistry, stores: StoreRegistry, default_limit: Option<u32>) -> Self {
        FootprintService {
            registry,
            stores,
            default_limit: default_limit.unwrap_or(DEFAULT_LIMIT),
        }
    }

    /// Resolve models, connect stores and run the configured migration.
    pub async fn initialize(config: &FullConfig) -> Result<Self, AppError> {
        let registry = resolve(config)?;
        let stores = connect_stores(&config.database).await?;
        apply_migrations(&stores, &registry, config.database.models.migrate).await?;
        tracing::info!(models = registry.len(), stores = stores.len(), "footprint service ready");
        Ok(Self::new(registry, stores, config.footprints.default_limit))
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn default_limit(&self) -> u32 {
        self.default_limit
    }

    /// Check every store is reachable.
    pub async fn ping(&self) -> Result<(), AppError> {
        for (_, store) in self.stores.iter() {
            store.ping().await?;
        }
        Ok(())
    }

    /// Close every store's connections.
    pub async fn close(&self) {
        for (name, store) in self.stores.iter() {
            store.close().await;
            tracing::info!(store = %name, "store closed");
        }
    }

    fn store_for(&self, model: &ModelDescriptor) -> Result<&dyn Store, AppError> {
        Ok(self.stores.get(&model.store)?.as_ref())
    }

    fn require(&self, model: &ModelDescriptor, id: &Value, row: Option<Record>, options: QueryOptions) -> Result<Option<Record>, AppError> {
        match row {
            None if options.require => Err(AppError::NotFound(format!("{} {}", model.name, id))),
            other => Ok(other),
        }
    }
}
