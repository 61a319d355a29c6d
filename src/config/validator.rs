//! Config validation: referential integrity between stores, models and relations.

use crate::config::{FullConfig, MigrateMode, ModelConfig, RelationKindConfig};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

/// Store clients this crate can connect.
pub const SUPPORTED_CLIENTS: &[&str] = &["postgres", "pg", "memory"];

/// Store used by models that do not name one: `default_store`, else the only configured store.
pub fn default_store_name(config: &FullConfig) -> Result<&str, ConfigError> {
    if let Some(name) = config.database.models.default_store.as_deref() {
        return Ok(name);
    }
    let mut stores = config.database.stores.keys();
    match (stores.next(), stores.next()) {
        (Some(only), None) => Ok(only.as_str()),
        (None, _) => Err(ConfigError::Validation("at least one store required".into())),
        (Some(_), Some(_)) => Err(ConfigError::Validation(
            "database.models.default_store is required when several stores are configured".into(),
        )),
    }
}

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    if config.database.models.migrate == MigrateMode::Alter {
        return Err(ConfigError::MigrationUnsupported(MigrateMode::Alter.to_string()));
    }

    for (name, store) in &config.database.stores {
        let client = store.client.to_lowercase();
        if !SUPPORTED_CLIENTS.contains(&client.as_str()) {
            return Err(ConfigError::UnsupportedClient {
                store: name.clone(),
                client: store.client.clone(),
            });
        }
        if client != "memory" && store.connection.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::Validation(format!("store '{}' requires a connection", name)));
        }
    }

    let default_store = default_store_name(config)?;
    if !config.database.stores.contains_key(default_store) {
        return Err(ConfigError::MissingReference {
            kind: "store",
            id: default_store.to_string(),
        });
    }

    let mut model_names = HashSet::new();
    for m in &config.models {
        if !model_names.insert(m.name.to_lowercase()) {
            return Err(ConfigError::DuplicateModel(m.name.clone()));
        }
    }

    let store_of: HashMap<String, &str> = config
        .models
        .iter()
        .map(|m| (m.name.to_lowercase(), m.store.as_deref().unwrap_or(default_store)))
        .collect();
    let same_store = |m: &ModelConfig, other: &str| -> Result<(), ConfigError> {
        let own = store_of.get(&m.name.to_lowercase()).copied();
        let theirs = store_of.get(&other.to_lowercase()).copied();
        if own != theirs {
            return Err(ConfigError::Validation(format!(
                "model '{}' relates to '{}' in another store",
                m.name, other
            )));
        }
        Ok(())
    };

    let mut table_names = HashSet::new();
    for m in &config.models {
        let table = m
            .table_name
            .clone()
            .unwrap_or_else(|| crate::case::to_snake_case(&m.name));
        if !table_names.insert(table.clone()) {
            return Err(ConfigError::DuplicateTable(table));
        }

        if let Some(store) = m.store.as_deref() {
            if !config.database.stores.contains_key(store) {
                return Err(ConfigError::MissingReference {
                    kind: "store",
                    id: store.to_string(),
                });
            }
        }

        let id_attribute = m.id_attribute.as_deref().unwrap_or("id");
        let mut column_names = HashSet::new();
        for c in &m.columns {
            if c.name == id_attribute {
                return Err(ConfigError::Validation(format!(
                    "model '{}': column '{}' duplicates the id attribute",
                    m.name, c.name
                )));
            }
            if !column_names.insert(c.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "model '{}': duplicate column '{}'",
                    m.name, c.name
                )));
            }
            if let Some(r) = &c.references {
                if !model_names.contains(&r.model.to_lowercase()) {
                    return Err(ConfigError::MissingReference {
                        kind: "model",
                        id: r.model.clone(),
                    });
                }
            }
        }

        for (rel_name, rel) in &m.relations {
            if !model_names.contains(&rel.model.to_lowercase()) {
                return Err(ConfigError::MissingReference {
                    kind: "model",
                    id: rel.model.clone(),
                });
            }
            same_store(m, &rel.model)?;
            match (rel.kind, rel.through.as_deref()) {
                (RelationKindConfig::BelongsToMany, Some(through)) => {
                    if !model_names.contains(&through.to_lowercase()) {
                        return Err(ConfigError::MissingReference {
                            kind: "through model",
                            id: through.to_string(),
                        });
                    }
                    same_store(m, through)?;
                }
                (RelationKindConfig::BelongsToMany, None) => {
                    return Err(ConfigError::Validation(format!(
                        "model '{}': relation '{}' is belongs_to_many and requires 'through'",
                        m.name, rel_name
                    )));
                }
                (_, Some(_)) => {
                    return Err(ConfigError::Validation(format!(
                        "model '{}': relation '{}' sets 'through' but is not belongs_to_many",
                        m.name, rel_name
                    )));
                }
                (_, None) => {}
            }
        }
    }

    Ok(())
}
