//! Load config from a JSON document and resolve it into the model registry.

use crate::case::to_snake_case;
use crate::config::resolved::{
    ColumnDescriptor, ColumnReference, ModelDescriptor, ModelRegistry, PivotDescriptor, RelationDescriptor,
    Timestamps,
};
use crate::config::types::*;
use crate::config::{default_store_name, validate};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

/// Table name and id attribute of each model, needed before relations can be keyed.
struct ModelKeys<'a> {
    table_name: String,
    id_attribute: &'a str,
    id_type: IdType,
}

/// Build the model registry from full config (validates first).
pub fn resolve(config: &FullConfig) -> Result<ModelRegistry, ConfigError> {
    validate(config)?;
    let default_store = default_store_name(config)?;
    let global_timestamps = config.database.models.has_timestamps.as_ref();

    let keys: HashMap<String, ModelKeys<'_>> = config
        .models
        .iter()
        .map(|m| {
            (
                ModelRegistry::key(&m.name),
                ModelKeys {
                    table_name: m.table_name.clone().unwrap_or_else(|| to_snake_case(&m.name)),
                    id_attribute: m.id_attribute.as_deref().unwrap_or("id"),
                    id_type: m.id_type,
                },
            )
        })
        .collect();

    let mut registry = ModelRegistry::default();
    for m in &config.models {
        let own = keys_of(&keys, &m.name)?;

        let mut columns = Vec::with_capacity(m.columns.len());
        for c in &m.columns {
            let references = match &c.references {
                Some(r) => {
                    let target = keys_of(&keys, &r.model)?;
                    Some(ColumnReference {
                        table: target.table_name.clone(),
                        column: r.column.clone().unwrap_or_else(|| target.id_attribute.to_string()),
                        on_delete: r.on_delete.clone(),
                    })
                }
                None => None,
            };
            columns.push(ColumnDescriptor {
                name: c.name.clone(),
                sql_type: sql_type(&c.type_),
                nullable: c.nullable,
                unique: c.unique,
                default: c.default.clone(),
                references,
            });
        }

        let mut relations = HashMap::with_capacity(m.relations.len());
        for (rel_name, rel) in &m.relations {
            let target = keys_of(&keys, &rel.model)?;
            let target_key = ModelRegistry::key(&rel.model);
            let descriptor = match rel.kind {
                RelationKindConfig::BelongsTo => RelationDescriptor::BelongsTo {
                    target: target_key,
                    foreign_key: rel
                        .foreign_key
                        .clone()
                        .unwrap_or_else(|| format!("{}_{}", target.table_name, target.id_attribute)),
                },
                RelationKindConfig::HasOne => RelationDescriptor::HasOne {
                    target: target_key,
                    foreign_key: rel
                        .foreign_key
                        .clone()
                        .unwrap_or_else(|| format!("{}_{}", own.table_name, own.id_attribute)),
                },
                RelationKindConfig::HasMany => RelationDescriptor::HasMany {
                    target: target_key,
                    foreign_key: rel
                        .foreign_key
                        .clone()
                        .unwrap_or_else(|| format!("{}_{}", own.table_name, own.id_attribute)),
                },
                RelationKindConfig::BelongsToMany => {
                    let through_name = rel.through.as_deref().ok_or_else(|| {
                        ConfigError::Validation(format!("relation '{}' requires 'through'", rel_name))
                    })?;
                    let through = keys_of(&keys, through_name)?;
                    RelationDescriptor::BelongsToManyThrough {
                        target: target_key,
                        pivot: PivotDescriptor {
                            table_name: through.table_name.clone(),
                            id_attribute: through.id_attribute.to_string(),
                            parent_key: rel
                                .foreign_key
                                .clone()
                                .unwrap_or_else(|| format!("{}_{}", own.table_name, own.id_attribute)),
                            child_key: rel
                                .other_key
                                .clone()
                                .unwrap_or_else(|| format!("{}_{}", target.table_name, target.id_attribute)),
                            parent_cast: own.id_type.param_cast(),
                            child_cast: target.id_type.param_cast(),
                        },
                    }
                }
            };
            relations.insert(rel_name.clone(), descriptor);
        }

        let key = ModelRegistry::key(&m.name);
        registry.models.insert(
            key.clone(),
            ModelDescriptor {
                name: m.name.clone(),
                table_name: own.table_name.clone(),
                id_attribute: own.id_attribute.to_string(),
                id_type: m.id_type,
                timestamps: resolve_timestamps(m.has_timestamps.as_ref(), global_timestamps),
                store: m.store.clone().unwrap_or_else(|| default_store.to_string()),
                columns,
                relations,
            },
        );
        registry.order.push(key);
    }

    Ok(registry)
}

fn keys_of<'k, 'a>(keys: &'k HashMap<String, ModelKeys<'a>>, name: &str) -> Result<&'k ModelKeys<'a>, ConfigError> {
    keys.get(&ModelRegistry::key(name)).ok_or_else(|| ConfigError::MissingReference {
        kind: "model",
        id: name.to_string(),
    })
}

/// A model-level policy overrides the global one; model-level `true` picks up a global custom pair.
fn resolve_timestamps(model: Option<&TimestampsConfig>, global: Option<&TimestampsConfig>) -> Timestamps {
    let custom = |pair: &[String; 2]| Timestamps::Custom {
        created: pair[0].clone(),
        updated: pair[1].clone(),
    };
    match (model, global) {
        (Some(TimestampsConfig::Enabled(false)), _) => Timestamps::None,
        (Some(TimestampsConfig::Custom(pair)), _) => custom(pair),
        (Some(TimestampsConfig::Enabled(true)), Some(TimestampsConfig::Custom(pair))) => custom(pair),
        (Some(TimestampsConfig::Enabled(true)), _) => Timestamps::Default,
        (None, Some(TimestampsConfig::Enabled(true))) => Timestamps::Default,
        (None, Some(TimestampsConfig::Custom(pair))) => custom(pair),
        (None, _) => Timestamps::None,
    }
}

/// SQL type for a configured column type. Short aliases map to Postgres types; anything else passes through.
fn sql_type(ty: &ColumnTypeConfig) -> String {
    match ty {
        ColumnTypeConfig::Simple(s) => match s.to_lowercase().as_str() {
            "string" => "varchar(255)".into(),
            "integer" | "int" => "integer".into(),
            "float" | "double" => "double precision".into(),
            "bool" => "boolean".into(),
            "datetime" | "timestamp" => "timestamptz".into(),
            "json" => "jsonb".into(),
            _ => s.clone(),
        },
        ColumnTypeConfig::Parameterized { name, params } => {
            let p = params
                .as_ref()
                .map(|v| v.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            if p.is_empty() {
                name.clone()
            } else {
                format!("{}({})", name, p)
            }
        }
    }
}

/// Parse a JSON configuration document.
pub fn load_from_str(json: &str) -> Result<FullConfig, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Read and parse a JSON configuration file.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading config");
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    load_from_str(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelationKind;
    use serde_json::json;

    fn blog_config() -> FullConfig {
        serde_json::from_value(json!({
            "database": {
                "stores": { "main": { "client": "memory" } },
                "models": { "migrate": "drop" }
            },
            "models": [
                {
                    "name": "User",
                    "columns": [{ "name": "name", "type": "string", "nullable": false }],
                    "relations": {
                        "roles": { "kind": "belongs_to_many", "model": "Role", "through": "UserRole" },
                        "profile": { "kind": "has_one", "model": "Profile" },
                        "posts": { "kind": "has_many", "model": "Post" }
                    }
                },
                {
                    "name": "UserRole",
                    "columns": [
                        { "name": "user_id", "type": "integer", "references": { "model": "User" } },
                        { "name": "role_id", "type": "integer", "references": { "model": "Role" } }
                    ]
                },
                { "name": "Role", "has_timestamps": true, "columns": [{ "name": "name", "type": "string" }] },
                { "name": "Profile", "columns": [{ "name": "user_id", "type": "integer" }] },
                {
                    "name": "Post",
                    "has_timestamps": ["inserted", "modified"],
                    "columns": [{ "name": "user_id", "type": "integer" }],
                    "relations": { "user": { "kind": "belongs_to", "model": "User" } }
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn derives_table_names_and_keys() {
        let registry = resolve(&blog_config()).unwrap();
        let user = registry.resolve("user").unwrap();
        assert_eq!(user.table_name, "user");
        assert_eq!(user.store, "main");
        assert_eq!(registry.resolve("USERROLE").unwrap().table_name, "user_role");

        match user.relations.get("roles").unwrap() {
            RelationDescriptor::BelongsToManyThrough { target, pivot } => {
                assert_eq!(target, "role");
                assert_eq!(pivot.table_name, "user_role");
                assert_eq!(pivot.parent_key, "user_id");
                assert_eq!(pivot.child_key, "role_id");
            }
            other => panic!("unexpected relation {:?}", other),
        }
        assert_eq!(user.relations["posts"].kind(), RelationKind::HasMany);
        assert_eq!(user.relations["posts"].foreign_key(), "user_id");

        let post = registry.resolve("post").unwrap();
        assert_eq!(
            post.relations["user"],
            RelationDescriptor::BelongsTo {
                target: "user".into(),
                foreign_key: "user_id".into()
            }
        );
    }

    #[test]
    fn resolves_timestamp_policies() {
        let registry = resolve(&blog_config()).unwrap();
        assert_eq!(registry.resolve("user").unwrap().timestamps, Timestamps::None);
        assert_eq!(registry.resolve("role").unwrap().timestamps, Timestamps::Default);
        assert_eq!(
            registry.resolve("post").unwrap().timestamps.fields(),
            Some(("inserted", "modified"))
        );
    }

    #[test]
    fn global_custom_pair_applies_to_enabled_models() {
        let t = resolve_timestamps(
            Some(&TimestampsConfig::Enabled(true)),
            Some(&TimestampsConfig::Custom(["c".into(), "u".into()])),
        );
        assert_eq!(t.fields(), Some(("c", "u")));
        let off = resolve_timestamps(Some(&TimestampsConfig::Enabled(false)), Some(&TimestampsConfig::Enabled(true)));
        assert_eq!(off, Timestamps::None);
    }

    #[test]
    fn maps_column_type_aliases() {
        let registry = resolve(&blog_config()).unwrap();
        let user = registry.resolve("user").unwrap();
        assert_eq!(user.column("name").unwrap().sql_type, "varchar(255)");
        let pivot = registry.resolve("userrole").unwrap();
        let reference = pivot.column("role_id").unwrap().references.clone().unwrap();
        assert_eq!(reference.table, "role");
        assert_eq!(reference.column, "id");
    }

    #[test]
    fn rejects_unknown_relation_target() {
        let mut config = blog_config();
        config.models[4].relations.get_mut("user").unwrap().model = "Account".into();
        assert!(matches!(
            resolve(&config),
            Err(ConfigError::MissingReference { kind: "model", .. })
        ));
    }

    #[test]
    fn rejects_alter_migration() {
        let mut config = blog_config();
        config.database.models.migrate = MigrateMode::Alter;
        assert!(matches!(resolve(&config), Err(ConfigError::MigrationUnsupported(_))));
    }

    #[test]
    fn rejects_unsupported_client() {
        let mut config = blog_config();
        config.database.stores.get_mut("main").unwrap().client = "sqlite3".into();
        assert!(matches!(resolve(&config), Err(ConfigError::UnsupportedClient { .. })));
    }

    #[test]
    fn rejects_duplicate_models() {
        let mut config = blog_config();
        let mut dup = config.models[2].clone();
        dup.name = "ROLE".into();
        dup.table_name = Some("role_copy".into());
        config.models.push(dup);
        assert!(matches!(resolve(&config), Err(ConfigError::DuplicateModel(_))));
    }

    #[test]
    fn through_is_required_for_many_to_many() {
        let mut config = blog_config();
        config.models[0].relations.get_mut("roles").unwrap().through = None;
        assert!(matches!(resolve(&config), Err(ConfigError::Validation(_))));
    }
}
