//! Raw config types matching the JSON configuration document.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp policy as written in config: `true`/`false` or a `[created, updated]` pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimestampsConfig {
    Enabled(bool),
    Custom([String; 2]),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrateMode {
    #[default]
    None,
    Create,
    Drop,
    Alter,
}

impl fmt::Display for MigrateMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MigrateMode::None => "none",
            MigrateMode::Create => "create",
            MigrateMode::Drop => "drop",
            MigrateMode::Alter => "alter",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `postgres` (alias `pg`) or `memory`.
    pub client: String,
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    /// Create the database named in `connection` when it does not exist.
    #[serde(default)]
    pub create_database: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default)]
    pub default_store: Option<String>,
    #[serde(default)]
    pub migrate: MigrateMode,
    #[serde(default)]
    pub has_timestamps: Option<TimestampsConfig>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub stores: BTreeMap<String, StoreConfig>,
    #[serde(default)]
    pub models: ModelsConfig,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FootprintsConfig {
    /// Page size applied to finds that carry no limit of their own.
    #[serde(default)]
    pub default_limit: Option<u32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdType {
    #[default]
    Increments,
    Uuid,
}

impl IdType {
    /// Postgres cast for parameters bound against an id of this type.
    pub fn param_cast(self) -> Option<&'static str> {
        match self {
            IdType::Increments => None,
            IdType::Uuid => Some("uuid"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnTypeConfig {
    Simple(String),
    Parameterized { name: String, params: Option<Vec<u32>> },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Referenced model name.
    pub model: String,
    /// Referenced column; the model's id attribute when omitted.
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub on_delete: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ColumnTypeConfig,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    /// Raw SQL default expression.
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub references: Option<ReferenceConfig>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKindConfig {
    BelongsTo,
    HasOne,
    HasMany,
    BelongsToMany,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationConfig {
    pub kind: RelationKindConfig,
    /// Target model name.
    pub model: String,
    #[serde(default)]
    pub foreign_key: Option<String>,
    /// Pivot model for `belongs_to_many`.
    #[serde(default)]
    pub through: Option<String>,
    /// Pivot column referencing the target for `belongs_to_many`.
    #[serde(default)]
    pub other_key: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub table_name: Option<String>,
    #[serde(default)]
    pub id_attribute: Option<String>,
    #[serde(default)]
    pub id_type: IdType,
    #[serde(default)]
    pub has_timestamps: Option<TimestampsConfig>,
    #[serde(default)]
    pub store: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnConfig>,
    #[serde(default)]
    pub relations: BTreeMap<String, RelationConfig>,
}

/// Whole configuration document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FullConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub footprints: FootprintsConfig,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}
