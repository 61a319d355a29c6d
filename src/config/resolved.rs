//! Resolved model registry: config validated and flattened for runtime use.

use crate::config::IdType;
use crate::error::AppError;
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Timestamps {
    None,
    /// `created_at` / `updated_at`.
    Default,
    Custom { created: String, updated: String },
}

impl Timestamps {
    /// (created, updated) column names when timestamps are enabled.
    pub fn fields(&self) -> Option<(&str, &str)> {
        match self {
            Timestamps::None => None,
            Timestamps::Default => Some(("created_at", "updated_at")),
            Timestamps::Custom { created, updated } => Some((created.as_str(), updated.as_str())),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnReference {
    pub table: String,
    pub column: String,
    pub on_delete: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ColumnDescriptor {
    pub name: String,
    /// SQL type as written to DDL (e.g. "text", "varchar(64)").
    pub sql_type: String,
    pub nullable: bool,
    pub unique: bool,
    pub default: Option<String>,
    pub references: Option<ColumnReference>,
}

impl ColumnDescriptor {
    /// Postgres cast applied to bound parameters, for types a text/number parameter does not coerce into.
    pub fn param_cast(&self) -> Option<&'static str> {
        param_cast_for(&self.sql_type)
    }
}

pub(crate) fn param_cast_for(sql_type: &str) -> Option<&'static str> {
    let lower = sql_type.to_lowercase();
    if lower == "timestamptz" || lower == "timestamp with time zone" {
        Some("timestamptz")
    } else if lower == "timestamp" || lower.starts_with("timestamp ") || lower.starts_with("timestamp(") {
        Some("timestamp")
    } else if lower == "date" {
        Some("date")
    } else if lower == "uuid" {
        Some("uuid")
    } else if lower == "jsonb" {
        Some("jsonb")
    } else if lower == "json" {
        Some("json")
    } else {
        None
    }
}

/// Pivot table of a many-to-many relation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PivotDescriptor {
    pub table_name: String,
    pub id_attribute: String,
    /// Pivot column holding the parent id.
    pub parent_key: String,
    /// Pivot column holding the target id.
    pub child_key: String,
    /// Casts for parameters bound against the two key columns.
    pub parent_cast: Option<&'static str>,
    pub child_cast: Option<&'static str>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationKind {
    BelongsTo,
    HasOne,
    HasMany,
    BelongsToManyThrough,
}

/// A declared relation, resolved once at registration with every key it needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelationDescriptor {
    /// The declaring model holds `foreign_key` pointing at the target's id.
    BelongsTo { target: String, foreign_key: String },
    /// The target holds `foreign_key` pointing at the declaring model's id.
    HasOne { target: String, foreign_key: String },
    HasMany { target: String, foreign_key: String },
    BelongsToManyThrough { target: String, pivot: PivotDescriptor },
}

impl RelationDescriptor {
    pub fn kind(&self) -> RelationKind {
        match self {
            RelationDescriptor::BelongsTo { .. } => RelationKind::BelongsTo,
            RelationDescriptor::HasOne { .. } => RelationKind::HasOne,
            RelationDescriptor::HasMany { .. } => RelationKind::HasMany,
            RelationDescriptor::BelongsToManyThrough { .. } => RelationKind::BelongsToManyThrough,
        }
    }

    /// Registry key of the target model.
    pub fn target(&self) -> &str {
        match self {
            RelationDescriptor::BelongsTo { target, .. }
            | RelationDescriptor::HasOne { target, .. }
            | RelationDescriptor::HasMany { target, .. }
            | RelationDescriptor::BelongsToManyThrough { target, .. } => target,
        }
    }

    pub fn foreign_key(&self) -> &str {
        match self {
            RelationDescriptor::BelongsTo { foreign_key, .. }
            | RelationDescriptor::HasOne { foreign_key, .. }
            | RelationDescriptor::HasMany { foreign_key, .. } => foreign_key,
            RelationDescriptor::BelongsToManyThrough { pivot, .. } => &pivot.parent_key,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ModelDescriptor {
    pub name: String,
    pub table_name: String,
    pub id_attribute: String,
    pub id_type: IdType,
    pub timestamps: Timestamps,
    pub store: String,
    pub columns: Vec<ColumnDescriptor>,
    pub relations: HashMap<String, RelationDescriptor>,
}

impl ModelDescriptor {
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// True for the id attribute and, when enabled, the timestamp columns.
    pub fn is_auto_value(&self, name: &str) -> bool {
        if name == self.id_attribute {
            return true;
        }
        match self.timestamps.fields() {
            Some((created, updated)) => name == created || name == updated,
            None => false,
        }
    }

    /// Postgres cast for a parameter bound against `column` of this model.
    pub fn param_cast(&self, column: &str) -> Option<&'static str> {
        if column == self.id_attribute {
            return self.id_type.param_cast();
        }
        if let Some((created, updated)) = self.timestamps.fields() {
            if column == created || column == updated {
                return Some("timestamptz");
            }
        }
        self.column(column).and_then(ColumnDescriptor::param_cast)
    }
}

/// All registered models, keyed by lowercased name.
#[derive(Clone, Debug, Default)]
pub struct ModelRegistry {
    pub models: HashMap<String, ModelDescriptor>,
    /// Registration order, for deterministic migration.
    pub order: Vec<String>,
}

impl ModelRegistry {
    pub fn key(name: &str) -> String {
        name.to_lowercase()
    }

    /// Look up a model by name, case-insensitively.
    pub fn resolve(&self, name: &str) -> Result<&ModelDescriptor, AppError> {
        self.models
            .get(&Self::key(name))
            .ok_or_else(|| AppError::ModelNotFound(name.to_string()))
    }

    /// Models in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.order.iter().filter_map(|k| self.models.get(k))
    }

    /// Models assigned to `store`, in registration order.
    pub fn models_in_store<'a>(&'a self, store: &'a str) -> Vec<&'a ModelDescriptor> {
        self.iter().filter(|m| m.store == store).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
