//! Schema migration: create or drop the tables of registered models.
//! Each store migrates its own models inside one transaction; `alter` is rejected.

use crate::config::{IdType, MigrateMode, ModelDescriptor, ModelRegistry};
use crate::error::{AppError, ConfigError};
use crate::sql::quoted;
use crate::store::StoreRegistry;
use sqlx::PgConnection;

/// Run `mode` against every store for the models assigned to it.
pub async fn apply_migrations(stores: &StoreRegistry, registry: &ModelRegistry, mode: MigrateMode) -> Result<(), AppError> {
    if mode == MigrateMode::None {
        return Ok(());
    }
    for (name, store) in stores.iter() {
        let models = registry.models_in_store(name);
        if models.is_empty() {
            continue;
        }
        tracing::info!(store = %name, mode = %mode, models = models.len(), "migrating");
        store.migrate(mode, &models).await?;
    }
    Ok(())
}

pub(crate) fn unsupported(mode: MigrateMode) -> AppError {
    AppError::Config(ConfigError::MigrationUnsupported(mode.to_string()))
}

/// CREATE TABLE for one model: id, timestamps, then declared columns. Foreign keys are added separately.
pub fn create_table_sql(model: &ModelDescriptor) -> String {
    let mut defs = Vec::new();
    let id = quoted(&model.id_attribute);
    defs.push(match model.id_type {
        IdType::Increments => format!("{} SERIAL PRIMARY KEY", id),
        IdType::Uuid => format!("{} UUID PRIMARY KEY DEFAULT gen_random_uuid()", id),
    });
    if let Some((created, updated)) = model.timestamps.fields() {
        for name in [created, updated] {
            if model.column(name).is_none() {
                defs.push(format!("{} TIMESTAMPTZ DEFAULT CURRENT_TIMESTAMP", quoted(name)));
            }
        }
    }
    for c in &model.columns {
        let mut def = format!("{} {}", quoted(&c.name), c.sql_type);
        if !c.nullable {
            def.push_str(" NOT NULL");
        }
        if c.unique {
            def.push_str(" UNIQUE");
        }
        if let Some(d) = &c.default {
            def.push_str(" DEFAULT ");
            def.push_str(d);
        }
        defs.push(def);
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        quoted(&model.table_name),
        defs.join(",\n  ")
    )
}

/// (constraint name, ALTER TABLE statement) for each referencing column.
pub fn foreign_key_sql(model: &ModelDescriptor) -> Vec<(String, String)> {
    model
        .columns
        .iter()
        .filter_map(|c| {
            let r = c.references.as_ref()?;
            let name = format!("fk_{}_{}", model.table_name, c.name);
            let on_delete = r.on_delete.as_deref().unwrap_or("NO ACTION");
            let sql = format!(
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
                quoted(&model.table_name),
                quoted(&name),
                quoted(&c.name),
                quoted(&r.table),
                quoted(&r.column),
                on_delete
            );
            Some((name, sql))
        })
        .collect()
}

pub fn drop_table_sql(model: &ModelDescriptor) -> String {
    format!("DROP TABLE IF EXISTS {} CASCADE", quoted(&model.table_name))
}

/// Create missing tables, then add foreign keys that do not exist yet.
pub async fn create_tables(tx: &mut PgConnection, models: &[&ModelDescriptor]) -> Result<(), AppError> {
    for m in models {
        tracing::debug!(table = %m.table_name, "create table");
        sqlx::query(&create_table_sql(m)).execute(&mut *tx).await?;
    }
    for m in models {
        for (name, sql) in foreign_key_sql(m) {
            let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_constraint WHERE conname = $1)")
                .bind(&name)
                .fetch_one(&mut *tx)
                .await?;
            if !exists.0 {
                sqlx::query(&sql).execute(&mut *tx).await?;
            }
        }
    }
    Ok(())
}

/// Drop the tables of `models`, last registered first.
pub async fn drop_tables(tx: &mut PgConnection, models: &[&ModelDescriptor]) -> Result<(), AppError> {
    for m in models.iter().rev() {
        tracing::debug!(table = %m.table_name, "drop table");
        sqlx::query(&drop_table_sql(m)).execute(&mut *tx).await?;
    }
    Ok(())
}

pub async fn alter_tables(_tx: &mut PgConnection, _models: &[&ModelDescriptor]) -> Result<(), AppError> {
    Err(unsupported(MigrateMode::Alter))
}
