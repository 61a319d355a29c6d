//! PostgreSQL store over a sqlx pool.

use super::{Scope, Store};
use crate::config::{MigrateMode, ModelDescriptor, PivotDescriptor, StoreConfig};
use crate::criteria::{Criteria, Record};
use crate::error::AppError;
use crate::migration;
use crate::sql::{self, row_to_record, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{ConnectOptions, Executor, PgPool, Postgres};
use std::str::FromStr;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    /// Connect the pool described by `config`, creating the database first when asked to.
    pub async fn connect(name: &str, config: &StoreConfig) -> Result<Self, AppError> {
        let url = config
            .connection
            .as_deref()
            .ok_or_else(|| AppError::BadRequest(format!("store '{}' has no connection", name)))?;
        if config.create_database {
            ensure_database_exists(url).await?;
        }
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS))
            .connect(url)
            .await?;
        Ok(PgStore::new(pool))
    }
}

fn bind_query(q: &QueryBuf) -> Query<'_, Postgres, PgArguments> {
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(PgBindValue::from_json(p));
    }
    query
}

async fn fetch_optional<'c, E>(executor: E, q: &QueryBuf) -> Result<Option<Record>, AppError>
where
    E: Executor<'c, Database = Postgres>,
{
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let row = bind_query(q).fetch_optional(executor).await?;
    Ok(row.map(|r| row_to_record(&r)))
}

async fn fetch_all<'c, E>(executor: E, q: &QueryBuf) -> Result<Vec<Record>, AppError>
where
    E: Executor<'c, Database = Postgres>,
{
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let rows = bind_query(q).fetch_all(executor).await?;
    Ok(rows.iter().map(row_to_record).collect())
}

async fn execute<'c, E>(executor: E, q: &QueryBuf) -> Result<u64, AppError>
where
    E: Executor<'c, Database = Postgres>,
{
    tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
    let done = bind_query(q).execute(executor).await?;
    Ok(done.rows_affected())
}

fn inserted_id(model: &ModelDescriptor, row: &Record) -> Result<Value, AppError> {
    row.get(&model.id_attribute)
        .cloned()
        .ok_or_else(|| AppError::Storage(format!("insert into '{}' returned no id", model.table_name)))
}

#[async_trait]
impl Store for PgStore {
    fn client(&self) -> &'static str {
        "postgres"
    }

    async fn fetch_by_id(&self, model: &ModelDescriptor, id: &Value) -> Result<Option<Record>, AppError> {
        fetch_optional(&self.pool, &sql::select_by_id(model, id)).await
    }

    async fn fetch_all(&self, model: &ModelDescriptor, scope: &Scope, criteria: &Criteria) -> Result<Vec<Record>, AppError> {
        fetch_all(&self.pool, &sql::select_where(model, scope, criteria)).await
    }

    async fn insert(&self, model: &ModelDescriptor, values: &Record) -> Result<Record, AppError> {
        fetch_optional(&self.pool, &sql::insert(model, values))
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn insert_linked(
        &self,
        model: &ModelDescriptor,
        values: &Record,
        pivot: &PivotDescriptor,
        parent_id: &Value,
    ) -> Result<Record, AppError> {
        let mut tx = self.pool.begin().await?;
        let row = fetch_optional(&mut *tx, &sql::insert(model, values))
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        let child_id = inserted_id(model, &row)?;
        execute(&mut *tx, &sql::insert_pivot(pivot, parent_id, &child_id)).await?;
        tx.commit().await?;
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
        let mut tx = self.pool.begin().await?;
        let row = fetch_optional(&mut *tx, &sql::insert(model, values))
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        let mut link = Record::new();
        link.insert(foreign_key.to_string(), inserted_id(model, &row)?);
        let attached = fetch_optional(&mut *tx, &sql::update_by_id(owner, owner_id, &link)).await?;
        if attached.is_none() {
            // Dropping the transaction rolls back the insert.
            return Err(AppError::NotFound(format!("{} {}", owner.name, owner_id)));
        }
        tx.commit().await?;
        Ok(row)
    }

    async fn update_by_id(&self, model: &ModelDescriptor, id: &Value, values: &Record) -> Result<Option<Record>, AppError> {
        fetch_optional(&self.pool, &sql::update_by_id(model, id, values)).await
    }

    async fn update_where(
        &self,
        model: &ModelDescriptor,
        scope: &Scope,
        criteria: &Criteria,
        values: &Record,
    ) -> Result<Vec<Record>, AppError> {
        fetch_all(&self.pool, &sql::update_where(model, scope, criteria, values)).await
    }

    async fn delete_by_id(&self, model: &ModelDescriptor, id: &Value) -> Result<u64, AppError> {
        execute(&self.pool, &sql::delete_by_id(model, id)).await
    }

    async fn delete_where(&self, model: &ModelDescriptor, scope: &Scope, criteria: &Criteria) -> Result<u64, AppError> {
        execute(&self.pool, &sql::delete_where(model, scope, criteria)).await
    }

    async fn unlink_all(&self, pivot: &PivotDescriptor, parent_id: &Value) -> Result<u64, AppError> {
        execute(&self.pool, &sql::delete_pivot(pivot, parent_id)).await
    }

    async fn migrate(&self, mode: MigrateMode, models: &[&ModelDescriptor]) -> Result<(), AppError> {
        if mode == MigrateMode::None {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        match mode {
            MigrateMode::None => {}
            MigrateMode::Create => migration::create_tables(&mut *tx, models).await?,
            MigrateMode::Drop => {
                migration::drop_tables(&mut *tx, models).await?;
                migration::create_tables(&mut *tx, models).await?;
            }
            MigrateMode::Alter => migration::alter_tables(&mut *tx, models).await?,
        }
        tx.commit().await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Connect to the server's `postgres` database and create the target database if missing.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid connection url: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", sql::quoted(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| AppError::BadRequest("connection url has no database path".into()))?
        + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let db_name = path_and_query.split('?').next().unwrap_or("").trim();
    let base = url.get(..path_start).unwrap_or(url);
    Ok((format!("{}postgres", base), db_name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::parse_db_name_from_url;

    #[test]
    fn splits_admin_url_and_database() {
        let (admin, db) = parse_db_name_from_url("postgres://u:p@localhost:5432/blog?sslmode=disable").unwrap();
        assert_eq!(admin, "postgres://u:p@localhost:5432/postgres");
        assert_eq!(db, "blog");
    }
}
