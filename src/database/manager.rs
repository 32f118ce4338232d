use serde_json::Value;
use sqlx::{
    postgres::{PgArguments, PgPoolOptions},
    query::Query,
    PgPool, Postgres, Row,
};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use super::query_builder::SqlResult;
use crate::config::DatabaseConfig;

/// Errors from the data access layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Shared connection pool. Built once at startup and handed to every component.
#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let pool = Self::options(config).connect(&config.url).await?;
        info!("Created database pool (max {} connections)", config.max_connections);
        Ok(Self { pool })
    }

    /// Pool that opens connections on first use.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let pool = Self::options(config).connect_lazy(&config.url)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn options(config: &DatabaseConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Run a composed SELECT and return each row as a JSON object.
    pub async fn fetch_json(&self, sql: &SqlResult) -> Result<Vec<Value>, DatabaseError> {
        let rows = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<Value, _>("row").map_err(DatabaseError::from))
            .collect()
    }

    pub async fn fetch_json_optional(&self, sql: &SqlResult) -> Result<Option<Value>, DatabaseError> {
        let row = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(row.try_get::<Value, _>("row")?)),
            None => Ok(None),
        }
    }

    /// Like [`Database::fetch_json_optional`] but a missing row is `NotFound(what)`.
    pub async fn fetch_json_404(&self, sql: &SqlResult, what: &str) -> Result<Value, DatabaseError> {
        self.fetch_json_optional(sql)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} not found", what)))
    }

    pub async fn fetch_count(&self, sql: &SqlResult) -> Result<i64, DatabaseError> {
        let row = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count)
    }

    /// Execute a statement ending in `RETURNING <id>`; `None` when no row was affected.
    pub async fn execute_returning_id(&self, sql: &SqlResult) -> Result<Option<i64>, DatabaseError> {
        let row = bind_params(sqlx::query(&sql.query), &sql.params)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(row.try_get::<i64, _>(0)?)),
            None => Ok(None),
        }
    }
}

pub fn bind_params<'q>(
    mut q: Query<'q, Postgres, PgArguments>,
    params: &'q [Value],
) -> Query<'q, Postgres, PgArguments> {
    for p in params {
        q = bind_param(q, p);
    }
    q
}

fn bind_param<'q>(
    q: Query<'q, Postgres, PgArguments>,
    v: &'q Value,
) -> Query<'q, Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                // Postgres doesn't have u64; cast down if safe
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        // Arrays and objects travel as JSONB
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()),
    }
}
