//! PostgreSQL backend.
//!
//! Rows cross the wire as `jsonb`: reads select `to_jsonb(t.*)`, writes go
//! through `jsonb_populate_record`, and filters use containment (`@>`).
//! Column names are checked against [`Table::columns`] before they are
//! spliced into SQL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StorageError;
use crate::model::{Record, Table, record_id, record_lastchange};
use crate::storage::{Filter, Storage, UpdateOutcome, check_columns};

const TABLES_SQL: &str = include_str!(concat!(env!("OUT_SCHEMAS"), "/tables.sql"));

#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

fn quoted(column: &str) -> String {
    format!("\"{column}\"")
}

fn storage_error(table: Table, error: sqlx::Error) -> StorageError {
    match error {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Protocol(_) => StorageError::Unavailable(error.to_string()),
        other => StorageError::Malformed {
            table: table.name(),
            message: other.to_string(),
        },
    }
}

fn rows(rows: Vec<Json<Record>>) -> Vec<Record> {
    rows.into_iter().map(|Json(row)| row).collect()
}

impl PgStorage {
    pub fn new(pool: PgPool) -> Self {
        PgStorage { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Ok(PgStorage::new(pool))
    }

    /// Creates missing tables; with `drop`, removes all of them first.
    pub async fn migrate(&self, drop: bool) -> Result<(), StorageError> {
        if drop {
            let names: Vec<&str> = Table::ALL.iter().map(Table::name).collect();
            sqlx::raw_sql(&format!("DROP TABLE IF EXISTS {} CASCADE", names.join(", ")))
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::Unavailable(e.to_string()))?;
            info!("dropped publication tables");
        }
        sqlx::raw_sql(TABLES_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        info!("publication tables ready");
        Ok(())
    }
}

#[async_trait]
impl Storage for PgStorage {
    async fn get_by_ids(&self, table: Table, ids: &[Uuid]) -> Result<Vec<Record>, StorageError> {
        let sql = format!(
            "SELECT to_jsonb(t.*) FROM {table} AS t WHERE t.id = ANY($1)"
        );
        let found = sqlx::query_scalar::<_, Json<Record>>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error(table, e))?;
        debug!(%table, requested = ids.len(), found = found.len(), "select by ids");
        Ok(rows(found))
    }

    async fn get_by_filter(
        &self,
        table: Table,
        filter: &Filter,
    ) -> Result<Vec<Record>, StorageError> {
        filter.check(table)?;
        let sql = format!(
            "SELECT to_jsonb(t.*) FROM {table} AS t WHERE to_jsonb(t.*) @> $1 ORDER BY t.id"
        );
        let found = sqlx::query_scalar::<_, Json<Record>>(&sql)
            .bind(Json(filter.to_record()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error(table, e))?;
        Ok(rows(found))
    }

    async fn get_page(
        &self,
        table: Table,
        filter: &Filter,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Record>, StorageError> {
        filter.check(table)?;
        let sql = format!(
            "SELECT to_jsonb(t.*) FROM {table} AS t WHERE to_jsonb(t.*) @> $1 \
             ORDER BY t.id OFFSET $2 LIMIT $3"
        );
        let found = sqlx::query_scalar::<_, Json<Record>>(&sql)
            .bind(Json(filter.to_record()))
            .bind(i64::try_from(skip).unwrap_or(i64::MAX))
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| storage_error(table, e))?;
        Ok(rows(found))
    }

    async fn insert(&self, table: Table, record: Record) -> Result<Record, StorageError> {
        check_columns(table, &record)?;
        let id = record_id(&record).ok_or_else(|| StorageError::Malformed {
            table: table.name(),
            message: "record has no id".to_string(),
        })?;

        let sql = format!(
            "INSERT INTO {table} SELECT * FROM jsonb_populate_record(NULL::{table}, $1) \
             RETURNING to_jsonb({table}.*)"
        );
        let Json(row) = sqlx::query_scalar::<_, Json<Record>>(&sql)
            .bind(Json(&record))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => StorageError::Duplicate {
                    table: table.name(),
                    id,
                },
                other => storage_error(table, other),
            })?;
        Ok(row)
    }

    async fn update(
        &self,
        table: Table,
        id: Uuid,
        expected: Option<DateTime<Utc>>,
        changes: Record,
    ) -> Result<UpdateOutcome, StorageError> {
        check_columns(table, &changes)?;
        let assignments: Vec<String> = changes
            .keys()
            .filter(|column| column.as_str() != "id")
            .map(|column| format!("{0} = r.{0}", quoted(column)))
            .collect();
        if assignments.is_empty() {
            return Ok(match self.get_by_id(table, id).await? {
                None => UpdateOutcome::Missing,
                Some(row) if expected.is_some() && record_lastchange(&row) != expected => {
                    UpdateOutcome::Stale
                }
                Some(row) => UpdateOutcome::Updated(row),
            });
        }

        let sql = format!(
            "UPDATE {table} AS t SET {} \
             FROM jsonb_populate_record(NULL::{table}, $1) AS r \
             WHERE t.id = $2 AND ($3::timestamptz IS NULL OR t.lastchange = $3) \
             RETURNING to_jsonb(t.*)",
            assignments.join(", ")
        );
        let row = sqlx::query_scalar::<_, Json<Record>>(&sql)
            .bind(Json(&changes))
            .bind(id)
            .bind(expected)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error(table, e))?;
        match row {
            Some(Json(row)) => Ok(UpdateOutcome::Updated(row)),
            // Nothing matched: either the row is gone or its token moved on.
            None => match self.get_by_id(table, id).await? {
                Some(_) => {
                    debug!(%table, %id, "conditional update lost the race");
                    Ok(UpdateOutcome::Stale)
                }
                None => Ok(UpdateOutcome::Missing),
            },
        }
    }

    async fn delete(&self, table: Table, id: Uuid) -> Result<bool, StorageError> {
        let sql = format!("DELETE FROM {table} WHERE id = $1");
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error(table, e))?;
        Ok(result.rows_affected() > 0)
    }
}
