use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StorageError;
use crate::model::{Record, Table, record_id, record_lastchange};

/// Exact-match conjunction over one or more columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Filter::default()
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::new().and(column, value)
    }

    pub fn and(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        match self.conditions.iter_mut().find(|(known, _)| *known == column) {
            Some(existing) => existing.1 = value,
            None => self.conditions.push((column, value)),
        }
        self
    }

    /// Rejects columns the table does not have.
    pub fn check(&self, table: Table) -> Result<(), StorageError> {
        match self
            .conditions
            .iter()
            .find(|(column, _)| !table.has_column(column))
        {
            Some((column, _)) => Err(StorageError::UnknownColumn {
                table: table.name(),
                column: column.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|(column, expected)| {
            let actual = record.get(column).unwrap_or(&Value::Null);
            same_value(actual, expected)
        })
    }

    pub fn to_record(&self) -> Record {
        self.conditions.iter().cloned().collect()
    }
}

fn same_value(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        _ => actual == expected,
    }
}

/// What a conditional [`Storage::update`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The row as stored after the write.
    Updated(Record),
    Missing,
    /// The stored `lastchange` differs from the expected one; nothing was written.
    Stale,
}

/// Backing store for entity rows.
///
/// Every call is independent and may be retried by the caller when it fails
/// with [`StorageError::Unavailable`].
#[async_trait]
pub trait Storage: Send + Sync {
    /// Rows whose id is in `ids`. Missing ids are simply absent from the result.
    async fn get_by_ids(&self, table: Table, ids: &[Uuid]) -> Result<Vec<Record>, StorageError>;

    async fn get_by_filter(&self, table: Table, filter: &Filter)
    -> Result<Vec<Record>, StorageError>;

    /// A window of the rows matching `filter`, ordered by id.
    async fn get_page(
        &self,
        table: Table,
        filter: &Filter,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Record>, StorageError>;

    /// Persists a full row (it must carry an `id`) and returns it as stored.
    async fn insert(&self, table: Table, record: Record) -> Result<Record, StorageError>;

    /// Overwrites the given columns only.
    ///
    /// With `expected` set, the write happens only while the stored
    /// `lastchange` still equals it; the comparison and the write are one
    /// atomic step.
    async fn update(
        &self,
        table: Table,
        id: Uuid,
        expected: Option<DateTime<Utc>>,
        changes: Record,
    ) -> Result<UpdateOutcome, StorageError>;

    /// Removes the row; `false` when there was nothing to remove.
    async fn delete(&self, table: Table, id: Uuid) -> Result<bool, StorageError>;

    async fn get_by_id(&self, table: Table, id: Uuid) -> Result<Option<Record>, StorageError> {
        Ok(self.get_by_ids(table, &[id]).await?.into_iter().next())
    }
}

pub(crate) fn check_columns(table: Table, record: &Record) -> Result<(), StorageError> {
    match record.keys().find(|column| !table.has_column(column)) {
        Some(column) => Err(StorageError::UnknownColumn {
            table: table.name(),
            column: column.clone(),
        }),
        None => Ok(()),
    }
}

/// Process-local storage, used by tests and by the `memory` backend.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    tables: Arc<RwLock<HashMap<Table, BTreeMap<Uuid, Record>>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        InMemoryStorage::default()
    }

    pub async fn len(&self, table: Table) -> usize {
        let tables = self.tables.read().await;
        tables.get(&table).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn get_by_ids(&self, table: Table, ids: &[Uuid]) -> Result<Vec<Record>, StorageError> {
        let tables = self.tables.read().await;
        let Some(rows) = tables.get(&table) else {
            return Ok(Vec::new());
        };

        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(row) = rows.get(id) {
                found.push(row.clone());
            }
        }
        Ok(found)
    }

    async fn get_by_filter(
        &self,
        table: Table,
        filter: &Filter,
    ) -> Result<Vec<Record>, StorageError> {
        filter.check(table)?;
        let tables = self.tables.read().await;
        Ok(tables
            .get(&table)
            .map(|rows| {
                rows.values()
                    .filter(|row| filter.matches(row))
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default())
    }

    async fn get_page(
        &self,
        table: Table,
        filter: &Filter,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Record>, StorageError> {
        filter.check(table)?;
        let tables = self.tables.read().await;
        Ok(tables
            .get(&table)
            .map(|rows| {
                rows.values()
                    .filter(|row| filter.matches(row))
                    .skip(skip)
                    .take(limit)
                    .cloned()
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, table: Table, record: Record) -> Result<Record, StorageError> {
        check_columns(table, &record)?;
        let id = record_id(&record).ok_or_else(|| StorageError::Malformed {
            table: table.name(),
            message: "record has no id".to_string(),
        })?;

        let mut tables = self.tables.write().await;
        let rows = tables.entry(table).or_default();
        if rows.contains_key(&id) {
            return Err(StorageError::Duplicate {
                table: table.name(),
                id,
            });
        }

        // Every column is present in a stored row, like a relational one.
        let mut row = Record::new();
        for column in table.columns() {
            let value = record.get(column).cloned().unwrap_or(Value::Null);
            row.insert(column.to_string(), value);
        }
        rows.insert(id, row.clone());
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
        let mut tables = self.tables.write().await;
        let Some(row) = tables.get_mut(&table).and_then(|rows| rows.get_mut(&id)) else {
            return Ok(UpdateOutcome::Missing);
        };
        if expected.is_some() && record_lastchange(row) != expected {
            return Ok(UpdateOutcome::Stale);
        }

        for (column, value) in changes {
            if column != "id" {
                row.insert(column, value);
            }
        }
        Ok(UpdateOutcome::Updated(row.clone()))
    }

    async fn delete(&self, table: Table, id: Uuid) -> Result<bool, StorageError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .get_mut(&table)
            .and_then(|rows| rows.remove(&id))
            .is_some())
    }
}
