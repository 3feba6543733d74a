#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pubgraph::model::{Record, Table};
use pubgraph::{
    AllowAll, Filter, GraphQLRequest, InMemoryStorage, Permission, Storage, StorageError,
    Subgraph, UpdateOutcome,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

pub const USER: &str = "2d9dc5ca-a4a2-11ed-b9df-0242ac120003";
pub const SUBJECT: &str = "ce250a68-b095-11ed-9bd8-0242ac110002";

pub fn user() -> Uuid {
    Uuid::parse_str(USER).unwrap()
}

/// Wraps a storage and counts the calls that reach it.
pub struct CountingStorage {
    inner: Arc<dyn Storage>,
    by_ids: AtomicUsize,
    by_filter: AtomicUsize,
}

impl CountingStorage {
    pub fn new(inner: Arc<dyn Storage>) -> Self {
        CountingStorage {
            inner,
            by_ids: AtomicUsize::new(0),
            by_filter: AtomicUsize::new(0),
        }
    }

    pub fn by_ids_calls(&self) -> usize {
        self.by_ids.load(Ordering::SeqCst)
    }

    pub fn by_filter_calls(&self) -> usize {
        self.by_filter.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.by_ids.store(0, Ordering::SeqCst);
        self.by_filter.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl Storage for CountingStorage {
    async fn get_by_ids(&self, table: Table, ids: &[Uuid]) -> Result<Vec<Record>, StorageError> {
        self.by_ids.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_ids(table, ids).await
    }

    async fn get_by_filter(
        &self,
        table: Table,
        filter: &Filter,
    ) -> Result<Vec<Record>, StorageError> {
        self.by_filter.fetch_add(1, Ordering::SeqCst);
        self.inner.get_by_filter(table, filter).await
    }

    async fn get_page(
        &self,
        table: Table,
        filter: &Filter,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Record>, StorageError> {
        self.inner.get_page(table, filter, skip, limit).await
    }

    async fn insert(&self, table: Table, record: Record) -> Result<Record, StorageError> {
        self.inner.insert(table, record).await
    }

    async fn update(
        &self,
        table: Table,
        id: Uuid,
        expected: Option<DateTime<Utc>>,
        changes: Record,
    ) -> Result<UpdateOutcome, StorageError> {
        self.inner.update(table, id, expected, changes).await
    }

    async fn delete(&self, table: Table, id: Uuid) -> Result<bool, StorageError> {
        self.inner.delete(table, id).await
    }
}

/// Holds every write back for `delay`, so concurrent requests all read
/// before any of them writes.
pub struct SlowWriteStorage {
    inner: Arc<dyn Storage>,
    delay: Duration,
}

impl SlowWriteStorage {
    pub fn new(inner: Arc<dyn Storage>, delay: Duration) -> Self {
        SlowWriteStorage { inner, delay }
    }
}

#[async_trait]
impl Storage for SlowWriteStorage {
    async fn get_by_ids(&self, table: Table, ids: &[Uuid]) -> Result<Vec<Record>, StorageError> {
        self.inner.get_by_ids(table, ids).await
    }

    async fn get_by_filter(
        &self,
        table: Table,
        filter: &Filter,
    ) -> Result<Vec<Record>, StorageError> {
        self.inner.get_by_filter(table, filter).await
    }

    async fn get_page(
        &self,
        table: Table,
        filter: &Filter,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Record>, StorageError> {
        self.inner.get_page(table, filter, skip, limit).await
    }

    async fn insert(&self, table: Table, record: Record) -> Result<Record, StorageError> {
        self.inner.insert(table, record).await
    }

    async fn update(
        &self,
        table: Table,
        id: Uuid,
        expected: Option<DateTime<Utc>>,
        changes: Record,
    ) -> Result<UpdateOutcome, StorageError> {
        tokio::time::sleep(self.delay).await;
        self.inner.update(table, id, expected, changes).await
    }

    async fn delete(&self, table: Table, id: Uuid) -> Result<bool, StorageError> {
        self.inner.delete(table, id).await
    }
}

/// Storage whose backend is down: every call fails as unavailable.
pub struct FailingStorage;

fn down() -> StorageError {
    StorageError::Unavailable("connection refused".to_string())
}

#[async_trait]
impl Storage for FailingStorage {
    async fn get_by_ids(&self, _: Table, _: &[Uuid]) -> Result<Vec<Record>, StorageError> {
        Err(down())
    }

    async fn get_by_filter(&self, _: Table, _: &Filter) -> Result<Vec<Record>, StorageError> {
        Err(down())
    }

    async fn get_page(
        &self,
        _: Table,
        _: &Filter,
        _: usize,
        _: usize,
    ) -> Result<Vec<Record>, StorageError> {
        Err(down())
    }

    async fn insert(&self, _: Table, _: Record) -> Result<Record, StorageError> {
        Err(down())
    }

    async fn update(
        &self,
        _: Table,
        _: Uuid,
        _: Option<DateTime<Utc>>,
        _: Record,
    ) -> Result<UpdateOutcome, StorageError> {
        Err(down())
    }

    async fn delete(&self, _: Table, _: Uuid) -> Result<bool, StorageError> {
        Err(down())
    }
}

pub fn record(value: Value) -> Record {
    match value {
        Value::Object(record) => record,
        other => panic!("not an object: {other}"),
    }
}

/// A live row with the audit columns filled in.
pub fn row(id: &str, columns: Value) -> Record {
    let mut row = record(json!({
        "id": id,
        "valid": true,
        "created": "2024-01-01T00:00:00.000000Z",
        "lastchange": "2024-01-01T00:00:00.000000Z",
    }));
    row.extend(record(columns));
    row
}

pub struct TestSubgraph {
    pub subgraph: Subgraph,
    pub storage: Arc<dyn Storage>,
}

impl TestSubgraph {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        TestSubgraph::with_permission(storage, Arc::new(AllowAll))
    }

    pub fn with_permission(storage: Arc<dyn Storage>, permission: Arc<dyn Permission>) -> Self {
        let subgraph = Subgraph::with_storage(Arc::clone(&storage), permission).unwrap();
        TestSubgraph { subgraph, storage }
    }

    pub async fn execute(&self, query: &str, variables: Value) -> Value {
        self.execute_as(Some(user()), query, variables).await
    }

    pub async fn execute_as(&self, principal: Option<Uuid>, query: &str, variables: Value) -> Value {
        let request = GraphQLRequest {
            query: query.to_string(),
            variables: Some(variables),
            operation_name: None,
            principal,
        };
        self.subgraph.process_request(request).await.unwrap()
    }
}

/// Category C1, type T1, publication P1 with authors A1 (user U) and A2,
/// and one subject link.
pub async fn fixture_storage() -> Arc<InMemoryStorage> {
    let storage = Arc::new(InMemoryStorage::new());
    let rows = [
        (
            Table::PublicationCategories,
            row(C1, json!({ "name": "Odborné", "name_en": "Professional" })),
        ),
        (
            Table::PublicationTypes,
            row(T1, json!({ "name": "Článek", "name_en": "Article", "category_id": C1 })),
        ),
        (
            Table::Publications,
            row(
                P1,
                json!({
                    "name": "Federated data",
                    "place": "Brno",
                    "publication_type_id": T1,
                }),
            ),
        ),
        (
            Table::PublicationAuthors,
            row(
                A1,
                json!({ "publication_id": P1, "user_id": USER, "order": 1, "share": 0.5 }),
            ),
        ),
        (
            Table::PublicationAuthors,
            row(
                A2,
                json!({
                    "publication_id": P1,
                    "user_id": "89d1f3cc-ae0f-11ed-9bd8-0242ac110002",
                    "order": 2,
                    "share": 0.5,
                }),
            ),
        ),
        (
            Table::PublicationSubjects,
            row(L1, json!({ "publication_id": P1, "subject_id": SUBJECT })),
        ),
    ];
    for (table, row) in rows {
        storage.insert(table, row).await.unwrap();
    }
    storage
}

pub const C1: &str = "00000000-0000-4000-8000-00000000c001";
pub const T1: &str = "00000000-0000-4000-8000-00000000f001";
pub const P1: &str = "00000000-0000-4000-8000-00000000a001";
pub const A1: &str = "00000000-0000-4000-8000-00000000b001";
pub const A2: &str = "00000000-0000-4000-8000-00000000b002";
pub const L1: &str = "00000000-0000-4000-8000-00000000d001";
