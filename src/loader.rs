//! Per-request batching of row lookups.
//!
//! Every `load` issued before the next scheduling point joins one batch and
//! the batch is sent to storage as a single `get_by_ids` call. Results are
//! cached by id for the lifetime of the owning [`Loaders`], which lives
//! exactly as long as one request.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::StorageError;
use crate::model::{Record, Table, record_id};
use crate::storage::{Filter, Storage};

type BatchResult = Result<Arc<HashMap<Uuid, Record>>, StorageError>;
type Batch = Shared<BoxFuture<'static, BatchResult>>;

struct PendingIds {
    ids: Vec<Uuid>,
    dispatched: bool,
}

#[derive(Default)]
struct LoaderState {
    cache: HashMap<Uuid, Batch>,
    open: Option<(Arc<Mutex<PendingIds>>, Batch)>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct EntityLoader {
    table: Table,
    storage: Arc<dyn Storage>,
    state: Mutex<LoaderState>,
}

impl EntityLoader {
    pub fn new(table: Table, storage: Arc<dyn Storage>) -> Self {
        EntityLoader {
            table,
            storage,
            state: Mutex::new(LoaderState::default()),
        }
    }

    /// The row with `id`, or `None` when storage has no such row.
    ///
    /// Storage failures are returned as errors and are not cached, so a
    /// later `load` of the same id goes back to storage.
    pub async fn load(&self, id: Uuid) -> Result<Option<Record>, StorageError> {
        let batch = self.enqueue(id);
        match batch.clone().await {
            Ok(rows) => Ok(rows.get(&id).cloned()),
            Err(error) => {
                // Another caller may already have retried; keep its batch.
                let mut state = lock(&self.state);
                if state.cache.get(&id).is_some_and(|cached| cached.ptr_eq(&batch)) {
                    state.cache.remove(&id);
                }
                Err(error)
            }
        }
    }

    /// Non-batched filtered query. Rows come back in backend order and are
    /// cached so later loads of the same ids stay in memory.
    pub async fn filter_by(&self, filter: &Filter) -> Result<Vec<Record>, StorageError> {
        let rows = self.storage.get_by_filter(self.table, filter).await?;
        for row in &rows {
            if let Some(id) = record_id(row) {
                self.prime_if_absent(id, row.clone());
            }
        }
        Ok(rows)
    }

    pub async fn page(
        &self,
        filter: &Filter,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Record>, StorageError> {
        let rows = self
            .storage
            .get_page(self.table, filter, skip, limit)
            .await?;
        for row in &rows {
            if let Some(id) = record_id(row) {
                self.prime_if_absent(id, row.clone());
            }
        }
        Ok(rows)
    }

    /// Replaces whatever is cached for `id` with a known row.
    pub fn prime(&self, id: Uuid, row: Record) {
        lock(&self.state).cache.insert(id, ready(id, row));
    }

    pub fn forget(&self, id: Uuid) {
        lock(&self.state).cache.remove(&id);
    }

    fn prime_if_absent(&self, id: Uuid, row: Record) {
        lock(&self.state)
            .cache
            .entry(id)
            .or_insert_with(|| ready(id, row));
    }

    fn enqueue(&self, id: Uuid) -> Batch {
        let mut guard = lock(&self.state);
        let state = &mut *guard;

        if let Some(batch) = state.cache.get(&id) {
            return batch.clone();
        }

        if let Some((pending, batch)) = &state.open {
            let mut pending = lock(pending);
            if !pending.dispatched {
                pending.ids.push(id);
                let batch = batch.clone();
                state.cache.insert(id, batch.clone());
                return batch;
            }
        }

        let pending = Arc::new(Mutex::new(PendingIds {
            ids: vec![id],
            dispatched: false,
        }));
        let batch = dispatch(self.table, Arc::clone(&self.storage), Arc::clone(&pending));
        state.open = Some((pending, batch.clone()));
        state.cache.insert(id, batch.clone());
        batch
    }
}

fn ready(id: Uuid, row: Record) -> Batch {
    let rows = HashMap::from([(id, row)]);
    futures::future::ready(Ok(Arc::new(rows))).boxed().shared()
}

fn dispatch(table: Table, storage: Arc<dyn Storage>, pending: Arc<Mutex<PendingIds>>) -> Batch {
    async move {
        // Let sibling resolvers of the same traversal step enqueue first.
        tokio::task::yield_now().await;

        let ids = {
            let mut pending = lock(&pending);
            pending.dispatched = true;
            std::mem::take(&mut pending.ids)
        };
        debug!(table = table.name(), batch = ids.len(), "dispatching load batch");

        let rows = storage.get_by_ids(table, &ids).await.inspect_err(|e| {
            warn!(
                table = table.name(),
                retryable = e.is_retryable(),
                error = %e,
                "load batch failed"
            );
        })?;

        let mut by_id = HashMap::with_capacity(rows.len());
        for row in rows {
            if let Some(id) = record_id(&row) {
                by_id.insert(id, row);
            }
        }
        Ok(Arc::new(by_id))
    }
    .boxed()
    .shared()
}

/// One loader per table, created fresh for every request.
pub struct Loaders {
    loaders: HashMap<Table, EntityLoader>,
}

impl Loaders {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let loaders = Table::ALL
            .into_iter()
            .map(|table| (table, EntityLoader::new(table, Arc::clone(&storage))))
            .collect();
        Loaders { loaders }
    }

    pub fn get(&self, table: Table) -> &EntityLoader {
        // Every table gets a loader in `new`.
        &self.loaders[&table]
    }
}
