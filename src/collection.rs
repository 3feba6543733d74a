//! "Has many" edges, resolved by one filtered query keyed on the owner id.

use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::debug;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::ResolveError;
use crate::model::{Entity, is_tombstone, record_id, record_uuid};
use crate::reference::{Ref, Referent, resolve_reference};
use crate::storage::Filter;

/// Rows of `E` whose `foreign_key` equals `owner`, wrapped as lazy handles.
///
/// Order is whatever the backend returns. Tombstoned rows are skipped.
pub async fn resolve_collection<E: Entity>(
    ctx: &RequestContext,
    foreign_key: &'static str,
    owner: Uuid,
) -> Result<Vec<Ref<E>>, ResolveError> {
    let rows = ctx
        .loader(E::TABLE)
        .filter_by(&Filter::eq(foreign_key, owner.to_string()))
        .await?;

    Ok(rows
        .iter()
        .filter(|row| !is_tombstone(row))
        .filter_map(record_id)
        .map(resolve_reference::<E>)
        .collect())
}

/// Two-hop resolution across the association table `A`.
///
/// Association rows are selected by `near_key = owner`; every row's
/// `far_key` is then resolved as an `F`, one task per row, all joined
/// before returning. Slots keep association-row order. A failed slot does
/// not affect its siblings; only a failure to read the association rows
/// fails the whole edge.
pub async fn resolve_association<A, F>(
    ctx: &Arc<RequestContext>,
    near_key: &'static str,
    far_key: &'static str,
    owner: Uuid,
) -> Result<Vec<Result<Uuid, ResolveError>>, ResolveError>
where
    A: Entity,
    F: Referent,
{
    let rows = ctx
        .loader(A::TABLE)
        .filter_by(&Filter::eq(near_key, owner.to_string()))
        .await?;
    let far_ids: Vec<Option<Uuid>> = rows
        .iter()
        .filter(|row| !is_tombstone(row))
        .map(|row| record_uuid(row, far_key))
        .collect();
    debug!(
        association = A::TABLE.name(),
        target = F::TYPE_NAME,
        rows = far_ids.len(),
        "fanning out association"
    );

    let count = far_ids.len();
    let mut tasks = JoinSet::new();
    for (slot, far_id) in far_ids.into_iter().enumerate() {
        let ctx = Arc::clone(ctx);
        tasks.spawn(async move {
            let resolved = match far_id {
                Some(id) => F::hydrate(&ctx, id).await.map(|()| id),
                None => Err(ResolveError::Validation(format!(
                    "{} row has no {far_key}",
                    A::TYPE_NAME
                ))),
            };
            (slot, resolved)
        });
    }

    let mut slots: Vec<Option<Result<Uuid, ResolveError>>> = vec![None; count];
    while let Some(joined) = tasks.join_next().await {
        let (slot, resolved) = joined
            .map_err(|e| ResolveError::Internal(format!("association task failed: {e}")))?;
        slots[slot] = Some(resolved);
    }

    Ok(slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| {
                Err(ResolveError::Internal("association slot never resolved".to_string()))
            })
        })
        .collect())
}
