//! Insert, update, delete and purge wrapped with the side effects every
//! entity shares: validation, authorization, audit stamping and a uniform
//! result shape.
//!
//! Envelope calls never fail with an error; every outcome is a
//! [`MutationResult`] the caller can render.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::Serialize;
use serde_json::Value;
use std::marker::PhantomData;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::{ResolveError, StorageError};
use crate::inputs::{InsertInput, LocalReference, UpdateInput};
use crate::model::{Entity, Record, is_tombstone};
use crate::permission::Action;
use crate::storage::UpdateOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MutationStatus {
    Ok,
    NotFound,
    Forbidden,
    /// The optimistic-lock token did not match the stored `lastchange`.
    Conflict,
    ValidationError,
    StorageUnavailable,
}

impl MutationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationStatus::Ok => "OK",
            MutationStatus::NotFound => "NOT_FOUND",
            MutationStatus::Forbidden => "FORBIDDEN",
            MutationStatus::Conflict => "CONFLICT",
            MutationStatus::ValidationError => "VALIDATION_ERROR",
            MutationStatus::StorageUnavailable => "STORAGE_UNAVAILABLE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
    pub id: Option<Uuid>,
    pub status: MutationStatus,
    pub detail: Option<String>,
}

impl MutationResult {
    pub fn ok(id: Uuid) -> Self {
        MutationResult {
            id: Some(id),
            status: MutationStatus::Ok,
            detail: None,
        }
    }

    pub fn failed(id: Option<Uuid>, status: MutationStatus, detail: impl Into<String>) -> Self {
        MutationResult {
            id,
            status,
            detail: Some(detail.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == MutationStatus::Ok
    }

    /// `"ok"` or `"fail"`.
    pub fn msg(&self) -> &'static str {
        if self.is_ok() { "ok" } else { "fail" }
    }
}

/// Current time at the precision both backends store.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A stamp strictly later than `previous`, even within one clock tick.
fn next_stamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = now();
    match previous {
        Some(previous) if now <= previous => previous + Duration::microseconds(1),
        _ => now,
    }
}

pub(crate) fn stamp(value: DateTime<Utc>) -> Value {
    Value::String(value.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
}

fn uuid_value(id: Option<Uuid>) -> Value {
    id.map_or(Value::Null, |id| Value::String(id.to_string()))
}

fn storage_failure(id: Option<Uuid>, table: &'static str, e: &StorageError) -> MutationResult {
    match e {
        StorageError::Unavailable(_) => {
            error!(table, error = %e, "mutation failed, storage unavailable");
            MutationResult::failed(
                id,
                MutationStatus::StorageUnavailable,
                "storage unavailable, try again later",
            )
        }
        StorageError::Duplicate { .. } => {
            MutationResult::failed(id, MutationStatus::Conflict, e.to_string())
        }
        StorageError::UnknownColumn { .. } | StorageError::Malformed { .. } => {
            MutationResult::failed(id, MutationStatus::ValidationError, e.to_string())
        }
    }
}

fn resolve_failure(id: Option<Uuid>, table: &'static str, e: ResolveError) -> MutationResult {
    match e {
        ResolveError::DanglingReference { .. } => {
            MutationResult::failed(id, MutationStatus::NotFound, e.to_string())
        }
        ResolveError::Forbidden { .. } => {
            MutationResult::failed(id, MutationStatus::Forbidden, e.to_string())
        }
        ResolveError::Validation(message) => {
            MutationResult::failed(id, MutationStatus::ValidationError, message)
        }
        ResolveError::Storage(e) => storage_failure(id, table, &e),
        ResolveError::Internal(message) => {
            error!(table, %message, "mutation failed");
            MutationResult::failed(id, MutationStatus::StorageUnavailable, "internal error")
        }
    }
}

/// Mutation envelope for one entity type, bound to one request.
pub struct MutationEnvelope<'a, E> {
    ctx: &'a RequestContext,
    _entity: PhantomData<fn() -> E>,
}

impl<'a, E: Entity> MutationEnvelope<'a, E> {
    pub fn new(ctx: &'a RequestContext) -> Self {
        MutationEnvelope {
            ctx,
            _entity: PhantomData,
        }
    }

    pub async fn insert<I>(&self, input: I) -> MutationResult
    where
        I: InsertInput<Target = E>,
    {
        let table = E::TABLE.name();
        let requested = input.id();

        if let Err(message) = input.validate() {
            return MutationResult::failed(requested, MutationStatus::ValidationError, message);
        }
        if let Err(e) = self
            .ctx
            .authorize(Action::Insert, E::TYPE_NAME, input.rbacobject())
            .await
        {
            warn!(table, principal = ?self.ctx.principal(), "insert denied");
            return resolve_failure(requested, table, e);
        }
        if let Err(e) = self.check_references(&input.references()).await {
            return resolve_failure(requested, table, e);
        }

        let id = requested.unwrap_or_else(Uuid::new_v4);
        let mut record = match input.into_record() {
            Ok(record) => record,
            Err(e) => return storage_failure(Some(id), table, &e),
        };
        let created = now();
        record.insert("id".to_string(), Value::String(id.to_string()));
        record.insert("created".to_string(), stamp(created));
        record.insert("lastchange".to_string(), stamp(created));
        record.insert("createdby".to_string(), uuid_value(self.ctx.principal()));
        record
            .entry("valid".to_string())
            .or_insert(Value::Bool(true));

        match self.ctx.storage().insert(E::TABLE, record).await {
            Ok(row) => {
                self.ctx.loader(E::TABLE).prime(id, row);
                info!(table, %id, "inserted");
                MutationResult::ok(id)
            }
            Err(e) => storage_failure(Some(id), table, &e),
        }
    }

    /// Partial update guarded by the caller's `lastchange` token.
    pub async fn update<U>(&self, input: U) -> MutationResult
    where
        U: UpdateInput<Target = E>,
    {
        let table = E::TABLE.name();
        let id = input.id();

        if let Err(message) = input.validate() {
            return MutationResult::failed(Some(id), MutationStatus::ValidationError, message);
        }
        let current = match self.current(id).await {
            Ok(current) => current,
            Err(result) => return result,
        };
        if current.audit().is_tombstone() {
            return MutationResult::failed(
                Some(id),
                MutationStatus::NotFound,
                format!("{} {id} was deleted", E::TYPE_NAME),
            );
        }
        if let Err(e) = self
            .ctx
            .authorize(Action::Update, E::TYPE_NAME, current.audit().rbacobject)
            .await
        {
            warn!(table, %id, principal = ?self.ctx.principal(), "update denied");
            return resolve_failure(Some(id), table, e);
        }
        let token = input.lastchange();
        if current.audit().lastchange != Some(token) {
            return self.conflict(id);
        }
        if let Err(e) = self.check_references(&input.references()).await {
            return resolve_failure(Some(id), table, e);
        }

        let mut changes = match input.into_changes() {
            Ok(changes) => changes,
            Err(e) => return storage_failure(Some(id), table, &e),
        };
        self.stamp_change(&mut changes, current.audit().lastchange);
        self.write(id, Some(token), changes, "updated").await
    }

    /// Soft delete: flips `valid` to false. Deleting a tombstone is a no-op
    /// that still reports success.
    pub async fn delete(&self, id: Uuid) -> MutationResult {
        let table = E::TABLE.name();
        let current = match self.current(id).await {
            Ok(current) => current,
            Err(result) => return result,
        };
        if let Err(e) = self
            .ctx
            .authorize(Action::Delete, E::TYPE_NAME, current.audit().rbacobject)
            .await
        {
            warn!(table, %id, principal = ?self.ctx.principal(), "delete denied");
            return resolve_failure(Some(id), table, e);
        }
        if current.audit().is_tombstone() {
            return MutationResult::ok(id);
        }

        let mut changes = Record::new();
        changes.insert("valid".to_string(), Value::Bool(false));
        self.stamp_change(&mut changes, current.audit().lastchange);
        self.write(id, current.audit().lastchange, changes, "deleted").await
    }

    /// Hard removal of the row.
    pub async fn purge(&self, id: Uuid) -> MutationResult {
        let table = E::TABLE.name();
        let current = match self.current(id).await {
            Ok(current) => current,
            Err(result) => return result,
        };
        if let Err(e) = self
            .ctx
            .authorize(Action::Purge, E::TYPE_NAME, current.audit().rbacobject)
            .await
        {
            warn!(table, %id, principal = ?self.ctx.principal(), "purge denied");
            return resolve_failure(Some(id), table, e);
        }

        match self.ctx.storage().delete(E::TABLE, id).await {
            Ok(true) => {
                self.ctx.loader(E::TABLE).forget(id);
                info!(table, %id, "purged");
                MutationResult::ok(id)
            }
            Ok(false) => MutationResult::failed(
                Some(id),
                MutationStatus::NotFound,
                format!("{} {id} does not exist", E::TYPE_NAME),
            ),
            Err(e) => storage_failure(Some(id), table, &e),
        }
    }

    /// The stored row, tombstones included, or the result to return when
    /// there is none.
    async fn current(&self, id: Uuid) -> Result<E, MutationResult> {
        let table = E::TABLE.name();
        match self.ctx.loader(E::TABLE).load(id).await {
            Ok(Some(record)) => {
                E::from_record(record).map_err(|e| storage_failure(Some(id), table, &e))
            }
            Ok(None) => Err(MutationResult::failed(
                Some(id),
                MutationStatus::NotFound,
                format!("{} {id} does not exist", E::TYPE_NAME),
            )),
            Err(e) => Err(storage_failure(Some(id), table, &e)),
        }
    }

    fn stamp_change(&self, changes: &mut Record, previous: Option<DateTime<Utc>>) {
        changes.insert("lastchange".to_string(), stamp(next_stamp(previous)));
        changes.insert("changedby".to_string(), uuid_value(self.ctx.principal()));
    }

    fn conflict(&self, id: Uuid) -> MutationResult {
        MutationResult::failed(
            Some(id),
            MutationStatus::Conflict,
            format!("{} {id} was changed by someone else", E::TYPE_NAME),
        )
    }

    /// Writes `changes` only while the stored `lastchange` still equals
    /// `expected`.
    async fn write(
        &self,
        id: Uuid,
        expected: Option<DateTime<Utc>>,
        changes: Record,
        verb: &'static str,
    ) -> MutationResult {
        let table = E::TABLE.name();
        match self
            .ctx
            .storage()
            .update(E::TABLE, id, expected, changes)
            .await
        {
            Ok(UpdateOutcome::Updated(row)) => {
                self.ctx.loader(E::TABLE).prime(id, row);
                info!(table, %id, "{verb}");
                MutationResult::ok(id)
            }
            Ok(UpdateOutcome::Stale) => {
                self.ctx.loader(E::TABLE).forget(id);
                warn!(table, %id, "concurrent change detected, {verb} rejected");
                self.conflict(id)
            }
            Ok(UpdateOutcome::Missing) => {
                self.ctx.loader(E::TABLE).forget(id);
                MutationResult::failed(
                    Some(id),
                    MutationStatus::NotFound,
                    format!("{} {id} does not exist", E::TYPE_NAME),
                )
            }
            Err(e) => storage_failure(Some(id), table, &e),
        }
    }

    /// Foreign-key-shaped inputs must name live rows of this subgraph.
    async fn check_references(&self, references: &[LocalReference]) -> Result<(), ResolveError> {
        for reference in references {
            let loaded = self.ctx.loader(reference.table).load(reference.id).await?;
            let live = loaded.as_ref().is_some_and(|row| !is_tombstone(row));
            if !live {
                return Err(ResolveError::Validation(format!(
                    "{} refers to missing {} {}",
                    reference.column,
                    reference.table.name(),
                    reference.id
                )));
            }
        }
        Ok(())
    }
}
