mod common;

use common::{A1, FailingStorage, P1, SlowWriteStorage, T1, fixture_storage, user};
use pretty_assertions::assert_eq;
use pubgraph::envelope::{MutationEnvelope, MutationStatus};
use pubgraph::inputs::{AuthorInsert, AuthorUpdate, PublicationInsert, PublicationUpdate};
use pubgraph::model::{Author, Entity, Publication, Table};
use pubgraph::permission::Action;
use pubgraph::reference::resolve_reference;
use pubgraph::{
    AllowAll, Authenticated, InMemoryStorage, Permission, RequestContext, Storage, UpdateOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn id(raw: &str) -> Uuid {
    Uuid::parse_str(raw).unwrap()
}

fn context(storage: Arc<dyn Storage>, permission: Arc<dyn Permission>) -> RequestContext {
    RequestContext::new(Some(user()), storage, permission)
}

fn publication(name: &str) -> PublicationInsert {
    PublicationInsert {
        id: None,
        name: name.to_string(),
        published_date: None,
        reference: None,
        place: None,
        publication_type_id: None,
        valid: None,
        rbacobject: None,
    }
}

fn rename(id: Uuid, lastchange: chrono::DateTime<chrono::Utc>, name: &str) -> PublicationUpdate {
    PublicationUpdate {
        id,
        lastchange,
        name: Some(name.to_string()),
        published_date: None,
        reference: None,
        place: None,
        publication_type_id: None,
        valid: None,
    }
}

async fn stored(storage: &dyn Storage, id: Uuid) -> Publication {
    let row = storage
        .get_by_id(Table::Publications, id)
        .await
        .unwrap()
        .unwrap();
    Publication::from_record(row).unwrap()
}

#[tokio::test]
async fn test_insert_stamps_audit_columns() {
    let storage = Arc::new(InMemoryStorage::new());
    let ctx = context(storage.clone(), Arc::new(AllowAll));

    let result = MutationEnvelope::<Publication>::new(&ctx)
        .insert(publication("Paper"))
        .await;
    assert_eq!(result.status, MutationStatus::Ok);
    assert_eq!(result.msg(), "ok");

    let row = stored(&*storage, result.id.unwrap()).await;
    assert_eq!(row.name.as_deref(), Some("Paper"));
    assert_eq!(row.audit.valid, Some(true));
    assert_eq!(row.audit.createdby, Some(user()));
    assert!(row.audit.created.is_some());
    assert_eq!(row.audit.created, row.audit.lastchange);
}

#[tokio::test]
async fn test_insert_keeps_a_caller_supplied_id() {
    let storage = Arc::new(InMemoryStorage::new());
    let ctx = context(storage.clone(), Arc::new(AllowAll));
    let wanted = Uuid::new_v4();

    let result = MutationEnvelope::<Publication>::new(&ctx)
        .insert(PublicationInsert {
            id: Some(wanted),
            ..publication("Mine")
        })
        .await;
    assert_eq!(result.id, Some(wanted));

    let again = MutationEnvelope::<Publication>::new(&ctx)
        .insert(PublicationInsert {
            id: Some(wanted),
            ..publication("Mine again")
        })
        .await;
    assert_eq!(again.status, MutationStatus::Conflict);
}

#[tokio::test]
async fn test_insert_rejects_invalid_input() {
    let storage = Arc::new(InMemoryStorage::new());
    let ctx = context(storage.clone(), Arc::new(AllowAll));
    let envelope = MutationEnvelope::<Publication>::new(&ctx);

    let blank = envelope.insert(publication("  ")).await;
    assert_eq!(blank.status, MutationStatus::ValidationError);
    assert_eq!(blank.msg(), "fail");

    let dangling = envelope
        .insert(PublicationInsert {
            publication_type_id: Some(Uuid::new_v4()),
            ..publication("Typed")
        })
        .await;
    assert_eq!(dangling.status, MutationStatus::ValidationError);
    assert!(dangling.detail.unwrap().contains("publication_type_id"));
    assert_eq!(storage.len(Table::Publications).await, 0);
}

#[tokio::test]
async fn test_insert_references_live_rows() {
    let storage = fixture_storage().await;
    let ctx = context(storage.clone(), Arc::new(AllowAll));

    let typed = MutationEnvelope::<Publication>::new(&ctx)
        .insert(PublicationInsert {
            publication_type_id: Some(id(T1)),
            ..publication("Typed")
        })
        .await;
    assert_eq!(typed.status, MutationStatus::Ok);

    let author = MutationEnvelope::<Author>::new(&ctx)
        .insert(AuthorInsert {
            id: None,
            publication_id: typed.id.unwrap(),
            user_id: user(),
            order: Some(1),
            share: Some(1.0),
            valid: None,
            rbacobject: None,
        })
        .await;
    assert_eq!(author.status, MutationStatus::Ok);
}

#[tokio::test]
async fn test_anonymous_writes_are_forbidden() {
    let storage = fixture_storage().await;
    let ctx = RequestContext::new(None, storage.clone(), Arc::new(Authenticated));

    let result = MutationEnvelope::<Publication>::new(&ctx)
        .insert(publication("Nope"))
        .await;
    assert_eq!(result.status, MutationStatus::Forbidden);

    let deleted = MutationEnvelope::<Publication>::new(&ctx).delete(id(P1)).await;
    assert_eq!(deleted.status, MutationStatus::Forbidden);
    assert_eq!(stored(&*storage, id(P1)).await.audit.valid, Some(true));
}

#[tokio::test]
async fn test_update_is_partial_and_guarded_by_lastchange() {
    let storage = fixture_storage().await;
    let ctx = context(storage.clone(), Arc::new(AllowAll));
    let envelope = MutationEnvelope::<Publication>::new(&ctx);
    let before = stored(&*storage, id(P1)).await;
    let token = before.audit.lastchange.unwrap();

    let updated = envelope.update(rename(id(P1), token, "Renamed")).await;
    assert_eq!(updated.status, MutationStatus::Ok);

    let after = stored(&*storage, id(P1)).await;
    assert_eq!(after.name.as_deref(), Some("Renamed"));
    assert_eq!(after.place, before.place);
    assert_eq!(after.publication_type_id, before.publication_type_id);
    assert_eq!(after.audit.created, before.audit.created);
    assert_eq!(after.audit.changedby, Some(user()));
    assert!(after.audit.lastchange.unwrap() > token);

    let stale = envelope.update(rename(id(P1), token, "Lost")).await;
    assert_eq!(stale.status, MutationStatus::Conflict);
    assert_eq!(
        stored(&*storage, id(P1)).await.name.as_deref(),
        Some("Renamed")
    );

    let missing = envelope.update(rename(Uuid::new_v4(), token, "Ghost")).await;
    assert_eq!(missing.status, MutationStatus::NotFound);
}

#[tokio::test]
async fn test_back_to_back_updates_advance_the_token() {
    let storage = fixture_storage().await;
    let ctx = context(storage.clone(), Arc::new(AllowAll));
    let envelope = MutationEnvelope::<Author>::new(&ctx);

    let mut token = resolve_reference::<Author>(id(A1))
        .load(&ctx)
        .await
        .unwrap()
        .audit
        .lastchange
        .unwrap();
    for order in 2..5 {
        let result = envelope
            .update(AuthorUpdate {
                id: id(A1),
                lastchange: token,
                user_id: None,
                order: Some(order),
                share: None,
                valid: None,
            })
            .await;
        assert_eq!(result.status, MutationStatus::Ok);

        let row = resolve_reference::<Author>(id(A1)).load(&ctx).await.unwrap();
        assert_eq!(row.order, Some(order));
        assert!(row.audit.lastchange.unwrap() > token);
        token = row.audit.lastchange.unwrap();
    }
}

#[tokio::test]
async fn test_concurrent_updates_with_one_token_let_one_win() {
    let storage = fixture_storage().await;
    let token = stored(&*storage, id(P1)).await.audit.lastchange.unwrap();
    let slow: Arc<dyn Storage> = Arc::new(SlowWriteStorage::new(
        storage.clone(),
        Duration::from_millis(50),
    ));

    let attempt = move |name: &'static str| {
        let ctx = context(slow.clone(), Arc::new(AllowAll));
        tokio::spawn(async move {
            MutationEnvelope::<Publication>::new(&ctx)
                .update(rename(id(P1), token, name))
                .await
        })
    };
    let first = attempt("First");
    let second = attempt("Second");
    let first = first.await.unwrap();
    let second = second.await.unwrap();

    let mut statuses = vec![first.status, second.status];
    statuses.sort_by_key(|status| status.as_str());
    assert_eq!(statuses, vec![MutationStatus::Conflict, MutationStatus::Ok]);

    let winner = if first.is_ok() { "First" } else { "Second" };
    assert_eq!(stored(&*storage, id(P1)).await.name.as_deref(), Some(winner));
}

#[tokio::test]
async fn test_stale_token_is_rejected_by_storage() {
    let storage = fixture_storage().await;
    let token = stored(&*storage, id(P1)).await.audit.lastchange.unwrap();

    let mut changes = serde_json::Map::new();
    changes.insert("place".to_string(), serde_json::json!("Praha"));
    let stale = storage
        .update(
            Table::Publications,
            id(P1),
            Some(token + chrono::Duration::seconds(1)),
            changes.clone(),
        )
        .await
        .unwrap();
    assert_eq!(stale, UpdateOutcome::Stale);
    assert_eq!(stored(&*storage, id(P1)).await.place.as_deref(), Some("Brno"));

    let written = storage
        .update(Table::Publications, id(P1), Some(token), changes)
        .await
        .unwrap();
    assert!(matches!(written, UpdateOutcome::Updated(row) if row["place"] == "Praha"));
}

#[tokio::test]
async fn test_update_does_not_revive_a_tombstone() {
    let storage = fixture_storage().await;
    let ctx = context(storage.clone(), Arc::new(AllowAll));
    let envelope = MutationEnvelope::<Publication>::new(&ctx);

    assert_eq!(envelope.delete(id(P1)).await.status, MutationStatus::Ok);
    let tombstone = stored(&*storage, id(P1)).await;

    let mut revive = rename(id(P1), tombstone.audit.lastchange.unwrap(), "Back");
    revive.valid = Some(true);
    let result = envelope.update(revive).await;
    assert_eq!(result.status, MutationStatus::NotFound);

    let after = stored(&*storage, id(P1)).await;
    assert_eq!(after.audit.valid, Some(false));
    assert_eq!(after.name, tombstone.name);
}

#[tokio::test]
async fn test_delete_leaves_a_tombstone_and_is_idempotent() {
    let storage = fixture_storage().await;
    let ctx = context(storage.clone(), Arc::new(AllowAll));
    let envelope = MutationEnvelope::<Publication>::new(&ctx);

    assert_eq!(envelope.delete(id(P1)).await.status, MutationStatus::Ok);
    let tombstone = stored(&*storage, id(P1)).await;
    assert_eq!(tombstone.audit.valid, Some(false));
    assert_eq!(tombstone.audit.changedby, Some(user()));

    assert_eq!(envelope.delete(id(P1)).await.status, MutationStatus::Ok);
    assert_eq!(
        stored(&*storage, id(P1)).await.audit.lastchange,
        tombstone.audit.lastchange
    );

    let loaded = resolve_reference::<Publication>(id(P1)).load_optional(&ctx).await;
    assert!(matches!(loaded, Ok(None)));

    let missing = envelope.delete(Uuid::new_v4()).await;
    assert_eq!(missing.status, MutationStatus::NotFound);
}

#[tokio::test]
async fn test_purge_removes_the_row() {
    let storage = fixture_storage().await;
    let ctx = context(storage.clone(), Arc::new(AllowAll));
    let envelope = MutationEnvelope::<Author>::new(&ctx);

    assert_eq!(envelope.purge(id(A1)).await.status, MutationStatus::Ok);
    assert_eq!(
        storage
            .get_by_id(Table::PublicationAuthors, id(A1))
            .await
            .unwrap(),
        None
    );
    assert_eq!(envelope.purge(id(A1)).await.status, MutationStatus::NotFound);
}

#[tokio::test]
async fn test_owner_based_permission() {
    let storage = fixture_storage().await;
    let owner = Uuid::new_v4();
    let only_owner = |principal: Option<Uuid>, action: Action, rbac_owner: Option<Uuid>| {
        action == Action::Insert || (rbac_owner.is_some() && principal == rbac_owner)
    };

    let as_owner = RequestContext::new(Some(owner), storage.clone(), Arc::new(only_owner));
    let inserted = MutationEnvelope::<Publication>::new(&as_owner)
        .insert(PublicationInsert {
            rbacobject: Some(owner),
            ..publication("Owned")
        })
        .await;
    assert_eq!(inserted.status, MutationStatus::Ok);
    let owned = inserted.id.unwrap();

    let as_stranger = context(storage.clone(), Arc::new(only_owner));
    let denied = MutationEnvelope::<Publication>::new(&as_stranger)
        .purge(owned)
        .await;
    assert_eq!(denied.status, MutationStatus::Forbidden);

    let allowed = MutationEnvelope::<Publication>::new(&as_owner)
        .purge(owned)
        .await;
    assert_eq!(allowed.status, MutationStatus::Ok);
}

#[tokio::test]
async fn test_unavailable_storage_is_reported_not_raised() {
    let ctx = context(Arc::new(FailingStorage), Arc::new(AllowAll));

    let inserted = MutationEnvelope::<Publication>::new(&ctx)
        .insert(publication("Paper"))
        .await;
    assert_eq!(inserted.status, MutationStatus::StorageUnavailable);

    let deleted = MutationEnvelope::<Publication>::new(&ctx).delete(id(P1)).await;
    assert_eq!(deleted.status, MutationStatus::StorageUnavailable);
    assert_eq!(deleted.id, Some(id(P1)));
}
