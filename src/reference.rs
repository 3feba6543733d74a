//! Two-phase reference resolution.
//!
//! [`resolve_reference`] never touches storage: it returns a typed handle
//! holding only the id, so links between entities can be composed before
//! any I/O happens. Data is fetched through the request's loader the first
//! time something other than the id is needed.

use async_trait::async_trait;
use std::marker::PhantomData;
use uuid::Uuid;

use crate::context::RequestContext;
use crate::error::ResolveError;
use crate::model::{
    Author, Entity, Publication, PublicationCategory, PublicationType, SubjectLink,
};

pub struct Ref<E> {
    id: Uuid,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Ref<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Ref<E> {}

impl<E> std::fmt::Debug for Ref<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Ref").field(&self.id).finish()
    }
}

impl<E> PartialEq for Ref<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

pub fn resolve_reference<E: Entity>(id: Uuid) -> Ref<E> {
    Ref {
        id,
        _entity: PhantomData,
    }
}

impl<E: Entity> Ref<E> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn type_name(&self) -> &'static str {
        E::TYPE_NAME
    }

    /// Hydrates the handle. A missing or tombstoned row is a
    /// [`ResolveError::DanglingReference`], never a storage error.
    pub async fn load(&self, ctx: &RequestContext) -> Result<E, ResolveError> {
        let dangling = ResolveError::DanglingReference {
            type_name: E::TYPE_NAME,
            id: self.id,
        };
        let Some(record) = ctx.loader(E::TABLE).load(self.id).await? else {
            return Err(dangling);
        };

        let entity = E::from_record(record)?;
        if entity.audit().is_tombstone() {
            return Err(dangling);
        }
        Ok(entity)
    }

    /// Like [`Ref::load`], but a dangling reference is `Ok(None)`.
    pub async fn load_optional(&self, ctx: &RequestContext) -> Result<Option<E>, ResolveError> {
        match self.load(ctx).await {
            Ok(entity) => Ok(Some(entity)),
            Err(ResolveError::DanglingReference { .. }) => Ok(None),
            Err(other) => Err(other),
        }
    }
}

/// Anything an id can be resolved into: local entities, and the federated
/// stubs whose data lives in other services.
#[async_trait]
pub trait Referent: Send + Sync + 'static {
    const TYPE_NAME: &'static str;

    /// Confirms the id resolves. Entities owned by another service always do.
    async fn hydrate(ctx: &RequestContext, id: Uuid) -> Result<(), ResolveError>;
}

macro_rules! local_referent {
    ($($ty:ty),* $(,)?) => {
        $(
            #[async_trait]
            impl Referent for $ty {
                const TYPE_NAME: &'static str = <$ty as Entity>::TYPE_NAME;

                async fn hydrate(ctx: &RequestContext, id: Uuid) -> Result<(), ResolveError> {
                    resolve_reference::<$ty>(id).load(ctx).await.map(|_| ())
                }
            }
        )*
    };
}

local_referent!(
    Publication,
    PublicationType,
    PublicationCategory,
    Author,
    SubjectLink
);

/// Principal defined by the user service.
pub struct User;

/// Subject defined by the study-plan service.
pub struct Subject;

#[async_trait]
impl Referent for User {
    const TYPE_NAME: &'static str = "User";

    async fn hydrate(_: &RequestContext, _: Uuid) -> Result<(), ResolveError> {
        Ok(())
    }
}

#[async_trait]
impl Referent for Subject {
    const TYPE_NAME: &'static str = "Subject";

    async fn hydrate(_: &RequestContext, _: Uuid) -> Result<(), ResolveError> {
        Ok(())
    }
}
