use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use crate::error::{GraphError, ResolveError};
use crate::loader::{EntityLoader, Loaders};
use crate::model::Table;
use crate::permission::{Action, Permission};
use crate::storage::Storage;

/// State owned by exactly one request: who is asking, the batch caches and
/// the per-field errors collected while the response is assembled.
///
/// Never shared between requests.
pub struct RequestContext {
    principal: Option<Uuid>,
    storage: Arc<dyn Storage>,
    permission: Arc<dyn Permission>,
    loaders: Loaders,
    errors: Mutex<Vec<GraphError>>,
}

impl RequestContext {
    pub fn new(
        principal: Option<Uuid>,
        storage: Arc<dyn Storage>,
        permission: Arc<dyn Permission>,
    ) -> Self {
        RequestContext {
            principal,
            loaders: Loaders::new(Arc::clone(&storage)),
            storage,
            permission,
            errors: Mutex::new(Vec::new()),
        }
    }

    pub fn principal(&self) -> Option<Uuid> {
        self.principal
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn loader(&self, table: Table) -> &EntityLoader {
        self.loaders.get(table)
    }

    pub async fn is_authorized(&self, action: Action, rbac_owner: Option<Uuid>) -> bool {
        self.permission
            .is_authorized(self.principal, action, rbac_owner)
            .await
    }

    /// Fails with [`ResolveError::Forbidden`] when the predicate denies.
    pub async fn authorize(
        &self,
        action: Action,
        type_name: &'static str,
        rbac_owner: Option<Uuid>,
    ) -> Result<(), ResolveError> {
        if self.is_authorized(action, rbac_owner).await {
            Ok(())
        } else {
            Err(ResolveError::Forbidden {
                action: action.as_str(),
                type_name,
            })
        }
    }

    pub fn push_error(&self, error: GraphError) {
        self.errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(error);
    }

    pub fn take_errors(&self) -> Vec<GraphError> {
        std::mem::take(&mut *self.errors.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
