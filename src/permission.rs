use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Insert,
    Update,
    Delete,
    /// Hard removal of a row.
    Purge,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Insert => "insert",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Purge => "purge",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Side-effect free authorization predicate.
///
/// `principal` is `None` for anonymous requests; `rbac_owner` is the user or
/// group that owns the target row, when there is one.
#[async_trait]
pub trait Permission: Send + Sync {
    async fn is_authorized(
        &self,
        principal: Option<Uuid>,
        action: Action,
        rbac_owner: Option<Uuid>,
    ) -> bool;
}

pub struct AllowAll;

#[async_trait]
impl Permission for AllowAll {
    async fn is_authorized(&self, _: Option<Uuid>, _: Action, _: Option<Uuid>) -> bool {
        true
    }
}

/// Any identified principal may do anything; anonymous requests may not.
pub struct Authenticated;

#[async_trait]
impl Permission for Authenticated {
    async fn is_authorized(&self, principal: Option<Uuid>, _: Action, _: Option<Uuid>) -> bool {
        principal.is_some()
    }
}

#[async_trait]
impl<F> Permission for F
where
    F: Fn(Option<Uuid>, Action, Option<Uuid>) -> bool + Send + Sync,
{
    async fn is_authorized(
        &self,
        principal: Option<Uuid>,
        action: Action,
        rbac_owner: Option<Uuid>,
    ) -> bool {
        self(principal, action, rbac_owner)
    }
}
