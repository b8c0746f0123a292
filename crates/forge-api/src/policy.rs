//! Ownership-based authorization.
//!
//! A request is allowed when the actor is an admin or owns the resource.
//! Post ownership is the owning influencer's owner; callers resolve that
//! chain before asking. Anything that does not match is a deny, never an
//! error.

use forge_types::models::{Role, User};

use crate::error::ApiError;

/// The authenticated caller, passed explicitly into every handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// `None` when the caller's identity has no user row yet. Such an
    /// actor owns nothing.
    pub user_id: Option<String>,
    pub role: Role,
}

impl Actor {
    pub fn unprovisioned() -> Self {
        Self {
            user_id: None,
            role: Role::User,
        }
    }

    pub fn is_admin(&self) -> bool {
        match self.role {
            Role::Admin => true,
            Role::User => false,
        }
    }

    pub fn owns(&self, owner_user_id: &str) -> bool {
        self.user_id.as_deref() == Some(owner_user_id)
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        Self {
            user_id: Some(user.id.clone()),
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Write,
    ChangeRole,
}

/// What a request touches.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    /// A resource whose ownership chain ends at this user id.
    Owned { owner_user_id: &'a str },
    /// Every resource of a kind, regardless of owner.
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn require(self) -> Result<(), ApiError> {
        self.require_or("permission denied")
    }

    pub fn require_or(self, message: &'static str) -> Result<(), ApiError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(ApiError::PermissionDenied(message)),
        }
    }
}

pub fn authorize(actor: &Actor, scope: Scope<'_>, action: Action) -> Decision {
    if actor.is_admin() {
        return Decision::Allow;
    }

    let allowed = match (scope, action) {
        (Scope::Owned { owner_user_id }, Action::Read | Action::Write) => actor.owns(owner_user_id),
        (Scope::Owned { .. }, Action::ChangeRole) => false,
        (Scope::Global, _) => false,
    };

    if allowed { Decision::Allow } else { Decision::Deny }
}

/// Row filter for listing queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope<'a> {
    All,
    OwnedBy(&'a str),
    Nothing,
}

/// Admins list everything, everyone else only their own rows.
pub fn list_scope(actor: &Actor) -> ListScope<'_> {
    if actor.is_admin() {
        return ListScope::All;
    }
    match actor.user_id.as_deref() {
        Some(id) => ListScope::OwnedBy(id),
        None => ListScope::Nothing,
    }
}
