use std::collections::HashSet;

use tracing::info;

use forge_db::{NewUser, Store};
use forge_types::models::Role;

use crate::auth::Identity;
use crate::error::ApiError;
use crate::policy::Actor;

/// Resolve the caller for a read. Never creates a user.
pub fn resolve_actor(store: &dyn Store, identity: &Identity) -> Result<Actor, ApiError> {
    Ok(store
        .find_user_by_identity(&identity.subject)?
        .as_ref()
        .map(Actor::from)
        .unwrap_or_else(Actor::unprovisioned))
}

/// Resolve the caller for a write, creating their user row on first use.
///
/// Subjects in `admin_subjects` are created with the admin role; an
/// existing row keeps whatever role it already has.
pub fn provision_actor(
    store: &dyn Store,
    identity: &Identity,
    admin_subjects: &HashSet<String>,
) -> Result<Actor, ApiError> {
    if let Some(user) = store.find_user_by_identity(&identity.subject)? {
        return Ok(Actor::from(&user));
    }

    let role = if admin_subjects.contains(&identity.subject) {
        Role::Admin
    } else {
        Role::User
    };
    let user = store.provision_user(NewUser {
        external_identity: identity.subject.clone(),
        email: identity.email.clone(),
        name: identity.name.clone(),
        role,
    })?;
    info!("Provisioned user {} ({}) for {}", user.id, user.role, identity.subject);

    Ok(Actor::from(&user))
}
