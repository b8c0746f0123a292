use forge_db::{Store, UserChanges};
use forge_types::api::{PageQuery, UpdateUserRequest};
use forge_types::models::User;

use crate::error::ApiError;
use crate::pagination::paginate;
use crate::policy::{Action, Actor, Scope, authorize};

/// Self or admin only.
pub fn get_user(store: &dyn Store, actor: &Actor, id: &str) -> Result<User, ApiError> {
    let user = store.get_user(id)?.ok_or(ApiError::NotFound("user"))?;
    authorize(actor, Scope::Owned { owner_user_id: &user.id }, Action::Read).require()?;
    Ok(user)
}

/// Admin only.
pub fn list_users(
    store: &dyn Store,
    actor: &Actor,
    query: &PageQuery,
) -> Result<(Vec<User>, String), ApiError> {
    authorize(actor, Scope::Global, Action::Read).require()?;
    Ok(paginate(query, |page| store.list_users(page), |u| u.id.as_str())?)
}

pub fn update_user(
    store: &dyn Store,
    actor: &Actor,
    id: &str,
    req: UpdateUserRequest,
) -> Result<User, ApiError> {
    if req.name.is_none() && req.role.is_none() {
        return Err(ApiError::InvalidArgument("nothing to update"));
    }
    if req.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::InvalidArgument("name must not be blank"));
    }

    let user = store.get_user(id)?.ok_or(ApiError::NotFound("user"))?;
    let scope = Scope::Owned { owner_user_id: &user.id };
    authorize(actor, scope, Action::Write).require()?;
    if req.role.is_some() {
        authorize(actor, scope, Action::ChangeRole).require_or("only admin can update roles")?;
    }

    let changes = UserChanges {
        name: req.name,
        role: req.role,
    };
    store.update_user(&user.id, &changes)?.ok_or(ApiError::NotFound("user"))
}
