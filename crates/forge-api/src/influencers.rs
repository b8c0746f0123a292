use forge_db::{NewInfluencer, Store, StoreError};
use forge_types::api::{CreateInfluencerRequest, PageQuery};
use forge_types::models::Influencer;
use tracing::error;

use crate::error::ApiError;
use crate::pagination::paginate;
use crate::policy::{Action, Actor, ListScope, Scope, authorize, list_scope};

/// The caller becomes the owner. `actor` must come from
/// [`provision_actor`](crate::actor::provision_actor).
pub fn create_influencer(
    store: &dyn Store,
    actor: &Actor,
    req: CreateInfluencerRequest,
) -> Result<Influencer, ApiError> {
    if [&req.name, &req.platform, &req.account_id]
        .iter()
        .any(|f| f.trim().is_empty())
    {
        return Err(ApiError::InvalidArgument(
            "name, platform and account_id are required",
        ));
    }
    let Some(owner_id) = actor.user_id.clone() else {
        error!("create_influencer called with an unprovisioned actor");
        return Err(ApiError::Internal);
    };

    store
        .create_influencer(NewInfluencer {
            name: req.name,
            platform: req.platform,
            account_id: req.account_id,
            owner_id,
        })
        .map_err(|e| match e {
            StoreError::Conflict(_) => ApiError::AlreadyExists(
                "an influencer with this platform and account_id already exists",
            ),
            other => other.into(),
        })
}

pub fn get_influencer(store: &dyn Store, actor: &Actor, id: &str) -> Result<Influencer, ApiError> {
    let influencer = store
        .get_influencer(id)?
        .ok_or(ApiError::NotFound("influencer"))?;
    authorize(
        actor,
        Scope::Owned { owner_user_id: &influencer.owner_id },
        Action::Read,
    )
    .require()?;
    Ok(influencer)
}

/// Scoped to the caller's own influencers unless they are an admin.
pub fn list_influencers(
    store: &dyn Store,
    actor: &Actor,
    query: &PageQuery,
) -> Result<(Vec<Influencer>, String), ApiError> {
    let owner = match list_scope(actor) {
        ListScope::All => None,
        ListScope::OwnedBy(id) => Some(id),
        ListScope::Nothing => return Ok((Vec::new(), String::new())),
    };
    Ok(paginate(
        query,
        |page| store.list_influencers(owner, page),
        |i| i.id.as_str(),
    )?)
}
