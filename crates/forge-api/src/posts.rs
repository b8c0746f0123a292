use forge_db::models::is_storable;
use forge_db::{NewPost, Store, StoreError};
use forge_types::api::{PageQuery, SchedulePostRequest};
use forge_types::models::{Influencer, Post};
use tracing::error;

use crate::error::ApiError;
use crate::pagination::paginate;
use crate::policy::{Action, Actor, Scope, authorize};

fn load_influencer(store: &dyn Store, id: &str) -> Result<Influencer, ApiError> {
    store.get_influencer(id)?.ok_or(ApiError::NotFound("influencer"))
}

fn influencer_scope(influencer: &Influencer) -> Scope<'_> {
    Scope::Owned {
        owner_user_id: &influencer.owner_id,
    }
}

/// Owner of the influencer or admin.
pub fn schedule_post(
    store: &dyn Store,
    actor: &Actor,
    req: SchedulePostRequest,
) -> Result<Post, ApiError> {
    if req.influencer_id.is_empty() {
        return Err(ApiError::InvalidArgument("influencer_id is required"));
    }
    if req.content.trim().is_empty() {
        return Err(ApiError::InvalidArgument("content must not be blank"));
    }
    if !is_storable(req.scheduled_time) {
        return Err(ApiError::InvalidArgument(
            "scheduled_time must fall within years 0000 to 9999",
        ));
    }

    let influencer = load_influencer(store, &req.influencer_id)?;
    authorize(actor, influencer_scope(&influencer), Action::Write).require()?;

    store
        .create_post(NewPost {
            influencer_id: influencer.id,
            content: req.content,
            scheduled_time: req.scheduled_time,
        })
        .map_err(|e| match e {
            StoreError::MissingReference(_) => ApiError::NotFound("influencer"),
            other => other.into(),
        })
}

/// Ownership is resolved through the post's influencer.
pub fn get_post(store: &dyn Store, actor: &Actor, id: &str) -> Result<Post, ApiError> {
    let post = store.get_post(id)?.ok_or(ApiError::NotFound("post"))?;
    let influencer = store.get_influencer(&post.influencer_id)?.ok_or_else(|| {
        error!("Post {} references missing influencer {}", post.id, post.influencer_id);
        ApiError::Internal
    })?;
    authorize(actor, influencer_scope(&influencer), Action::Read).require()?;
    Ok(post)
}

pub fn list_posts(
    store: &dyn Store,
    actor: &Actor,
    influencer_id: &str,
    query: &PageQuery,
) -> Result<(Vec<Post>, String), ApiError> {
    let influencer = load_influencer(store, influencer_id)?;
    authorize(actor, influencer_scope(&influencer), Action::Read).require()?;
    Ok(paginate(
        query,
        |page| store.list_posts(&influencer.id, page),
        |p| p.id.as_str(),
    )?)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{Duration, TimeZone, Utc};
    use forge_db::{Database, NewInfluencer};
    use forge_types::models::PostStatus;

    use super::*;
    use crate::actor::provision_actor;
    use crate::auth::Identity;

    struct Fixture {
        db: Database,
        alice: Actor,
        bob: Actor,
        root: Actor,
        influencer: Influencer,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let admins = HashSet::from(["root".to_string()]);
        let provision = |subject: &str| {
            let identity = Identity {
                subject: subject.into(),
                email: String::new(),
                name: subject.into(),
            };
            provision_actor(&db, &identity, &admins).unwrap()
        };
        let (alice, bob, root) = (provision("alice"), provision("bob"), provision("root"));
        let influencer = db
            .create_influencer(NewInfluencer {
                name: "Alice's cat".into(),
                platform: "instagram".into(),
                account_id: "cat".into(),
                owner_id: alice.user_id.clone().unwrap(),
            })
            .unwrap();
        Fixture {
            db,
            alice,
            bob,
            root,
            influencer,
        }
    }

    fn request(influencer_id: &str, content: &str) -> SchedulePostRequest {
        SchedulePostRequest {
            influencer_id: influencer_id.into(),
            content: content.into(),
            scheduled_time: Utc::now() + Duration::hours(1),
        }
    }

    #[test]
    fn owner_schedules_and_reads_post() {
        let f = fixture();
        let post = schedule_post(&f.db, &f.alice, request(&f.influencer.id, "meow")).unwrap();

        assert_eq!(post.status, PostStatus::Scheduled);
        assert_eq!(post.influencer_id, f.influencer.id);
        assert_eq!(get_post(&f.db, &f.alice, &post.id).unwrap(), post);
        assert_eq!(get_post(&f.db, &f.root, &post.id).unwrap(), post);
    }

    #[test]
    fn strangers_cannot_touch_posts() {
        let f = fixture();
        let post = schedule_post(&f.db, &f.alice, request(&f.influencer.id, "meow")).unwrap();

        assert!(matches!(
            schedule_post(&f.db, &f.bob, request(&f.influencer.id, "hijack")),
            Err(ApiError::PermissionDenied(_))
        ));
        assert!(matches!(
            get_post(&f.db, &f.bob, &post.id),
            Err(ApiError::PermissionDenied(_))
        ));
        assert!(matches!(
            list_posts(&f.db, &f.bob, &f.influencer.id, &PageQuery::default()),
            Err(ApiError::PermissionDenied(_))
        ));
    }

    #[test]
    fn admin_schedules_for_anyone() {
        let f = fixture();
        let post = schedule_post(&f.db, &f.root, request(&f.influencer.id, "by admin")).unwrap();
        assert_eq!(post.influencer_id, f.influencer.id);
    }

    #[test]
    fn missing_and_invalid_inputs() {
        let f = fixture();
        assert!(matches!(
            schedule_post(&f.db, &f.alice, request("nope", "hi")),
            Err(ApiError::NotFound("influencer"))
        ));
        assert!(matches!(
            schedule_post(&f.db, &f.alice, request(&f.influencer.id, "   ")),
            Err(ApiError::InvalidArgument(_))
        ));
        assert!(matches!(
            get_post(&f.db, &f.alice, "nope"),
            Err(ApiError::NotFound("post"))
        ));
        assert!(matches!(
            list_posts(&f.db, &f.alice, "nope", &PageQuery::default()),
            Err(ApiError::NotFound("influencer"))
        ));
    }

    #[test]
    fn five_digit_year_is_invalid_and_nothing_is_written() {
        let f = fixture();
        let mut far = request(&f.influencer.id, "see you in year ten thousand");
        far.scheduled_time = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();

        assert!(matches!(
            schedule_post(&f.db, &f.alice, far),
            Err(ApiError::InvalidArgument(_))
        ));
        let (posts, _) =
            list_posts(&f.db, &f.alice, &f.influencer.id, &PageQuery::default()).unwrap();
        assert!(posts.is_empty());
    }

    #[test]
    fn pages_through_posts_without_gaps() {
        let f = fixture();
        let mut ids: Vec<String> = (0..3)
            .map(|n| {
                schedule_post(&f.db, &f.alice, request(&f.influencer.id, &format!("post {n}")))
                    .unwrap()
                    .id
            })
            .collect();
        ids.sort();

        let mut query = PageQuery {
            page_size: 1,
            page_token: String::new(),
        };
        let mut seen = Vec::new();
        loop {
            let (page, next) = list_posts(&f.db, &f.alice, &f.influencer.id, &query).unwrap();
            assert!(page.len() <= 1);
            seen.extend(page.into_iter().map(|p| p.id));
            if next.is_empty() {
                break;
            }
            query.page_token = next;
        }
        assert_eq!(seen, ids);
    }
}
