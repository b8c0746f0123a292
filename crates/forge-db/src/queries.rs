use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, warn};
use uuid::Uuid;

use forge_types::models::{Influencer, Post, PostStatus, User};

use crate::models::{
    INFLUENCER_COLUMNS, InfluencerRow, POST_COLUMNS, PostRow, USER_COLUMNS, UserRow,
    format_timestamp, is_storable,
};
use crate::store::{NewInfluencer, NewPost, NewUser, Page, Store, UserChanges};
use crate::{Database, StoreError};

impl Store for Database {
    // -- Users --

    fn find_user_by_identity(&self, external_identity: &str) -> Result<Option<User>, StoreError> {
        self.with_conn(|conn| query_user_by_identity(conn, external_identity))
    }

    fn provision_user(&self, new: NewUser) -> Result<User, StoreError> {
        self.with_conn_mut(|conn| {
            let now = format_timestamp(Utc::now());
            let inserted = conn.execute(
                &format!(
                    "INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                     ON CONFLICT(external_identity) DO NOTHING"
                ),
                params![
                    Uuid::new_v4().to_string(),
                    new.email,
                    new.name,
                    new.external_identity,
                    new.role.as_str(),
                    now,
                ],
            )?;
            if inserted == 0 {
                debug!("User for {} already provisioned", new.external_identity);
            }

            query_user_by_identity(conn, &new.external_identity)?.ok_or_else(|| {
                StoreError::Corrupt(format!(
                    "user for {} vanished after provisioning",
                    new.external_identity
                ))
            })
        })
    }

    fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    fn list_users(&self, page: &Page) -> Result<Vec<User>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE (?1 IS NULL OR id > ?1)
                 ORDER BY id
                 LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![page.after, sql_limit(page)], UserRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(User::try_from).collect()
        })
    }

    fn update_user(&self, id: &str, changes: &UserChanges) -> Result<Option<User>, StoreError> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE users
                 SET name = COALESCE(?2, name),
                     role = COALESCE(?3, role),
                     updated_at = MAX(updated_at, ?4)
                 WHERE id = ?1",
                params![
                    id,
                    changes.name,
                    changes.role.map(|r| r.as_str()),
                    format_timestamp(Utc::now()),
                ],
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_user_by_id(conn, id)
        })
    }

    // -- Influencers --

    fn create_influencer(&self, new: NewInfluencer) -> Result<Influencer, StoreError> {
        self.with_conn_mut(|conn| {
            let id = Uuid::new_v4().to_string();
            let now = format_timestamp(Utc::now());
            conn.execute(
                "INSERT INTO influencers
                     (id, name, platform, account_id, owner_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![id, new.name, new.platform, new.account_id, new.owner_id, now],
            )?;
            query_influencer_by_id(conn, &id)?.ok_or_else(|| {
                StoreError::Corrupt(format!("influencer {} vanished after insert", id))
            })
        })
    }

    fn get_influencer(&self, id: &str) -> Result<Option<Influencer>, StoreError> {
        self.with_conn(|conn| query_influencer_by_id(conn, id))
    }

    fn list_influencers(
        &self,
        owner_id: Option<&str>,
        page: &Page,
    ) -> Result<Vec<Influencer>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {INFLUENCER_COLUMNS} FROM influencers
                 WHERE (?1 IS NULL OR owner_id = ?1)
                   AND (?2 IS NULL OR id > ?2)
                 ORDER BY id
                 LIMIT ?3"
            ))?;
            let rows = stmt
                .query_map(
                    params![owner_id, page.after, sql_limit(page)],
                    InfluencerRow::from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(Influencer::try_from).collect()
        })
    }

    // -- Posts --

    fn create_post(&self, new: NewPost) -> Result<Post, StoreError> {
        if !is_storable(new.scheduled_time) {
            return Err(StoreError::OutOfRange(format!("scheduled_time {}", new.scheduled_time)));
        }
        self.with_conn_mut(|conn| {
            let id = Uuid::new_v4().to_string();
            let now = format_timestamp(Utc::now());
            conn.execute(
                "INSERT INTO posts
                     (id, influencer_id, content, scheduled_time, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![
                    id,
                    new.influencer_id,
                    new.content,
                    format_timestamp(new.scheduled_time),
                    now,
                ],
            )?;
            query_post_by_id(conn, &id)?
                .ok_or_else(|| StoreError::Corrupt(format!("post {} vanished after insert", id)))
        })
    }

    fn get_post(&self, id: &str) -> Result<Option<Post>, StoreError> {
        self.with_conn(|conn| query_post_by_id(conn, id))
    }

    fn list_posts(&self, influencer_id: &str, page: &Page) -> Result<Vec<Post>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts
                 WHERE influencer_id = ?1
                   AND (?2 IS NULL OR id > ?2)
                 ORDER BY id
                 LIMIT ?3"
            ))?;
            let rows = stmt
                .query_map(
                    params![influencer_id, page.after, sql_limit(page)],
                    PostRow::from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;
            rows.into_iter().map(Post::try_from).collect()
        })
    }

    fn due_posts(&self, now: DateTime<Utc>) -> Result<Vec<Post>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {POST_COLUMNS} FROM posts
                 WHERE status = ?1 AND scheduled_time <= ?2
                 ORDER BY scheduled_time, id"
            ))?;
            let rows = stmt
                .query_map(
                    params![PostStatus::Scheduled.as_str(), format_timestamp(now)],
                    PostRow::from_row,
                )?
                .collect::<Result<Vec<_>, _>>()?;

            // One unreadable row must not hold back every other due post.
            Ok(rows
                .into_iter()
                .filter_map(|row| {
                    let id = row.id.clone();
                    Post::try_from(row)
                        .inspect_err(|e| warn!("Skipping unreadable due post {}: {}", id, e))
                        .ok()
                })
                .collect())
        })
    }

    fn transition_post(
        &self,
        id: &str,
        from: PostStatus,
        to: PostStatus,
    ) -> Result<bool, StoreError> {
        if !from.can_transition_to(to) {
            return Err(StoreError::IllegalTransition { from, to });
        }
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE posts
                 SET status = ?3, updated_at = MAX(updated_at, ?4)
                 WHERE id = ?1 AND status = ?2",
                params![id, from.as_str(), to.as_str(), format_timestamp(Utc::now())],
            )?;
            Ok(updated == 1)
        })
    }
}

/// SQLite treats a negative LIMIT as unbounded.
fn sql_limit(page: &Page) -> i64 {
    page.limit.map(i64::from).unwrap_or(-1)
}

fn query_user_by_identity(
    conn: &Connection,
    external_identity: &str,
) -> Result<Option<User>, StoreError> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE external_identity = ?1"),
            [external_identity],
            UserRow::from_row,
        )
        .optional()?;
    row.map(User::try_from).transpose()
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<User>, StoreError> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            [id],
            UserRow::from_row,
        )
        .optional()?;
    row.map(User::try_from).transpose()
}

fn query_influencer_by_id(conn: &Connection, id: &str) -> Result<Option<Influencer>, StoreError> {
    let row = conn
        .query_row(
            &format!("SELECT {INFLUENCER_COLUMNS} FROM influencers WHERE id = ?1"),
            [id],
            InfluencerRow::from_row,
        )
        .optional()?;
    row.map(Influencer::try_from).transpose()
}

fn query_post_by_id(conn: &Connection, id: &str) -> Result<Option<Post>, StoreError> {
    let row = conn
        .query_row(
            &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
            [id],
            PostRow::from_row,
        )
        .optional()?;
    row.map(Post::try_from).transpose()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone};
    use forge_types::models::{InfluencerStatus, Role};

    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn new_user(subject: &str) -> NewUser {
        NewUser {
            external_identity: subject.to_string(),
            email: format!("{subject}@example.com"),
            name: subject.to_string(),
            role: Role::User,
        }
    }

    fn influencer(db: &Database, owner: &User, account: &str) -> Influencer {
        db.create_influencer(NewInfluencer {
            name: format!("inf-{account}"),
            platform: "instagram".into(),
            account_id: account.into(),
            owner_id: owner.id.clone(),
        })
        .unwrap()
    }

    /// Inserts a post with a caller-chosen id so ordering is predictable.
    fn post_with_id(db: &Database, id: &str, influencer_id: &str, at: DateTime<Utc>) {
        db.with_conn_mut(|conn| {
            let now = format_timestamp(Utc::now());
            conn.execute(
                "INSERT INTO posts
                     (id, influencer_id, content, scheduled_time, created_at, updated_at)
                 VALUES (?1, ?2, 'hello', ?3, ?4, ?4)",
                params![id, influencer_id, format_timestamp(at), now],
            )?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn provisioning_is_idempotent() {
        let db = db();
        let first = db.provision_user(new_user("auth0|alice")).unwrap();
        let mut again = new_user("auth0|alice");
        again.role = Role::Admin;
        let second = db.provision_user(again).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.role, Role::User);
        assert_eq!(db.list_users(&Page::default()).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_provisioning_creates_one_user() {
        let db = Arc::new(db());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                std::thread::spawn(move || db.provision_user(new_user("auth0|race")).unwrap().id)
            })
            .collect();
        let ids: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(ids.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(db.list_users(&Page::default()).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_platform_account_conflicts() {
        let db = db();
        let alice = db.provision_user(new_user("alice")).unwrap();
        let bob = db.provision_user(new_user("bob")).unwrap();
        let created = influencer(&db, &alice, "acct-1");
        assert_eq!(created.status, InfluencerStatus::Active);
        assert_eq!(created.owner_id, alice.id);

        let err = db
            .create_influencer(NewInfluencer {
                name: "copycat".into(),
                platform: "instagram".into(),
                account_id: "acct-1".into(),
                owner_id: bob.id,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "{err:?}");
    }

    #[test]
    fn influencer_requires_existing_owner() {
        let err = db()
            .create_influencer(NewInfluencer {
                name: "orphan".into(),
                platform: "x".into(),
                account_id: "1".into(),
                owner_id: "no-such-user".into(),
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingReference(_)), "{err:?}");
    }

    #[test]
    fn influencer_listing_is_scoped_by_owner() {
        let db = db();
        let alice = db.provision_user(new_user("alice")).unwrap();
        let bob = db.provision_user(new_user("bob")).unwrap();
        influencer(&db, &alice, "a1");
        influencer(&db, &alice, "a2");
        influencer(&db, &bob, "b1");

        let mine = db.list_influencers(Some(&alice.id), &Page::default()).unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|i| i.owner_id == alice.id));
        assert!(mine[0].id < mine[1].id);

        assert_eq!(db.list_influencers(None, &Page::default()).unwrap().len(), 3);
    }

    #[test]
    fn post_pages_follow_id_order() {
        let db = db();
        let alice = db.provision_user(new_user("alice")).unwrap();
        let inf = influencer(&db, &alice, "a1");
        let at = Utc::now();
        for id in ["c", "a", "b"] {
            post_with_id(&db, id, &inf.id, at);
        }

        let page = |after: Option<&str>| {
            db.list_posts(
                &inf.id,
                &Page {
                    after: after.map(str::to_string),
                    limit: Some(1),
                },
            )
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect::<Vec<_>>()
        };
        assert_eq!(page(None), ["a"]);
        assert_eq!(page(Some("a")), ["b"]);
        assert_eq!(page(Some("b")), ["c"]);
        assert!(page(Some("c")).is_empty());
        // A token need not name an existing row.
        assert_eq!(page(Some("aa")), ["b"]);
    }

    #[test]
    fn due_posts_skip_future_and_finished() {
        let db = db();
        let alice = db.provision_user(new_user("alice")).unwrap();
        let inf = influencer(&db, &alice, "a1");
        let now = Utc::now();
        post_with_id(&db, "past", &inf.id, now - Duration::seconds(1));
        post_with_id(&db, "exact", &inf.id, now);
        post_with_id(&db, "future", &inf.id, now + Duration::minutes(5));
        post_with_id(&db, "done", &inf.id, now - Duration::hours(1));
        assert!(
            db.transition_post("done", PostStatus::Scheduled, PostStatus::Posted)
                .unwrap()
        );

        let due: Vec<String> = db.due_posts(now).unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(due, ["past", "exact"]);
    }

    #[test]
    fn five_digit_year_is_rejected_before_insert() {
        let db = db();
        let alice = db.provision_user(new_user("alice")).unwrap();
        let inf = influencer(&db, &alice, "a1");

        let err = db
            .create_post(NewPost {
                influencer_id: inf.id.clone(),
                content: "far".into(),
                scheduled_time: Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap(),
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::OutOfRange(_)), "{err:?}");
        assert!(db.list_posts(&inf.id, &Page::default()).unwrap().is_empty());
        assert!(db.due_posts(Utc::now()).unwrap().is_empty());
    }

    #[test]
    fn unreadable_due_row_does_not_hide_the_rest() {
        let db = db();
        let alice = db.provision_user(new_user("alice")).unwrap();
        let inf = influencer(&db, &alice, "a1");
        let now = Utc::now();
        post_with_id(&db, "past", &inf.id, now - Duration::seconds(1));
        db.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO posts
                     (id, influencer_id, content, scheduled_time, created_at, updated_at)
                 VALUES ('bad', ?1, 'x', '+10000-01-01T00:00:00.000000Z', ?2, ?2)",
                params![inf.id, format_timestamp(now)],
            )?;
            Ok(())
        })
        .unwrap();

        let due: Vec<String> = db.due_posts(now).unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(due, ["past"]);
    }

    #[test]
    fn transition_is_compare_and_set() {
        let db = db();
        let alice = db.provision_user(new_user("alice")).unwrap();
        let inf = influencer(&db, &alice, "a1");
        let post = db
            .create_post(NewPost {
                influencer_id: inf.id.clone(),
                content: "hi".into(),
                scheduled_time: Utc::now(),
            })
            .unwrap();
        assert_eq!(post.status, PostStatus::Scheduled);

        assert!(
            db.transition_post(&post.id, PostStatus::Scheduled, PostStatus::Failed)
                .unwrap()
        );
        assert!(
            !db.transition_post(&post.id, PostStatus::Scheduled, PostStatus::Posted)
                .unwrap()
        );
        assert_eq!(db.get_post(&post.id).unwrap().unwrap().status, PostStatus::Failed);

        let err = db
            .transition_post(&post.id, PostStatus::Failed, PostStatus::Scheduled)
            .unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
    }

    #[test]
    fn update_user_keeps_updated_at_monotonic() {
        let db = db();
        let alice = db.provision_user(new_user("alice")).unwrap();
        let renamed = db
            .update_user(
                &alice.id,
                &UserChanges {
                    name: Some("Alice A.".into()),
                    role: None,
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(renamed.name, "Alice A.");
        assert_eq!(renamed.role, Role::User);
        assert_eq!(renamed.created_at, alice.created_at);
        assert!(renamed.updated_at >= alice.updated_at);

        assert!(
            db.update_user("missing", &UserChanges::default())
                .unwrap()
                .is_none()
        );
    }
}
