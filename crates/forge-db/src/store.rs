use chrono::{DateTime, Utc};

use forge_types::models::{Influencer, Post, PostStatus, Role, User};

use crate::StoreError;

/// Lower bound and size of one page over an ID-ordered query.
///
/// Rows are returned in ascending ID order, restricted to IDs strictly
/// greater than `after`. `limit: None` returns every matching row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub after: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub external_identity: String,
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone)]
pub struct NewInfluencer {
    pub name: String,
    pub platform: String,
    pub account_id: String,
    pub owner_id: String,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub influencer_id: String,
    pub content: String,
    pub scheduled_time: DateTime<Utc>,
}

/// Transactional access to users, influencers and posts.
///
/// Every method is a single atomic operation against the backing store.
/// Lookups by ID return `Ok(None)` for absent rows rather than an error.
pub trait Store: Send + Sync {
    fn find_user_by_identity(&self, external_identity: &str) -> Result<Option<User>, StoreError>;

    /// Returns the user for `new.external_identity`, inserting it first if
    /// none exists. Concurrent calls for the same identity yield one row.
    fn provision_user(&self, new: NewUser) -> Result<User, StoreError>;

    fn get_user(&self, id: &str) -> Result<Option<User>, StoreError>;

    fn list_users(&self, page: &Page) -> Result<Vec<User>, StoreError>;

    fn update_user(&self, id: &str, changes: &UserChanges) -> Result<Option<User>, StoreError>;

    fn create_influencer(&self, new: NewInfluencer) -> Result<Influencer, StoreError>;

    fn get_influencer(&self, id: &str) -> Result<Option<Influencer>, StoreError>;

    /// `owner_id: None` lists every influencer.
    fn list_influencers(
        &self,
        owner_id: Option<&str>,
        page: &Page,
    ) -> Result<Vec<Influencer>, StoreError>;

    fn create_post(&self, new: NewPost) -> Result<Post, StoreError>;

    fn get_post(&self, id: &str) -> Result<Option<Post>, StoreError>;

    fn list_posts(&self, influencer_id: &str, page: &Page) -> Result<Vec<Post>, StoreError>;

    /// Scheduled posts whose `scheduled_time <= now`.
    fn due_posts(&self, now: DateTime<Utc>) -> Result<Vec<Post>, StoreError>;

    /// Compare-and-set on a post's status. Returns `false` without writing
    /// when the stored status is no longer `from` (or the post is gone).
    fn transition_post(&self, id: &str, from: PostStatus, to: PostStatus)
    -> Result<bool, StoreError>;
}
