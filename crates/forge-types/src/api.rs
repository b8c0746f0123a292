use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Influencer, InfluencerStatus, Post, PostStatus, Role, User};

// -- Pagination --

/// `page_size <= 0` means no limit, an empty `page_token` starts from the
/// beginning.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageQuery {
    #[serde(default)]
    pub page_size: i32,
    #[serde(default)]
    pub page_token: String,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            role: u.role,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserPage {
    pub users: Vec<UserResponse>,
    pub next_page_token: String,
}

// -- Influencers --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateInfluencerRequest {
    pub name: String,
    pub platform: String,
    pub account_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfluencerResponse {
    pub id: String,
    pub name: String,
    pub platform: String,
    pub account_id: String,
    pub status: InfluencerStatus,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Influencer> for InfluencerResponse {
    fn from(i: Influencer) -> Self {
        Self {
            id: i.id,
            name: i.name,
            platform: i.platform,
            account_id: i.account_id,
            status: i.status,
            owner_id: i.owner_id,
            created_at: i.created_at,
            updated_at: i.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InfluencerPage {
    pub influencers: Vec<InfluencerResponse>,
    pub next_page_token: String,
}

// -- Posts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulePostRequest {
    pub influencer_id: String,
    pub content: String,
    pub scheduled_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: String,
    pub influencer_id: String,
    pub content: String,
    pub scheduled_time: DateTime<Utc>,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Post> for PostResponse {
    fn from(p: Post) -> Self {
        Self {
            id: p.id,
            influencer_id: p.influencer_id,
            content: p.content,
            scheduled_time: p.scheduled_time,
            status: p.status,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostPage {
    pub posts: Vec<PostResponse>,
    pub next_page_token: String,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
