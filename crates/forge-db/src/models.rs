//! Row types as they come out of SQLite. Distinct from the forge-types
//! models so that parsing of stored text happens in one place.

use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use rusqlite::Row;

use forge_types::models::{Influencer, Post, User};

use crate::StoreError;

/// Years whose RFC 3339 form is four digits wide. Anything else would
/// break string ordering and fail to parse back.
pub fn is_storable(ts: DateTime<Utc>) -> bool {
    (0..=9999).contains(&ts.year())
}

/// Fixed-width RFC 3339 so that comparing stored strings compares instants.
/// Only valid for [`is_storable`] timestamps.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("timestamp '{}': {}", raw, e)))
}

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub name: String,
    pub external_identity: String,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

pub const USER_COLUMNS: &str = "id, email, name, external_identity, role, created_at, updated_at";

impl UserRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            external_identity: row.get(3)?,
            role: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            role: row
                .role
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("user {}: {}", row.id, e)))?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            id: row.id,
            email: row.email,
            name: row.name,
            external_identity: row.external_identity,
        })
    }
}

pub struct InfluencerRow {
    pub id: String,
    pub name: String,
    pub platform: String,
    pub account_id: String,
    pub status: String,
    pub owner_id: String,
    pub created_at: String,
    pub updated_at: String,
}

pub const INFLUENCER_COLUMNS: &str =
    "id, name, platform, account_id, status, owner_id, created_at, updated_at";

impl InfluencerRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            platform: row.get(2)?,
            account_id: row.get(3)?,
            status: row.get(4)?,
            owner_id: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

impl TryFrom<InfluencerRow> for Influencer {
    type Error = StoreError;

    fn try_from(row: InfluencerRow) -> Result<Self, Self::Error> {
        Ok(Influencer {
            status: row
                .status
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("influencer {}: {}", row.id, e)))?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            id: row.id,
            name: row.name,
            platform: row.platform,
            account_id: row.account_id,
            owner_id: row.owner_id,
        })
    }
}

pub struct PostRow {
    pub id: String,
    pub influencer_id: String,
    pub content: String,
    pub scheduled_time: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

pub const POST_COLUMNS: &str =
    "id, influencer_id, content, scheduled_time, status, created_at, updated_at";

impl PostRow {
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            influencer_id: row.get(1)?,
            content: row.get(2)?,
            scheduled_time: row.get(3)?,
            status: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

impl TryFrom<PostRow> for Post {
    type Error = StoreError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        Ok(Post {
            status: row
                .status
                .parse()
                .map_err(|e| StoreError::Corrupt(format!("post {}: {}", row.id, e)))?,
            scheduled_time: parse_timestamp(&row.scheduled_time)?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            id: row.id,
            influencer_id: row.influencer_id,
            content: row.content,
        })
    }
}
