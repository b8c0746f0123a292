use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Returned when a stored or submitted enum value is not one we know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

macro_rules! string_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

string_enum!(Role, "role", { User => "user", Admin => "admin" });

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfluencerStatus {
    #[default]
    Active,
    Suspended,
}

string_enum!(InfluencerStatus, "influencer status", {
    Active => "active",
    Suspended => "suspended",
});

/// Publication state of a post.
///
/// The only legal moves are `Scheduled -> Posted` and `Scheduled -> Failed`;
/// both targets are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[default]
    Scheduled,
    Posted,
    Failed,
}

string_enum!(PostStatus, "post status", {
    Scheduled => "scheduled",
    Posted => "posted",
    Failed => "failed",
});

impl PostStatus {
    /// A post only ever moves once, out of `scheduled` into an outcome.
    pub fn can_transition_to(self, next: PostStatus) -> bool {
        !self.is_terminal() && next.is_terminal()
    }

    pub fn is_terminal(self) -> bool {
        match self {
            PostStatus::Scheduled => false,
            PostStatus::Posted | PostStatus::Failed => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    /// Stable subject issued by the token verifier.
    pub external_identity: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Influencer {
    pub id: String,
    pub name: String,
    pub platform: String,
    pub account_id: String,
    pub status: InfluencerStatus,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub influencer_id: String,
    pub content: String,
    pub scheduled_time: DateTime<Utc>,
    pub status: PostStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_status_only_leaves_scheduled() {
        use PostStatus::*;
        assert!(Scheduled.can_transition_to(Posted));
        assert!(Scheduled.can_transition_to(Failed));
        for from in [Posted, Failed] {
            for to in [Scheduled, Posted, Failed] {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
        assert!(!Scheduled.can_transition_to(Scheduled));
        assert!(!Scheduled.is_terminal());
        assert!(Posted.is_terminal() && Failed.is_terminal());
    }

    #[test]
    fn enums_parse_their_own_text() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(
            "suspended".parse::<InfluencerStatus>().unwrap(),
            InfluencerStatus::Suspended
        );
        assert_eq!(PostStatus::Failed.as_str(), "failed");

        let err = "superuser".parse::<Role>().unwrap_err();
        assert_eq!(err.to_string(), "unknown role 'superuser'");
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert!(serde_json::from_str::<Role>("\"root\"").is_err());
    }
}
