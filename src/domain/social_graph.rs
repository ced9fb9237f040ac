use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::id::ObjectId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Follower {
    pub id: ObjectId,
    pub follower_id: ObjectId,
    pub following_id: ObjectId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowRequest {
    pub id: ObjectId,
    pub sender_id: ObjectId,
    pub receiver_id: ObjectId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: ObjectId,
    pub blocker_id: ObjectId,
    pub blocked_id: ObjectId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Ordered pair of users: `from` acts on `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Pair {
    pub from: ObjectId,
    pub to: ObjectId,
}

impl Pair {
    pub fn new(from: ObjectId, to: ObjectId) -> Self {
        Self { from, to }
    }

    pub fn reversed(self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }
}

/// Follow state of an ordered pair. `Requested` and `Following` never hold at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowState {
    None,
    Requested,
    Following,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockPolicy {
    /// Blocking leaves follower and request edges in place.
    Retain,
    /// Blocking removes follower and request edges in both directions.
    Cascade,
}

impl BlockPolicy {
    pub fn from_config(value: &str) -> Option<Self> {
        match value {
            "retain" => Some(Self::Retain),
            "cascade" => Some(Self::Cascade),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelationshipStatus {
    pub is_following: bool,
    pub is_requested: bool,
    pub is_followed_by: bool,
    pub is_blocking: bool,
    pub is_blocked_by: bool,
}

impl RelationshipStatus {
    pub fn follow_state(&self) -> FollowState {
        if self.is_following {
            FollowState::Following
        } else if self.is_requested {
            FollowState::Requested
        } else {
            FollowState::None
        }
    }
}
