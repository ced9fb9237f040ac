use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::domain::id::ObjectId;
use crate::domain::user::PublicUser;

pub const STORY_TTL: Duration = Duration::hours(24);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Story {
    pub id: ObjectId,
    pub user_id: ObjectId,
    pub img: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl Story {
    pub fn new(user_id: ObjectId, img: String, now: OffsetDateTime) -> Self {
        Self {
            id: ObjectId::generate(),
            user_id,
            img,
            created_at: now,
            expires_at: now + STORY_TTL,
        }
    }

    pub fn is_active(&self, now: OffsetDateTime) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoryWithUser {
    #[serde(flatten)]
    pub story: Story,
    pub user: PublicUser,
}
