use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::id::ObjectId;
use crate::domain::user::PublicUser;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
    pub id: ObjectId,
    pub user_id: ObjectId,
    pub post_id: ObjectId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: ObjectId,
    pub user_id: ObjectId,
    pub post_id: ObjectId,
    pub desc: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentWithUser {
    #[serde(flatten)]
    pub comment: Comment,
    pub user: PublicUser,
}
