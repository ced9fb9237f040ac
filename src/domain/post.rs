use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::id::ObjectId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: ObjectId,
    pub user_id: ObjectId,
    pub desc: String,
    pub img: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
