use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::id::ObjectId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: ObjectId,
    pub username: String,
    pub avatar: Option<String>,
    pub cover: Option<String>,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub description: Option<String>,
    pub city: Option<String>,
    pub school: Option<String>,
    pub work: Option<String>,
    pub website: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn new(id: ObjectId, username: String, avatar: Option<String>) -> Self {
        Self {
            id,
            username,
            avatar,
            cover: None,
            name: None,
            surname: None,
            description: None,
            city: None,
            school: None,
            work: None,
            website: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// "name surname" when both are set, otherwise the username.
    pub fn display_name(&self) -> String {
        match (&self.name, &self.surname) {
            (Some(name), Some(surname)) => format!("{} {}", name, surname),
            _ => self.username.clone(),
        }
    }

    pub fn apply(&mut self, update: &ProfileUpdate) {
        let fields = [
            (&mut self.cover, &update.cover),
            (&mut self.name, &update.name),
            (&mut self.surname, &update.surname),
            (&mut self.description, &update.description),
            (&mut self.city, &update.city),
            (&mut self.school, &update.school),
            (&mut self.work, &update.work),
            (&mut self.website, &update.website),
        ];
        for (slot, value) in fields {
            if let Some(value) = value {
                *slot = Some(value.clone());
            }
        }
    }
}

/// Validated set of profile fields to overwrite; `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub cover: Option<String>,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub description: Option<String>,
    pub city: Option<String>,
    pub school: Option<String>,
    pub work: Option<String>,
    pub website: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    #[serde(flatten)]
    pub user: User,
    pub display_name: String,
    pub followers_count: i64,
}

impl Profile {
    pub fn new(user: User, followers_count: i64) -> Self {
        Self {
            display_name: user.display_name(),
            user,
            followers_count,
        }
    }
}

/// Author summary embedded in comments and stories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: ObjectId,
    pub username: String,
    pub display_name: String,
    pub avatar: Option<String>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name(),
            avatar: user.avatar.clone(),
        }
    }
}
