use serde::Deserialize;
use std::sync::Arc;
use url::Url;

use crate::app::error::{parse_id, store_failure, ServiceError, ServiceResult};
use crate::app::identity::{require_caller, IdentityProvider};
use crate::domain::id::ObjectId;
use crate::domain::user::{Profile, ProfileUpdate, PublicUser, User};
use crate::infra::store::{ContentStore, Inserted, RelationshipStore};

const MAX_USERNAME_LEN: usize = 64;
const MAX_SHORT_FIELD_LEN: usize = 60;
const MAX_DESCRIPTION_LEN: usize = 255;
const MAX_WEBSITE_LEN: usize = 100;

/// Profile form as submitted. Empty strings mean "leave unchanged".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileInput {
    pub cover: Option<String>,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub description: Option<String>,
    pub city: Option<String>,
    pub school: Option<String>,
    pub work: Option<String>,
    pub website: Option<String>,
}

impl ProfileInput {
    pub fn validate(self) -> ServiceResult<ProfileUpdate> {
        let website = non_empty(self.website);
        if let Some(website) = &website {
            check_len("website", website, MAX_WEBSITE_LEN)?;
            Url::parse(website).map_err(|err| ServiceError::invalid("website", err.to_string()))?;
        }

        Ok(ProfileUpdate {
            cover: non_empty(self.cover),
            name: bounded("name", self.name, MAX_SHORT_FIELD_LEN)?,
            surname: bounded("surname", self.surname, MAX_SHORT_FIELD_LEN)?,
            description: bounded("description", self.description, MAX_DESCRIPTION_LEN)?,
            city: bounded("city", self.city, MAX_SHORT_FIELD_LEN)?,
            school: bounded("school", self.school, MAX_SHORT_FIELD_LEN)?,
            work: bounded("work", self.work, MAX_SHORT_FIELD_LEN)?,
            website,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}

fn check_len(field: &'static str, value: &str, max: usize) -> ServiceResult<()> {
    if value.chars().count() > max {
        return Err(ServiceError::invalid(
            field,
            format!("must be at most {} characters", max),
        ));
    }
    Ok(())
}

fn bounded(field: &'static str, value: Option<String>, max: usize) -> ServiceResult<Option<String>> {
    let value = non_empty(value);
    if let Some(value) = &value {
        check_len(field, value, max)?;
    }
    Ok(value)
}

#[derive(Clone)]
pub struct UserService {
    content: Arc<dyn ContentStore>,
    relationships: Arc<dyn RelationshipStore>,
}

impl UserService {
    pub fn new(content: Arc<dyn ContentStore>, relationships: Arc<dyn RelationshipStore>) -> Self {
        Self {
            content,
            relationships,
        }
    }

    /// Provisions the local row for an account created at the identity provider.
    pub async fn register(
        &self,
        id: &str,
        username: &str,
        avatar: Option<String>,
    ) -> ServiceResult<User> {
        let id = parse_id("user id", id)?;
        let username = username.trim();
        if username.is_empty() || username.chars().any(char::is_whitespace) {
            return Err(ServiceError::invalid("username", "must be a single non-empty word"));
        }
        check_len("username", username, MAX_USERNAME_LEN)?;

        let user = User::new(id, username.to_string(), non_empty(avatar));
        let inserted = self
            .content
            .insert_user(user)
            .await
            .map_err(store_failure("insert user"))?;
        match inserted {
            Inserted::Created(user) => {
                tracing::info!(user_id = %user.id, username = %user.username, "registered user");
                Ok(user)
            }
            Inserted::Conflict => Err(ServiceError::Conflict("user id or username already taken")),
        }
    }

    pub async fn get_profile(&self, username: &str) -> ServiceResult<Profile> {
        let user = self
            .content
            .find_user_by_username(username)
            .await
            .map_err(store_failure("find user by username"))?
            .ok_or(ServiceError::NotFound("user"))?;
        let followers = self
            .relationships
            .count_followers(user.id)
            .await
            .map_err(store_failure("count followers"))?;

        Ok(Profile::new(user, followers))
    }

    pub async fn update_profile(
        &self,
        identity: &dyn IdentityProvider,
        input: ProfileInput,
    ) -> ServiceResult<User> {
        let caller = require_caller(identity)?;
        let update = input.validate()?;

        let user = if update.is_empty() {
            self.content
                .find_user(caller)
                .await
                .map_err(store_failure("find user"))?
        } else {
            self.content
                .update_user(caller, &update)
                .await
                .map_err(store_failure("update user"))?
        };

        let user = user.ok_or(ServiceError::NotFound("user"))?;
        tracing::info!(user_id = %caller, "updated profile");
        Ok(user)
    }

    pub async fn public_user(&self, id: ObjectId) -> ServiceResult<Option<PublicUser>> {
        let user = self
            .content
            .find_user(id)
            .await
            .map_err(store_failure("find user"))?;
        Ok(user.as_ref().map(PublicUser::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_fields_are_dropped() {
        let update = ProfileInput {
            name: Some(String::new()),
            city: Some("Lagos".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap();

        assert_eq!(update.name, None);
        assert_eq!(update.city.as_deref(), Some("Lagos"));
    }

    #[test]
    fn overlong_fields_are_rejected_by_name() {
        let err = ProfileInput {
            description: Some("x".repeat(256)),
            ..Default::default()
        }
        .validate()
        .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidArgument { field: "description", .. }));

        let err = ProfileInput {
            school: Some("s".repeat(61)),
            ..Default::default()
        }
        .validate()
        .unwrap_err();

        assert!(matches!(err, ServiceError::InvalidArgument { field: "school", .. }));
    }

    #[test]
    fn website_must_be_a_url() {
        let err = ProfileInput {
            website: Some("not a url".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidArgument { field: "website", .. }));

        let update = ProfileInput {
            website: Some("https://example.com/me".to_string()),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(update.website.as_deref(), Some("https://example.com/me"));
    }
}
