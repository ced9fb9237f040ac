use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::app::error::{store_failure, ServiceError, ServiceResult};
use crate::app::identity::{require_caller, IdentityProvider};
use crate::domain::story::{Story, StoryWithUser};
use crate::domain::user::PublicUser;
use crate::infra::store::{ContentStore, RelationshipStore};

#[derive(Clone)]
pub struct StoryService {
    content: Arc<dyn ContentStore>,
    relationships: Arc<dyn RelationshipStore>,
}

impl StoryService {
    pub fn new(content: Arc<dyn ContentStore>, relationships: Arc<dyn RelationshipStore>) -> Self {
        Self {
            content,
            relationships,
        }
    }

    /// Replaces the caller's current story; each user has at most one.
    pub async fn add_story(
        &self,
        identity: &dyn IdentityProvider,
        img: &str,
    ) -> ServiceResult<StoryWithUser> {
        let caller = require_caller(identity)?;
        let img = img.trim();
        if img.is_empty() {
            return Err(ServiceError::invalid("img", "cannot be empty"));
        }

        let user = self
            .content
            .find_user(caller)
            .await
            .map_err(store_failure("find user"))?
            .ok_or(ServiceError::NotFound("user"))?;

        let story = Story::new(caller, img.to_string(), OffsetDateTime::now_utc());
        let story = self
            .content
            .replace_story(story)
            .await
            .map_err(store_failure("replace story"))?;

        tracing::info!(user_id = %caller, story_id = %story.id, "published story");
        Ok(StoryWithUser {
            story,
            user: PublicUser::from(&user),
        })
    }

    /// Unexpired stories of the caller and everyone the caller follows.
    pub async fn story_feed(
        &self,
        identity: &dyn IdentityProvider,
    ) -> ServiceResult<Vec<StoryWithUser>> {
        let caller = require_caller(identity)?;

        let mut authors = self
            .relationships
            .list_following_ids(caller)
            .await
            .map_err(store_failure("list following"))?;
        authors.push(caller);

        let stories = self
            .content
            .list_active_stories(&authors, OffsetDateTime::now_utc())
            .await
            .map_err(store_failure("list stories"))?;

        let mut users: HashMap<_, PublicUser> = HashMap::new();
        let mut feed = Vec::with_capacity(stories.len());
        for story in stories {
            if !users.contains_key(&story.user_id) {
                let user = self
                    .content
                    .find_user(story.user_id)
                    .await
                    .map_err(store_failure("find user"))?;
                match user {
                    Some(user) => {
                        users.insert(story.user_id, PublicUser::from(&user));
                    }
                    None => continue,
                }
            }
            if let Some(user) = users.get(&story.user_id) {
                feed.push(StoryWithUser {
                    user: user.clone(),
                    story,
                });
            }
        }

        Ok(feed)
    }
}
