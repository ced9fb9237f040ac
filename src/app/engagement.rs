use std::sync::Arc;
use time::OffsetDateTime;

use crate::app::error::{parse_id, store_failure, ServiceError, ServiceResult};
use crate::app::identity::{require_caller, IdentityProvider};
use crate::app::posts::validate_text;
use crate::app::relationships::ToggleOutcome;
use crate::domain::engagement::{Comment, CommentWithUser, Like};
use crate::domain::id::ObjectId;
use crate::domain::user::PublicUser;
use crate::infra::store::{ContentStore, Inserted};

#[derive(Clone)]
pub struct EngagementService {
    content: Arc<dyn ContentStore>,
}

impl EngagementService {
    pub fn new(content: Arc<dyn ContentStore>) -> Self {
        Self { content }
    }

    pub async fn toggle_like(
        &self,
        identity: &dyn IdentityProvider,
        post_id: &str,
    ) -> ServiceResult<ToggleOutcome> {
        let caller = require_caller(identity)?;
        let post_id = parse_id("post id", post_id)?;
        self.ensure_post(post_id).await?;

        let like = self
            .content
            .find_like(caller, post_id)
            .await
            .map_err(store_failure("find like"))?;
        if let Some(like) = like {
            self.content
                .delete_like(like.id)
                .await
                .map_err(store_failure("delete like"))?;
            return Ok(ToggleOutcome::Removed);
        }

        let like = Like {
            id: ObjectId::generate(),
            user_id: caller,
            post_id,
            created_at: OffsetDateTime::now_utc(),
        };
        let inserted = self
            .content
            .insert_like(like)
            .await
            .map_err(store_failure("insert like"))?;
        match inserted {
            Inserted::Created(_) => Ok(ToggleOutcome::Created),
            Inserted::Conflict => {
                tracing::warn!(user_id = %caller, post_id = %post_id, "like changed concurrently");
                Ok(ToggleOutcome::Conflict)
            }
        }
    }

    pub async fn add_comment(
        &self,
        identity: &dyn IdentityProvider,
        post_id: &str,
        desc: &str,
    ) -> ServiceResult<CommentWithUser> {
        let caller = require_caller(identity)?;
        let post_id = parse_id("post id", post_id)?;
        let desc = validate_text("comment", desc)?;
        self.ensure_post(post_id).await?;

        let author = self
            .content
            .find_user(caller)
            .await
            .map_err(store_failure("find user"))?
            .ok_or(ServiceError::NotFound("user"))?;

        let comment = Comment {
            id: ObjectId::generate(),
            user_id: caller,
            post_id,
            desc,
            created_at: OffsetDateTime::now_utc(),
        };
        let comment = self
            .content
            .insert_comment(comment)
            .await
            .map_err(store_failure("insert comment"))?;

        tracing::info!(user_id = %caller, post_id = %post_id, comment_id = %comment.id, "added comment");
        Ok(CommentWithUser {
            comment,
            user: PublicUser::from(&author),
        })
    }

    async fn ensure_post(&self, post_id: ObjectId) -> ServiceResult<()> {
        self.content
            .find_post(post_id)
            .await
            .map_err(store_failure("find post"))?
            .map(|_| ())
            .ok_or(ServiceError::NotFound("post"))
    }
}
