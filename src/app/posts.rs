use std::sync::Arc;
use time::OffsetDateTime;

use crate::app::error::{parse_id, store_failure, ServiceError, ServiceResult};
use crate::app::identity::{require_caller, IdentityProvider};
use crate::domain::id::ObjectId;
use crate::domain::post::Post;
use crate::infra::store::ContentStore;

pub(crate) const MAX_TEXT_LEN: usize = 255;

#[derive(Clone)]
pub struct PostService {
    content: Arc<dyn ContentStore>,
}

impl PostService {
    pub fn new(content: Arc<dyn ContentStore>) -> Self {
        Self { content }
    }

    pub async fn add_post(
        &self,
        identity: &dyn IdentityProvider,
        desc: &str,
        img: Option<String>,
    ) -> ServiceResult<Post> {
        let caller = require_caller(identity)?;
        let desc = validate_text("description", desc)?;

        let post = Post {
            id: ObjectId::generate(),
            user_id: caller,
            desc,
            img: img.filter(|img| !img.is_empty()),
            created_at: OffsetDateTime::now_utc(),
        };
        let post = self
            .content
            .insert_post(post)
            .await
            .map_err(store_failure("insert post"))?;

        tracing::info!(user_id = %caller, post_id = %post.id, "created post");
        Ok(post)
    }

    /// Only the author may delete; anything else reads as not found.
    pub async fn delete_post(
        &self,
        identity: &dyn IdentityProvider,
        post_id: &str,
    ) -> ServiceResult<()> {
        let caller = require_caller(identity)?;
        let post_id = parse_id("post id", post_id)?;

        let deleted = self
            .content
            .delete_post(post_id, caller)
            .await
            .map_err(store_failure("delete post"))?;
        if !deleted {
            return Err(ServiceError::NotFound("post"));
        }

        tracing::info!(user_id = %caller, post_id = %post_id, "deleted post");
        Ok(())
    }
}

/// Trims and bounds free text to 1..=255 characters.
pub(crate) fn validate_text(field: &'static str, value: &str) -> ServiceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::invalid(field, "cannot be empty"));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(ServiceError::invalid(
            field,
            format!("must be at most {} characters", MAX_TEXT_LEN),
        ));
    }
    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::identity::Caller;
    use crate::infra::store::MemoryStore;

    #[tokio::test]
    async fn only_the_author_can_delete() {
        let service = PostService::new(Arc::new(MemoryStore::new()));
        let author = Caller::authenticated(ObjectId::generate());
        let stranger = Caller::authenticated(ObjectId::generate());

        let post = service.add_post(&author, "  hello  ", None).await.unwrap();
        assert_eq!(post.desc, "hello");

        let err = service
            .delete_post(&stranger, &post.id.to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound("post")));

        service
            .delete_post(&author, &post.id.to_string())
            .await
            .unwrap();
    }

    #[test]
    fn text_bounds() {
        assert!(validate_text("description", "   ").is_err());
        assert!(validate_text("description", &"a".repeat(255)).is_ok());
        assert!(validate_text("description", &"a".repeat(256)).is_err());
    }
}
