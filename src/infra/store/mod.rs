//! Persistence contracts for the social graph and the content tables.
//!
//! Every compound write (accepting a request, cascading a block, replacing a
//! story) is a single call so that implementations can make it atomic.
//! Inserts that would violate a pair uniqueness rule report
//! [`Inserted::Conflict`] instead of failing. Edge inserts naming a user
//! that is not registered fail with [`StoreError::UnknownUser`] on every
//! backend.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::domain::engagement::{Comment, Like};
use crate::domain::id::ObjectId;
use crate::domain::post::Post;
use crate::domain::social_graph::{Block, BlockPolicy, FollowRequest, Follower, Pair};
use crate::domain::story::Story;
use crate::domain::user::{ProfileUpdate, User};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("referenced user does not exist")]
    UnknownUser,
    #[error("store state is poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inserted<T> {
    Created(T),
    Conflict,
}

impl<T> Inserted<T> {
    pub fn created(self) -> Option<T> {
        match self {
            Self::Created(value) => Some(value),
            Self::Conflict => None,
        }
    }
}

#[async_trait]
pub trait RelationshipStore: Send + Sync {
    async fn find_follower(&self, pair: Pair) -> StoreResult<Option<Follower>>;

    async fn find_follow_request(&self, pair: Pair) -> StoreResult<Option<FollowRequest>>;

    async fn find_block(&self, pair: Pair) -> StoreResult<Option<Block>>;

    /// Conflicts when the request already exists or `pair.from` already follows `pair.to`.
    /// Fails with [`StoreError::UnknownUser`] when either side is not registered.
    async fn insert_follow_request(&self, pair: Pair) -> StoreResult<Inserted<FollowRequest>>;

    /// With [`BlockPolicy::Cascade`], follower and request edges in both
    /// directions are removed in the same transaction as the insert.
    /// Fails with [`StoreError::UnknownUser`] when either side is not registered.
    async fn insert_block(&self, pair: Pair, policy: BlockPolicy) -> StoreResult<Inserted<Block>>;

    async fn delete_follower(&self, id: ObjectId) -> StoreResult<bool>;

    async fn delete_follow_request(&self, id: ObjectId) -> StoreResult<bool>;

    async fn delete_block(&self, id: ObjectId) -> StoreResult<bool>;

    /// Deletes the request and creates `sender -> receiver` atomically.
    /// Returns `None` when the request was already resolved.
    async fn accept_follow_request(&self, request: &FollowRequest)
        -> StoreResult<Option<Follower>>;

    /// Pending requests received by `receiver`, newest first.
    async fn list_follow_requests(&self, receiver: ObjectId) -> StoreResult<Vec<FollowRequest>>;

    async fn list_following_ids(&self, follower: ObjectId) -> StoreResult<Vec<ObjectId>>;

    async fn count_followers(&self, user: ObjectId) -> StoreResult<i64>;

    async fn ping(&self) -> StoreResult<()>;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Conflicts on a duplicate id or username.
    async fn insert_user(&self, user: User) -> StoreResult<Inserted<User>>;

    async fn find_user(&self, id: ObjectId) -> StoreResult<Option<User>>;

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn update_user(&self, id: ObjectId, update: &ProfileUpdate) -> StoreResult<Option<User>>;

    async fn insert_post(&self, post: Post) -> StoreResult<Post>;

    async fn find_post(&self, id: ObjectId) -> StoreResult<Option<Post>>;

    /// Deletes the post only when owned by `owner`; likes and comments go with it.
    async fn delete_post(&self, id: ObjectId, owner: ObjectId) -> StoreResult<bool>;

    async fn find_like(&self, user: ObjectId, post: ObjectId) -> StoreResult<Option<Like>>;

    async fn insert_like(&self, like: Like) -> StoreResult<Inserted<Like>>;

    async fn delete_like(&self, id: ObjectId) -> StoreResult<bool>;

    async fn insert_comment(&self, comment: Comment) -> StoreResult<Comment>;

    /// Removes any story owned by `story.user_id` and inserts `story` atomically.
    async fn replace_story(&self, story: Story) -> StoreResult<Story>;

    async fn list_active_stories(
        &self,
        users: &[ObjectId],
        now: OffsetDateTime,
    ) -> StoreResult<Vec<Story>>;
}
