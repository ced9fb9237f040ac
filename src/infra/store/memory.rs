use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;

use super::{ContentStore, Inserted, RelationshipStore, StoreError, StoreResult};
use crate::domain::engagement::{Comment, Like};
use crate::domain::id::ObjectId;
use crate::domain::post::Post;
use crate::domain::social_graph::{Block, BlockPolicy, FollowRequest, Follower, Pair};
use crate::domain::story::Story;
use crate::domain::user::{ProfileUpdate, User};

/// Process-local store. Each call holds one lock for its whole duration, so
/// compound operations are atomic.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    users: HashMap<ObjectId, User>,
    followers: HashMap<ObjectId, Follower>,
    follow_requests: HashMap<ObjectId, FollowRequest>,
    blocks: HashMap<ObjectId, Block>,
    posts: HashMap<ObjectId, Post>,
    likes: HashMap<ObjectId, Like>,
    comments: HashMap<ObjectId, Comment>,
    stories: HashMap<ObjectId, Story>,
}

impl State {
    fn follower(&self, pair: Pair) -> Option<&Follower> {
        self.followers
            .values()
            .find(|edge| edge.follower_id == pair.from && edge.following_id == pair.to)
    }

    fn follow_request(&self, pair: Pair) -> Option<&FollowRequest> {
        self.follow_requests
            .values()
            .find(|edge| edge.sender_id == pair.from && edge.receiver_id == pair.to)
    }

    fn block(&self, pair: Pair) -> Option<&Block> {
        self.blocks
            .values()
            .find(|edge| edge.blocker_id == pair.from && edge.blocked_id == pair.to)
    }

    fn require_users(&self, pair: Pair) -> StoreResult<()> {
        if self.users.contains_key(&pair.from) && self.users.contains_key(&pair.to) {
            Ok(())
        } else {
            Err(StoreError::UnknownUser)
        }
    }

    fn drop_follow_edges(&mut self, pair: Pair) {
        let touches = |a: ObjectId, b: ObjectId| {
            (a == pair.from && b == pair.to) || (a == pair.to && b == pair.from)
        };
        self.followers
            .retain(|_, edge| !touches(edge.follower_id, edge.following_id));
        self.follow_requests
            .retain(|_, edge| !touches(edge.sender_id, edge.receiver_id));
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, State>> {
        self.state.lock().map_err(|_| StoreError::Poisoned)
    }
}

#[async_trait]
impl RelationshipStore for MemoryStore {
    async fn find_follower(&self, pair: Pair) -> StoreResult<Option<Follower>> {
        Ok(self.lock()?.follower(pair).cloned())
    }

    async fn find_follow_request(&self, pair: Pair) -> StoreResult<Option<FollowRequest>> {
        Ok(self.lock()?.follow_request(pair).cloned())
    }

    async fn find_block(&self, pair: Pair) -> StoreResult<Option<Block>> {
        Ok(self.lock()?.block(pair).cloned())
    }

    async fn insert_follow_request(&self, pair: Pair) -> StoreResult<Inserted<FollowRequest>> {
        let mut state = self.lock()?;
        state.require_users(pair)?;
        if state.follow_request(pair).is_some() || state.follower(pair).is_some() {
            return Ok(Inserted::Conflict);
        }
        let request = FollowRequest {
            id: ObjectId::generate(),
            sender_id: pair.from,
            receiver_id: pair.to,
            created_at: OffsetDateTime::now_utc(),
        };
        state.follow_requests.insert(request.id, request.clone());
        Ok(Inserted::Created(request))
    }

    async fn insert_block(&self, pair: Pair, policy: BlockPolicy) -> StoreResult<Inserted<Block>> {
        let mut state = self.lock()?;
        state.require_users(pair)?;
        if state.block(pair).is_some() {
            return Ok(Inserted::Conflict);
        }
        let block = Block {
            id: ObjectId::generate(),
            blocker_id: pair.from,
            blocked_id: pair.to,
            created_at: OffsetDateTime::now_utc(),
        };
        state.blocks.insert(block.id, block.clone());
        if policy == BlockPolicy::Cascade {
            state.drop_follow_edges(pair);
        }
        Ok(Inserted::Created(block))
    }

    async fn delete_follower(&self, id: ObjectId) -> StoreResult<bool> {
        Ok(self.lock()?.followers.remove(&id).is_some())
    }

    async fn delete_follow_request(&self, id: ObjectId) -> StoreResult<bool> {
        Ok(self.lock()?.follow_requests.remove(&id).is_some())
    }

    async fn delete_block(&self, id: ObjectId) -> StoreResult<bool> {
        Ok(self.lock()?.blocks.remove(&id).is_some())
    }

    async fn accept_follow_request(
        &self,
        request: &FollowRequest,
    ) -> StoreResult<Option<Follower>> {
        let mut state = self.lock()?;
        if state.follow_requests.remove(&request.id).is_none() {
            return Ok(None);
        }
        let pair = Pair::new(request.sender_id, request.receiver_id);
        if let Some(existing) = state.follower(pair) {
            return Ok(Some(existing.clone()));
        }
        let follower = Follower {
            id: ObjectId::generate(),
            follower_id: request.sender_id,
            following_id: request.receiver_id,
            created_at: OffsetDateTime::now_utc(),
        };
        state.followers.insert(follower.id, follower.clone());
        Ok(Some(follower))
    }

    async fn list_follow_requests(&self, receiver: ObjectId) -> StoreResult<Vec<FollowRequest>> {
        let state = self.lock()?;
        let mut requests: Vec<_> = state
            .follow_requests
            .values()
            .filter(|request| request.receiver_id == receiver)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(requests)
    }

    async fn list_following_ids(&self, follower: ObjectId) -> StoreResult<Vec<ObjectId>> {
        Ok(self
            .lock()?
            .followers
            .values()
            .filter(|edge| edge.follower_id == follower)
            .map(|edge| edge.following_id)
            .collect())
    }

    async fn count_followers(&self, user: ObjectId) -> StoreResult<i64> {
        let count = self
            .lock()?
            .followers
            .values()
            .filter(|edge| edge.following_id == user)
            .count();
        Ok(count as i64)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.lock().map(|_| ())
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn insert_user(&self, user: User) -> StoreResult<Inserted<User>> {
        let mut state = self.lock()?;
        let taken = state.users.contains_key(&user.id)
            || state.users.values().any(|u| u.username == user.username);
        if taken {
            return Ok(Inserted::Conflict);
        }
        state.users.insert(user.id, user.clone());
        Ok(Inserted::Created(user))
    }

    async fn find_user(&self, id: ObjectId) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn update_user(&self, id: ObjectId, update: &ProfileUpdate) -> StoreResult<Option<User>> {
        let mut state = self.lock()?;
        Ok(state.users.get_mut(&id).map(|user| {
            user.apply(update);
            user.clone()
        }))
    }

    async fn insert_post(&self, post: Post) -> StoreResult<Post> {
        self.lock()?.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn find_post(&self, id: ObjectId) -> StoreResult<Option<Post>> {
        Ok(self.lock()?.posts.get(&id).cloned())
    }

    async fn delete_post(&self, id: ObjectId, owner: ObjectId) -> StoreResult<bool> {
        let mut state = self.lock()?;
        let owned = state
            .posts
            .get(&id)
            .map(|post| post.user_id == owner)
            .unwrap_or(false);
        if !owned {
            return Ok(false);
        }
        state.posts.remove(&id);
        state.likes.retain(|_, like| like.post_id != id);
        state.comments.retain(|_, comment| comment.post_id != id);
        Ok(true)
    }

    async fn find_like(&self, user: ObjectId, post: ObjectId) -> StoreResult<Option<Like>> {
        Ok(self
            .lock()?
            .likes
            .values()
            .find(|like| like.user_id == user && like.post_id == post)
            .cloned())
    }

    async fn insert_like(&self, like: Like) -> StoreResult<Inserted<Like>> {
        let mut state = self.lock()?;
        let exists = state
            .likes
            .values()
            .any(|l| l.user_id == like.user_id && l.post_id == like.post_id);
        if exists {
            return Ok(Inserted::Conflict);
        }
        state.likes.insert(like.id, like.clone());
        Ok(Inserted::Created(like))
    }

    async fn delete_like(&self, id: ObjectId) -> StoreResult<bool> {
        Ok(self.lock()?.likes.remove(&id).is_some())
    }

    async fn insert_comment(&self, comment: Comment) -> StoreResult<Comment> {
        self.lock()?.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn replace_story(&self, story: Story) -> StoreResult<Story> {
        let mut state = self.lock()?;
        state
            .stories
            .retain(|_, existing| existing.user_id != story.user_id);
        state.stories.insert(story.id, story.clone());
        Ok(story)
    }

    async fn list_active_stories(
        &self,
        users: &[ObjectId],
        now: OffsetDateTime,
    ) -> StoreResult<Vec<Story>> {
        let state = self.lock()?;
        let mut stories: Vec<_> = state
            .stories
            .values()
            .filter(|story| users.contains(&story.user_id) && story.is_active(now))
            .cloned()
            .collect();
        stories.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(stories)
    }
}
