use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::OffsetDateTime;

use super::{ContentStore, Inserted, RelationshipStore, StoreError, StoreResult};
use crate::domain::engagement::{Comment, Like};
use crate::domain::id::ObjectId;
use crate::domain::post::Post;
use crate::domain::social_graph::{Block, BlockPolicy, FollowRequest, Follower, Pair};
use crate::domain::story::Story;
use crate::domain::user::{ProfileUpdate, User};
use crate::infra::db::Db;

const FOREIGN_KEY_VIOLATION: &str = "23503";

const USER_COLUMNS: &str = "id, username, avatar, cover, name, surname, description, \
                            city, school, work, website, created_at";

#[derive(Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }
}

/// Edge rows reference `users` on both sides; a foreign key violation means
/// one of the pair is not registered.
fn edge_insert_error(err: sqlx::Error) -> StoreError {
    let missing_user = err
        .as_database_error()
        .and_then(|db_err| db_err.code())
        .is_some_and(|code| code == FOREIGN_KEY_VIOLATION);
    if missing_user {
        StoreError::UnknownUser
    } else {
        StoreError::Database(err)
    }
}

fn row_to_follower(row: &PgRow) -> StoreResult<Follower> {
    Ok(Follower {
        id: row.try_get("id")?,
        follower_id: row.try_get("follower_id")?,
        following_id: row.try_get("following_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_follow_request(row: &PgRow) -> StoreResult<FollowRequest> {
    Ok(FollowRequest {
        id: row.try_get("id")?,
        sender_id: row.try_get("sender_id")?,
        receiver_id: row.try_get("receiver_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_block(row: &PgRow) -> StoreResult<Block> {
    Ok(Block {
        id: row.try_get("id")?,
        blocker_id: row.try_get("blocker_id")?,
        blocked_id: row.try_get("blocked_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_user(row: &PgRow) -> StoreResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        avatar: row.try_get("avatar")?,
        cover: row.try_get("cover")?,
        name: row.try_get("name")?,
        surname: row.try_get("surname")?,
        description: row.try_get("description")?,
        city: row.try_get("city")?,
        school: row.try_get("school")?,
        work: row.try_get("work")?,
        website: row.try_get("website")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_post(row: &PgRow) -> StoreResult<Post> {
    Ok(Post {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        desc: row.try_get("desc")?,
        img: row.try_get("img")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_like(row: &PgRow) -> StoreResult<Like> {
    Ok(Like {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        post_id: row.try_get("post_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_story(row: &PgRow) -> StoreResult<Story> {
    Ok(Story {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        img: row.try_get("img")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

#[async_trait]
impl RelationshipStore for PgStore {
    async fn find_follower(&self, pair: Pair) -> StoreResult<Option<Follower>> {
        let row = sqlx::query(
            "SELECT id, follower_id, following_id, created_at \
             FROM followers WHERE follower_id = $1 AND following_id = $2",
        )
        .bind(pair.from)
        .bind(pair.to)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(row_to_follower).transpose()
    }

    async fn find_follow_request(&self, pair: Pair) -> StoreResult<Option<FollowRequest>> {
        let row = sqlx::query(
            "SELECT id, sender_id, receiver_id, created_at \
             FROM follow_requests WHERE sender_id = $1 AND receiver_id = $2",
        )
        .bind(pair.from)
        .bind(pair.to)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(row_to_follow_request).transpose()
    }

    async fn find_block(&self, pair: Pair) -> StoreResult<Option<Block>> {
        let row = sqlx::query(
            "SELECT id, blocker_id, blocked_id, created_at \
             FROM blocks WHERE blocker_id = $1 AND blocked_id = $2",
        )
        .bind(pair.from)
        .bind(pair.to)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(row_to_block).transpose()
    }

    async fn insert_follow_request(&self, pair: Pair) -> StoreResult<Inserted<FollowRequest>> {
        let row = sqlx::query(
            "INSERT INTO follow_requests (id, sender_id, receiver_id) \
             SELECT $1, $2, $3 \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM followers WHERE follower_id = $2 AND following_id = $3 \
             ) \
             ON CONFLICT DO NOTHING \
             RETURNING id, sender_id, receiver_id, created_at",
        )
        .bind(ObjectId::generate())
        .bind(pair.from)
        .bind(pair.to)
        .fetch_optional(self.db.pool())
        .await
        .map_err(edge_insert_error)?;

        match row {
            Some(row) => Ok(Inserted::Created(row_to_follow_request(&row)?)),
            None => Ok(Inserted::Conflict),
        }
    }

    async fn insert_block(&self, pair: Pair, policy: BlockPolicy) -> StoreResult<Inserted<Block>> {
        let mut tx = self.db.pool().begin().await?;

        let row = sqlx::query(
            "INSERT INTO blocks (id, blocker_id, blocked_id) VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING \
             RETURNING id, blocker_id, blocked_id, created_at",
        )
        .bind(ObjectId::generate())
        .bind(pair.from)
        .bind(pair.to)
        .fetch_optional(&mut *tx)
        .await
        .map_err(edge_insert_error)?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(Inserted::Conflict);
        };
        let block = row_to_block(&row)?;

        if policy == BlockPolicy::Cascade {
            sqlx::query(
                "DELETE FROM followers \
                 WHERE (follower_id = $1 AND following_id = $2) \
                    OR (follower_id = $2 AND following_id = $1)",
            )
            .bind(pair.from)
            .bind(pair.to)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "DELETE FROM follow_requests \
                 WHERE (sender_id = $1 AND receiver_id = $2) \
                    OR (sender_id = $2 AND receiver_id = $1)",
            )
            .bind(pair.from)
            .bind(pair.to)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Inserted::Created(block))
    }

    async fn delete_follower(&self, id: ObjectId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM followers WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_follow_request(&self, id: ObjectId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM follow_requests WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_block(&self, id: ObjectId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM blocks WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn accept_follow_request(
        &self,
        request: &FollowRequest,
    ) -> StoreResult<Option<Follower>> {
        let mut tx = self.db.pool().begin().await?;

        let deleted = sqlx::query("DELETE FROM follow_requests WHERE id = $1")
            .bind(request.id)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        // A no-op update makes RETURNING yield the existing edge on conflict.
        let row = sqlx::query(
            "INSERT INTO followers (id, follower_id, following_id) VALUES ($1, $2, $3) \
             ON CONFLICT (follower_id, following_id) \
             DO UPDATE SET follower_id = EXCLUDED.follower_id \
             RETURNING id, follower_id, following_id, created_at",
        )
        .bind(ObjectId::generate())
        .bind(request.sender_id)
        .bind(request.receiver_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(edge_insert_error)?;

        let follower = row_to_follower(&row)?;
        tx.commit().await?;

        Ok(Some(follower))
    }

    async fn list_follow_requests(&self, receiver: ObjectId) -> StoreResult<Vec<FollowRequest>> {
        let rows = sqlx::query(
            "SELECT id, sender_id, receiver_id, created_at \
             FROM follow_requests \
             WHERE receiver_id = $1 \
             ORDER BY created_at DESC, id DESC",
        )
        .bind(receiver)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(row_to_follow_request).collect()
    }

    async fn list_following_ids(&self, follower: ObjectId) -> StoreResult<Vec<ObjectId>> {
        let ids = sqlx::query_scalar("SELECT following_id FROM followers WHERE follower_id = $1")
            .bind(follower)
            .fetch_all(self.db.pool())
            .await?;

        Ok(ids)
    }

    async fn count_followers(&self, user: ObjectId) -> StoreResult<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM followers WHERE following_id = $1")
            .bind(user)
            .fetch_one(self.db.pool())
            .await?;

        Ok(count)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(self.db.pool()).await?;
        Ok(())
    }
}

#[async_trait]
impl ContentStore for PgStore {
    async fn insert_user(&self, user: User) -> StoreResult<Inserted<User>> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (id, username, avatar, created_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT DO NOTHING \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.avatar)
        .bind(user.created_at)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(Inserted::Created(row_to_user(&row)?)),
            None => Ok(Inserted::Conflict),
        }
    }

    async fn find_user(&self, id: ObjectId) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn update_user(&self, id: ObjectId, update: &ProfileUpdate) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!(
            "UPDATE users \
             SET cover = COALESCE($2, cover), \
                 name = COALESCE($3, name), \
                 surname = COALESCE($4, surname), \
                 description = COALESCE($5, description), \
                 city = COALESCE($6, city), \
                 school = COALESCE($7, school), \
                 work = COALESCE($8, work), \
                 website = COALESCE($9, website) \
             WHERE id = $1 \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(&update.cover)
        .bind(&update.name)
        .bind(&update.surname)
        .bind(&update.description)
        .bind(&update.city)
        .bind(&update.school)
        .bind(&update.work)
        .bind(&update.website)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn insert_post(&self, post: Post) -> StoreResult<Post> {
        let row = sqlx::query(
            "INSERT INTO posts (id, user_id, \"desc\", img, created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, user_id, \"desc\", img, created_at",
        )
        .bind(post.id)
        .bind(post.user_id)
        .bind(&post.desc)
        .bind(&post.img)
        .bind(post.created_at)
        .fetch_one(self.db.pool())
        .await?;

        row_to_post(&row)
    }

    async fn find_post(&self, id: ObjectId) -> StoreResult<Option<Post>> {
        let row = sqlx::query(
            "SELECT id, user_id, \"desc\", img, created_at FROM posts WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(row_to_post).transpose()
    }

    async fn delete_post(&self, id: ObjectId, owner: ObjectId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_like(&self, user: ObjectId, post: ObjectId) -> StoreResult<Option<Like>> {
        let row = sqlx::query(
            "SELECT id, user_id, post_id, created_at \
             FROM likes WHERE user_id = $1 AND post_id = $2",
        )
        .bind(user)
        .bind(post)
        .fetch_optional(self.db.pool())
        .await?;

        row.as_ref().map(row_to_like).transpose()
    }

    async fn insert_like(&self, like: Like) -> StoreResult<Inserted<Like>> {
        let row = sqlx::query(
            "INSERT INTO likes (id, user_id, post_id, created_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT DO NOTHING \
             RETURNING id, user_id, post_id, created_at",
        )
        .bind(like.id)
        .bind(like.user_id)
        .bind(like.post_id)
        .bind(like.created_at)
        .fetch_optional(self.db.pool())
        .await?;

        match row {
            Some(row) => Ok(Inserted::Created(row_to_like(&row)?)),
            None => Ok(Inserted::Conflict),
        }
    }

    async fn delete_like(&self, id: ObjectId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE id = $1")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_comment(&self, comment: Comment) -> StoreResult<Comment> {
        let row = sqlx::query(
            "INSERT INTO comments (id, user_id, post_id, \"desc\", created_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, user_id, post_id, \"desc\", created_at",
        )
        .bind(comment.id)
        .bind(comment.user_id)
        .bind(comment.post_id)
        .bind(&comment.desc)
        .bind(comment.created_at)
        .fetch_one(self.db.pool())
        .await?;

        Ok(Comment {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            post_id: row.try_get("post_id")?,
            desc: row.try_get("desc")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn replace_story(&self, story: Story) -> StoreResult<Story> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("DELETE FROM stories WHERE user_id = $1")
            .bind(story.user_id)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(
            "INSERT INTO stories (id, user_id, img, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, user_id, img, created_at, expires_at",
        )
        .bind(story.id)
        .bind(story.user_id)
        .bind(&story.img)
        .bind(story.created_at)
        .bind(story.expires_at)
        .fetch_one(&mut *tx)
        .await?;

        let story = row_to_story(&row)?;
        tx.commit().await?;

        Ok(story)
    }

    async fn list_active_stories(
        &self,
        users: &[ObjectId],
        now: OffsetDateTime,
    ) -> StoreResult<Vec<Story>> {
        let ids: Vec<String> = users.iter().map(ObjectId::to_hex).collect();
        let rows = sqlx::query(
            "SELECT id, user_id, img, created_at, expires_at \
             FROM stories \
             WHERE user_id = ANY($1) AND expires_at > $2 \
             ORDER BY created_at DESC",
        )
        .bind(&ids)
        .bind(now)
        .fetch_all(self.db.pool())
        .await?;

        rows.iter().map(row_to_story).collect()
    }
}
