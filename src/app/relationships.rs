//! Follow, follow-request and block transitions for an ordered pair of users.
//!
//! For caller `A` and target `B` the follow state is one of `None`,
//! `Requested` or `Following`. Every new follow starts as a pending request
//! that `B` accepts or declines. Blocks are tracked independently; whether
//! creating one clears follow edges is decided by [`BlockPolicy`].

use serde::Serialize;
use std::sync::Arc;

use crate::app::error::{parse_id, store_failure, ServiceError, ServiceResult};
use crate::app::identity::{require_caller, IdentityProvider};
use crate::domain::social_graph::{BlockPolicy, FollowRequest, Pair, RelationshipStatus};
use crate::infra::store::{Inserted, RelationshipStore};

const TARGET: &str = "user id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToggleOutcome {
    Created,
    Removed,
    /// A concurrent call created or removed the same edge first.
    Conflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestOutcome {
    Resolved,
    NoPendingRequest,
}

#[derive(Clone)]
pub struct RelationshipService {
    store: Arc<dyn RelationshipStore>,
    block_policy: BlockPolicy,
}

impl RelationshipService {
    pub fn new(store: Arc<dyn RelationshipStore>, block_policy: BlockPolicy) -> Self {
        Self {
            store,
            block_policy,
        }
    }

    /// Unfollows, withdraws a pending request, or sends a new request,
    /// depending on the current state.
    pub async fn toggle_follow(
        &self,
        identity: &dyn IdentityProvider,
        target: &str,
    ) -> ServiceResult<ToggleOutcome> {
        let pair = target_pair(identity, target)?;

        let follower = self
            .store
            .find_follower(pair)
            .await
            .map_err(store_failure("find follower"))?;
        if let Some(edge) = follower {
            let deleted = self
                .store
                .delete_follower(edge.id)
                .await
                .map_err(store_failure("delete follower"))?;
            if !deleted {
                tracing::warn!(caller_id = %pair.from, target_id = %pair.to, "follow state changed concurrently");
                return Ok(ToggleOutcome::Conflict);
            }
            tracing::info!(caller_id = %pair.from, target_id = %pair.to, "unfollowed user");
            return Ok(ToggleOutcome::Removed);
        }

        let request = self
            .store
            .find_follow_request(pair)
            .await
            .map_err(store_failure("find follow request"))?;
        if let Some(request) = request {
            let deleted = self
                .store
                .delete_follow_request(request.id)
                .await
                .map_err(store_failure("delete follow request"))?;
            if !deleted {
                tracing::warn!(caller_id = %pair.from, target_id = %pair.to, "follow state changed concurrently");
                return Ok(ToggleOutcome::Conflict);
            }
            tracing::info!(caller_id = %pair.from, target_id = %pair.to, "withdrew follow request");
            return Ok(ToggleOutcome::Removed);
        }

        let blocked = self
            .store
            .find_block(pair.reversed())
            .await
            .map_err(store_failure("find block"))?;
        if blocked.is_some() {
            return Err(ServiceError::Blocked("user is not accepting follow requests from you"));
        }

        let inserted = self
            .store
            .insert_follow_request(pair)
            .await
            .map_err(store_failure("insert follow request"))?;
        match inserted {
            Inserted::Created(_) => {
                tracing::info!(caller_id = %pair.from, target_id = %pair.to, "sent follow request");
                Ok(ToggleOutcome::Created)
            }
            Inserted::Conflict => {
                tracing::warn!(caller_id = %pair.from, target_id = %pair.to, "follow state changed concurrently");
                Ok(ToggleOutcome::Conflict)
            }
        }
    }

    pub async fn toggle_block(
        &self,
        identity: &dyn IdentityProvider,
        target: &str,
    ) -> ServiceResult<ToggleOutcome> {
        let pair = target_pair(identity, target)?;

        let block = self
            .store
            .find_block(pair)
            .await
            .map_err(store_failure("find block"))?;
        if let Some(block) = block {
            let deleted = self
                .store
                .delete_block(block.id)
                .await
                .map_err(store_failure("delete block"))?;
            if !deleted {
                tracing::warn!(caller_id = %pair.from, target_id = %pair.to, "block state changed concurrently");
                return Ok(ToggleOutcome::Conflict);
            }
            tracing::info!(caller_id = %pair.from, target_id = %pair.to, "unblocked user");
            return Ok(ToggleOutcome::Removed);
        }

        let inserted = self
            .store
            .insert_block(pair, self.block_policy)
            .await
            .map_err(store_failure("insert block"))?;
        match inserted {
            Inserted::Created(_) => {
                tracing::info!(
                    caller_id = %pair.from,
                    target_id = %pair.to,
                    policy = ?self.block_policy,
                    "blocked user"
                );
                Ok(ToggleOutcome::Created)
            }
            Inserted::Conflict => {
                tracing::warn!(caller_id = %pair.from, target_id = %pair.to, "block state changed concurrently");
                Ok(ToggleOutcome::Conflict)
            }
        }
    }

    /// Caller accepts the request `sender` sent them; `sender` then follows the caller.
    pub async fn accept_follow_request(
        &self,
        identity: &dyn IdentityProvider,
        sender: &str,
    ) -> ServiceResult<RequestOutcome> {
        let request_pair = target_pair(identity, sender)?.reversed();

        let request = self
            .store
            .find_follow_request(request_pair)
            .await
            .map_err(store_failure("find follow request"))?;
        let Some(request) = request else {
            return Ok(RequestOutcome::NoPendingRequest);
        };

        let accepted = self
            .store
            .accept_follow_request(&request)
            .await
            .map_err(store_failure("accept follow request"))?;
        match accepted {
            Some(_) => {
                tracing::info!(
                    caller_id = %request.receiver_id,
                    sender_id = %request.sender_id,
                    "accepted follow request"
                );
                Ok(RequestOutcome::Resolved)
            }
            None => Ok(RequestOutcome::NoPendingRequest),
        }
    }

    pub async fn decline_follow_request(
        &self,
        identity: &dyn IdentityProvider,
        sender: &str,
    ) -> ServiceResult<RequestOutcome> {
        let request_pair = target_pair(identity, sender)?.reversed();

        let request = self
            .store
            .find_follow_request(request_pair)
            .await
            .map_err(store_failure("find follow request"))?;
        let Some(request) = request else {
            return Ok(RequestOutcome::NoPendingRequest);
        };

        let deleted = self
            .store
            .delete_follow_request(request.id)
            .await
            .map_err(store_failure("delete follow request"))?;
        if deleted {
            tracing::info!(
                caller_id = %request.receiver_id,
                sender_id = %request.sender_id,
                "declined follow request"
            );
            Ok(RequestOutcome::Resolved)
        } else {
            Ok(RequestOutcome::NoPendingRequest)
        }
    }

    /// Edges between the caller and `target`, read fresh from the store.
    pub async fn relationship_status(
        &self,
        identity: &dyn IdentityProvider,
        target: &str,
    ) -> ServiceResult<RelationshipStatus> {
        let caller = require_caller(identity)?;
        let target = parse_id(TARGET, target)?;
        if caller == target {
            return Ok(RelationshipStatus::default());
        }
        let pair = Pair::new(caller, target);

        let (following, requested, followed_by, blocking, blocked_by) = futures::try_join!(
            self.store.find_follower(pair),
            self.store.find_follow_request(pair),
            self.store.find_follower(pair.reversed()),
            self.store.find_block(pair),
            self.store.find_block(pair.reversed()),
        )
        .map_err(store_failure("relationship status"))?;

        Ok(RelationshipStatus {
            is_following: following.is_some(),
            is_requested: requested.is_some(),
            is_followed_by: followed_by.is_some(),
            is_blocking: blocking.is_some(),
            is_blocked_by: blocked_by.is_some(),
        })
    }

    /// Pending requests addressed to the caller, newest first.
    pub async fn list_follow_requests(
        &self,
        identity: &dyn IdentityProvider,
    ) -> ServiceResult<Vec<FollowRequest>> {
        let caller = require_caller(identity)?;
        self.store
            .list_follow_requests(caller)
            .await
            .map_err(store_failure("list follow requests"))
    }
}

fn target_pair(identity: &dyn IdentityProvider, target: &str) -> ServiceResult<Pair> {
    let caller = require_caller(identity)?;
    let target = parse_id(TARGET, target)?;
    if caller == target {
        return Err(ServiceError::invalid(TARGET, "cannot target yourself"));
    }
    Ok(Pair::new(caller, target))
}
