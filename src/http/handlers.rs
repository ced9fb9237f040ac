use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::app::engagement::EngagementService;
use crate::app::identity::Caller;
use crate::app::posts::PostService;
use crate::app::relationships::{RelationshipService, RequestOutcome, ToggleOutcome};
use crate::app::stories::StoryService;
use crate::app::users::{ProfileInput, UserService};
use crate::domain::engagement::CommentWithUser;
use crate::domain::post::Post;
use crate::domain::social_graph::{FollowRequest, RelationshipStatus};
use crate::domain::story::StoryWithUser;
use crate::domain::user::{Profile, PublicUser, User};
use crate::http::{AdminToken, AppError};
use crate::AppState;

const HOME_PATH: &str = "/";

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.relationships.ping().await.is_ok();
    let cache = state.revalidator.ping().await.is_ok();
    let status = if store && cache { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

fn relationship_service(state: &AppState) -> RelationshipService {
    RelationshipService::new(state.relationships.clone(), state.block_policy)
}

fn user_service(state: &AppState) -> UserService {
    UserService::new(state.content.clone(), state.relationships.clone())
}

fn profile_path(user_id: &str) -> String {
    format!("/profile/{}", user_id.to_ascii_lowercase())
}

/// Cached pages going stale is not worth failing a committed mutation over.
async fn revalidate(state: &AppState, path: &str) {
    if let Err(err) = state.revalidator.revalidate_path(path).await {
        tracing::warn!(error = ?err, path, "failed to revalidate page");
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub id: String,
    pub username: String,
    pub avatar: Option<String>,
}

pub async fn create_user(
    _admin: AdminToken,
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let user = user_service(&state)
        .register(&payload.id, &payload.username, payload.avatar)
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_profile(
    Path(username): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Profile>, AppError> {
    let profile = user_service(&state).get_profile(&username).await?;
    Ok(Json(profile))
}

pub async fn update_profile(
    caller: Caller,
    State(state): State<AppState>,
    Json(payload): Json<ProfileInput>,
) -> Result<Json<User>, AppError> {
    let user = user_service(&state).update_profile(&caller, payload).await?;
    revalidate(&state, &profile_path(&user.id.to_string())).await;
    Ok(Json(user))
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ToggleResponse {
    pub outcome: ToggleOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<RelationshipStatus>,
}

#[derive(Serialize)]
pub struct RequestResponse {
    pub outcome: RequestOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<RelationshipStatus>,
}

#[derive(Serialize)]
pub struct FollowRequestView {
    #[serde(flatten)]
    pub request: FollowRequest,
    pub sender: PublicUser,
}

/// Reads the pair back after a committed mutation. A failed read drops the
/// snapshot from the response instead of failing the request.
async fn status_after(
    service: &RelationshipService,
    caller: &Caller,
    target: &str,
) -> Option<RelationshipStatus> {
    match service.relationship_status(caller, target).await {
        Ok(status) => Some(status),
        Err(err) => {
            tracing::warn!(error = %err, target, "failed to read relationship after mutation");
            None
        }
    }
}

fn reject_conflict(outcome: ToggleOutcome) -> Result<ToggleOutcome, AppError> {
    match outcome {
        ToggleOutcome::Conflict => Err(AppError::conflict(
            "relationship changed concurrently, try again",
        )),
        outcome => Ok(outcome),
    }
}

pub async fn toggle_follow(
    Path(id): Path<String>,
    caller: Caller,
    State(state): State<AppState>,
) -> Result<Json<ToggleResponse>, AppError> {
    let service = relationship_service(&state);
    let outcome = reject_conflict(service.toggle_follow(&caller, &id).await?)?;
    revalidate(&state, &profile_path(&id)).await;

    let relationship = status_after(&service, &caller, &id).await;
    Ok(Json(ToggleResponse {
        outcome,
        relationship,
    }))
}

pub async fn toggle_block(
    Path(id): Path<String>,
    caller: Caller,
    State(state): State<AppState>,
) -> Result<Json<ToggleResponse>, AppError> {
    let service = relationship_service(&state);
    let outcome = reject_conflict(service.toggle_block(&caller, &id).await?)?;
    revalidate(&state, &profile_path(&id)).await;

    let relationship = status_after(&service, &caller, &id).await;
    Ok(Json(ToggleResponse {
        outcome,
        relationship,
    }))
}

pub async fn relationship_status(
    Path(id): Path<String>,
    caller: Caller,
    State(state): State<AppState>,
) -> Result<Json<RelationshipStatus>, AppError> {
    let relationship = relationship_service(&state)
        .relationship_status(&caller, &id)
        .await?;
    Ok(Json(relationship))
}

pub async fn list_follow_requests(
    caller: Caller,
    State(state): State<AppState>,
) -> Result<Json<ListResponse<FollowRequestView>>, AppError> {
    let requests = relationship_service(&state)
        .list_follow_requests(&caller)
        .await?;

    let users = user_service(&state);
    let mut items = Vec::with_capacity(requests.len());
    for request in requests {
        // Senders whose account is gone are skipped.
        if let Some(sender) = users.public_user(request.sender_id).await? {
            items.push(FollowRequestView { request, sender });
        }
    }

    Ok(Json(ListResponse { items }))
}

pub async fn accept_follow_request(
    Path(sender_id): Path<String>,
    caller: Caller,
    State(state): State<AppState>,
) -> Result<Json<RequestResponse>, AppError> {
    let service = relationship_service(&state);
    let outcome = service.accept_follow_request(&caller, &sender_id).await?;
    if outcome == RequestOutcome::Resolved {
        revalidate(&state, &profile_path(&sender_id)).await;
    }

    let relationship = status_after(&service, &caller, &sender_id).await;
    Ok(Json(RequestResponse {
        outcome,
        relationship,
    }))
}

pub async fn decline_follow_request(
    Path(sender_id): Path<String>,
    caller: Caller,
    State(state): State<AppState>,
) -> Result<Json<RequestResponse>, AppError> {
    let service = relationship_service(&state);
    let outcome = service.decline_follow_request(&caller, &sender_id).await?;
    if outcome == RequestOutcome::Resolved {
        revalidate(&state, &profile_path(&sender_id)).await;
    }

    let relationship = status_after(&service, &caller, &sender_id).await;
    Ok(Json(RequestResponse {
        outcome,
        relationship,
    }))
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub desc: String,
    pub img: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    pub desc: String,
}

#[derive(Serialize)]
pub struct LikeResponse {
    pub outcome: ToggleOutcome,
}

pub async fn create_post(
    caller: Caller,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    let post = PostService::new(state.content.clone())
        .add_post(&caller, &payload.desc, payload.img)
        .await?;
    revalidate(&state, HOME_PATH).await;

    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn delete_post(
    Path(id): Path<String>,
    caller: Caller,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    PostService::new(state.content.clone())
        .delete_post(&caller, &id)
        .await?;
    revalidate(&state, HOME_PATH).await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_like(
    Path(id): Path<String>,
    caller: Caller,
    State(state): State<AppState>,
) -> Result<Json<LikeResponse>, AppError> {
    let outcome = EngagementService::new(state.content.clone())
        .toggle_like(&caller, &id)
        .await?;
    if outcome == ToggleOutcome::Conflict {
        return Err(AppError::conflict("like changed concurrently, try again"));
    }

    Ok(Json(LikeResponse { outcome }))
}

pub async fn comment_post(
    Path(id): Path<String>,
    caller: Caller,
    State(state): State<AppState>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentWithUser>), AppError> {
    let comment = EngagementService::new(state.content.clone())
        .add_comment(&caller, &id, &payload.desc)
        .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

// ---------------------------------------------------------------------------
// Stories
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreateStoryRequest {
    pub img: String,
}

pub async fn create_story(
    caller: Caller,
    State(state): State<AppState>,
    Json(payload): Json<CreateStoryRequest>,
) -> Result<(StatusCode, Json<StoryWithUser>), AppError> {
    let story = StoryService::new(state.content.clone(), state.relationships.clone())
        .add_story(&caller, &payload.img)
        .await?;
    revalidate(&state, HOME_PATH).await;

    Ok((StatusCode::CREATED, Json(story)))
}

pub async fn story_feed(
    caller: Caller,
    State(state): State<AppState>,
) -> Result<Json<ListResponse<StoryWithUser>>, AppError> {
    let items = StoryService::new(state.content.clone(), state.relationships.clone())
        .story_feed(&caller)
        .await?;
    Ok(Json(ListResponse { items }))
}
