use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/users", post(handlers::create_user))
        // The segment is a username; axum needs the same parameter name as
        // the `/users/:id/...` routes merged alongside.
        .route("/users/:id", get(handlers::get_profile))
        .route("/account/profile", patch(handlers::update_profile))
}

pub fn relationships() -> Router<AppState> {
    Router::new()
        .route("/users/:id/follow", post(handlers::toggle_follow))
        .route("/users/:id/block", post(handlers::toggle_block))
        .route("/users/:id/relationship", get(handlers::relationship_status))
        .route("/follow-requests", get(handlers::list_follow_requests))
        .route(
            "/follow-requests/:sender_id/accept",
            post(handlers::accept_follow_request),
        )
        .route(
            "/follow-requests/:sender_id/decline",
            post(handlers::decline_follow_request),
        )
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/posts", post(handlers::create_post))
        .route("/posts/:id", delete(handlers::delete_post))
        .route("/posts/:id/like", post(handlers::toggle_like))
        .route("/posts/:id/comments", post(handlers::comment_post))
}

pub fn stories() -> Router<AppState> {
    Router::new()
        .route("/stories", post(handlers::create_story))
        .route("/stories", get(handlers::story_feed))
}
