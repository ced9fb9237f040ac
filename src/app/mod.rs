pub mod auth;
pub mod engagement;
pub mod error;
pub mod identity;
pub mod posts;
pub mod relationships;
pub mod stories;
pub mod users;
