pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use std::sync::Arc;

use crate::app::auth::TokenService;
use crate::domain::social_graph::BlockPolicy;
use crate::infra::cache::Revalidator;
use crate::infra::store::{ContentStore, RelationshipStore};

#[derive(Clone)]
pub struct AppState {
    pub relationships: Arc<dyn RelationshipStore>,
    pub content: Arc<dyn ContentStore>,
    pub revalidator: Arc<dyn Revalidator>,
    pub tokens: TokenService,
    pub admin_token: Option<String>,
    pub block_policy: BlockPolicy,
}
