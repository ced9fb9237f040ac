#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tower::ServiceExt;

use trellis::app::auth::TokenService;
use trellis::app::users::UserService;
use trellis::domain::id::ObjectId;
use trellis::domain::social_graph::{Block, BlockPolicy, FollowRequest, Follower, Pair};
use trellis::infra::cache::{NoopRevalidator, Revalidator};
use trellis::infra::store::{Inserted, MemoryStore, RelationshipStore, StoreError, StoreResult};
use trellis::AppState;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

// "0123456789abcdef0123456789abcdef" (32 bytes), test-only
const TEST_PASETO_ACCESS_KEY: [u8; 32] = *b"0123456789abcdef0123456789abcdef";
pub const TEST_ADMIN_TOKEN: &str = "test-admin-token-12345";

// ---------------------------------------------------------------------------
// TestApp
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

pub struct TestUser {
    pub id: ObjectId,
    pub username: String,
    pub access_token: String,
}

static TEST_APP: OnceCell<TestApp> = OnceCell::const_new();

/// Shared app with the default (retain) block policy and no page cache.
pub async fn app() -> &'static TestApp {
    TEST_APP
        .get_or_init(|| async { TestApp::builder().build() })
        .await
}

type WrapStore = Box<dyn FnOnce(Arc<MemoryStore>) -> Arc<dyn RelationshipStore>>;

pub struct TestAppBuilder {
    block_policy: BlockPolicy,
    revalidator: Arc<dyn Revalidator>,
    relationships: Option<WrapStore>,
}

impl TestAppBuilder {
    pub fn block_policy(mut self, policy: BlockPolicy) -> Self {
        self.block_policy = policy;
        self
    }

    pub fn revalidator(mut self, revalidator: Arc<dyn Revalidator>) -> Self {
        self.revalidator = revalidator;
        self
    }

    /// Builds the relationship store from the shared memory store, which
    /// still holds users and content.
    pub fn relationships(
        mut self,
        wrap: impl FnOnce(Arc<MemoryStore>) -> Arc<dyn RelationshipStore> + 'static,
    ) -> Self {
        self.relationships = Some(Box::new(wrap));
        self
    }

    pub fn build(self) -> TestApp {
        let store = Arc::new(MemoryStore::new());
        let relationships = match self.relationships {
            Some(wrap) => wrap(store.clone()),
            None => store.clone() as Arc<dyn RelationshipStore>,
        };

        let state = AppState {
            relationships,
            content: store.clone(),
            revalidator: self.revalidator,
            tokens: TokenService::new(TEST_PASETO_ACCESS_KEY, 15),
            admin_token: Some(TEST_ADMIN_TOKEN.to_string()),
            block_policy: self.block_policy,
        };
        let router = trellis::http::router(state.clone());

        TestApp {
            router,
            state,
            store,
        }
    }
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder {
            block_policy: BlockPolicy::Retain,
            revalidator: Arc::new(NoopRevalidator),
            relationships: None,
        }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::GET, path, None, &headers).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::POST, path, None, &headers).await
    }

    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::POST, path, Some(body), &headers).await
    }

    pub async fn patch_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::PATCH, path, Some(body), &headers)
            .await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        let mut headers = vec![];
        let auth;
        if let Some(t) = token {
            auth = format!("Bearer {}", t);
            headers.push(("Authorization", auth.as_str()));
        }
        self.request(Method::DELETE, path, None, &headers).await
    }

    /// POST with an admin token in the x-admin-token header.
    pub async fn post_admin(
        &self,
        path: &str,
        body: Value,
        admin_token: Option<&str>,
    ) -> TestResponse {
        let mut headers = vec![];
        if let Some(t) = admin_token {
            headers.push(("x-admin-token", t));
        }
        self.request(Method::POST, path, Some(body), &headers).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Registers a user through the service and issues an access token for it.
    pub async fn create_user(&self, suffix: &str) -> TestUser {
        let id = ObjectId::generate();
        let username = format!("{}_{}", suffix, &id.to_hex()[16..]);

        UserService::new(self.state.content.clone(), self.state.relationships.clone())
            .register(&id.to_string(), &username, None)
            .await
            .expect("register test user failed");

        let access_token = self
            .state
            .tokens
            .issue_access_token(id)
            .expect("issue access token failed")
            .token;

        TestUser {
            id,
            username,
            access_token,
        }
    }

    /// Sends a follow request from `from` to `to` and has `to` accept it.
    pub async fn follow(&self, from: &TestUser, to: &TestUser) {
        let resp = self
            .post(&format!("/v1/users/{}/follow", to.id), Some(&from.access_token))
            .await;
        assert_eq!(resp.status, StatusCode::OK, "follow request failed");
        let resp = self
            .post(
                &format!("/v1/follow-requests/{}/accept", from.id),
                Some(&to.access_token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK, "accept failed");
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Records every revalidated path; optionally fails each call.
#[derive(Default)]
pub struct RecordingRevalidator {
    pub paths: Mutex<Vec<String>>,
    pub fail: bool,
}

impl RecordingRevalidator {
    pub fn failing() -> Self {
        Self {
            paths: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

#[async_trait]
impl Revalidator for RecordingRevalidator {
    async fn revalidate_path(&self, path: &str) -> anyhow::Result<()> {
        self.paths.lock().unwrap().push(path.to_string());
        if self.fail {
            anyhow::bail!("page cache unavailable");
        }
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Relationship store whose every call fails.
pub struct FailingStore;

#[async_trait]
impl RelationshipStore for FailingStore {
    async fn find_follower(&self, _pair: Pair) -> StoreResult<Option<Follower>> {
        Err(StoreError::Poisoned)
    }

    async fn find_follow_request(&self, _pair: Pair) -> StoreResult<Option<FollowRequest>> {
        Err(StoreError::Poisoned)
    }

    async fn find_block(&self, _pair: Pair) -> StoreResult<Option<Block>> {
        Err(StoreError::Poisoned)
    }

    async fn insert_follow_request(&self, _pair: Pair) -> StoreResult<Inserted<FollowRequest>> {
        Err(StoreError::Poisoned)
    }

    async fn insert_block(
        &self,
        _pair: Pair,
        _policy: BlockPolicy,
    ) -> StoreResult<Inserted<Block>> {
        Err(StoreError::Poisoned)
    }

    async fn delete_follower(&self, _id: ObjectId) -> StoreResult<bool> {
        Err(StoreError::Poisoned)
    }

    async fn delete_follow_request(&self, _id: ObjectId) -> StoreResult<bool> {
        Err(StoreError::Poisoned)
    }

    async fn delete_block(&self, _id: ObjectId) -> StoreResult<bool> {
        Err(StoreError::Poisoned)
    }

    async fn accept_follow_request(
        &self,
        _request: &FollowRequest,
    ) -> StoreResult<Option<Follower>> {
        Err(StoreError::Poisoned)
    }

    async fn list_follow_requests(&self, _receiver: ObjectId) -> StoreResult<Vec<FollowRequest>> {
        Err(StoreError::Poisoned)
    }

    async fn list_following_ids(&self, _follower: ObjectId) -> StoreResult<Vec<ObjectId>> {
        Err(StoreError::Poisoned)
    }

    async fn count_followers(&self, _user: ObjectId) -> StoreResult<i64> {
        Err(StoreError::Poisoned)
    }

    async fn ping(&self) -> StoreResult<()> {
        Err(StoreError::Poisoned)
    }
}

/// How [`InterferingStore`] simulates another caller acting on the same pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interference {
    /// Every edge insert finds the edge already created.
    ConcurrentInsert,
    /// Every edge delete finds the edge already removed.
    ConcurrentDelete,
    /// Reads fail once any write has gone through.
    ReadsFailAfterWrite,
}

/// Memory store with another writer racing each call.
pub struct InterferingStore {
    inner: Arc<MemoryStore>,
    mode: Interference,
    wrote: AtomicBool,
}

impl InterferingStore {
    pub fn new(inner: Arc<MemoryStore>, mode: Interference) -> Self {
        Self {
            inner,
            mode,
            wrote: AtomicBool::new(false),
        }
    }

    fn read(&self) -> StoreResult<()> {
        if self.mode == Interference::ReadsFailAfterWrite && self.wrote.load(Ordering::SeqCst) {
            return Err(StoreError::Poisoned);
        }
        Ok(())
    }

    fn written<T>(&self, result: StoreResult<T>) -> StoreResult<T> {
        if result.is_ok() {
            self.wrote.store(true, Ordering::SeqCst);
        }
        result
    }
}

#[async_trait]
impl RelationshipStore for InterferingStore {
    async fn find_follower(&self, pair: Pair) -> StoreResult<Option<Follower>> {
        self.read()?;
        self.inner.find_follower(pair).await
    }

    async fn find_follow_request(&self, pair: Pair) -> StoreResult<Option<FollowRequest>> {
        self.read()?;
        self.inner.find_follow_request(pair).await
    }

    async fn find_block(&self, pair: Pair) -> StoreResult<Option<Block>> {
        self.read()?;
        self.inner.find_block(pair).await
    }

    async fn insert_follow_request(&self, pair: Pair) -> StoreResult<Inserted<FollowRequest>> {
        if self.mode == Interference::ConcurrentInsert {
            self.inner.insert_follow_request(pair).await?;
        }
        let result = self.inner.insert_follow_request(pair).await;
        self.written(result)
    }

    async fn insert_block(&self, pair: Pair, policy: BlockPolicy) -> StoreResult<Inserted<Block>> {
        if self.mode == Interference::ConcurrentInsert {
            self.inner.insert_block(pair, policy).await?;
        }
        let result = self.inner.insert_block(pair, policy).await;
        self.written(result)
    }

    async fn delete_follower(&self, id: ObjectId) -> StoreResult<bool> {
        if self.mode == Interference::ConcurrentDelete {
            self.inner.delete_follower(id).await?;
        }
        let result = self.inner.delete_follower(id).await;
        self.written(result)
    }

    async fn delete_follow_request(&self, id: ObjectId) -> StoreResult<bool> {
        if self.mode == Interference::ConcurrentDelete {
            self.inner.delete_follow_request(id).await?;
        }
        let result = self.inner.delete_follow_request(id).await;
        self.written(result)
    }

    async fn delete_block(&self, id: ObjectId) -> StoreResult<bool> {
        if self.mode == Interference::ConcurrentDelete {
            self.inner.delete_block(id).await?;
        }
        let result = self.inner.delete_block(id).await;
        self.written(result)
    }

    async fn accept_follow_request(
        &self,
        request: &FollowRequest,
    ) -> StoreResult<Option<Follower>> {
        let result = self.inner.accept_follow_request(request).await;
        self.written(result)
    }

    async fn list_follow_requests(&self, receiver: ObjectId) -> StoreResult<Vec<FollowRequest>> {
        self.read()?;
        self.inner.list_follow_requests(receiver).await
    }

    async fn list_following_ids(&self, follower: ObjectId) -> StoreResult<Vec<ObjectId>> {
        self.read()?;
        self.inner.list_following_ids(follower).await
    }

    async fn count_followers(&self, user: ObjectId) -> StoreResult<i64> {
        self.read()?;
        self.inner.count_followers(user).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}
