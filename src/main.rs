use axum::http::HeaderName;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trellis::app::auth::TokenService;
use trellis::config::{AppConfig, StoreBackend};
use trellis::infra::cache::{NoopRevalidator, RedisCache, Revalidator};
use trellis::infra::db::Db;
use trellis::infra::store::{ContentStore, MemoryStore, PgStore, RelationshipStore};
use trellis::AppState;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let mut db = None;
    let (relationships, content): (Arc<dyn RelationshipStore>, Arc<dyn ContentStore>) =
        match config.store_backend {
            StoreBackend::Postgres => {
                let pool = Db::connect(&config).await?;
                db = Some(pool.clone());
                let store = Arc::new(PgStore::new(pool));
                (store.clone(), store)
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory store, data will not survive a restart");
                let store = Arc::new(MemoryStore::new());
                (store.clone(), store)
            }
        };

    let revalidator: Arc<dyn Revalidator> = match &config.redis_url {
        Some(redis_url) => Arc::new(RedisCache::connect(redis_url).await?),
        None => {
            tracing::info!("REDIS_URL not set, page revalidation disabled");
            Arc::new(NoopRevalidator)
        }
    };

    let state = AppState {
        relationships,
        content,
        revalidator,
        tokens: TokenService::new(config.paseto_access_key, config.access_ttl_minutes),
        admin_token: config.admin_token.clone(),
        block_policy: config.block_policy,
    };

    let app: Router = trellis::http::router(state)
        .layer(RequestBodyLimitLayer::new(config.body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER))
        .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid));

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!(
        addr = %config.http_addr,
        backend = ?config.store_backend,
        block_policy = ?config.block_policy,
        "listening"
    );

    let app = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(db) = db {
        db.close().await;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
