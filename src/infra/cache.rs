use anyhow::Result;
use async_trait::async_trait;
use redis::Client;

const PAGE_KEY_PREFIX: &str = "page:";
const REVALIDATE_CHANNEL: &str = "revalidate";

/// Invalidates cached renderings of a page after a mutation.
#[async_trait]
pub trait Revalidator: Send + Sync {
    async fn revalidate_path(&self, path: &str) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Revalidator for RedisCache {
    /// Drops the cached page and announces the path to renderers holding their own copy.
    async fn revalidate_path(&self, path: &str) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::pipe()
            .del(format!("{}{}", PAGE_KEY_PREFIX, path))
            .ignore()
            .publish(REVALIDATE_CHANNEL, path)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

/// Used when no page cache is configured.
#[derive(Clone, Default)]
pub struct NoopRevalidator;

#[async_trait]
impl Revalidator for NoopRevalidator {
    async fn revalidate_path(&self, path: &str) -> Result<()> {
        tracing::debug!(path, "page cache disabled, skipping revalidation");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
