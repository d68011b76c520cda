use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;

use super::{StoreError, TokenBlacklist};

/// Revocation set backed by Redis. Each entry lives exactly as long as the
/// token it revokes, so the set stays bounded without a sweeper.
#[derive(Clone)]
pub struct RedisTokenBlacklist {
    redis: ConnectionManager,
}

impl RedisTokenBlacklist {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }

    fn key(jti: &str) -> String {
        format!("token_blacklist:{}", jti)
    }
}

#[async_trait]
impl TokenBlacklist for RedisTokenBlacklist {
    async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<bool, StoreError> {
        let mut conn = self.redis.clone();
        let ttl_seconds = (expires_at - Utc::now()).num_seconds().max(1);

        // NX: only the first revocation gets an OK reply, later ones get nil
        let reply: Option<String> = redis::cmd("SET")
            .arg(Self::key(jti))
            .arg(Utc::now().timestamp())
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .context("Failed to record revoked token")?;

        Ok(reply.is_some())
    }

    async fn is_revoked(&self, jti: &str) -> Result<bool, StoreError> {
        let mut conn = self.redis.clone();

        let exists: bool = redis::cmd("EXISTS")
            .arg(Self::key(jti))
            .query_async(&mut conn)
            .await
            .context("Failed to query revoked token")?;

        Ok(exists)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();

        redis::cmd("PING")
            .query_async::<()>(&mut conn)
            .await
            .context("Redis ping failed")?;

        Ok(())
    }
}
