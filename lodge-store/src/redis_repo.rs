use async_trait::async_trait;
use lodge_core::{CoreError, CoreResult, ReservationCache, SessionCacheFactory};
use redis::{AsyncCommands, RedisResult};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
    session_ttl_seconds: u64,
}

impl RedisClient {
    pub async fn new(
        connection_string: &str,
        session_ttl_seconds: u64,
    ) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client, session_ttl_seconds })
    }

    // Hash operations for per-session reservation caches

    pub async fn hset_session_field(
        &self,
        session_id: &str,
        field: &str,
        value: &str,
    ) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("session:{}", session_id);
        let _: () = redis::pipe()
            .atomic()
            .hset(&key, field, value)
            .ignore()
            .expire(&key, self.session_ttl_seconds as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn hget_session_field(
        &self,
        session_id: &str,
        field: &str,
    ) -> RedisResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("session:{}", session_id);
        conn.hget(key, field).await
    }

    pub async fn hdel_session_field(&self, session_id: &str, field: &str) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("session:{}", session_id);
        conn.hdel(key, field).await
    }

    // High-demand flags

    pub async fn set_high_demand(
        &self,
        event_id: &str,
        ticket_definition_id: &str,
    ) -> RedisResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("demand:{}:{}", event_id, ticket_definition_id);
        conn.set::<_, _, ()>(key, 1).await?;
        info!("High demand flagged: {}/{}", event_id, ticket_definition_id);
        Ok(())
    }

    pub async fn is_high_demand(
        &self,
        event_id: &str,
        ticket_definition_id: &str,
    ) -> RedisResult<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = format!("demand:{}:{}", event_id, ticket_definition_id);
        conn.exists(key).await
    }
}

/// Reservation cache entries for one session, stored as fields of
/// `session:<id>`.
pub struct RedisSessionCache {
    client: RedisClient,
    session_id: String,
}

fn cache_error(e: redis::RedisError) -> CoreError {
    CoreError::CacheError(e.to_string())
}

#[async_trait]
impl ReservationCache for RedisSessionCache {
    async fn get(&self, key: &str) -> CoreResult<Option<String>> {
        self.client.hget_session_field(&self.session_id, key).await.map_err(cache_error)
    }

    async fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        self.client.hset_session_field(&self.session_id, key, value).await.map_err(cache_error)
    }

    async fn remove(&self, key: &str) -> CoreResult<()> {
        self.client.hdel_session_field(&self.session_id, key).await.map_err(cache_error)
    }
}

impl SessionCacheFactory for RedisClient {
    fn session(&self, session_id: &str) -> Arc<dyn ReservationCache> {
        Arc::new(RedisSessionCache {
            client: self.clone(),
            session_id: session_id.to_string(),
        })
    }
}
