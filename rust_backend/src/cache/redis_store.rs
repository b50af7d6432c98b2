use async_trait::async_trait;
use log::debug;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;

use super::store::{delete_each, CacheError, CacheStore};

/// Store backed by a Redis endpoint over one multiplexed connection.
pub struct RedisStore {
    connection: MultiplexedConnection,
}

impl RedisStore {
    /// Open a connection and check it with `PING`.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client =
            redis::Client::open(url).map_err(|e| CacheError::Connection(e.to_string()))?;
        let mut connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut connection)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;
        debug!("Redis answered {} at {}", pong, url);
        Ok(Self { connection })
    }
}

#[async_trait]
impl CacheStore for RedisStore {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        match ttl {
            Some(ttl) => {
                let seconds = ttl.as_secs().max(1);
                let _: () = conn.set_ex(key, value, seconds).await?;
            }
            None => {
                let _: () = conn.set(key, value).await?;
            }
        }
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection.clone();
        let keys: Vec<String> = conn.keys(format!("{}*", prefix)).await?;
        debug!("Deleting {} keys with prefix '{}'", keys.len(), prefix);

        let deleted_all = delete_each(keys, |key| {
            let mut conn = conn.clone();
            async move {
                let removed: i64 = conn.del(&key).await?;
                Ok::<_, CacheError>(removed > 0)
            }
        })
        .await;
        Ok(deleted_all)
    }
}
