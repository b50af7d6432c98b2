use async_trait::async_trait;
use log::warn;
use std::future::Future;
use std::time::Duration;

/// Errors raised by a cache backend. Never surfaced to the user.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache connection failed: {0}")]
    Connection(String),

    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("cache codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

#[cfg(feature = "redis-cache")]
impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_io_error() || err.is_connection_refusal() {
            CacheError::Connection(err.to_string())
        } else {
            CacheError::Backend(err.to_string())
        }
    }
}

/// Key/value backend holding opaque blobs.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store `value`; `ttl` of `None` keeps it until deleted.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Delete every key starting with `prefix`. Returns whether all deletions succeeded.
    async fn delete_prefix(&self, prefix: &str) -> Result<bool, CacheError>;
}

/// Delete `keys` one at a time with `delete`. A failed deletion is logged and
/// the purge moves on; returns whether every key was removed.
#[cfg_attr(not(feature = "redis-cache"), allow(dead_code))]
pub(crate) async fn delete_each<F, Fut>(keys: Vec<String>, mut delete: F) -> bool
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, CacheError>>,
{
    let mut deleted_all = true;
    for key in keys {
        match delete(key.clone()).await {
            Ok(removed) => deleted_all &= removed,
            Err(e) => {
                warn!("Failed to delete cache key '{}': {}", key, e);
                deleted_all = false;
            }
        }
    }
    deleted_all
}
