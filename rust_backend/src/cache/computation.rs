//! Memoisation of aggregate results keyed by filter fingerprint.

use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::memory::MemoryStore;
use super::store::{CacheError, CacheStore};
use crate::config::{BaseConfig, RedisSettings};
use crate::core::{DashboardError, DashboardResult};

/// Namespace shared by every memoised result.
pub const KEY_NAMESPACE: &str = "calculations";

/// Cache key for a memoised result.
pub fn cache_key(fingerprint: &str, prefix: &str) -> String {
    format!("{}:{}:{}", KEY_NAMESPACE, fingerprint, prefix)
}

/// Connection failures are absorbed here and only ever logged.
fn unavailable(err: &CacheError) -> DashboardError {
    DashboardError::CacheUnavailable(err.to_string())
}

/// Best-effort computation cache.
///
/// The store handle is optional: with no handle every call computes. When a
/// Redis endpoint is configured but unreachable the cache runs in that
/// pass-through mode and a background task keeps trying to reconnect. Without
/// an endpoint an in-process [`MemoryStore`] is used.
pub struct ComputationCache {
    handle: RwLock<Option<Arc<dyn CacheStore>>>,
    redis: Option<RedisSettings>,
    default_ttl: Duration,
    reconnect_interval: Duration,
    /// Bumped by `clear`; results computed before a bump are not written
    generation: AtomicU64,
    /// Held shared by writes, exclusively by `clear`
    purge: tokio::sync::RwLock<()>,
    reconnector_running: AtomicBool,
    handshake: tokio::sync::Mutex<()>,
}

impl ComputationCache {
    fn with_handle(
        handle: Option<Arc<dyn CacheStore>>,
        redis: Option<RedisSettings>,
        default_ttl: Duration,
        reconnect_interval: Duration,
    ) -> Self {
        Self {
            handle: RwLock::new(handle),
            redis,
            default_ttl,
            reconnect_interval,
            generation: AtomicU64::new(0),
            purge: tokio::sync::RwLock::new(()),
            reconnector_running: AtomicBool::new(false),
            handshake: tokio::sync::Mutex::new(()),
        }
    }

    /// Cache over an arbitrary store.
    pub fn with_store(store: Arc<dyn CacheStore>, default_ttl: Duration) -> Self {
        Self::with_handle(Some(store), None, default_ttl, Duration::from_secs(10))
    }

    pub fn in_memory(default_ttl: Duration) -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), default_ttl)
    }

    /// Cache that never stores anything.
    pub fn pass_through() -> Self {
        Self::with_handle(None, None, Duration::ZERO, Duration::from_secs(10))
    }

    /// Build the cache described by the base configuration.
    pub async fn from_config(config: &BaseConfig) -> Self {
        let ttl = Duration::from_secs(config.cache.ttl_seconds);
        let interval = Duration::from_secs(config.cache.reconnect_interval_seconds.max(1));

        let Some(redis) = config.redis.clone() else {
            info!("No redis endpoint configured, caching in memory");
            let store: Arc<dyn CacheStore> = Arc::new(MemoryStore::new());
            return Self::with_handle(Some(store), None, ttl, interval);
        };

        let cache = Self::with_handle(None, Some(redis), ttl, interval);
        if !cache.try_reconnect().await {
            warn!("Computation cache unavailable, computing without cache until reconnected");
        }
        cache
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn is_connected(&self) -> bool {
        self.handle.read().is_some()
    }

    fn store(&self) -> Option<Arc<dyn CacheStore>> {
        self.handle.read().clone()
    }

    fn drop_store(&self, err: &CacheError) {
        if matches!(err, CacheError::Connection(_)) && self.redis.is_some() {
            warn!("{}; switching to pass-through", unavailable(err));
            *self.handle.write() = None;
        } else {
            debug!("Cache operation failed: {}", err);
        }
    }

    /// Current clear generation. Inputs read after this call may be memoised
    /// through [`memoize_since`](Self::memoize_since) with the returned value.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Return the cached result for `(fingerprint, prefix)` or compute and store it.
    ///
    /// Cache failures never propagate; only `compute` errors do.
    pub async fn memoize<T, F, Fut>(
        &self,
        fingerprint: &str,
        prefix: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> DashboardResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = DashboardResult<T>>,
    {
        self.memoize_since(self.generation(), fingerprint, prefix, ttl, compute)
            .await
    }

    /// Like [`memoize`](Self::memoize), but the result is only stored if the
    /// cache has not been cleared since `generation`. Callers capture the
    /// generation before reading the inputs `compute` works on.
    pub async fn memoize_since<T, F, Fut>(
        &self,
        generation: u64,
        fingerprint: &str,
        prefix: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> DashboardResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = DashboardResult<T>>,
    {
        let key = cache_key(fingerprint, prefix);
        let store = self.store();

        if let Some(store) = &store {
            match store.get(&key).await {
                Ok(Some(blob)) => match serde_json::from_slice::<T>(&blob) {
                    Ok(value) => {
                        debug!("Cache hit for key='{}'", key);
                        return Ok(value);
                    }
                    Err(e) => debug!("Ignoring undecodable cache entry '{}': {}", key, e),
                },
                Ok(None) => debug!("Cache miss for key='{}'", key),
                Err(e) => self.drop_store(&e),
            }
        }

        let value = compute().await?;

        if let Some(store) = self.store() {
            let _purge = self.purge.read().await;
            if self.generation() != generation {
                debug!("Cache cleared during computation, not storing '{}'", key);
                return Ok(value);
            }
            let ttl = ttl.unwrap_or(self.default_ttl);
            let ttl = (!ttl.is_zero()).then_some(ttl);
            let written = match serde_json::to_vec(&value) {
                Ok(blob) => store.set(&key, &blob, ttl).await,
                Err(e) => Err(CacheError::from(e)),
            };
            if let Err(e) = written {
                self.drop_store(&e);
            }
        }
        Ok(value)
    }

    /// Delete every memoised result. Returns whether all keys were removed.
    pub async fn clear(&self) -> bool {
        let _purge = self.purge.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        let Some(store) = self.store() else {
            return true;
        };
        match store.delete_prefix(&format!("{}:", KEY_NAMESPACE)).await {
            Ok(all) => {
                info!("Cleared computation cache ({}), all keys deleted: {}", store.name(), all);
                all
            }
            Err(e) => {
                self.drop_store(&e);
                false
            }
        }
    }

    /// Attempt to (re)connect to the configured endpoint.
    pub async fn try_reconnect(&self) -> bool {
        let Some(redis) = &self.redis else {
            return self.is_connected();
        };
        let _guard = self.handshake.lock().await;
        if self.is_connected() {
            return true;
        }

        match connect(redis).await {
            Ok(store) => {
                info!("Computation cache connected ({})", redis.url());
                *self.handle.write() = Some(store);
                true
            }
            Err(e) => {
                debug!("Reconnect to {} failed: {}", redis.url(), unavailable(&e));
                false
            }
        }
    }

    /// Start the background reconnector. Returns `None` if one is already running
    /// or no endpoint is configured.
    pub fn spawn_reconnector(
        self: &Arc<Self>,
        shutdown: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        if self.redis.is_none() {
            return None;
        }
        if self
            .reconnector_running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Cache reconnector already running");
            return None;
        }

        let cache = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cache.reconnect_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if !cache.is_connected() {
                            cache.try_reconnect().await;
                        }
                    }
                }
            }
            cache.reconnector_running.store(false, Ordering::SeqCst);
            debug!("Cache reconnector stopped");
        }))
    }
}

#[cfg(feature = "redis-cache")]
async fn connect(settings: &RedisSettings) -> Result<Arc<dyn CacheStore>, CacheError> {
    let store = super::redis_store::RedisStore::connect(&settings.url()).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis-cache"))]
async fn connect(settings: &RedisSettings) -> Result<Arc<dyn CacheStore>, CacheError> {
    Err(CacheError::Connection(format!(
        "built without redis support, cannot reach {}",
        settings.url()
    )))
}
