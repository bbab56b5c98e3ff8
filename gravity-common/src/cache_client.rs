//! Async key-value cache client.
//!
//! [`CacheClient`] delegates to a [`KeyValueStore`] opened lazily through a
//! [`PooledResource`]. Production services use [`RedisConnector`], backed by
//! a `deadpool-redis` pool; tests and local runs can use [`MemoryConnector`].

use crate::error::{GravityError, Result};
use crate::pool::{ConnectionState, Connector, PooledResource};
use async_trait::async_trait;
use deadpool_redis::redis::{self, AsyncCommands};
use deadpool_redis::{Pool, PoolConfig, Runtime};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Cache client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Redis connection URL
    pub url: String,
    /// Maximum number of pooled connections
    pub max_connections: usize,
    /// Decode values strictly as UTF-8 text
    pub decode_responses: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            max_connections: 50,
            decode_responses: true,
        }
    }
}

impl CacheConfig {
    /// Load configuration from `REDIS_URL` and `REDIS_MAX_CONNECTIONS`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `REDIS_MAX_CONNECTIONS` is not a number.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Ok(url) = env::var("REDIS_URL") {
            config.url = url;
        }
        if let Ok(max) = env::var("REDIS_MAX_CONNECTIONS") {
            config.max_connections = max
                .parse()
                .map_err(|_| GravityError::validation(format!("Invalid REDIS_MAX_CONNECTIONS: {max}")))?;
        }
        Ok(config)
    }

    /// Create config with custom URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Create config with custom pool size.
    #[must_use]
    pub const fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    /// Create config with custom response decoding.
    #[must_use]
    pub const fn with_decode_responses(mut self, decode: bool) -> Self {
        self.decode_responses = decode;
        self
    }
}

/// Value accepted by [`CacheClient::set`].
///
/// Only the structured case is JSON-encoded; text is stored as-is.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    /// Plain text stored verbatim
    Text(String),
    /// Structured value stored as JSON text
    Json(Value),
}

impl CacheValue {
    fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Self::Text(text) => Ok(text.into_bytes()),
            Self::Json(value) => Ok(serde_json::to_vec(&value)?),
        }
    }
}

impl From<&str> for CacheValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Value> for CacheValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Expiry in whole milliseconds. TTLs that round down to zero are rejected.
fn ttl_millis(ttl: Duration) -> Result<u64> {
    match u64::try_from(ttl.as_millis()) {
        Ok(0) => Err(GravityError::validation(format!(
            "Expiration must be at least 1ms, got {ttl:?}"
        ))),
        Ok(millis) => Ok(millis),
        Err(_) => Ok(u64::MAX),
    }
}

/// Operations the cache client delegates to a backing store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Raw value for `key`.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value`, optionally expiring after `ttl`.
    ///
    /// A `ttl` under one millisecond is a validation error.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool>;

    /// Delete keys, returning how many existed.
    async fn delete(&self, keys: &[&str]) -> Result<u64>;

    /// Whether `key` exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Increment an integer value, returning the new value.
    async fn incr_by(&self, key: &str, amount: i64) -> Result<i64>;

    /// Set a time-to-live in seconds. Returns `false` if the key is absent.
    async fn expire(&self, key: &str, seconds: i64) -> Result<bool>;

    /// Round-trip probe.
    async fn ping(&self) -> Result<()>;

    /// Release pooled connections.
    async fn close(&self);
}

/// Redis store over a `deadpool-redis` pool.
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    /// Build a pool from configuration. No connection is made until first use.
    ///
    /// # Errors
    ///
    /// Returns an external service error if the pool cannot be configured.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let mut cfg = deadpool_redis::Config::from_url(config.url.clone());
        cfg.pool = Some(PoolConfig::new(config.max_connections));
        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;

        info!(max_connections = config.max_connections, "Redis pool created");
        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        let value: Option<Vec<u8>> = conn.get(key).await?;
        debug!(key, hit = value.is_some(), "Redis GET");
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        let millis = ttl.map(ttl_millis).transpose()?;
        let mut conn = self.conn().await?;
        match millis {
            Some(millis) => conn.pset_ex::<_, _, ()>(key, value, millis).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        debug!(key, ?ttl, "Redis SET");
        Ok(true)
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        Ok(conn.del(keys).await?)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        Ok(conn.exists(key).await?)
    }

    async fn incr_by(&self, key: &str, amount: i64) -> Result<i64> {
        let mut conn = self.conn().await?;
        Ok(conn.incr(key, amount).await?)
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<bool> {
        let mut conn = self.conn().await?;
        Ok(conn.expire(key, seconds).await?)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let _pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close();
    }
}

/// Connector producing [`RedisStore`] handles.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    config: CacheConfig,
}

impl RedisConnector {
    /// Connector for the given configuration.
    #[must_use]
    pub const fn new(config: CacheConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for RedisConnector {
    type Handle = RedisStore;

    fn name(&self) -> &'static str {
        "redis"
    }

    async fn open(&self) -> Result<RedisStore> {
        RedisStore::new(&self.config)
    }

    async fn ping(&self, handle: &RedisStore) -> Result<()> {
        handle.ping().await
    }

    async fn close(&self, handle: &RedisStore) {
        handle.close().await;
    }
}

/// In-memory entry with optional expiry.
struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

type MemoryMap = Arc<RwLock<HashMap<String, MemoryEntry>>>;

/// Process-local store with TTL support.
///
/// Every handle opened from the same [`MemoryConnector`] shares one map, so
/// data survives disconnect/reconnect the way it would on a server.
pub struct MemoryStore {
    entries: MemoryMap,
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().await;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<bool> {
        let millis = ttl.map(ttl_millis).transpose()?;
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value,
                expires_at: millis.and_then(|ms| now.checked_add(Duration::from_millis(ms))),
            },
        );
        entries.retain(|_, e| e.is_live(now));
        Ok(true)
    }

    async fn delete(&self, keys: &[&str]) -> Result<u64> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let mut removed = 0;
        for key in keys {
            if entries.remove(*key).is_some_and(|e| e.is_live(now)) {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).is_some_and(|e| e.is_live(Instant::now())))
    }

    async fn incr_by(&self, key: &str, amount: i64) -> Result<i64> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();

        let (current, expires_at) = match entries.get(key).filter(|e| e.is_live(now)) {
            Some(entry) => {
                let current = std::str::from_utf8(&entry.value)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or_else(|| GravityError::external("value is not an integer or out of range"))?;
                (current, entry.expires_at)
            }
            None => (0, None),
        };

        let next = current
            .checked_add(amount)
            .ok_or_else(|| GravityError::external("increment or decrement would overflow"))?;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: next.to_string().into_bytes(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        if !entries.get(key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }

        match u64::try_from(seconds) {
            Ok(secs) if secs > 0 => {
                if let Some(entry) = entries.get_mut(key) {
                    entry.expires_at = Some(now + Duration::from_secs(secs));
                }
            }
            _ => {
                entries.remove(key);
            }
        }
        Ok(true)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) {}
}

/// Connector producing [`MemoryStore`] handles over one shared map.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    entries: MemoryMap,
}

impl MemoryConnector {
    /// Connector with an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Handle = MemoryStore;

    fn name(&self) -> &'static str {
        "memory"
    }

    async fn open(&self) -> Result<MemoryStore> {
        Ok(MemoryStore {
            entries: Arc::clone(&self.entries),
        })
    }

    async fn ping(&self, handle: &MemoryStore) -> Result<()> {
        handle.ping().await
    }

    async fn close(&self, handle: &MemoryStore) {
        handle.close().await;
    }
}

/// Async cache client with lazy connection.
///
/// # Examples
///
/// ```
/// use gravity_common::CacheClient;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let cache = CacheClient::in_memory();
/// cache.set_json("user:1", &json!({"name": "ada"}), None).await?;
/// let user: Option<serde_json::Value> = cache.get_json("user:1").await?;
/// assert_eq!(user, Some(json!({"name": "ada"})));
/// # Ok::<(), gravity_common::GravityError>(())
/// # }).unwrap();
/// ```
pub struct CacheClient<C: Connector = RedisConnector> {
    config: CacheConfig,
    resource: PooledResource<C>,
}

impl CacheClient<RedisConnector> {
    /// Redis-backed client. Nothing is opened until the first operation.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        let connector = RedisConnector::new(config.clone());
        Self::with_connector(config, connector)
    }
}

impl CacheClient<MemoryConnector> {
    /// Client over a fresh in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_connector(CacheConfig::default(), MemoryConnector::new())
    }
}

impl<C> CacheClient<C>
where
    C: Connector,
    C::Handle: KeyValueStore,
{
    /// Client over an arbitrary connector.
    #[must_use]
    pub fn with_connector(config: CacheConfig, connector: C) -> Self {
        Self {
            config,
            resource: PooledResource::new(connector),
        }
    }

    /// Client configuration.
    #[must_use]
    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Open the pooled handle. No-op if already connected.
    ///
    /// # Errors
    ///
    /// Returns an external service error if the pool cannot be created.
    pub async fn connect(&self) -> Result<()> {
        self.resource.connect().await
    }

    /// Release the pooled handle. Idempotent.
    pub async fn disconnect(&self) {
        self.resource.disconnect().await;
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ConnectionState {
        self.resource.state().await
    }

    /// Raw bytes stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an external service error if the store fails.
    pub async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.resource.handle().await?.get(key).await
    }

    /// Text stored under `key`.
    ///
    /// With `decode_responses` enabled invalid UTF-8 is an error; otherwise
    /// invalid sequences are replaced.
    ///
    /// # Errors
    ///
    /// Returns an external service error if the store fails, or a validation
    /// error for undecodable values.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(bytes) = self.get_bytes(key).await? else {
            return Ok(None);
        };

        if self.config.decode_responses {
            String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| GravityError::validation(format!("Value for {key} is not UTF-8: {e}")))
        } else {
            Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
        }
    }

    /// Store a value with optional expiration.
    ///
    /// # Errors
    ///
    /// Returns a validation error for an expiration under one millisecond, or
    /// an external service error if the store fails.
    pub async fn set(
        &self,
        key: &str,
        value: impl Into<CacheValue>,
        expire: Option<Duration>,
    ) -> Result<bool> {
        let bytes = value.into().into_bytes()?;
        self.resource.handle().await?.set(key, bytes, expire).await
    }

    /// Delete keys, returning the number removed.
    ///
    /// # Errors
    ///
    /// Returns an external service error if the store fails.
    pub async fn delete(&self, keys: &[&str]) -> Result<u64> {
        self.resource.handle().await?.delete(keys).await
    }

    /// Whether `key` exists.
    ///
    /// # Errors
    ///
    /// Returns an external service error if the store fails.
    pub async fn exists(&self, key: &str) -> Result<bool> {
        self.resource.handle().await?.exists(key).await
    }

    /// Increment `key` by `amount`, returning the new value.
    ///
    /// # Errors
    ///
    /// Returns an external service error if the store fails or the value is
    /// not an integer.
    pub async fn incr(&self, key: &str, amount: i64) -> Result<i64> {
        self.resource.handle().await?.incr_by(key, amount).await
    }

    /// Set expiration on `key`.
    ///
    /// # Errors
    ///
    /// Returns an external service error if the store fails.
    pub async fn expire(&self, key: &str, seconds: i64) -> Result<bool> {
        self.resource.handle().await?.expire(key, seconds).await
    }

    /// Decode a JSON value stored under `key`.
    ///
    /// Missing keys and values that fail to decode both yield `None`.
    ///
    /// # Errors
    ///
    /// Returns an external service error if the store fails.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(bytes) = self.get_bytes(key).await? else {
            return Ok(None);
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                debug!(key, error = %e, "Cached value is not valid JSON");
                Ok(None)
            }
        }
    }

    /// Encode `value` as JSON and store it.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `value` cannot be serialized, or an
    /// external service error if the store fails.
    pub async fn set_json<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        expire: Option<Duration>,
    ) -> Result<bool> {
        let text = serde_json::to_string(value)?;
        self.set(key, CacheValue::Text(text), expire).await
    }

    /// Ping the store. Never fails; errors are reported as `false`.
    pub async fn health_check(&self) -> bool {
        self.resource.health_check().await
    }
}
