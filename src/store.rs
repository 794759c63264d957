use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::{Pool, PoolConfig, Runtime, Timeouts};
use redis::AsyncCommands;
use tracing::{debug, info, warn};

use crate::{config::StoreConfig, error::StoreError};

/// String key/value capability backing the movie cache.
///
/// `get` returns `Ok(None)` for an absent key so callers can tell a miss apart
/// from a store failure. `set` overwrites unconditionally and never expires.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    /// Builds a pool from `config` and pings the server before returning.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut cfg = deadpool_redis::Config::from_url(redis_url(config));
        let mut pool_cfg = PoolConfig::new(config.pool_size);
        pool_cfg.timeouts = Timeouts {
            wait: Some(config.timeout),
            create: Some(config.timeout),
            recycle: Some(config.timeout),
        };
        cfg.pool = Some(pool_cfg);

        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;

        info!(addr = %config.addr, db = config.db, "pinging redis");
        let mut conn = pool.get().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!(addr = %config.addr, "connected to redis");

        Ok(Self { pool })
    }

    /// Wraps a pool that was configured elsewhere. No connectivity check is made.
    pub fn from_pool(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn close(&self) {
        info!("closing redis pool");
        self.pool.close();
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        debug!(key = %key, "redis GET");
        let result = async {
            let mut conn = self.pool.get().await?;
            let value: Option<String> = conn.get(key).await?;
            Ok::<_, StoreError>(value)
        }
        .await;

        if let Err(err) = &result {
            warn!(key = %key, error = %err, "redis GET failed");
        }
        result
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        debug!(key = %key, bytes = value.len(), "redis SET");
        let result = async {
            let mut conn = self.pool.get().await?;
            conn.set::<_, _, ()>(key, value).await?;
            Ok::<_, StoreError>(())
        }
        .await;

        if let Err(err) = &result {
            warn!(key = %key, error = %err, "redis SET failed");
        }
        result
    }
}

fn redis_url(config: &StoreConfig) -> String {
    match config.password.as_deref() {
        Some(password) => format!(
            "redis://:{}@{}/{}",
            urlencoding::encode(password),
            config.addr,
            config.db
        ),
        None => format!("redis://{}/{}", config.addr, config.db),
    }
}

/// In-process store with the same semantics as Redis. Used when no Redis is
/// configured and by tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
