use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::Context;

use crate::cache::LookupFailurePolicy;

pub const DEFAULT_TMDB_BASE_URL: &str = "https://api.themoviedb.org/3";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StoreBackend {
    Redis,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("unknown cache backend {other:?}, expected redis or memory"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub addr: String,
    pub password: Option<String>,
    pub db: i64,
    pub pool_size: usize,
    pub timeout: Duration,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub tmdb_access_token: String,
    pub tmdb_base_url: String,
    pub http_timeout: Duration,
    pub backend: StoreBackend,
    pub store: StoreConfig,
    pub lookup_failure: LookupFailurePolicy,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let host = get("HOST", "0.0.0.0");
        let port: u16 = get("PORT", "8080").parse().context("PORT")?;

        let tmdb_access_token =
            var("TMDB_ACCESS_TOKEN").or_else(|| var("TOKEN")).unwrap_or_default();
        let tmdb_base_url = get("TMDB_BASE_URL", DEFAULT_TMDB_BASE_URL);
        let http_timeout_secs: u64 =
            get("HTTP_TIMEOUT_SECS", "30").parse().context("HTTP_TIMEOUT_SECS")?;

        let backend: StoreBackend = get("CACHE_BACKEND", "redis").parse()?;
        let lookup_failure: LookupFailurePolicy =
            get("CACHE_LOOKUP_FAILURE", "fallthrough").parse()?;

        let password = var("REDIS_PASSWORD").filter(|p| !p.is_empty());
        let db: i64 = get("REDIS_DB", "0").parse().context("REDIS_DB")?;
        let pool_size: usize = get("REDIS_POOL_SIZE", "16").parse().context("REDIS_POOL_SIZE")?;
        let timeout_ms: u64 = get("REDIS_TIMEOUT_MS", "5000").parse().context("REDIS_TIMEOUT_MS")?;

        Ok(Self {
            addr: format!("{host}:{port}").parse().context("HOST/PORT")?,
            tmdb_access_token,
            tmdb_base_url,
            http_timeout: Duration::from_secs(http_timeout_secs),
            backend,
            store: StoreConfig {
                addr: get("REDIS_ADDR", "localhost:6379"),
                password,
                db,
                pool_size: pool_size.max(1),
                timeout: Duration::from_millis(timeout_ms),
            },
            lookup_failure,
        })
    }
}
