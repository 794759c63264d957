use std::sync::Arc;

use moviecache::{
    AppState,
    cache::MovieCache,
    config::{Config, StoreBackend},
    store::{KeyValueStore, MemoryStore, RedisStore},
    tmdb::TmdbClient,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,moviecache=debug".to_string()),
        )
        .init();

    let config = Config::from_env()?;

    let http = reqwest::Client::builder()
        .user_agent("moviecache/0.1")
        .timeout(config.http_timeout)
        .build()?;

    let redis = match config.backend {
        StoreBackend::Redis => Some(RedisStore::connect(&config.store).await?),
        StoreBackend::Memory => {
            tracing::warn!("using in-process cache, entries are lost on restart");
            None
        },
    };
    let store: Arc<dyn KeyValueStore> = match &redis {
        Some(redis) => Arc::new(redis.clone()),
        None => Arc::new(MemoryStore::new()),
    };

    let tmdb = TmdbClient::new(http, config.tmdb_access_token.clone(), config.tmdb_base_url.clone());
    let cache = MovieCache::new(store, Arc::new(tmdb), config.lookup_failure);

    let app = moviecache::router(Arc::new(AppState { cache }));

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    tracing::info!(addr = %config.addr, "listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    if let Some(redis) = redis {
        redis.close();
    }
    tracing::info!("shut down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            },
            Err(err) => {
                tracing::warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            },
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
