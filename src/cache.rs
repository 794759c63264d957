use std::{str::FromStr, sync::Arc};

use tracing::{debug, info, warn};

use crate::{
    error::{AppError, AppResult},
    models::{Movie, MovieList},
    store::KeyValueStore,
    tmdb::MovieProvider,
};

/// What `MovieCache::movie` does when the store lookup itself fails (as opposed
/// to reporting the key absent).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum LookupFailurePolicy {
    /// Treat the failure as a miss and go to the provider.
    #[default]
    FallThrough,
    /// Return the store error without contacting the provider.
    FailFast,
}

impl FromStr for LookupFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fallthrough" | "fall-through" => Ok(LookupFailurePolicy::FallThrough),
            "fail" | "failfast" | "fail-fast" => Ok(LookupFailurePolicy::FailFast),
            other => anyhow::bail!("unknown lookup failure policy {other:?}"),
        }
    }
}

/// Cache-aside access to movies: reads go through the store and fall back to the
/// provider, saves go straight to the store, listings go straight to the provider.
#[derive(Clone)]
pub struct MovieCache {
    store: Arc<dyn KeyValueStore>,
    provider: Arc<dyn MovieProvider>,
    on_lookup_failure: LookupFailurePolicy,
}

impl MovieCache {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn MovieProvider>,
        on_lookup_failure: LookupFailurePolicy,
    ) -> Self {
        Self { store, provider, on_lookup_failure }
    }

    pub async fn movie(&self, id: &str) -> AppResult<Movie> {
        debug!(id = %id, "looking up movie in cache");
        match self.store.get(id).await {
            Ok(Some(cached)) if !cached.is_empty() => {
                debug!(id = %id, "cache hit");
                return serde_json::from_str(&cached).map_err(|err| {
                    warn!(id = %id, error = %err, "cached movie is not valid JSON");
                    AppError::from(err)
                });
            },
            Ok(_) => debug!(id = %id, "cache miss"),
            Err(err) => match self.on_lookup_failure {
                LookupFailurePolicy::FallThrough => {
                    warn!(id = %id, error = %err, "cache lookup failed, treating as miss");
                },
                LookupFailurePolicy::FailFast => {
                    warn!(id = %id, error = %err, "cache lookup failed");
                    return Err(err.into());
                },
            },
        }

        let movie = self.provider.movie(id).await?;

        let json = serde_json::to_string(&movie)?;
        self.store.set(id, &json).await?;

        info!(id = %id, "movie fetched and cached");
        Ok(movie)
    }

    pub async fn movies(&self, page: u32) -> AppResult<MovieList> {
        self.provider.discover(page).await
    }

    /// Overwrites whatever is cached under the movie's id.
    pub async fn save(&self, movie: &Movie) -> AppResult<()> {
        let json = serde_json::to_string(movie)?;
        self.store.set(&movie.cache_key(), &json).await?;
        info!(id = movie.id, "movie saved to cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::error::{ErrorKind, StoreError};

    const BAD_BOYS: &str = r#"{"id":573435,"title":"Bad Boys: Ride or Die"}"#;

    #[derive(Default)]
    struct FakeStore {
        entries: Mutex<Vec<(String, String)>>,
        writes: Mutex<Vec<(String, String)>>,
        reads: AtomicUsize,
        fail_get: bool,
        fail_set: bool,
    }

    impl FakeStore {
        fn with(key: &str, value: &str) -> Self {
            let store = Self::default();
            store.entries.lock().unwrap().push((key.to_string(), value.to_string()));
            store
        }

        fn writes(&self) -> Vec<(String, String)> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl KeyValueStore for FakeStore {
        async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_get {
                return Err(StoreError::Unavailable("connection reset".into()));
            }
            let entries = self.entries.lock().unwrap();
            Ok(entries.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.clone()))
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.writes.lock().unwrap().push((key.to_string(), value.to_string()));
            if self.fail_set {
                return Err(StoreError::Unavailable("read only replica".into()));
            }
            self.entries.lock().unwrap().push((key.to_string(), value.to_string()));
            Ok(())
        }
    }

    enum Reply {
        Movie(&'static str),
        Status(u16),
    }

    struct FakeProvider {
        reply: Reply,
        movie_calls: AtomicUsize,
        discover_calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(reply: Reply) -> Self {
            Self { reply, movie_calls: AtomicUsize::new(0), discover_calls: AtomicUsize::new(0) }
        }

        fn calls(&self) -> usize {
            self.movie_calls.load(Ordering::SeqCst) + self.discover_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MovieProvider for FakeProvider {
        async fn movie(&self, _id: &str) -> AppResult<Movie> {
            self.movie_calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Reply::Movie(json) => Ok(serde_json::from_str(json)?),
                Reply::Status(status) => Err(AppError::UpstreamStatus { status }),
            }
        }

        async fn discover(&self, page: u32) -> AppResult<MovieList> {
            self.discover_calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_str(&format!(
                r#"{{"page":{page},"results":[{{"id":533535}},{{"id":573435}}]}}"#
            ))?)
        }
    }

    fn engine(
        store: &Arc<FakeStore>,
        provider: &Arc<FakeProvider>,
        policy: LookupFailurePolicy,
    ) -> MovieCache {
        MovieCache::new(store.clone(), provider.clone(), policy)
    }

    fn bad_boys() -> Movie {
        serde_json::from_str(BAD_BOYS).unwrap()
    }

    #[tokio::test]
    async fn hit_never_touches_provider() {
        let store = Arc::new(FakeStore::with("573435", BAD_BOYS));
        let provider = Arc::new(FakeProvider::new(Reply::Status(500)));
        let cache = engine(&store, &provider, LookupFailurePolicy::FallThrough);

        for _ in 0..3 {
            assert_eq!(cache.movie("573435").await.unwrap(), bad_boys());
        }
        assert_eq!(provider.calls(), 0);
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn miss_fetches_once_and_fills_cache() {
        let store = Arc::new(FakeStore::default());
        let provider = Arc::new(FakeProvider::new(Reply::Movie(BAD_BOYS)));
        let cache = engine(&store, &provider, LookupFailurePolicy::FallThrough);

        assert_eq!(cache.movie("573435").await.unwrap(), bad_boys());

        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "573435");
        assert_eq!(serde_json::from_str::<Movie>(&writes[0].1).unwrap(), bad_boys());

        assert_eq!(cache.movie("573435").await.unwrap(), bad_boys());
        assert_eq!(provider.movie_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn upstream_failure_writes_nothing() {
        let store = Arc::new(FakeStore::default());
        let provider = Arc::new(FakeProvider::new(Reply::Status(404)));
        let cache = engine(&store, &provider, LookupFailurePolicy::FallThrough);

        let err = cache.movie("573435").await.unwrap_err();
        assert!(matches!(err, AppError::UpstreamStatus { status: 404 }));
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn failed_write_back_fails_the_fetch() {
        let store = Arc::new(FakeStore { fail_set: true, ..Default::default() });
        let provider = Arc::new(FakeProvider::new(Reply::Movie(BAD_BOYS)));
        let cache = engine(&store, &provider, LookupFailurePolicy::FallThrough);

        let err = cache.movie("573435").await.unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
        assert_eq!(provider.movie_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn corrupt_cache_entry_is_fatal() {
        let store = Arc::new(FakeStore::with("573435", "{not json"));
        let provider = Arc::new(FakeProvider::new(Reply::Movie(BAD_BOYS)));
        let cache = engine(&store, &provider, LookupFailurePolicy::FallThrough);

        let err = cache.movie("573435").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Serialization);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn empty_cache_entry_is_a_miss() {
        let store = Arc::new(FakeStore::with("573435", ""));
        let provider = Arc::new(FakeProvider::new(Reply::Movie(BAD_BOYS)));
        let cache = engine(&store, &provider, LookupFailurePolicy::FallThrough);

        assert_eq!(cache.movie("573435").await.unwrap(), bad_boys());
        assert_eq!(provider.movie_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn lookup_error_falls_through_by_default() {
        let store = Arc::new(FakeStore { fail_get: true, ..Default::default() });
        let provider = Arc::new(FakeProvider::new(Reply::Movie(BAD_BOYS)));
        let cache = engine(&store, &provider, LookupFailurePolicy::default());

        assert_eq!(cache.movie("573435").await.unwrap(), bad_boys());
        assert_eq!(provider.movie_calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn lookup_error_fails_fast_when_asked() {
        let store = Arc::new(FakeStore { fail_get: true, ..Default::default() });
        let provider = Arc::new(FakeProvider::new(Reply::Movie(BAD_BOYS)));
        let cache = engine(&store, &provider, LookupFailurePolicy::FailFast);

        let err = cache.movie("573435").await.unwrap_err();
        assert!(matches!(err, AppError::Store(StoreError::Unavailable(_))));
        assert_eq!(provider.calls(), 0);
        assert!(store.writes().is_empty());
    }

    #[tokio::test]
    async fn save_overwrites_without_provider() {
        let store = Arc::new(FakeStore::with("573435", r#"{"id":573435,"title":"old"}"#));
        let provider = Arc::new(FakeProvider::new(Reply::Status(500)));
        let cache = engine(&store, &provider, LookupFailurePolicy::FallThrough);

        cache.save(&bad_boys()).await.unwrap();

        let writes = store.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "573435");
        assert_eq!(writes[0].1, serde_json::to_string(&bad_boys()).unwrap());
        assert_eq!(cache.movie("573435").await.unwrap(), bad_boys());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn save_surfaces_store_failure() {
        let store = Arc::new(FakeStore { fail_set: true, ..Default::default() });
        let provider = Arc::new(FakeProvider::new(Reply::Movie(BAD_BOYS)));
        let cache = engine(&store, &provider, LookupFailurePolicy::FallThrough);

        let err = cache.save(&bad_boys()).await.unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
        assert_eq!(store.writes().len(), 1);
    }

    #[tokio::test]
    async fn listing_bypasses_store_even_when_it_is_down() {
        let store =
            Arc::new(FakeStore { fail_get: true, fail_set: true, ..Default::default() });
        let provider = Arc::new(FakeProvider::new(Reply::Movie(BAD_BOYS)));
        let cache = engine(&store, &provider, LookupFailurePolicy::FailFast);

        for page in [1, 2, 500] {
            let list = cache.movies(page).await.unwrap();
            assert_eq!(list.page, page);
            assert_eq!(list.results.iter().map(|m| m.id).collect::<Vec<_>>(), vec![533535, 573435]);
        }
        assert_eq!(store.reads.load(Ordering::SeqCst), 0);
        assert!(store.writes().is_empty());
    }

    #[test]
    fn policy_parses() {
        let parse = |s: &str| s.parse::<LookupFailurePolicy>().unwrap();
        assert_eq!(parse("fallthrough"), LookupFailurePolicy::FallThrough);
        assert_eq!(parse("FAIL"), LookupFailurePolicy::FailFast);
        assert!("retry".parse::<LookupFailurePolicy>().is_err());
    }
}
