use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    error::{AppError, AppResult},
    models::{Movie, MovieList},
};

/// Source of record for movie metadata.
#[async_trait]
pub trait MovieProvider: Send + Sync {
    async fn movie(&self, id: &str) -> AppResult<Movie>;

    async fn discover(&self, page: u32) -> AppResult<MovieList>;
}

pub struct TmdbClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl TmdbClient {
    pub fn new(client: reqwest::Client, access_token: String, base_url: String) -> Self {
        if access_token.trim().is_empty() {
            warn!("no TMDB access token configured, upstream requests will be rejected");
        }

        Self { client, access_token, base_url: base_url.trim_end_matches('/').to_string() }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> AppResult<T> {
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(query)
            .send()
            .await
            .inspect_err(|err| warn!(url = %url, error = %err, "TMDB request failed"))?;

        let status = resp.status();
        if status != StatusCode::OK {
            warn!(url = %url, status = status.as_u16(), "TMDB returned non-200 status");
            return Err(AppError::UpstreamStatus { status: status.as_u16() });
        }

        let body = resp.bytes().await?;
        serde_json::from_slice(&body).map_err(|err| {
            warn!(url = %url, error = %err, "failed to decode TMDB response");
            AppError::from(err)
        })
    }
}

#[async_trait]
impl MovieProvider for TmdbClient {
    async fn movie(&self, id: &str) -> AppResult<Movie> {
        let url = format!("{}/movie/{}", self.base_url, urlencoding::encode(id));
        debug!(id = %id, "fetching movie from TMDB");
        self.get_json(url, &[]).await
    }

    async fn discover(&self, page: u32) -> AppResult<MovieList> {
        let url = format!("{}/discover/movie", self.base_url);
        debug!(page = page, "fetching discover page from TMDB");
        let list: MovieList = self.get_json(url, &[("page", page.to_string())]).await?;
        debug!(page = list.page, results = list.results.len(), "fetched discover page");
        Ok(list)
    }
}
