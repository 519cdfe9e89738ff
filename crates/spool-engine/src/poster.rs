//! Poster search provider.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use spool_core::PosterLanguage;
use tracing::debug;
use url::Url;

use crate::client::{decode, directory_url, join, send};
use crate::error::EngineResult;

/// Prefix turning a TMDB `poster_path` into an image URL.
pub const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/w500";

const SEARCH_PATH: &str = "tmdb/search";

/// Best-effort poster lookup.
#[async_trait]
pub trait PosterProvider: Send + Sync {
    /// Candidate image URLs for `title`, best match first.
    async fn search(&self, title: &str, language: PosterLanguage) -> EngineResult<Vec<String>>;

    /// Whether `url` currently serves an image.
    async fn is_reachable(&self, url: &str) -> bool;
}

/// Poster provider backed by the TMDB search proxy.
#[derive(Debug, Clone)]
pub struct TmdbPosterClient {
    client: Client,
    search_url: Url,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    language: PosterLanguage,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Deserialize)]
struct SearchResult {
    #[serde(default)]
    poster_path: Option<String>,
}

impl TmdbPosterClient {
    /// Create a provider rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::InvalidUrl`] if the search URL cannot be derived.
    pub fn new(client: Client, base_url: &Url) -> EngineResult<Self> {
        Ok(Self {
            client,
            search_url: join(&directory_url(base_url), SEARCH_PATH)?,
        })
    }
}

#[async_trait]
impl PosterProvider for TmdbPosterClient {
    async fn search(&self, title: &str, language: PosterLanguage) -> EngineResult<Vec<String>> {
        let operation = "posters.search";
        let request = SearchRequest {
            query: title,
            language,
            kind: "multi",
        };
        let builder = self.client.post(self.search_url.clone()).json(&request);
        let response = send(operation, &self.search_url, builder).await?;
        let body: SearchResponse = decode(operation, &self.search_url, response).await?;
        let urls = poster_urls(body.results.into_iter().filter_map(|r| r.poster_path));
        debug!(title, language = %language, candidates = urls.len(), "poster search finished");
        Ok(urls)
    }

    async fn is_reachable(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let response = match self.client.get(parsed).send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(url, error = %err, "poster check failed");
                return false;
            }
        };
        let is_image = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.trim().to_ascii_lowercase().starts_with("image/"));
        response.status().is_success() && is_image
    }
}

fn poster_urls(paths: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for path in paths {
        let path = path.trim();
        if path.is_empty() {
            continue;
        }
        let url = if path.starts_with('/') {
            format!("{TMDB_IMAGE_BASE}{path}")
        } else {
            format!("{TMDB_IMAGE_BASE}/{path}")
        };
        if !urls.contains(&url) {
            urls.push(url);
        }
    }
    urls
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::EngineError;
    use crate::client::build_http_client;

    fn provider(server: &MockServer) -> TmdbPosterClient {
        let base: Url = server.base_url().parse().expect("url");
        let http = build_http_client(Duration::from_secs(5)).expect("client");
        TmdbPosterClient::new(http, &base).expect("provider")
    }

    #[test]
    fn poster_paths_map_to_image_urls_without_duplicates() {
        let urls = poster_urls(vec![
            "/a.jpg".to_string(),
            String::new(),
            "b.jpg".to_string(),
            "/a.jpg".to_string(),
        ]);
        assert_eq!(
            urls,
            vec![
                format!("{TMDB_IMAGE_BASE}/a.jpg"),
                format!("{TMDB_IMAGE_BASE}/b.jpg"),
            ]
        );
    }

    #[tokio::test]
    async fn search_posts_query_and_maps_results() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/tmdb/search").json_body(json!({
                    "query": "The Matrix",
                    "language": "ru",
                    "type": "multi"
                }));
                then.status(200).json_body(json!({
                    "results": [
                        {"poster_path": "/matrix.jpg", "title": "The Matrix"},
                        {"poster_path": null},
                        {"name": "no poster"}
                    ]
                }));
            })
            .await;

        let urls = provider(&server)
            .search("The Matrix", PosterLanguage::Ru)
            .await
            .expect("search should succeed");
        mock.assert_async().await;
        assert_eq!(urls, vec![format!("{TMDB_IMAGE_BASE}/matrix.jpg")]);
    }

    #[tokio::test]
    async fn search_failure_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/tmdb/search");
                then.status(503);
            })
            .await;

        let err = provider(&server)
            .search("x", PosterLanguage::En)
            .await
            .expect_err("503 should fail");
        assert!(matches!(err, EngineError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn reachability_requires_an_image_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/ok.jpg");
                then.status(200).header("content-type", "image/jpeg").body("jpg");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/page.html");
                then.status(200).header("content-type", "text/html").body("<html>");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing.jpg");
                then.status(404);
            })
            .await;

        let provider = provider(&server);
        assert!(provider.is_reachable(&server.url("/ok.jpg")).await);
        assert!(!provider.is_reachable(&server.url("/page.html")).await);
        assert!(!provider.is_reachable(&server.url("/missing.jpg")).await);
        assert!(!provider.is_reachable("not a url").await);
    }
}
