//! Download of `.torrent` descriptors referenced by links.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::client::send;
use crate::error::{EngineError, EngineResult};

/// Fetches raw descriptor bytes for a link source.
#[async_trait]
pub trait DescriptorFetcher: Send + Sync {
    /// Download the body behind `url`.
    async fn fetch(&self, url: &str) -> EngineResult<Vec<u8>>;
}

/// Descriptor fetcher issuing one GET per link, with a body size cap.
#[derive(Debug, Clone)]
pub struct HttpDescriptorFetcher {
    client: Client,
    max_bytes: u64,
}

impl HttpDescriptorFetcher {
    /// Fetcher rejecting bodies larger than `max_bytes`.
    #[must_use]
    pub const fn new(client: Client, max_bytes: u64) -> Self {
        Self { client, max_bytes }
    }
}

#[async_trait]
impl DescriptorFetcher for HttpDescriptorFetcher {
    async fn fetch(&self, url: &str) -> EngineResult<Vec<u8>> {
        let operation = "descriptor.fetch";
        let parsed = Url::parse(url).map_err(|source| EngineError::InvalidUrl {
            value: url.to_string(),
            source,
        })?;
        let too_large = || EngineError::TooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        };

        let mut response = send(operation, &parsed, self.client.get(parsed.clone())).await?;
        if response
            .content_length()
            .is_some_and(|length| length > self.max_bytes)
        {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|source| EngineError::Transport {
                operation,
                url: url.to_string(),
                source,
            })?
        {
            body.extend_from_slice(&chunk);
            if u64::try_from(body.len()).unwrap_or(u64::MAX) > self.max_bytes {
                return Err(too_large());
            }
        }
        debug!(url, bytes = body.len(), "descriptor downloaded");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;

    use super::*;
    use crate::client::build_http_client;

    fn fetcher(max_bytes: u64) -> HttpDescriptorFetcher {
        let http = build_http_client(Duration::from_secs(5)).expect("client");
        HttpDescriptorFetcher::new(http, max_bytes)
    }

    #[tokio::test]
    async fn downloads_descriptor_bytes() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/a.torrent");
                then.status(200).body("d4:infod4:name1:aee");
            })
            .await;

        let bytes = fetcher(1024)
            .fetch(&server.url("/a.torrent"))
            .await
            .expect("fetch should succeed");
        mock.assert_async().await;
        assert_eq!(bytes, b"d4:infod4:name1:aee");
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/big.torrent");
                then.status(200).body("x".repeat(64));
            })
            .await;

        let err = fetcher(16)
            .fetch(&server.url("/big.torrent"))
            .await
            .expect_err("64 bytes exceed 16");
        assert!(matches!(err, EngineError::TooLarge { limit: 16, .. }));
    }

    #[tokio::test]
    async fn failures_surface_as_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/gone.torrent");
                then.status(404);
            })
            .await;

        let err = fetcher(1024)
            .fetch(&server.url("/gone.torrent"))
            .await
            .expect_err("404 should fail");
        assert!(matches!(err, EngineError::Status { status: 404, .. }));

        let invalid = fetcher(1024).fetch("::nope").await.expect_err("bad url");
        assert!(matches!(invalid, EngineError::InvalidUrl { .. }));
    }
}
