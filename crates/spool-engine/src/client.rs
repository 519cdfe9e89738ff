//! Reqwest-backed engine client.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use spool_core::InfoHash;
use tracing::debug;
use url::Url;

use crate::api::EngineApi;
use crate::error::{EngineError, EngineResult};
use crate::model::{
    AddTorrentRequest, EngineRequest, SetTorrentRequest, TorrentStatus, UploadRequest,
};

const TORRENTS_PATH: &str = "torrents";
const UPLOAD_PATH: &str = "torrent/upload";

/// HTTP basic credentials for the engine proxy.
#[derive(Clone, PartialEq, Eq)]
pub struct EngineCredentials {
    /// User name.
    pub user: String,
    /// Password; may be empty.
    pub password: String,
}

impl fmt::Debug for EngineCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineCredentials")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Build the shared reqwest client with the configured timeout.
///
/// # Errors
///
/// Returns [`EngineError::Client`] when the TLS backend cannot be initialised.
pub fn build_http_client(timeout: Duration) -> EngineResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|source| EngineError::Client { source })
}

/// Engine client posting JSON actions to `{base}/torrents`.
#[derive(Debug, Clone)]
pub struct EngineClient {
    client: Client,
    torrents_url: Url,
    upload_url: Url,
    credentials: Option<EngineCredentials>,
}

impl EngineClient {
    /// Create a client rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidUrl`] if the endpoint URLs cannot be derived.
    pub fn new(
        client: Client,
        base_url: &Url,
        credentials: Option<EngineCredentials>,
    ) -> EngineResult<Self> {
        let base = directory_url(base_url);
        Ok(Self {
            client,
            torrents_url: join(&base, TORRENTS_PATH)?,
            upload_url: join(&base, UPLOAD_PATH)?,
            credentials,
        })
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let Some(credentials) = &self.credentials else {
            return builder;
        };
        builder.basic_auth(&credentials.user, Some(&credentials.password))
    }

    async fn post_action(
        &self,
        operation: &'static str,
        request: &EngineRequest,
    ) -> EngineResult<Response> {
        debug!(operation, "engine request");
        let builder = self.authorize(self.client.post(self.torrents_url.clone()).json(request));
        send(operation, &self.torrents_url, builder).await
    }
}

#[async_trait]
impl EngineApi for EngineClient {
    async fn add(&self, request: AddTorrentRequest) -> EngineResult<TorrentStatus> {
        let operation = "torrents.add";
        let response = self
            .post_action(operation, &EngineRequest::Add(request))
            .await?;
        decode(operation, &self.torrents_url, response).await
    }

    async fn upload(&self, request: UploadRequest) -> EngineResult<TorrentStatus> {
        let operation = "torrents.upload";
        let mut form = Form::new();
        for (name, value) in request.text_fields()? {
            form = form.text(name, value);
        }
        form = form.part("file", Part::bytes(request.bytes).file_name(request.file_name));

        debug!(operation, "engine request");
        let builder = self.authorize(self.client.post(self.upload_url.clone()).multipart(form));
        let response = send(operation, &self.upload_url, builder).await?;
        decode(operation, &self.upload_url, response).await
    }

    async fn set(&self, request: SetTorrentRequest) -> EngineResult<()> {
        self.post_action("torrents.set", &EngineRequest::Set(request))
            .await
            .map(drop)
    }

    async fn get(&self, hash: InfoHash) -> EngineResult<TorrentStatus> {
        let operation = "torrents.get";
        let response = self
            .post_action(operation, &EngineRequest::Get { hash })
            .await?;
        decode(operation, &self.torrents_url, response).await
    }

    async fn list(&self) -> EngineResult<Vec<TorrentStatus>> {
        let operation = "torrents.list";
        let response = self.post_action(operation, &EngineRequest::List).await?;
        decode(operation, &self.torrents_url, response).await
    }

    async fn remove(&self, hash: InfoHash) -> EngineResult<()> {
        self.post_action("torrents.rem", &EngineRequest::Rem { hash })
            .await
            .map(drop)
    }
}

/// Send a request and turn non-success statuses into [`EngineError::Status`].
pub(crate) async fn send(
    operation: &'static str,
    url: &Url,
    builder: RequestBuilder,
) -> EngineResult<Response> {
    let response = builder
        .send()
        .await
        .map_err(|source| EngineError::Transport {
            operation,
            url: url.to_string(),
            source,
        })?;
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(EngineError::Status {
            operation,
            url: url.to_string(),
            status: status.as_u16(),
        })
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(
    operation: &'static str,
    url: &Url,
    response: Response,
) -> EngineResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|source| EngineError::Decode {
            operation,
            url: url.to_string(),
            source,
        })
}

/// Copy of `url` whose path ends in `/`, so relative joins append.
pub(crate) fn directory_url(url: &Url) -> Url {
    let mut base = url.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

pub(crate) fn join(base: &Url, path: &str) -> EngineResult<Url> {
    base.join(path).map_err(|source| EngineError::InvalidUrl {
        value: format!("{base}{path}"),
        source,
    })
}
