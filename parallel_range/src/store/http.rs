//! Object store reached over plain HTTP(S) range requests.
//!
//! Objects are addressed path-style as `{endpoint}/{container}/{key}`, with
//! every key segment percent-encoded. Lengths come from a `HEAD` request and
//! ranges from `GET` with a `Range` header. Requests are sent unsigned, so the
//! endpoint must allow anonymous reads or sit behind something that authorises
//! them.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{StatusCode, Url};
use tracing::debug;

use super::{ObjectMetadata, ObjectStore};
use crate::error::{StoreError, StoreResult};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    endpoint: String,
    base: Url,
}

impl HttpStore {
    /// Creates a store for `endpoint` with the given per-request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> StoreResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Self::with_client(endpoint, client)
    }

    /// Store for the public S3 endpoint of `region`.
    pub fn for_region(region: &str, timeout: Duration) -> StoreResult<Self> {
        Self::new(format!("https://s3.{region}.amazonaws.com"), timeout)
    }

    /// Creates a store that sends its requests through `client`.
    pub fn with_client(endpoint: impl Into<String>, client: Client) -> StoreResult<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let base = Url::parse(&endpoint)
            .map_err(|e| StoreError::Transport(format!("invalid endpoint {endpoint:?}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(StoreError::Transport(format!(
                "endpoint {endpoint:?} cannot hold object paths"
            )));
        }
        Ok(Self {
            client,
            endpoint,
            base,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// URL of `container/key`. Each `/`-separated key segment is
    /// percent-encoded, so `#`, `?` and `%` stay part of the key.
    pub fn object_url(&self, container: &str, key: &str) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(container)
                .extend(key.trim_start_matches('/').split('/'));
        }
        url
    }
}

/// Maps a non-success status to the store error it stands for.
fn status_error(status: StatusCode, url: &Url, container: &str, key: &str) -> Option<StoreError> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::NOT_FOUND => StoreError::NotFound {
            container: container.to_string(),
            key: key.to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::AccessDenied {
            container: container.to_string(),
            key: key.to_string(),
            message: status.to_string(),
        },
        _ => StoreError::Transport(format!("{url} returned {status}")),
    })
}

fn check_status(response: Response, container: &str, key: &str) -> StoreResult<Response> {
    match status_error(response.status(), response.url(), container, key) {
        Some(err) => Err(err),
        None => Ok(response),
    }
}

impl ObjectStore for HttpStore {
    fn metadata(&self, container: &str, key: &str) -> StoreResult<ObjectMetadata> {
        let url = self.object_url(container, key);
        debug!(%url, "HEAD");
        let response = self.client.head(url.clone()).send()?;
        let response = check_status(response, container, key)?;

        let length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| StoreError::Transport(format!("{url}: missing content-length")))?;

        Ok(ObjectMetadata { length })
    }

    fn get_range(
        &self,
        container: &str,
        key: &str,
        start: u64,
        end: u64,
    ) -> StoreResult<Box<dyn Read + Send>> {
        let url = self.object_url(container, key);
        debug!(%url, start, end, "GET range");
        let response = self
            .client
            .get(url.clone())
            .header(RANGE, format!("bytes={start}-{end}"))
            .send()?;
        let response = check_status(response, container, key)?;

        // A server that ignores the Range header answers 200 with the whole
        // object; only accept that when the whole object was asked for.
        if response.status() == StatusCode::OK && start != 0 {
            return Err(StoreError::Transport(format!(
                "{url}: server ignored range request"
            )));
        }

        Ok(Box::new(response))
    }
}
