//! Raw byte sources for the transaction export.

use bdagg_core::config::{StorageConfig, StorageKind};
use bdagg_core::{Error, Result};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;
use tracing::info;

/// Boxed, sendable future returned by [`ByteSource`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that yields the raw export once per run.
pub trait ByteSource: Send + Sync {
    /// Fetch the full contents.
    fn download(&self) -> BoxFuture<'_, Result<Vec<u8>>>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

/// File on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalFileSource {
    path: PathBuf,
}

impl LocalFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ByteSource for LocalFileSource {
    fn download(&self) -> BoxFuture<'_, Result<Vec<u8>>> {
        Box::pin(async move {
            tokio::fs::read(&self.path).await.map_err(|e| {
                Error::source(format!("failed to read {}: {e}", self.path.display()))
            })
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Object fetched over HTTP from `{base_url}/{bucket}/{object}`.
///
/// Requests carry a bearer token when one is set; otherwise the object must
/// be publicly readable.
#[derive(Clone)]
pub struct HttpObjectSource {
    client: reqwest::Client,
    url: String,
    auth_token: Option<String>,
    timeout: Duration,
}

impl HttpObjectSource {
    pub fn new(base_url: &str, bucket: &str, object: &str) -> Self {
        let url = format!(
            "{}/{}/{}",
            base_url.trim_end_matches('/'),
            bucket.trim_matches('/'),
            object.trim_start_matches('/')
        );
        Self {
            client: reqwest::Client::new(),
            url,
            auth_token: None,
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request(&self) -> reqwest::RequestBuilder {
        let builder = self.client.get(&self.url).timeout(self.timeout);
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

impl ByteSource for HttpObjectSource {
    fn download(&self) -> BoxFuture<'_, Result<Vec<u8>>> {
        Box::pin(async move {
            let response = self
                .request()
                .send()
                .await
                .map_err(|e| Error::source(format!("request to {} failed: {e}", self.url)))?;

            let status = response.status();
            if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                return Err(Error::source(format!(
                    "access denied ({}) to {}; private objects need an auth token",
                    status.as_u16(),
                    self.url
                )));
            }
            if !status.is_success() {
                return Err(Error::source(format!(
                    "unexpected status {} from {}",
                    status.as_u16(),
                    self.url
                )));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| Error::source(format!("failed to read body of {}: {e}", self.url)))?;
            Ok(bytes.to_vec())
        })
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// Build the configured source.
pub fn open_source(config: &StorageConfig) -> Result<Box<dyn ByteSource>> {
    let source: Box<dyn ByteSource> = match config.kind {
        StorageKind::Local => {
            if config.local_path.as_os_str().is_empty() {
                return Err(Error::config("local storage path is not set"));
            }
            Box::new(LocalFileSource::new(&config.local_path))
        }
        StorageKind::Gcs => {
            if config.bucket.is_empty() || config.object.is_empty() {
                return Err(Error::config("gcs bucket and object must be set"));
            }
            Box::new(
                HttpObjectSource::new(&config.object_store_url, &config.bucket, &config.object)
                    .with_auth_token(config.auth_token.clone())
                    .with_timeout(Duration::from_millis(config.download_timeout_ms)),
            )
        }
    };
    info!(kind = ?config.kind, location = %source.describe(), "opened byte source");
    Ok(source)
}
