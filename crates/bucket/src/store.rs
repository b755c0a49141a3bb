//! Object-store backends
//!
//! An [`ObjectStore`] serves raw object bodies from one bucket. Two backends
//! ship with the crate:
//! - [`FsObjectStore`]: objects under `<root>/<bucket>/<key>` on local disk
//! - [`HttpObjectStore`]: `GET`/`PUT` against `<endpoint>/<bucket>/<key>`

use crate::{Error, Result};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Request timeout used by [`HttpObjectStore::new`]
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A source of object bodies addressed by key within a single bucket
pub trait ObjectStore: Send + Sync {
    /// Name of the bucket this store serves
    fn bucket(&self) -> &str;

    /// Download the body stored under `key`.
    ///
    /// A missing object is reported as [`Error::ObjectNotFound`].
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Upload `body` under `key`, replacing any existing object
    fn put(&self, key: &str, body: &[u8]) -> Result<()>;
}

impl<S: ObjectStore + ?Sized> ObjectStore for Box<S> {
    fn bucket(&self) -> &str {
        (**self).bucket()
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, body: &[u8]) -> Result<()> {
        (**self).put(key, body)
    }
}

/// Reject keys that are empty, absolute, or escape the bucket
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::configuration("Object key must not be empty"));
    }
    if key
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(Error::configuration(format!(
            "Invalid object key '{key}': segments must be non-empty and not '.' or '..'"
        )));
    }
    Ok(())
}

fn validate_bucket(bucket: &str) -> Result<()> {
    if bucket.is_empty() || bucket.contains('/') || bucket == "." || bucket == ".." {
        return Err(Error::configuration(format!(
            "Invalid bucket name '{bucket}'"
        )));
    }
    Ok(())
}

/// Objects stored as plain files below a root directory
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    bucket: String,
}

impl FsObjectStore {
    /// Serve `bucket` from `<root>/<bucket>`
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        validate_bucket(&bucket)?;
        Ok(Self {
            root: root.into(),
            bucket,
        })
    }

    /// Root directory holding one sub-directory per bucket
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local path of the object stored under `key`
    pub fn object_path(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        let mut path = self.root.join(&self.bucket);
        path.extend(key.split('/'));
        Ok(path)
    }
}

impl ObjectStore for FsObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key)?;
        debug!(bucket = %self.bucket, key, path = %path.display(), "Reading object");
        fs::read(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::not_found(&self.bucket, key)
            } else {
                Error::io(e, &path, "read")
            }
        })
    }

    fn put(&self, key: &str, body: &[u8]) -> Result<()> {
        let path = self.object_path(key)?;
        debug!(bucket = %self.bucket, key, bytes = body.len(), "Writing object");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(e, parent, "create"))?;
        }
        fs::write(&path, body).map_err(|e| Error::io(e, &path, "write"))
    }
}

/// Objects served over HTTP(S) at `<endpoint>/<bucket>/<key>`
#[derive(Debug)]
pub struct HttpObjectStore {
    client: Client,
    endpoint: Url,
    bucket: String,
    token: Option<SecretString>,
}

impl HttpObjectStore {
    /// Create a client with [`DEFAULT_TIMEOUT`]
    pub fn new(endpoint: &str, bucket: impl Into<String>) -> Result<Self> {
        Self::with_timeout(endpoint, bucket, DEFAULT_TIMEOUT)
    }

    /// Create a client with a custom per-request timeout
    pub fn with_timeout(
        endpoint: &str,
        bucket: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let bucket = bucket.into();
        validate_bucket(&bucket)?;

        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::configuration(format!("Invalid endpoint '{endpoint}': {e}")))?;
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.cannot_be_a_base() {
            return Err(Error::configuration(format!(
                "Endpoint must be an http(s) URL, got '{endpoint}'"
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bucketcache/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            bucket,
            token: None,
        })
    }

    /// Send `token` as a bearer credential with every request
    #[must_use]
    pub fn with_token(mut self, token: SecretString) -> Self {
        self.token = Some(token);
        self
    }

    /// Base URL objects are resolved against
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Full URL of the object stored under `key`
    pub fn object_url(&self, key: &str) -> Result<Url> {
        validate_key(key)?;
        let mut url = self.endpoint.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                Error::configuration(format!("Endpoint '{}' cannot hold a path", self.endpoint))
            })?;
            segments
                .pop_if_empty()
                .push(&self.bucket)
                .extend(key.split('/'));
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        }
    }

    fn check_status(&self, status: StatusCode, key: &str, url: &Url) -> Result<()> {
        if status == StatusCode::NOT_FOUND {
            return Err(Error::not_found(&self.bucket, key));
        }
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(())
    }
}

impl ObjectStore for HttpObjectStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        let url = self.object_url(key)?;
        debug!(%url, "Downloading object");

        let response = self
            .authorize(self.client.get(url.clone()))
            .send()
            .map_err(|e| Error::transport(format!("GET {url}: {e}")))?;
        self.check_status(response.status(), key, &url)?;

        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| Error::transport(format!("Failed to read body of {url}: {e}")))
    }

    fn put(&self, key: &str, body: &[u8]) -> Result<()> {
        let url = self.object_url(key)?;
        debug!(%url, bytes = body.len(), "Uploading object");

        let response = self
            .authorize(self.client.put(url.clone()).body(body.to_vec()))
            .send()
            .map_err(|e| Error::transport(format!("PUT {url}: {e}")))?;
        self.check_status(response.status(), key, &url)
    }
}
