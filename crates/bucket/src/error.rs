//! Error types for the bucket crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for object-store operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error while reading or writing a local object
    #[error("I/O {operation} failed: {}", path.display())]
    #[diagnostic(
        code(bucketcache::bucket::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error
        path: Box<Path>,
        /// Operation that failed (e.g., "read", "write")
        operation: String,
    },

    /// The requested object does not exist
    #[error("Object '{key}' not found in bucket '{bucket}'")]
    #[diagnostic(
        code(bucketcache::bucket::not_found),
        help("Check the bucket name and the object's folders")
    )]
    ObjectNotFound {
        /// Bucket that was queried
        bucket: String,
        /// Object key within the bucket
        key: String,
    },

    /// The object store answered with a non-success status
    #[error("Object store returned HTTP {status} for {url}")]
    #[diagnostic(code(bucketcache::bucket::http))]
    Http {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// The request never produced a response
    #[error("Object store request failed: {message}")]
    #[diagnostic(
        code(bucketcache::bucket::transport),
        help("Check the endpoint and your network connection")
    )]
    Transport {
        /// Error message from the HTTP client
        message: String,
    },

    /// Invalid endpoint, key or client setup
    #[error("Bucket configuration error: {message}")]
    #[diagnostic(code(bucketcache::bucket::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// An object body could not be encoded or decoded
    #[error("Serialization error for '{key}': {message}")]
    #[diagnostic(code(bucketcache::bucket::serialization))]
    Serialization {
        /// Object key
        key: String,
        /// Error message from the serializer
        message: String,
    },

    /// Error from the local cache
    #[error(transparent)]
    #[diagnostic(transparent)]
    Cache(#[from] bucketcache_cache::Error),
}

impl Error {
    /// Create an I/O error with path context
    #[must_use]
    pub fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: impl Into<String>,
    ) -> Self {
        Self::Io {
            source,
            path: path.as_ref().into(),
            operation: operation.into(),
        }
    }

    /// Create an object-not-found error
    #[must_use]
    pub fn not_found(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::ObjectNotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Create a transport error
    #[must_use]
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            message: msg.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(key: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            key: key.into(),
            message: msg.into(),
        }
    }
}

/// Result type for object-store operations
pub type Result<T> = std::result::Result<T, Error>;
