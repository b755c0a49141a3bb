//! Error types for the cache crate

// Rust 1.92 compiler bug: false positives for thiserror/miette derive macro fields
// https://github.com/rust-lang/rust/issues/147648
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::path::Path;
use thiserror::Error;

/// Error type for cache operations
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// I/O error during cache operations
    #[error("I/O {operation} failed: {}", path.display())]
    #[diagnostic(
        code(bucketcache::cache::io),
        help("Check file permissions and ensure the path exists")
    )]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// Path that caused the error
        path: Box<Path>,
        /// Operation that failed (e.g., "read", "write", "create")
        operation: String,
    },

    /// Configuration or validation error
    #[error("Cache configuration error: {message}")]
    #[diagnostic(code(bucketcache::cache::config))]
    Configuration {
        /// Error message describing the configuration issue
        message: String,
    },

    /// The cache log exists but cannot be parsed
    #[error("Cache log {} is corrupt: {message}", path.display())]
    #[diagnostic(
        code(bucketcache::cache::corrupt_log),
        help("Fix or remove the log file; the cache will not repair it automatically")
    )]
    CorruptLog {
        /// Location of the log file
        path: Box<Path>,
        /// Parser message
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(code(bucketcache::cache::serialization))]
    Serialization {
        /// Error message describing the serialization issue
        message: String,
    },

    /// A codec failed to encode or decode an artifact
    #[error("Codec error for {}: {message}", path.display())]
    #[diagnostic(
        code(bucketcache::cache::codec),
        help("The artifact may be truncated or written by a different codec")
    )]
    Codec {
        /// Artifact path
        path: Box<Path>,
        /// Error message from the codec
        message: String,
    },
}

impl Error {
    /// Create a configuration error
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

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

    /// Create a corrupt log error
    #[must_use]
    pub fn corrupt_log(path: impl AsRef<Path>, msg: impl Into<String>) -> Self {
        Self::CorruptLog {
            path: path.as_ref().into(),
            message: msg.into(),
        }
    }

    /// Create a serialization error
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
        }
    }

    /// Create a codec error
    #[must_use]
    pub fn codec(path: impl AsRef<Path>, msg: impl Into<String>) -> Self {
        Self::Codec {
            path: path.as_ref().into(),
            message: msg.into(),
        }
    }

    /// Returns true if this error wraps an I/O `NotFound`
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, Error>;
