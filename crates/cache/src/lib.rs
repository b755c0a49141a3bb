//! Disk-backed memoization for expensive fetches
//!
//! This crate caches the results of slow, externally-sourced operations
//! (object-store downloads, API calls) on local disk:
//! - Deterministic call signatures derived from the call's arguments
//! - A persistent log mapping signatures to artifact files
//! - Age-based expiry using artifact modification times
//! - A generic wrapper that runs a producer or reads a cached artifact
//!
//! # Overview
//!
//! A [`CacheStore`] owns a directory holding `log.json` and the artifact
//! files it references. For each call, [`Memoized::call`] derives a
//! [`Signature`], asks the store for a [`Decision`], and then either:
//! - runs the producer, writes the value with its [`Codec`], and commits the
//!   signature to the log, or
//! - reads the previously written artifact back.
//!
//! # Dummy mode
//!
//! [`CacheStore::dummy`] builds a pass-through store for environments
//! without a writable cache directory: every call runs the producer and
//! nothing is written to disk.

// TODO(cache-docs): Add # Errors documentation to all fallible public functions
#![expect(
    clippy::missing_errors_doc,
    reason = "Error documentation to be added incrementally"
)]

pub mod codec;
mod config;
mod decision;
mod error;
mod memoize;
mod signature;
pub mod store;

// Re-export error types at crate root
pub use error::{Error, Result};

// Re-export main types
pub use codec::{ByteCodec, BytesCodec, Codec, FnCodec, JsonCodec, ZstdCodec};
pub use config::{
    CacheConfig, DEFAULT_EXPIRY_SECS, ENV_CACHE_DIR, ENV_EXPIRY_SECS, ENV_NO_CACHE, EnvOverrides,
    default_cache_root,
};
pub use decision::{Decision, DecisionReason};
pub use memoize::{KeyFn, Memoized, NamedKey, memoize};
pub use signature::{Signature, SignatureBuilder};
pub use store::{CacheLog, CacheMetadata, CacheStore, LogEntry};
