//! Object-store client with cached downloads
//!
//! [`BucketManager`] reads objects from an [`ObjectStore`] and memoizes the
//! results in a [`bucketcache_cache::CacheStore`]:
//!
//! ```rust,no_run
//! use bucketcache_bucket::{BucketManager, HttpObjectStore};
//! use bucketcache_cache::CacheStore;
//! use std::time::Duration;
//!
//! let store = HttpObjectStore::new("https://objects.example.com", "market-data")?;
//! let cache = CacheStore::open("/tmp/market-cache", Duration::from_secs(3600))?;
//! let bucket = BucketManager::with_cache(store, cache);
//!
//! let prices: Vec<f64> = bucket.get_json(&["prices", "2024"], "daily.json")?;
//! # Ok::<(), bucketcache_bucket::Error>(())
//! ```

// TODO(bucket-docs): Add # Errors documentation to all fallible public functions
#![expect(
    clippy::missing_errors_doc,
    reason = "Error documentation to be added incrementally"
)]

mod error;
mod manager;
mod store;

pub use error::{Error, Result};
pub use manager::{BucketManager, object_key};
pub use store::{
    DEFAULT_TIMEOUT, FsObjectStore, HttpObjectStore, ObjectStore, validate_key,
};
