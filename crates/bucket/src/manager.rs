//! Cached access to a bucket
//!
//! [`BucketManager`] pairs an [`ObjectStore`] with a [`CacheStore`]. Reads go
//! through the memoizing wrapper so repeated downloads of the same object are
//! served from disk until they expire; writes always go straight to the
//! object store.

use crate::{Error, ObjectStore, Result};
use bucketcache_cache::{
    BytesCodec, CacheStore, DEFAULT_EXPIRY_SECS, JsonCodec, Memoized, ZstdCodec,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::info;

/// Join `folders` and `name` into an object key.
///
/// Empty folder names are skipped, so `object_key(&[], "a.json")` is `a.json`.
#[must_use]
pub fn object_key(folders: &[&str], name: &str) -> String {
    folders
        .iter()
        .copied()
        .filter(|f| !f.is_empty())
        .chain(std::iter::once(name))
        .collect::<Vec<_>>()
        .join("/")
}

// Memoized reads are keyed as `method("bucket", "key")`.
type ObjectRef<'a> = (&'a str, &'a str);

/// An object store with cached reads
#[derive(Debug)]
pub struct BucketManager<S> {
    store: S,
    cache: CacheStore,
}

impl<S: ObjectStore> BucketManager<S> {
    /// Manage `store` without caching; every read hits the object store
    pub fn new(store: S) -> Self {
        Self::with_cache(
            store,
            CacheStore::dummy(Duration::from_secs(DEFAULT_EXPIRY_SECS)),
        )
    }

    /// Manage `store` with reads cached in `cache`
    pub fn with_cache(store: S, cache: CacheStore) -> Self {
        Self { store, cache }
    }

    /// Bucket served by the underlying store
    pub fn bucket(&self) -> &str {
        self.store.bucket()
    }

    /// The underlying object store
    pub fn object_store(&self) -> &S {
        &self.store
    }

    /// The cache reads go through
    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Download and parse a JSON object
    pub fn get_json<T>(&self, folders: &[&str], name: &str) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let key = object_key(folders, name);
        Memoized::with_codec(
            &self.cache,
            "get_json",
            |(_, key): &ObjectRef<'_>| -> Result<T> {
                let body = self.fetch(key)?;
                serde_json::from_slice(&body)
                    .map_err(|e| Error::serialization(*key, e.to_string()))
            },
            JsonCodec,
        )
        .call(&(self.bucket(), key.as_str()))
    }

    /// Download an object's raw body
    pub fn get_bytes(&self, folders: &[&str], name: &str) -> Result<Vec<u8>> {
        let key = object_key(folders, name);
        Memoized::with_codec(
            &self.cache,
            "get_bytes",
            |(_, key): &ObjectRef<'_>| self.fetch(key),
            BytesCodec,
        )
        .call(&(self.bucket(), key.as_str()))
    }

    /// Download an object's raw body, keeping the cached copy zstd-compressed
    pub fn get_bytes_compressed(&self, folders: &[&str], name: &str) -> Result<Vec<u8>> {
        let key = object_key(folders, name);
        Memoized::with_codec(
            &self.cache,
            "get_bytes_compressed",
            |(_, key): &ObjectRef<'_>| self.fetch(key),
            ZstdCodec::new(BytesCodec),
        )
        .call(&(self.bucket(), key.as_str()))
    }

    /// Serialize `value` as JSON and upload it
    pub fn put_json<T: Serialize + ?Sized>(
        &self,
        value: &T,
        folders: &[&str],
        name: &str,
    ) -> Result<()> {
        let key = object_key(folders, name);
        let body =
            serde_json::to_vec(value).map_err(|e| Error::serialization(&key, e.to_string()))?;
        self.upload(&key, &body)
    }

    /// Upload a raw body
    pub fn put_bytes(&self, body: &[u8], folders: &[&str], name: &str) -> Result<()> {
        self.upload(&object_key(folders, name), body)
    }

    fn fetch(&self, key: &str) -> Result<Vec<u8>> {
        info!(bucket = %self.bucket(), key, "Fetching object");
        self.store.get(key)
    }

    fn upload(&self, key: &str, body: &[u8]) -> Result<()> {
        info!(bucket = %self.bucket(), key, bytes = body.len(), "Uploading object");
        self.store.put(key, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FsObjectStore;
    use tempfile::TempDir;

    #[test]
    fn object_key_joins_with_slashes() {
        assert_eq!(object_key(&["prices", "2024"], "daily.json"), "prices/2024/daily.json");
        assert_eq!(object_key(&[], "daily.json"), "daily.json");
        assert_eq!(object_key(&["", "prices"], "daily.json"), "prices/daily.json");
    }

    #[test]
    fn signature_includes_method_and_bucket() {
        let objects = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let store = FsObjectStore::new(objects.path(), "market").unwrap();
        store.put("prices/daily.json", b"[1]").unwrap();
        let manager = BucketManager::with_cache(
            store,
            CacheStore::open(cache_dir.path(), Duration::from_secs(60)).unwrap(),
        );

        let _: Vec<u32> = manager.get_json(&["prices"], "daily.json").unwrap();
        let signatures: Vec<_> = manager
            .cache()
            .read_log()
            .unwrap()
            .entries
            .into_keys()
            .map(|s| s.into_string())
            .collect();
        assert_eq!(signatures, [r#"get_json("market", "prices/daily.json")"#]);
    }

    #[test]
    fn default_manager_does_not_cache() {
        let temp = TempDir::new().unwrap();
        let manager = BucketManager::new(FsObjectStore::new(temp.path(), "market").unwrap());
        assert!(manager.cache().is_dummy());

        manager.put_bytes(b"v1", &["raw"], "blob").unwrap();
        assert_eq!(manager.get_bytes(&["raw"], "blob").unwrap(), b"v1");
        manager.put_bytes(b"v2", &["raw"], "blob").unwrap();
        assert_eq!(manager.get_bytes(&["raw"], "blob").unwrap(), b"v2");
    }
}
