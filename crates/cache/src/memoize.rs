//! Memoizing wrapper around a producer function
//!
//! Every wrapper is named after the operation it memoizes. The default key is
//! `name(args)`, so different producers sharing one store never share entries.
//!
//! ```rust,no_run
//! use bucketcache_cache::{CacheStore, JsonCodec, Memoized};
//! use std::time::Duration;
//!
//! let store = CacheStore::open("/tmp/prices-cache", Duration::from_secs(3600))?;
//! let fetch = Memoized::with_codec(
//!     &store,
//!     "prices",
//!     |_symbol: &String| -> bucketcache_cache::Result<Vec<f64>> { Ok(vec![1.0, 2.0]) },
//!     JsonCodec,
//! );
//! let prices = fetch.call(&"ACME".to_string())?;
//! # Ok::<(), bucketcache_cache::Error>(())
//! ```

use crate::codec::{Codec, FnCodec};
use crate::{CacheStore, Decision, Error, Result, Signature};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Derives the signature of a call from its arguments
pub trait KeyFn<A: ?Sized> {
    /// Signature for a call with `args`
    fn key(&self, args: &A) -> Result<Signature>;
}

impl<A: ?Sized, F> KeyFn<A> for F
where
    F: Fn(&A) -> Result<Signature>,
{
    fn key(&self, args: &A) -> Result<Signature> {
        self(args)
    }
}

/// Default key: the operation name wrapped around the serialized arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedKey {
    name: String,
}

impl NamedKey {
    /// Key calls as `name(args)`
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Operation name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<A: Serialize + ?Sized> KeyFn<A> for NamedKey {
    fn key(&self, args: &A) -> Result<Signature> {
        Signature::named(&self.name, args)
    }
}

/// A producer bound to a store, a codec and a key function
pub struct Memoized<'s, P, C, K> {
    store: &'s CacheStore,
    producer: P,
    codec: C,
    key: K,
}

/// Wrap `producer` with a writer/reader pair, keyed by [`NamedKey`]
pub fn memoize<'s, A, T, E, P, W, R>(
    store: &'s CacheStore,
    name: impl Into<String>,
    producer: P,
    writer: W,
    reader: R,
) -> Memoized<'s, P, FnCodec<W, R>, NamedKey>
where
    A: Serialize + ?Sized,
    P: Fn(&A) -> std::result::Result<T, E>,
    W: Fn(&T, &Path) -> Result<()>,
    R: Fn(&Path) -> Result<T>,
{
    Memoized::with_codec(store, name, producer, FnCodec::new(writer, reader))
}

impl<'s, P, C> Memoized<'s, P, C, NamedKey> {
    /// Wrap `producer` with `codec`, keyed by [`NamedKey`]
    pub fn with_codec<A, T, E>(
        store: &'s CacheStore,
        name: impl Into<String>,
        producer: P,
        codec: C,
    ) -> Self
    where
        A: Serialize + ?Sized,
        P: Fn(&A) -> std::result::Result<T, E>,
        C: Codec<T>,
    {
        Self {
            store,
            producer,
            codec,
            key: NamedKey::new(name),
        }
    }
}

impl<'s, P, C, K> Memoized<'s, P, C, K> {
    /// Replace the key function
    pub fn with_key<K2>(self, key: K2) -> Memoized<'s, P, C, K2> {
        Memoized {
            store: self.store,
            producer: self.producer,
            codec: self.codec,
            key,
        }
    }

    /// The backing store
    #[must_use]
    pub fn store(&self) -> &'s CacheStore {
        self.store
    }

    /// Invoke the wrapped producer, or serve its cached result.
    ///
    /// Producer errors are returned unchanged and leave the cache untouched.
    /// A result is committed to the log only after the codec has fully
    /// written it.
    pub fn call<A, T, E>(&self, args: &A) -> std::result::Result<T, E>
    where
        A: ?Sized,
        P: Fn(&A) -> std::result::Result<T, E>,
        C: Codec<T>,
        K: KeyFn<A>,
        E: From<Error>,
    {
        if self.store.is_dummy() {
            trace!("Cache bypassed");
            return (self.producer)(args);
        }

        let signature = self.key.key(args)?;
        let decision = self.store.decide(signature)?;

        if !decision.must_execute {
            debug!(
                signature = %decision.signature,
                path = %decision.artifact_path.display(),
                "Cache hit"
            );
            return self.codec.read(&decision.artifact_path).map_err(|e| {
                warn!(
                    signature = %decision.signature,
                    path = %decision.artifact_path.display(),
                    "Failed to read cached artifact: {e}"
                );
                E::from(e)
            });
        }

        debug!(
            signature = %decision.signature,
            reason = %decision.reason,
            path = %decision.artifact_path.display(),
            "Cache miss; running producer"
        );
        let value = (self.producer)(args)?;
        self.persist(&value, &decision)?;
        Ok(value)
    }

    fn persist<T>(&self, value: &T, decision: &Decision) -> Result<()>
    where
        C: Codec<T>,
    {
        let target = &decision.artifact_path;
        let staging = staging_path(target);

        if let Err(e) = self.codec.write(value, &staging) {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }
        fs::rename(&staging, target).map_err(|e| {
            let _ = fs::remove_file(&staging);
            Error::io(e, target, "rename")
        })?;

        self.store.commit(&decision.signature, target)
    }
}

// Writers fill a sibling file first so the artifact path only ever holds a
// complete value.
fn staging_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map_or_else(OsString::new, OsString::from);
    name.push(".partial");
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{BytesCodec, JsonCodec, write_file};
    use std::cell::Cell;
    use std::time::Duration;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn staging_path_is_sibling() {
        let p = staging_path(Path::new("/cache/0000000004"));
        assert_eq!(p, PathBuf::from("/cache/0000000004.partial"));
    }

    #[test]
    fn miss_then_hit() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::open(temp.path(), HOUR).unwrap();
        let calls = Cell::new(0);
        let fetch = Memoized::with_codec(
            &store,
            "range",
            |n: &u32| -> Result<Vec<u32>> {
                calls.set(calls.get() + 1);
                Ok((0..*n).collect())
            },
            JsonCodec,
        );

        assert_eq!(fetch.call(&3).unwrap(), vec![0, 1, 2]);
        assert_eq!(fetch.call(&3).unwrap(), vec![0, 1, 2]);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn failed_write_leaves_no_entry_and_no_partial_file() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::open(temp.path(), HOUR).unwrap();
        let fetch = memoize(
            &store,
            "payload",
            |_: &str| -> Result<Vec<u8>> { Ok(b"payload".to_vec()) },
            |value: &Vec<u8>, path: &Path| {
                write_file(path, &value[..2])?;
                Err(Error::codec(path, "disk full"))
            },
            |path: &Path| BytesCodec.read(path),
        );

        let err = fetch.call("key").unwrap_err();
        assert!(matches!(err, Error::Codec { .. }));
        assert!(store.read_log().unwrap().entries.is_empty());

        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != crate::store::LOG_FILE_NAME)
            .collect();
        assert!(leftovers.is_empty(), "unexpected files: {leftovers:?}");
    }

    #[test]
    fn default_key_is_named_after_the_operation() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::open(temp.path(), HOUR).unwrap();
        let fetch = Memoized::with_codec(
            &store,
            "range",
            |n: &u32| -> Result<Vec<u32>> { Ok((0..*n).collect()) },
            JsonCodec,
        );

        fetch.call(&2).unwrap();
        assert!(
            store
                .lookup(&Signature::new("range(2)"))
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn producers_sharing_a_store_keep_separate_entries() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::open(temp.path(), HOUR).unwrap();
        let prices = Memoized::with_codec(
            &store,
            "prices",
            |symbol: &str| -> Result<String> { Ok(format!("prices of {symbol}")) },
            JsonCodec,
        );
        let volume = Memoized::with_codec(
            &store,
            "volume",
            |symbol: &str| -> Result<String> { Ok(format!("volume of {symbol}")) },
            JsonCodec,
        );
        let trades = Memoized::with_codec(
            &store,
            "trades",
            |symbol: &str| -> Result<u64> { Ok(symbol.len() as u64) },
            JsonCodec,
        );

        assert_eq!(prices.call("ACME").unwrap(), "prices of ACME");
        assert_eq!(volume.call("ACME").unwrap(), "volume of ACME");
        assert_eq!(trades.call("ACME").unwrap(), 4);

        // Second round is served from the cache, still per operation
        assert_eq!(prices.call("ACME").unwrap(), "prices of ACME");
        assert_eq!(volume.call("ACME").unwrap(), "volume of ACME");
        assert_eq!(trades.call("ACME").unwrap(), 4);
        assert_eq!(store.read_log().unwrap().entries.len(), 3);
    }

    #[test]
    fn named_key_renders_arguments() {
        let key = NamedKey::new("get");
        assert_eq!(key.name(), "get");
        assert_eq!(
            KeyFn::<(&str, u8)>::key(&key, &("a", 1)).unwrap().as_str(),
            r#"get("a", 1)"#
        );
    }

    #[test]
    fn injected_key_function_is_used() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::open(temp.path(), HOUR).unwrap();
        let fetch = Memoized::with_codec(
            &store,
            "upper",
            |s: &String| -> Result<String> { Ok(s.to_uppercase()) },
            JsonCodec,
        )
        .with_key(|s: &String| -> Result<Signature> {
            Ok(Signature::new(format!("upper:{}", s.to_lowercase())))
        });

        assert_eq!(fetch.call(&"Abc".to_string()).unwrap(), "ABC");
        // Same key, so the first result is served
        assert_eq!(fetch.call(&"aBC".to_string()).unwrap(), "ABC");
        assert!(
            store
                .lookup(&Signature::new("upper:abc"))
                .unwrap()
                .is_some()
        );
    }
}
