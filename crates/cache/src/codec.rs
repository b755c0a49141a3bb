//! Artifact codecs
//!
//! A [`Codec`] is the writer/reader pair the memoizing wrapper uses to
//! persist a value to an artifact path and restore it later. Writers must
//! leave a complete file behind before returning.

use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::Path;

/// Writer/reader pair for one value type
pub trait Codec<T> {
    /// Serialize `value` to `path`, creating or overwriting the file
    fn write(&self, value: &T, path: &Path) -> Result<()>;

    /// Deserialize a value from `path`
    fn read(&self, path: &Path) -> Result<T>;
}

/// In-memory encoding, used by codecs that wrap other codecs
pub trait ByteCodec<T> {
    /// Encode a value
    fn encode(&self, value: &T) -> Result<Vec<u8>>;

    /// Decode a value
    fn decode(&self, bytes: &[u8]) -> Result<T>;
}

/// Codec built from a writer closure and a reader closure
pub struct FnCodec<W, R> {
    writer: W,
    reader: R,
}

impl<W, R> FnCodec<W, R> {
    /// Pair a writer with its matching reader
    pub const fn new(writer: W, reader: R) -> Self {
        Self { writer, reader }
    }
}

impl<T, W, R> Codec<T> for FnCodec<W, R>
where
    W: Fn(&T, &Path) -> Result<()>,
    R: Fn(&Path) -> Result<T>,
{
    fn write(&self, value: &T, path: &Path) -> Result<()> {
        (self.writer)(value, path)
    }

    fn read(&self, path: &Path) -> Result<T> {
        (self.reader)(path)
    }
}

/// Pretty-printed JSON for any serde type
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl<T: Serialize + DeserializeOwned> ByteCodec<T> for JsonCodec {
    fn encode(&self, value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(value)
            .map_err(|e| Error::serialization(format!("Failed to encode JSON artifact: {e}")))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::serialization(format!("Failed to decode JSON artifact: {e}")))
    }
}

impl<T: Serialize + DeserializeOwned> Codec<T> for JsonCodec {
    fn write(&self, value: &T, path: &Path) -> Result<()> {
        let bytes = ByteCodec::<T>::encode(self, value)?;
        write_file(path, &bytes)
    }

    fn read(&self, path: &Path) -> Result<T> {
        let bytes = read_file(path)?;
        ByteCodec::<T>::decode(self, &bytes).map_err(|e| Error::codec(path, e.to_string()))
    }
}

/// Raw bytes, stored verbatim
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl ByteCodec<Vec<u8>> for BytesCodec {
    fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>> {
        Ok(value.clone())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(bytes.to_vec())
    }
}

impl Codec<Vec<u8>> for BytesCodec {
    fn write(&self, value: &Vec<u8>, path: &Path) -> Result<()> {
        write_file(path, value)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        read_file(path)
    }
}

/// zstd compression around another codec's encoding
#[derive(Debug, Clone, Copy)]
pub struct ZstdCodec<C, T> {
    inner: C,
    level: i32,
    _value: PhantomData<fn() -> T>,
}

impl<C, T> ZstdCodec<C, T> {
    /// Default compression level
    pub const DEFAULT_LEVEL: i32 = 3;

    /// Compress `inner`'s output at the default level
    pub const fn new(inner: C) -> Self {
        Self::with_level(inner, Self::DEFAULT_LEVEL)
    }

    /// Compress `inner`'s output at `level`
    pub const fn with_level(inner: C, level: i32) -> Self {
        Self {
            inner,
            level,
            _value: PhantomData,
        }
    }
}

impl<C: ByteCodec<T>, T> Codec<T> for ZstdCodec<C, T> {
    fn write(&self, value: &T, path: &Path) -> Result<()> {
        let raw = self.inner.encode(value)?;
        let compressed = zstd::encode_all(raw.as_slice(), self.level)
            .map_err(|e| Error::codec(path, format!("zstd encode failed: {e}")))?;
        write_file(path, &compressed)
    }

    fn read(&self, path: &Path) -> Result<T> {
        let compressed = read_file(path)?;
        let raw = zstd::decode_all(compressed.as_slice())
            .map_err(|e| Error::codec(path, format!("zstd decode failed: {e}")))?;
        self.inner
            .decode(&raw)
            .map_err(|e| Error::codec(path, e.to_string()))
    }
}

/// Create or truncate `path`, write `bytes`, and sync before returning
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path).map_err(|e| Error::io(e, path, "create"))?;
    file.write_all(bytes)
        .map_err(|e| Error::io(e, path, "write"))?;
    file.sync_all().map_err(|e| Error::io(e, path, "sync"))
}

/// Read a whole artifact
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::io(e, path, "read"))
}
