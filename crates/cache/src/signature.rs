//! Call signatures for memoized operations
//!
//! A [`Signature`] is the key under which a call's result is recorded in the
//! cache log. Arguments are rendered through their canonical JSON encoding
//! (object keys sorted), so two calls with equal argument values produce the
//! same signature regardless of how the values were built.
//!
//! ```text
//! get_json("bucket", ["raw", "2024"], fn="prices.json")
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Deterministic key identifying a logical call
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// Use a caller-supplied key as-is
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derive a signature from a value.
    ///
    /// Sequences (tuples, arrays, vectors) are treated as positional argument
    /// lists: `Signature::of(&("a", 1))` renders as `"a", 1`.
    pub fn of<A: Serialize + ?Sized>(args: &A) -> Result<Self> {
        Ok(SignatureBuilder::new().args(args)?.build())
    }

    /// Derive a signature for the operation `name` called with `args`.
    ///
    /// `Signature::named("prices", &("ACME", 3))` renders as `prices("ACME", 3)`.
    pub fn named<A: Serialize + ?Sized>(name: &str, args: &A) -> Result<Self> {
        Ok(SignatureBuilder::named(name).args(args)?.build())
    }

    /// Derive a fixed-length signature: SHA-256 over the canonical form
    pub fn hashed<A: Serialize + ?Sized>(args: &A) -> Result<Self> {
        let canonical = Self::of(args)?;
        let digest = Sha256::digest(canonical.0.as_bytes());
        Ok(Self(hex::encode(digest)))
    }

    /// Borrow the signature text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the underlying string
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Signature {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<String> for Signature {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Signature {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Incremental builder mirroring a call's positional and keyword arguments
#[derive(Debug, Clone, Default)]
pub struct SignatureBuilder {
    name: Option<String>,
    parts: Vec<String>,
}

impl SignatureBuilder {
    /// Start an empty signature
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a signature for a named operation; the name wraps the argument list
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            parts: Vec::new(),
        }
    }

    /// Append a positional argument
    pub fn arg<A: Serialize + ?Sized>(mut self, value: &A) -> Result<Self> {
        let value = to_canonical_value(value)?;
        self.parts.push(render(&value)?);
        Ok(self)
    }

    /// Append every element of a sequence as a positional argument; any
    /// other value is appended as a single argument
    pub fn args<A: Serialize + ?Sized>(mut self, values: &A) -> Result<Self> {
        match to_canonical_value(values)? {
            serde_json::Value::Array(items) => {
                for item in &items {
                    self.parts.push(render(item)?);
                }
            }
            other => self.parts.push(render(&other)?),
        }
        Ok(self)
    }

    /// Append a keyword argument, rendered as `name=value`
    pub fn kwarg<A: Serialize + ?Sized>(mut self, name: &str, value: &A) -> Result<Self> {
        let value = to_canonical_value(value)?;
        self.parts.push(format!("{name}={}", render(&value)?));
        Ok(self)
    }

    /// Finish the signature
    #[must_use]
    pub fn build(self) -> Signature {
        let joined = self.parts.join(", ");
        match self.name {
            Some(name) => Signature(format!("{name}({joined})")),
            None => Signature(joined),
        }
    }
}

// serde_json's default map is ordered, so converting through Value sorts object keys.
fn to_canonical_value<A: Serialize + ?Sized>(value: &A) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| Error::serialization(format!("Failed to encode call argument: {e}")))
}

fn render(value: &serde_json::Value) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::serialization(format!("Failed to render call argument: {e}")))
}
