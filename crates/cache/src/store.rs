//! Disk-backed cache store
//!
//! A store owns one directory containing a JSON log and the artifact files
//! it references:
//!
//! ```text
//! <directory>/
//!   log.json      # { "metadata": {...}, "entries": { "<signature>": "0000000000" } }
//!   0000000000    # artifact for one signature
//!   0000000001
//! ```
//!
//! The log is rewritten in full on every commit. Within one process commits
//! are serialized; separate processes sharing a directory are not coordinated
//! and the last writer wins.

use crate::{Error, Result, Signature};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, trace};

/// File name of the log inside a cache directory
pub const LOG_FILE_NAME: &str = "log.json";

/// Current on-disk log format
pub const LOG_FORMAT_VERSION: u32 = 1;

const ARTIFACT_NAME_WIDTH: usize = 10;

/// Store-level metadata recorded when the log is first created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    /// Log format version
    pub format_version: u32,
    /// When the log was created
    pub created_at: DateTime<Utc>,
    /// Tool and version that created the log
    pub created_by: String,
    /// Free-form configuration fingerprint
    #[serde(default)]
    pub fingerprint: BTreeMap<String, String>,
}

impl CacheMetadata {
    /// Metadata stamped with the current time and crate version
    #[must_use]
    pub fn new() -> Self {
        Self {
            format_version: LOG_FORMAT_VERSION,
            created_at: Utc::now(),
            created_by: format!("bucketcache {}", env!("CARGO_PKG_VERSION")),
            fingerprint: BTreeMap::new(),
        }
    }

    /// Add a fingerprint field
    #[must_use]
    pub fn with_fingerprint(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fingerprint.insert(key.into(), value.into());
        self
    }
}

impl Default for CacheMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// Persisted log: store metadata plus the signature → artifact mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheLog {
    /// Store metadata
    pub metadata: CacheMetadata,
    /// Artifact location per signature, relative to the store directory
    #[serde(default)]
    pub entries: BTreeMap<Signature, PathBuf>,
}

/// One log entry as seen on inspection
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// Call signature
    pub signature: Signature,
    /// Resolved artifact path
    pub path: PathBuf,
    /// Artifact modification time, if the file exists
    pub modified: Option<DateTime<Utc>>,
    /// Artifact age, if the file exists
    pub age: Option<Duration>,
    /// Whether a call with this signature would reuse the artifact right now
    pub fresh: bool,
}

/// Persistent mapping from call signatures to cached artifacts
#[derive(Debug)]
pub struct CacheStore {
    directory: PathBuf,
    expiry: Duration,
    dummy: bool,
    next_artifact: AtomicU64,
    commit_lock: Mutex<()>,
}

impl CacheStore {
    /// Open (or create) a store in `directory`.
    ///
    /// Existing entries are preserved; a malformed log is a hard error.
    pub fn open(directory: impl Into<PathBuf>, expiry: Duration) -> Result<Self> {
        let metadata =
            CacheMetadata::new().with_fingerprint("expiry_secs", expiry.as_secs().to_string());
        Self::open_with_metadata(directory, expiry, metadata)
    }

    /// Open (or create) a store, recording `metadata` if the log is new
    pub fn open_with_metadata(
        directory: impl Into<PathBuf>,
        expiry: Duration,
        metadata: CacheMetadata,
    ) -> Result<Self> {
        let directory = directory.into();
        if directory.as_os_str().is_empty() {
            return Err(Error::configuration("cache directory must not be empty"));
        }
        fs::create_dir_all(&directory).map_err(|e| Error::io(e, &directory, "create_dir_all"))?;
        ensure_writable(&directory)?;

        let log_path = directory.join(LOG_FILE_NAME);
        let log = if log_path.exists() {
            read_log(&log_path)?
        } else {
            let log = CacheLog {
                metadata,
                entries: BTreeMap::new(),
            };
            write_log(&log_path, &log)?;
            debug!(path = %log_path.display(), "Created cache log");
            log
        };

        let next = next_artifact_number(&directory, &log)?;
        info!(
            directory = %directory.display(),
            expiry_secs = expiry.as_secs(),
            entries = log.entries.len(),
            "Opened cache store"
        );

        Ok(Self {
            directory,
            expiry,
            dummy: false,
            next_artifact: AtomicU64::new(next),
            commit_lock: Mutex::new(()),
        })
    }

    /// A pass-through store: never reuses, never writes anything to disk
    #[must_use]
    pub fn dummy(expiry: Duration) -> Self {
        Self {
            directory: PathBuf::new(),
            expiry,
            dummy: true,
            next_artifact: AtomicU64::new(0),
            commit_lock: Mutex::new(()),
        }
    }

    /// Store root directory (empty for a dummy store)
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Maximum artifact age before a refresh is required
    #[must_use]
    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Whether caching is bypassed
    #[must_use]
    pub fn is_dummy(&self) -> bool {
        self.dummy
    }

    /// Location of the log file
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        self.directory.join(LOG_FILE_NAME)
    }

    /// Read the full log from disk
    pub fn read_log(&self) -> Result<CacheLog> {
        if self.dummy {
            return Err(Error::configuration("dummy cache store has no log"));
        }
        read_log(&self.log_path())
    }

    /// Store metadata as recorded in the log
    pub fn metadata(&self) -> Result<CacheMetadata> {
        self.read_log().map(|log| log.metadata)
    }

    /// Recorded artifact path for `signature`, if the signature was ever committed
    pub fn lookup(&self, signature: &Signature) -> Result<Option<PathBuf>> {
        if self.dummy {
            return Ok(None);
        }
        let log = self.read_log()?;
        Ok(log.entries.get(signature).map(|p| self.resolve(p)))
    }

    /// Reserve a fresh artifact path inside the store directory.
    ///
    /// Paths are never handed out twice by one store instance. The log is not
    /// touched; the path becomes visible to lookups only after [`commit`](Self::commit).
    #[must_use]
    pub fn allocate_path(&self) -> PathBuf {
        loop {
            let n = self.next_artifact.fetch_add(1, Ordering::Relaxed);
            let path = self.directory.join(artifact_name(n));
            if !path.exists() {
                trace!(path = %path.display(), "Allocated artifact path");
                return path;
            }
        }
    }

    /// Record `signature → artifact_path` in the log and persist it
    pub fn commit(&self, signature: &Signature, artifact_path: &Path) -> Result<()> {
        if self.dummy {
            return Ok(());
        }
        let _guard = self.commit_lock.lock();
        let log_path = self.log_path();
        let mut log = read_log(&log_path)?;
        let stored = artifact_path
            .strip_prefix(&self.directory)
            .map_or_else(|_| artifact_path.to_path_buf(), Path::to_path_buf);
        log.entries.insert(signature.clone(), stored);
        write_log(&log_path, &log)?;
        debug!(
            signature = %signature,
            path = %artifact_path.display(),
            "Committed cache entry"
        );
        Ok(())
    }

    /// All log entries with their current on-disk state
    pub fn entries(&self) -> Result<Vec<LogEntry>> {
        if self.dummy {
            return Ok(Vec::new());
        }
        let now = SystemTime::now();
        let log = self.read_log()?;
        Ok(log
            .entries
            .into_iter()
            .map(|(signature, stored)| {
                let path = self.resolve(&stored);
                let modified = crate::decision::artifact_mtime(&path);
                let age = modified.map(|m| crate::decision::age_at(m, now));
                LogEntry {
                    fresh: age.is_some_and(|a| !crate::decision::is_expired(a, self.expiry)),
                    modified: modified.map(DateTime::<Utc>::from),
                    age,
                    signature,
                    path,
                }
            })
            .collect())
    }

    fn resolve(&self, stored: &Path) -> PathBuf {
        if stored.is_absolute() {
            stored.to_path_buf()
        } else {
            self.directory.join(stored)
        }
    }
}

fn artifact_name(n: u64) -> String {
    format!("{n:0width$}", width = ARTIFACT_NAME_WIDTH)
}

fn parse_artifact_name(path: &Path) -> Option<u64> {
    let name = path.file_name()?.to_str()?;
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

// Seed from both the directory and the log: an entry may point at a file
// that was deleted out-of-band, and its name must still not be reused.
fn next_artifact_number(directory: &Path, log: &CacheLog) -> Result<u64> {
    let mut highest: Option<u64> = log
        .entries
        .values()
        .filter_map(|p| parse_artifact_name(p))
        .max();

    let read_dir =
        fs::read_dir(directory).map_err(|e| Error::io(e, directory, "read_dir"))?;
    for entry in read_dir {
        let entry = entry.map_err(|e| Error::io(e, directory, "read_dir_entry"))?;
        if let Some(n) = parse_artifact_name(&entry.path()) {
            highest = Some(highest.map_or(n, |h| h.max(n)));
        }
    }
    Ok(highest.map_or(0, |h| h.saturating_add(1)))
}

/// Fails unless a file can be created inside `directory`.
pub(crate) fn ensure_writable(directory: &Path) -> Result<()> {
    let marker = directory.join(".writable");
    fs::OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&marker)
        .map_err(|e| Error::io(e, &marker, "check_writable"))?;
    let _ = fs::remove_file(&marker);
    Ok(())
}

fn read_log(path: &Path) -> Result<CacheLog> {
    let content = fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
    serde_json::from_str(&content).map_err(|e| Error::corrupt_log(path, e.to_string()))
}

fn write_log(path: &Path, log: &CacheLog) -> Result<()> {
    let json = serde_json::to_vec_pretty(log)
        .map_err(|e| Error::serialization(format!("Failed to serialize cache log: {e}")))?;

    // Write to a sibling file and rename so readers never see a torn log
    let tmp_path = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp_path).map_err(|e| Error::io(e, &tmp_path, "create"))?;
    file.write_all(&json)
        .map_err(|e| Error::io(e, &tmp_path, "write"))?;
    file.sync_all()
        .map_err(|e| Error::io(e, &tmp_path, "sync"))?;
    drop(file);

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        Error::io(e, path, "rename")
    })
}
