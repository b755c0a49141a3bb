//! Reuse-or-execute decisions
//!
//! | logged | file exists | age > expiry | execute | reason            |
//! |--------|-------------|--------------|---------|-------------------|
//! | no     | -           | -            | yes     | `NotLogged`       |
//! | yes    | no          | -            | yes     | `ArtifactMissing` |
//! | yes    | yes         | no           | no      | `Fresh`           |
//! | yes    | yes         | yes          | yes     | `Expired`         |
//!
//! The artifact's modification time is the only age source.

use crate::{CacheStore, Result, Signature};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::trace;

/// Why a decision came out the way it did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// Signature never committed; a new path was allocated
    NotLogged,
    /// Logged, but the artifact file is gone
    ArtifactMissing,
    /// Artifact older than the expiry window
    Expired,
    /// Artifact present and within the expiry window
    Fresh,
}

impl DecisionReason {
    /// Stable lowercase name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotLogged => "not_logged",
            Self::ArtifactMissing => "artifact_missing",
            Self::Expired => "expired",
            Self::Fresh => "fresh",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of consulting the store for one call. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Call signature
    pub signature: Signature,
    /// Where the artifact lives, or will be written
    pub artifact_path: PathBuf,
    /// Whether the producer has to run
    pub must_execute: bool,
    /// Which row of the decision table applied
    pub reason: DecisionReason,
}

impl CacheStore {
    /// Decide whether `signature` can be served from the cache
    pub fn decide(&self, signature: Signature) -> Result<Decision> {
        self.decide_at(signature, SystemTime::now())
    }

    pub(crate) fn decide_at(&self, signature: Signature, now: SystemTime) -> Result<Decision> {
        let Some(artifact_path) = self.lookup(&signature)? else {
            return Ok(Decision {
                signature,
                artifact_path: self.allocate_path(),
                must_execute: true,
                reason: DecisionReason::NotLogged,
            });
        };

        let reason = match artifact_mtime(&artifact_path) {
            None => DecisionReason::ArtifactMissing,
            Some(modified) if is_expired(age_at(modified, now), self.expiry()) => {
                DecisionReason::Expired
            }
            Some(_) => DecisionReason::Fresh,
        };
        trace!(signature = %signature, %reason, path = %artifact_path.display(), "Cache decision");

        Ok(Decision {
            signature,
            artifact_path,
            must_execute: reason != DecisionReason::Fresh,
            reason,
        })
    }
}

/// Modification time of a regular file; anything unreadable counts as missing
pub(crate) fn artifact_mtime(path: &Path) -> Option<SystemTime> {
    let meta = fs::metadata(path).ok()?;
    if !meta.is_file() {
        return None;
    }
    meta.modified().ok()
}

/// Age relative to `now`; timestamps in the future count as zero
pub(crate) fn age_at(modified: SystemTime, now: SystemTime) -> Duration {
    now.duration_since(modified).unwrap_or(Duration::ZERO)
}

/// A zero window never reuses anything, whatever the timestamp resolution
pub(crate) fn is_expired(age: Duration, expiry: Duration) -> bool {
    expiry.is_zero() || age > expiry
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HOUR: Duration = Duration::from_secs(3600);

    fn store_with_artifact(temp: &TempDir, expiry: Duration) -> (CacheStore, PathBuf) {
        let store = CacheStore::open(temp.path(), expiry).unwrap();
        let path = store.allocate_path();
        fs::write(&path, b"cached").unwrap();
        store.commit(&Signature::new("sig"), &path).unwrap();
        (store, path)
    }

    #[test]
    fn unseen_signature_executes_with_fresh_path() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::open(temp.path(), HOUR).unwrap();

        let d = store.decide(Signature::new("new")).unwrap();
        assert!(d.must_execute);
        assert_eq!(d.reason, DecisionReason::NotLogged);
        assert!(d.artifact_path.starts_with(temp.path()));
        assert!(!d.artifact_path.exists());
    }

    #[test]
    fn unseen_signatures_get_distinct_paths() {
        let temp = TempDir::new().unwrap();
        let store = CacheStore::open(temp.path(), HOUR).unwrap();

        let a = store.decide(Signature::new("a")).unwrap();
        let b = store.decide(Signature::new("b")).unwrap();
        assert_ne!(a.artifact_path, b.artifact_path);
    }

    #[test]
    fn fresh_artifact_is_reused() {
        let temp = TempDir::new().unwrap();
        let (store, path) = store_with_artifact(&temp, HOUR);

        let d = store.decide(Signature::new("sig")).unwrap();
        assert!(!d.must_execute);
        assert_eq!(d.reason, DecisionReason::Fresh);
        assert_eq!(d.artifact_path, path);
    }

    #[test]
    fn expired_artifact_refreshes_in_place() {
        let temp = TempDir::new().unwrap();
        let (store, path) = store_with_artifact(&temp, HOUR);

        let later = SystemTime::now() + HOUR + Duration::from_secs(1);
        let d = store.decide_at(Signature::new("sig"), later).unwrap();
        assert!(d.must_execute);
        assert_eq!(d.reason, DecisionReason::Expired);
        assert_eq!(d.artifact_path, path);
    }

    #[test]
    fn missing_artifact_reuses_recorded_path() {
        let temp = TempDir::new().unwrap();
        let (store, path) = store_with_artifact(&temp, HOUR);
        fs::remove_file(&path).unwrap();

        let d = store.decide(Signature::new("sig")).unwrap();
        assert!(d.must_execute);
        assert_eq!(d.reason, DecisionReason::ArtifactMissing);
        assert_eq!(d.artifact_path, path);
    }

    #[test]
    fn zero_expiry_always_executes() {
        let temp = TempDir::new().unwrap();
        let (store, _) = store_with_artifact(&temp, Duration::ZERO);

        let d = store.decide(Signature::new("sig")).unwrap();
        assert!(d.must_execute);
        assert_eq!(d.reason, DecisionReason::Expired);
    }

    #[test]
    fn directory_at_artifact_path_counts_as_missing() {
        let temp = TempDir::new().unwrap();
        let (store, path) = store_with_artifact(&temp, HOUR);
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        let d = store.decide(Signature::new("sig")).unwrap();
        assert_eq!(d.reason, DecisionReason::ArtifactMissing);
    }

    #[test]
    fn future_mtime_has_zero_age() {
        let now = SystemTime::now();
        assert_eq!(age_at(now + HOUR, now), Duration::ZERO);
        assert_eq!(age_at(now - HOUR, now), HOUR);
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        assert!(!is_expired(HOUR, HOUR));
        assert!(is_expired(HOUR + Duration::from_nanos(1), HOUR));
        assert!(is_expired(Duration::ZERO, Duration::ZERO));
    }

    #[test]
    fn reason_names() {
        assert_eq!(DecisionReason::NotLogged.to_string(), "not_logged");
        assert_eq!(
            serde_json::to_string(&DecisionReason::ArtifactMissing).unwrap(),
            r#""artifact_missing""#
        );
    }
}
