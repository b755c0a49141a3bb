//! Cache configuration
//!
//! Configuration comes from a TOML file (`[cache]` table), then environment
//! overrides, then whatever the caller sets explicitly:
//!
//! ```toml
//! [cache]
//! directory = "/var/cache/bucketcache"
//! expiry_secs = 3600
//! dummy = false
//! ```

use crate::store::ensure_writable;
use crate::{CacheStore, Error, Result};
use dirs::{cache_dir, home_dir};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default expiry window: one day
pub const DEFAULT_EXPIRY_SECS: u64 = 86_400;

/// Overrides the cache directory
pub const ENV_CACHE_DIR: &str = "BUCKETCACHE_CACHE_DIR";
/// Overrides the expiry window, in seconds
pub const ENV_EXPIRY_SECS: &str = "BUCKETCACHE_EXPIRY_SECS";
/// Enables dummy (pass-through) mode when truthy
pub const ENV_NO_CACHE: &str = "BUCKETCACHE_NO_CACHE";

/// Settings needed to build a [`CacheStore`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Cache root; resolved with [`default_cache_root`] when unset
    pub directory: Option<PathBuf>,
    /// Maximum artifact age in seconds
    pub expiry_secs: u64,
    /// Bypass caching entirely
    pub dummy: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: None,
            expiry_secs: DEFAULT_EXPIRY_SECS,
            dummy: false,
        }
    }
}

// Other tools may share the file, so only the `[cache]` table is strict.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    cache: CacheConfig,
}

/// Raw environment values, separated from `std::env` for testing
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    /// Value of [`ENV_CACHE_DIR`]
    pub cache_dir: Option<String>,
    /// Value of [`ENV_EXPIRY_SECS`]
    pub expiry_secs: Option<String>,
    /// Value of [`ENV_NO_CACHE`]
    pub no_cache: Option<String>,
}

impl EnvOverrides {
    /// Capture the current process environment
    #[must_use]
    pub fn from_env() -> Self {
        let var = |key: &str| {
            std::env::var(key)
                .ok()
                .filter(|s| !s.trim().is_empty())
        };
        Self {
            cache_dir: var(ENV_CACHE_DIR),
            expiry_secs: var(ENV_EXPIRY_SECS),
            no_cache: var(ENV_NO_CACHE),
        }
    }
}

impl CacheConfig {
    /// Parse the `[cache]` table of a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)
            .map_err(|e| Error::configuration(format!("Invalid cache configuration: {e}")))?;
        Ok(file.cache)
    }

    /// Load a TOML configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::io(e, path, "read"))?;
        Self::from_toml_str(&content)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(&EnvOverrides::from_env())
    }

    /// Apply captured environment overrides
    pub fn apply_overrides(mut self, env: &EnvOverrides) -> Result<Self> {
        if let Some(dir) = &env.cache_dir {
            self.directory = Some(PathBuf::from(dir));
        }
        if let Some(raw) = &env.expiry_secs {
            self.expiry_secs = raw.trim().parse().map_err(|e| {
                Error::configuration(format!("{ENV_EXPIRY_SECS}={raw:?} is not a number of seconds: {e}"))
            })?;
        }
        if let Some(raw) = &env.no_cache {
            self.dummy = parse_flag(raw).ok_or_else(|| {
                Error::configuration(format!("{ENV_NO_CACHE}={raw:?} is not a boolean"))
            })?;
        }
        Ok(self)
    }

    /// Expiry window as a duration
    #[must_use]
    pub const fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }

    /// Build the store this configuration describes.
    ///
    /// An explicitly configured directory that cannot be used is an error;
    /// this never falls back to dummy mode.
    pub fn open_store(&self) -> Result<CacheStore> {
        if self.dummy {
            debug!("Cache disabled; using pass-through store");
            return Ok(CacheStore::dummy(self.expiry()));
        }
        let directory = match &self.directory {
            Some(dir) => dir.clone(),
            None => default_cache_root()?,
        };
        CacheStore::open(directory, self.expiry())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Inputs for determining the default cache root
#[derive(Debug, Clone)]
struct RootInputs {
    override_dir: Option<PathBuf>,
    xdg_cache_home: Option<PathBuf>,
    os_cache_dir: Option<PathBuf>,
    home_dir: Option<PathBuf>,
    temp_dir: PathBuf,
}

fn cache_root_from_inputs(inputs: RootInputs) -> Result<PathBuf> {
    // First usable wins: override, XDG, OS cache dir, ~/.bucketcache, TMPDIR
    let RootInputs {
        override_dir,
        xdg_cache_home,
        os_cache_dir,
        home_dir,
        temp_dir,
    } = inputs;
    let candidates = override_dir
        .filter(|p| !p.as_os_str().is_empty())
        .into_iter()
        .chain(xdg_cache_home.map(|p| p.join("bucketcache")))
        .chain(os_cache_dir.map(|p| p.join("bucketcache")))
        .chain(home_dir.map(|p| p.join(".bucketcache/cache")))
        .chain(std::iter::once(temp_dir.join("bucketcache/cache")));

    candidates
        // Nix build sandboxes point HOME at a directory that never exists
        .filter(|path| !path.starts_with("/homeless-shelter"))
        .find(|path| {
            let usable = fs::create_dir_all(path).is_ok() && ensure_writable(path).is_ok();
            if !usable {
                debug!(path = %path.display(), "Skipping unusable cache root candidate");
            }
            usable
        })
        .ok_or_else(|| Error::configuration("Failed to determine a writable cache directory"))
}

/// Resolve the default cache root from the environment and platform directories
pub fn default_cache_root() -> Result<PathBuf> {
    let env_path = |key: &str| {
        std::env::var(key)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
    };
    cache_root_from_inputs(RootInputs {
        override_dir: env_path(ENV_CACHE_DIR),
        xdg_cache_home: env_path("XDG_CACHE_HOME"),
        os_cache_dir: cache_dir(),
        home_dir: home_dir(),
        temp_dir: std::env::temp_dir(),
    })
}
