use crate::tracing::{LogLevel, TracingFormat};
use bucketcache_bucket::validate_key;
use bucketcache_cache::{CacheConfig, EnvOverrides};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "bucketcache")]
#[command(about = "Fetch objects from a bucket through a local disk cache")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Commands,

    /// Set logging level
    #[arg(short = 'l', long, global = true, default_value = "warn", value_enum)]
    pub level: LogLevel,

    /// Log output format (pretty, compact, json)
    #[arg(long, global = true, default_value = "compact")]
    pub log_format: TracingFormat,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// TOML file with a `[cache]` table
    #[arg(long, global = true, env = "BUCKETCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Cache directory
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Maximum age of a cached object, in seconds
    #[arg(long, global = true)]
    pub expiry_secs: Option<u64>,

    /// Bypass the cache entirely
    #[arg(long, global = true)]
    pub no_cache: bool,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download an object through the cache
    Get {
        /// Object key, e.g. `prices/2024/daily.json`
        key: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Write the body to this file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Keep the cached copy zstd-compressed
        #[arg(long)]
        compressed: bool,
    },
    /// Upload a file as an object (never cached)
    Put {
        /// Object key
        key: String,

        /// File to upload
        file: PathBuf,

        #[command(flatten)]
        source: SourceArgs,
    },
    /// List the entries recorded in the cache log
    Entries {
        /// Output format
        #[arg(long, default_value = "table", value_enum)]
        format: EntriesFormat,
    },
}

/// Where objects come from
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Bucket name
    #[arg(long, short = 'b')]
    pub bucket: String,

    /// Base URL of an HTTP object store
    #[arg(long, conflicts_with = "local", required_unless_present = "local")]
    pub endpoint: Option<String>,

    /// Directory holding one sub-directory per bucket
    #[arg(long)]
    pub local: Option<PathBuf>,

    /// Bearer token for the HTTP object store
    #[arg(long, env = "BUCKETCACHE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// HTTP request timeout, in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

/// Output format for `entries`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EntriesFormat {
    /// One tab-separated line per entry
    Table,
    /// JSON array
    Json,
}

impl Cli {
    /// Tracing format after applying `--json`
    pub fn tracing_format(&self) -> TracingFormat {
        if self.json {
            TracingFormat::Json
        } else {
            self.log_format
        }
    }

    /// Resolve cache settings: file, then environment, then flags
    pub fn cache_config(&self, env: &EnvOverrides) -> bucketcache_cache::Result<CacheConfig> {
        let base = match &self.config {
            Some(path) => CacheConfig::load(path)?,
            None => CacheConfig::default(),
        };
        let mut config = base.apply_overrides(env)?;
        if let Some(dir) = &self.cache_dir {
            config.directory = Some(dir.clone());
        }
        if let Some(secs) = self.expiry_secs {
            config.expiry_secs = secs;
        }
        if self.no_cache {
            config.dummy = true;
        }
        Ok(config)
    }
}

/// Split an object key into its folders and file name.
///
/// Keys with empty, `.` or `..` segments are rejected rather than normalized.
pub fn split_key(key: &str) -> bucketcache_bucket::Result<(Vec<&str>, &str)> {
    validate_key(key)?;
    Ok(match key.rsplit_once('/') {
        Some((folders, name)) => (folders.split('/').collect(), name),
        None => (Vec::new(), key),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["bucketcache", "entries"]).unwrap();
        assert_eq!(cli.level, LogLevel::Warn);
        assert_eq!(cli.tracing_format(), TracingFormat::Compact);
        assert!(!cli.no_cache);
        assert!(matches!(
            cli.command,
            Commands::Entries {
                format: EntriesFormat::Table
            }
        ));
    }

    #[test]
    fn json_flag_wins_over_log_format() {
        let cli = Cli::try_parse_from([
            "bucketcache",
            "--log-format",
            "pretty",
            "--json",
            "entries",
        ])
        .unwrap();
        assert_eq!(cli.tracing_format(), TracingFormat::Json);
    }

    #[test]
    fn get_with_local_source() {
        let cli = Cli::try_parse_from([
            "bucketcache",
            "get",
            "prices/daily.json",
            "--bucket",
            "market",
            "--local",
            "/srv/objects",
            "-o",
            "out.json",
        ])
        .unwrap();
        let Commands::Get {
            key,
            source,
            output,
            compressed,
        } = cli.command
        else {
            panic!("expected get");
        };
        assert_eq!(key, "prices/daily.json");
        assert_eq!(source.bucket, "market");
        assert_eq!(source.local, Some(PathBuf::from("/srv/objects")));
        assert_eq!(source.endpoint, None);
        assert_eq!(output, Some(PathBuf::from("out.json")));
        assert!(!compressed);
    }

    #[test]
    fn get_requires_exactly_one_source() {
        assert!(Cli::try_parse_from(["bucketcache", "get", "k", "--bucket", "b"]).is_err());
        assert!(
            Cli::try_parse_from([
                "bucketcache",
                "get",
                "k",
                "--bucket",
                "b",
                "--local",
                "/x",
                "--endpoint",
                "http://localhost",
            ])
            .is_err()
        );
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "bucketcache",
            "put",
            "k",
            "file.bin",
            "--bucket",
            "b",
            "--endpoint",
            "http://localhost:9000",
            "--no-cache",
            "--level",
            "debug",
        ])
        .unwrap();
        assert!(cli.no_cache);
        assert_eq!(cli.level, LogLevel::Debug);
    }

    #[test]
    fn invalid_log_level() {
        assert!(Cli::try_parse_from(["bucketcache", "--level", "loud", "entries"]).is_err());
    }

    #[test]
    fn flags_override_environment() {
        let cli = Cli::try_parse_from([
            "bucketcache",
            "--cache-dir",
            "/tmp/flag",
            "--expiry-secs",
            "5",
            "entries",
        ])
        .unwrap();
        let env = EnvOverrides {
            cache_dir: Some("/tmp/env".into()),
            expiry_secs: Some("60".into()),
            no_cache: None,
        };
        let config = cli.cache_config(&env).unwrap();
        assert_eq!(config.directory, Some(PathBuf::from("/tmp/flag")));
        assert_eq!(config.expiry(), Duration::from_secs(5));
        assert!(!config.dummy);
    }

    #[test]
    fn environment_applies_without_flags() {
        let cli = Cli::try_parse_from(["bucketcache", "entries"]).unwrap();
        let env = EnvOverrides {
            no_cache: Some("1".into()),
            ..EnvOverrides::default()
        };
        assert!(cli.cache_config(&env).unwrap().dummy);
    }

    #[test]
    fn key_splitting() {
        assert_eq!(
            split_key("prices/2024/daily.json").unwrap(),
            (vec!["prices", "2024"], "daily.json")
        );
        assert_eq!(split_key("daily.json").unwrap(), (vec![], "daily.json"));
    }

    #[test]
    fn malformed_keys_are_rejected_not_normalized() {
        for key in ["/a.txt", "a//b.txt", "a/", "./a.txt", "a/../b.txt", ""] {
            assert!(split_key(key).is_err(), "{key:?} should be rejected");
        }
    }
}
