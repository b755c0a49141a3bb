//! Command implementations

use crate::cli::{Cli, Commands, EntriesFormat, SourceArgs, split_key};
use crate::tracing::correlation_id;
use bucketcache_bucket::{BucketManager, FsObjectStore, HttpObjectStore, ObjectStore};
use bucketcache_cache::{CacheConfig, EnvOverrides, LogEntry};
use chrono::SecondsFormat;
use miette::{IntoDiagnostic, WrapErr};
use secrecy::SecretString;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{info, info_span, warn};

/// Run the parsed command
pub fn execute(cli: Cli) -> miette::Result<()> {
    let config = cli.cache_config(&EnvOverrides::from_env())?;
    let _span = info_span!("command", correlation_id = %correlation_id()).entered();

    match cli.command {
        Commands::Get {
            key,
            source,
            output,
            compressed,
        } => get(&config, &key, &source, output.as_deref(), compressed),
        Commands::Put { key, file, source } => put(&key, &file, &source),
        Commands::Entries { format } => entries(&config, format),
    }
}

fn object_store(source: &SourceArgs) -> miette::Result<Box<dyn ObjectStore>> {
    if let Some(endpoint) = &source.endpoint {
        let mut store = HttpObjectStore::with_timeout(
            endpoint,
            &source.bucket,
            Duration::from_secs(source.timeout_secs),
        )?;
        if let Some(token) = &source.token {
            store = store.with_token(SecretString::from(token.clone()));
        }
        return Ok(Box::new(store));
    }
    match &source.local {
        Some(root) => Ok(Box::new(FsObjectStore::new(root, &source.bucket)?)),
        None => Err(miette::miette!("Either --endpoint or --local is required")),
    }
}

fn get(
    config: &CacheConfig,
    key: &str,
    source: &SourceArgs,
    output: Option<&Path>,
    compressed: bool,
) -> miette::Result<()> {
    let (folders, name) = split_key(key)?;
    let manager = BucketManager::with_cache(object_store(source)?, config.open_store()?);

    let body = if compressed {
        manager.get_bytes_compressed(&folders, name)?
    } else {
        manager.get_bytes(&folders, name)?
    };

    match output {
        Some(path) => {
            fs::write(path, &body)
                .into_diagnostic()
                .wrap_err_with(|| format!("Failed to write {}", path.display()))?;
            info!(key, path = %path.display(), bytes = body.len(), "Wrote object");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&body).into_diagnostic()?;
            stdout.flush().into_diagnostic()?;
        }
    }
    Ok(())
}

fn put(key: &str, file: &Path, source: &SourceArgs) -> miette::Result<()> {
    let (folders, name) = split_key(key)?;
    let body = fs::read(file)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to read {}", file.display()))?;
    let manager = BucketManager::new(object_store(source)?);
    manager.put_bytes(&body, &folders, name)?;
    Ok(())
}

fn entries(config: &CacheConfig, format: EntriesFormat) -> miette::Result<()> {
    let store = config.open_store()?;
    if store.is_dummy() {
        warn!("Cache is disabled; there are no entries to list");
    }
    let entries = store.entries()?;

    let mut stdout = io::stdout().lock();
    match format {
        EntriesFormat::Table => {
            for entry in &entries {
                writeln!(stdout, "{}", table_row(entry)).into_diagnostic()?;
            }
        }
        EntriesFormat::Json => {
            serde_json::to_writer_pretty(&mut stdout, &entries).into_diagnostic()?;
            writeln!(stdout).into_diagnostic()?;
        }
    }
    stdout.flush().into_diagnostic()
}

fn table_row(entry: &LogEntry) -> String {
    let state = match (entry.modified, entry.fresh) {
        (None, _) => "missing",
        (Some(_), true) => "fresh",
        (Some(_), false) => "stale",
    };
    let modified = entry.modified.map_or_else(
        || "-".to_string(),
        |m| m.to_rfc3339_opts(SecondsFormat::Secs, true),
    );
    let age = entry
        .age
        .map_or_else(|| "-".to_string(), |a| a.as_secs().to_string());
    format!(
        "{state}\t{modified}\t{age}\t{}\t{}",
        entry.path.display(),
        entry.signature
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucketcache_cache::Signature;
    use chrono::{TimeZone, Utc};
    use std::path::PathBuf;

    fn entry(modified: bool, fresh: bool) -> LogEntry {
        LogEntry {
            signature: Signature::new(r#"get_bytes("b", "k")"#),
            path: PathBuf::from("/cache/0000000000"),
            modified: modified.then(|| Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
            age: modified.then(|| Duration::from_secs(90)),
            fresh,
        }
    }

    #[test]
    fn table_rows() {
        assert_eq!(
            table_row(&entry(true, true)),
            "fresh\t2024-05-01T12:00:00Z\t90\t/cache/0000000000\tget_bytes(\"b\", \"k\")"
        );
        assert!(table_row(&entry(true, false)).starts_with("stale\t"));
        assert!(table_row(&entry(false, false)).starts_with("missing\t-\t-\t"));
    }

    #[test]
    fn local_source_builds_fs_store() {
        let source = SourceArgs {
            bucket: "b".into(),
            endpoint: None,
            local: Some(PathBuf::from("/srv/objects")),
            token: None,
            timeout_secs: 30,
        };
        assert_eq!(object_store(&source).unwrap().bucket(), "b");
    }

    #[test]
    fn missing_source_is_an_error() {
        let source = SourceArgs {
            bucket: "b".into(),
            endpoint: None,
            local: None,
            token: None,
            timeout_secs: 30,
        };
        assert!(object_store(&source).is_err());
    }
}
