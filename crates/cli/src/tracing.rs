//! Tracing configuration for the bucketcache CLI
//!
//! Logs go to stderr so command output on stdout stays clean.

use std::io;
pub use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Tracing output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Pretty-printed human-readable format
    Pretty,
    /// Compact single-line format
    Compact,
    /// Structured JSON format
    Json,
}

/// Log level options for CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    /// Show all logs (trace level)
    Trace,
    /// Show debug and above
    Debug,
    /// Show info and above
    Info,
    /// Show warnings and above (default)
    Warn,
    /// Show errors only
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}

impl std::str::FromStr for TracingFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown tracing format: {s}")),
        }
    }
}

/// Tracing configuration
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Output format
    pub format: TracingFormat,
    /// Level used when `RUST_LOG` is unset
    pub level: Level,
    /// Explicit filter directive, overriding both `RUST_LOG` and `level`
    pub filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: TracingFormat::Compact,
            level: Level::WARN,
            filter: None,
        }
    }
}

static CORRELATION_ID: std::sync::OnceLock<Uuid> = std::sync::OnceLock::new();

/// Get or create a correlation ID for the current process
pub fn correlation_id() -> Uuid {
    *CORRELATION_ID.get_or_init(Uuid::new_v4)
}

fn default_directives(level: Level) -> String {
    let level = match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    };
    format!("bucketcache={level},bucketcache_cache={level},bucketcache_bucket={level}")
}

/// Initialize tracing with the given configuration
pub fn init_tracing(config: TracingConfig) -> miette::Result<()> {
    let correlation_id = correlation_id();

    let env_filter = if let Some(filter) = config.filter {
        EnvFilter::try_new(filter)
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(default_directives(config.level)))
    }
    .map_err(|e| miette::miette!("Failed to create tracing filter: {e}"))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        TracingFormat::Pretty => {
            let layer = tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(io::stderr)
                .with_target(true);

            registry.with(layer).init();
        }
        TracingFormat::Compact => {
            let layer = tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(io::stderr)
                .with_target(false);

            registry.with(layer).init();
        }
        TracingFormat::Json => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(io::stderr)
                .with_current_span(true)
                .with_span_list(true);

            registry.with(layer).init();
        }
    }

    tracing::debug!(
        correlation_id = %correlation_id,
        version = env!("CARGO_PKG_VERSION"),
        format = ?config.format,
        "Tracing initialized"
    );

    Ok(())
}
