//! Structured logging for both binaries
//!
//! Settings come from the environment:
//!
//! - `LOG_LEVEL`: ERROR, WARN, INFO, DEBUG or TRACE (default INFO)
//! - `LOG_FORMAT`: `json` for Cloud Logging, `pretty` or `compact` for a
//!   terminal (default json)
//! - `LOG_SPANS`: `true` to log span open/close events
//! - `RUST_LOG`: full filter override
//!
//! ```bash
//! LOG_FORMAT=pretty LOG_LEVEL=DEBUG coa-agent run --uri gs://bucket/coa.pdf
//! LOG_FORMAT=compact gcs-event-relay
//! ```

use std::env;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line (machine-readable)
    Json,
    /// Multi-line human-readable output with colors
    Pretty,
    /// Single-line colored output
    Compact,
}

impl LogFormat {
    /// Parse a format name; unknown names fall back to JSON
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

/// Dependencies that are too chatty at the default level
const NOISY_TARGETS: [&str; 4] = ["hyper", "reqwest", "warp", "tokio"];

/// Parse a log level name, falling back to INFO
pub fn parse_level(value: &str) -> Level {
    value.trim().parse().unwrap_or(Level::INFO)
}

/// Resolved logging settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: Level,
    pub format: LogFormat,
    pub include_spans: bool,
    /// Raw `RUST_LOG` directives, used instead of `level` when present
    pub directives: Option<String>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Json,
            include_spans: false,
            directives: None,
        }
    }
}

impl LogSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            level: lookup("LOG_LEVEL").map_or(defaults.level, |v| parse_level(&v)),
            format: lookup("LOG_FORMAT").map_or(defaults.format, |v| LogFormat::parse(&v)),
            include_spans: lookup("LOG_SPANS")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("true")),
            directives: lookup("RUST_LOG").filter(|v| !v.trim().is_empty()),
        }
    }

    fn filter(&self) -> EnvFilter {
        if let Some(directives) = &self.directives {
            return EnvFilter::new(directives);
        }

        NOISY_TARGETS
            .iter()
            .filter_map(|target| format!("{target}=warn").parse().ok())
            .fold(EnvFilter::new(self.level.to_string()), EnvFilter::add_directive)
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Install the global subscriber
///
/// Does nothing if a global subscriber is already installed.
pub fn init_logging(settings: &LogSettings) {
    let registry = tracing_subscriber::registry().with(settings.filter());
    let spans = settings.span_events();

    let _ = match settings.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_span_events(spans))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_ansi(true).with_span_events(spans))
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_ansi(true)
                    .with_target(false)
                    .with_span_events(spans),
            )
            .try_init(),
    };
}

/// Initialize logging from environment variables
pub fn init_default_logging() {
    init_logging(&LogSettings::from_env());
}

/// Create a span covering one hold pipeline run
#[macro_export]
macro_rules! pipeline_span {
    ($($field:tt)*) => {
        tracing::info_span!("pipeline_run", $($field)*)
    };
}

/// Create a span covering one relayed storage event
#[macro_export]
macro_rules! relay_span {
    ($($field:tt)*) => {
        tracing::info_span!("event_relay", $($field)*)
    };
}

pub use {pipeline_span, relay_span};
