//! Structured logging and tracing configuration.
//!
//! Provides setup for observability using the `tracing` crate with:
//! - Structured logging with JSON output option
//! - Configurable log levels (`RUST_LOG` wins over the configured level)
//! - Span helpers for scan runs, single files and watcher drain cycles

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Registry,
};

/// Tracing configuration options.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON output format
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Initialize tracing with the given level and output format.
///
/// Logs go to stderr so that stdout stays parseable for the JSON
/// summaries printed by the CLI.
///
/// # Panics
///
/// Panics if tracing subscriber has already been initialized in this process.
pub fn init_tracing(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        let json_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(json_layer).init();
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        Registry::default().with(env_filter).with(fmt_layer).init();
    }

    tracing::debug!("Tracing initialized: level={}, json={}", level, json);
}

/// Get current tracing configuration from environment variables.
///
/// Respects these environment variables:
/// - `NEXUS_LOG_LEVEL` - Log level (default: "info")
/// - `NEXUS_LOG_JSON` - Enable JSON output (default: false)
#[must_use]
pub fn config_from_env() -> TracingConfig {
    let level = std::env::var("NEXUS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let json = std::env::var("NEXUS_LOG_JSON")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false);

    TracingConfig { level, json }
}

/// Span helpers for the ingestion pipeline.
pub mod spans {
    use std::path::Path;

    use tracing::{debug_span, info_span, Span};

    /// Span covering one full scan of a tree.
    #[must_use]
    pub fn scan_span(root: &Path) -> Span {
        info_span!("scan", root = %root.display())
    }

    /// Span covering the pipeline run for a single file.
    #[must_use]
    pub fn file_span(rel_path: &str) -> Span {
        debug_span!("index_file", path = %rel_path)
    }

    /// Span covering one watcher drain cycle.
    #[must_use]
    pub fn drain_span(queued: usize) -> Span {
        info_span!("drain", queued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_tracing_config_default() {
        let config = TracingConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.json);
    }

    #[test]
    fn test_span_creation() {
        let span = spans::scan_span(Path::new("/tmp/project"));
        let _guard = span.enter();
        let file = spans::file_span("src/main.rs");
        let _file_guard = file.enter();
        let drain = spans::drain_span(3);
        let _drain_guard = drain.enter();
    }
}
