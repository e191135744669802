//! Logging setup for the `roots` binary
//!
//! Console output goes to stderr so that query results on stdout stay
//! pipeable. An optional JSON layer writes daily-rolling files for
//! attaching to bug reports. `RUST_LOG` overrides the default filter.

use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::{Layered, SubscriberExt},
    util::SubscriberInitExt,
};

const LOG_FILE_PREFIX: &str = "roots.log";

const QUIET_FILTER: &str =
    "warn,roots_cli=info,roots_connection=warn,roots_drivers=warn,roots_settings=warn";
const VERBOSE_FILTER: &str = "info,roots_cli=debug,roots_connection=debug,roots_core=debug,\
     roots_drivers=debug,roots_driver_sqlite=debug,roots_driver_snowflake=debug,roots_settings=debug";

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    /// Directory for JSON log files
    pub log_dir: PathBuf,
    pub enable_json_logs: bool,
    pub enable_console_logs: bool,
    /// Log span open/close events with timings
    pub enable_spans: bool,
    pub default_filter: String,
}

impl LoggingConfig {
    pub fn for_cli(json_logs: bool, verbose: bool) -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: json_logs,
            enable_console_logs: true,
            enable_spans: verbose,
            default_filter: if verbose { VERBOSE_FILTER } else { QUIET_FILTER }.to_string(),
        }
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Subscriber assembled from a [`LoggingConfig`]
pub type RootsSubscriber = Layered<Vec<BoxedLayer>, Registry>;

/// Install the global subscriber. Fails if one is already installed.
///
/// The returned guard flushes the JSON file writer when dropped; hold it
/// until the last log line of the process has been written.
pub fn init(config: LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let (subscriber, guard) = build_subscriber(&config)?;
    subscriber.try_init()?;

    tracing::debug!(
        log_dir = %config.log_dir.display(),
        json_enabled = config.enable_json_logs,
        "logging initialized"
    );
    Ok(guard)
}

pub fn build_subscriber(config: &LoggingConfig) -> anyhow::Result<(RootsSubscriber, Option<WorkerGuard>)> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    // NEW/CLOSE instead of ENTER: async spans are re-entered on every poll
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;

    if config.enable_console_logs {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_span_events(span_events.clone())
            .with_writer(std::io::stderr)
            .compact()
            .with_filter(env_filter.clone())
            .boxed();
        layers.push(console_layer);
    }

    if config.enable_json_logs {
        std::fs::create_dir_all(&config.log_dir)?;
        let file_appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(span_events)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(env_filter)
            .boxed();
        layers.push(json_layer);
    }

    Ok((tracing_subscriber::registry().with(layers), guard))
}

pub fn log_directory() -> PathBuf {
    roots_settings::settings_file::log_dir().unwrap_or_else(|| PathBuf::from("logs"))
}
