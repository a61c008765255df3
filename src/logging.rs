//! Subscriber setup: env-filtered stdout, plus daily files when
//! `LogConfig::file_dir` is set.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

const LOG_FILE_PREFIX: &str = "assessment";

/// Quiet defaults for noisy dependencies, applied unless the configured
/// filter already names the target.
const DEFAULT_DIRECTIVES: &[&str] = &["hyper=warn", "tower_http=info"];

/// Keeps the background file writer flushing; drop it only at shutdown.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Combines the configured filter with the defaults. An empty level falls
/// back to `info`.
pub fn filter_directives(level: &str) -> String {
    let level = level.trim();
    let mut directives = vec![if level.is_empty() { "info" } else { level }.to_string()];
    for default in DEFAULT_DIRECTIVES.iter().copied() {
        let target = default.split('=').next().unwrap_or(default);
        if !level.split(',').any(|d| d.trim().starts_with(target)) {
            directives.push(default.to_string());
        }
    }
    directives.join(",")
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(filter_directives(level)).unwrap_or_else(|err| {
        eprintln!("invalid log filter {level:?} ({err}), using info");
        EnvFilter::new(filter_directives("info"))
    })
}

fn file_appender(config: &LogConfig) -> Option<RollingFileAppender> {
    let dir = config.file_dir.as_ref()?;
    if let Err(err) = std::fs::create_dir_all(dir) {
        eprintln!("failed to create log directory {}: {err}", dir.display());
        return None;
    }
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(config.retained_files.max(1))
        .build(dir)
        .map_err(|err| eprintln!("failed to open log file in {}: {err}", dir.display()))
        .ok()
}

/// Installs the global subscriber.
pub fn init_tracing(config: &LogConfig) -> LogGuard {
    let (file_layer, guard) = match file_appender(config) {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(build_filter(&config.level))
        .with(fmt::layer().with_target(true))
        .with(file_layer)
        .init();

    LogGuard { _file: guard }
}
