use crate::config::{LogFormat, LogLevel, LoggingSettings};
use anyhow::Context;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Initialize logging both in the terminal and the configured log file.
///
/// The terminal layer writes to stderr. The file layer appends to
/// `settings.file` without rotation and without ansi colors; its parent
/// directory is created if missing. `RUST_LOG` overrides `settings.level`.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init_daemon_logger(settings: &LoggingSettings) -> anyhow::Result<WorkerGuard> {
    let file_appender = open_log_file(&settings.file)?;
    let (file_writer, guard) = non_blocking(file_appender);

    let layers: Vec<BoxedLayer> = vec![
        console_layer(settings.format),
        file_layer(settings.format, file_writer),
    ];

    tracing_subscriber::registry()
        .with(layers)
        .with(build_filter(settings.level))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

pub fn build_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,auto_natpmp={}", level.as_directive())))
}

pub fn open_log_file(path: &Path) -> anyhow::Result<RollingFileAppender> {
    let file_name = path
        .file_name()
        .with_context(|| format!("Log file path {} has no file name", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    rolling::Builder::new()
        .rotation(rolling::Rotation::NEVER)
        .filename_prefix(file_name.to_string_lossy())
        .build(dir)
        .with_context(|| format!("Failed to open log file {}", path.display()))
}

fn console_layer(format: LogFormat) -> BoxedLayer {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false);
    match format {
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

fn file_layer(format: LogFormat, writer: NonBlocking) -> BoxedLayer {
    let layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(false);
    match format {
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}
