use crate::config::LogConfig;
use std::fs;
use tracing::subscriber::DefaultGuard;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Owns the logging subscriber for one pipeline run.
///
/// Events go both to stdout and to the configured log file (created if absent,
/// appended otherwise). The subscriber is only active while this value lives;
/// dropping it flushes the file writer.
pub struct LoggingContext {
    // Field order matters: uninstall the subscriber before flushing the writer.
    _default: DefaultGuard,
    _file_guard: WorkerGuard,
}

impl LoggingContext {
    pub fn init(config: &LogConfig) -> std::io::Result<Self> {
        let directory = match config.file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        fs::create_dir_all(&directory)?;
        let file_name = config
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| crate::constants::LOG_FILE.to_string());

        // No rotation: the prefix is the whole file name, opened in append mode
        let file_appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(file_name)
            .build(&directory)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        let (non_blocking_writer, file_guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = fmt::layer()
            .with_target(false)
            .with_ansi(false)
            .with_writer(non_blocking_writer);

        let console_layer = fmt::layer().with_target(false).with_writer(std::io::stdout);

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&config.default_directive));

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer);

        let default = tracing::subscriber::set_default(subscriber);

        Ok(Self {
            _default: default,
            _file_guard: file_guard,
        })
    }
}
