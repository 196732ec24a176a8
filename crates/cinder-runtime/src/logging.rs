//! Logging setup built on `tracing-subscriber`.
//!
//! ```rust,ignore
//! use cinder_runtime::logging::{LoggingBuilder, SpanEvents};
//!
//! let _guard = LoggingBuilder::new()
//!     .directive("cinder_core=debug")
//!     .span_events(SpanEvents::LIFECYCLE)
//!     .try_init()?;
//! ```
//!
//! File output goes through a non-blocking writer; keep the returned
//! [`LoggingGuard`] alive or buffered records are lost at exit.

use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

const DEFAULT_LOG_FILE: &str = "cinder.log";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Failed to open log file: {0}")]
    File(#[from] InitError),

    #[error("Failed to install global subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

impl SpanEvents {
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Creation and close only; shows how long each span lived.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };

    fn to_fmt_span(self) -> FmtSpan {
        [
            (self.new, FmtSpan::NEW),
            (self.enter, FmtSpan::ENTER),
            (self.exit, FmtSpan::EXIT),
            (self.close, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(config: &SpanEventConfig) -> Self {
        Self {
            new: config.new,
            enter: config.enter,
            exit: config.exit,
            close: config.close,
        }
    }
}

/// Keeps the background log writer alive.
///
/// Dropping it flushes pending file output.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LoggingGuard {
    _worker: Option<WorkerGuard>,
}

/// Installs the global subscriber described by `config`.
///
/// Returns `None` if a subscriber is already installed or the log file
/// cannot be opened; the failure is reported on stderr.
pub fn init_from_config(config: &LoggingConfig) -> Option<LoggingGuard> {
    match LoggingBuilder::from_config(config).try_init() {
        Ok(guard) => Some(guard),
        Err(LoggingError::Init(_)) => None,
        Err(e) => {
            eprintln!("cinder: {e}");
            None
        }
    }
}

/// Builder for the global `tracing` subscriber.
pub struct LoggingBuilder {
    directives: Vec<String>,
    level: tracing::Level,
    span_events: SpanEvents,
    format: LogFormat,
    output: LogOutput,
    with_target: bool,
    with_thread_ids: bool,
    with_file: bool,
    with_line_number: bool,
    file_path: Option<PathBuf>,
    rotation: LogRotation,
    max_files: usize,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self {
            directives: Vec::new(),
            level: tracing::Level::INFO,
            span_events: SpanEvents::NONE,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
            file_path: None,
            rotation: LogRotation::Never,
            max_files: 5,
        }
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        let directives = config
            .filters
            .iter()
            .map(|(target, level)| format!("{target}={level}"))
            .collect();

        Self {
            directives,
            level: config.level.to_tracing_level(),
            span_events: SpanEvents::from(&config.span_events),
            format: config.format,
            output: config.output,
            with_target: true,
            with_thread_ids: config.thread_ids,
            with_file: config.file_location,
            with_line_number: config.file_location,
            file_path: config.file_path.clone(),
            rotation: config.rotation,
            max_files: config.max_files,
        }
    }

    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `cinder_framework=trace`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    /// Includes source file and line in each record.
    pub fn with_file_location(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self.with_line_number = enabled;
        self
    }

    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn rotation(mut self, rotation: LogRotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Rotated files kept on disk; `0` keeps all of them.
    pub fn max_files(mut self, count: usize) -> Self {
        self.max_files = count;
        self
    }

    /// `RUST_LOG` wins over the configured level; directives are added on top.
    fn build_filter(&self) -> EnvFilter {
        let base = self.level.to_string().to_lowercase();
        let mut filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base));

        for directive in &self.directives {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => eprintln!("cinder: ignoring log directive '{directive}': {e}"),
            }
        }
        filter
    }

    fn make_writer(&self) -> Result<(BoxMakeWriter, Option<WorkerGuard>), LoggingError> {
        match (self.output, &self.file_path) {
            (LogOutput::Stdout, _) => Ok((BoxMakeWriter::new(std::io::stdout), None)),
            (LogOutput::Stderr, _) => Ok((BoxMakeWriter::new(std::io::stderr), None)),
            (LogOutput::File, None) => {
                eprintln!("cinder: file output requested without logging.file_path, using stdout");
                Ok((BoxMakeWriter::new(std::io::stdout), None))
            }
            (LogOutput::File, Some(path)) => {
                let appender = self.file_appender(path)?;
                let (writer, guard) = tracing_appender::non_blocking(appender);
                Ok((BoxMakeWriter::new(writer), Some(guard)))
            }
        }
    }

    fn file_appender(&self, path: &std::path::Path) -> Result<RollingFileAppender, InitError> {
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(DEFAULT_LOG_FILE);

        let rotation = match self.rotation {
            LogRotation::Minutely => Rotation::MINUTELY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        };

        let mut builder = RollingFileAppender::builder()
            .rotation(rotation)
            .filename_prefix(file_name);
        if self.max_files > 0 {
            builder = builder.max_log_files(self.max_files);
        }
        builder.build(directory)
    }

    /// Installs the subscriber, keeping a guard for file output.
    pub fn try_init(self) -> Result<LoggingGuard, LoggingError> {
        let filter = self.build_filter();
        let span_events = self.span_events.to_fmt_span();
        let (writer, worker) = self.make_writer()?;

        macro_rules! install {
            ($layer:expr) => {
                tracing_subscriber::registry()
                    .with(
                        $layer
                            .with_span_events(span_events)
                            .with_target(self.with_target)
                            .with_thread_ids(self.with_thread_ids)
                            .with_file(self.with_file)
                            .with_line_number(self.with_line_number)
                            .with_writer(writer),
                    )
                    .with(filter)
                    .try_init()
            };
        }

        match self.format {
            #[cfg(feature = "json-log")]
            LogFormat::Json => install!(fmt::layer().json()),
            LogFormat::Compact => install!(fmt::layer().compact()),
            LogFormat::Pretty => install!(fmt::layer().pretty()),
            _ => install!(fmt::layer()),
        }?;

        Ok(LoggingGuard { _worker: worker })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_span_events_to_fmt_span() {
        assert_eq!(SpanEvents::NONE.to_fmt_span(), FmtSpan::NONE);
        assert_eq!(
            SpanEvents::LIFECYCLE.to_fmt_span(),
            FmtSpan::NEW | FmtSpan::CLOSE
        );
        assert_eq!(SpanEvents::FULL.to_fmt_span(), FmtSpan::FULL);
    }

    #[test]
    fn test_from_config() {
        let mut config = LoggingConfig {
            level: LogLevel::Debug,
            file_location: true,
            ..Default::default()
        };
        config
            .filters
            .insert("cinder_core".to_string(), LogLevel::Trace);
        config
            .filters
            .insert("cinder_framework".to_string(), LogLevel::Warn);

        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(builder.level, tracing::Level::DEBUG);
        assert_eq!(
            builder.directives,
            vec!["cinder_core=trace", "cinder_framework=warn"]
        );
        assert!(builder.with_file && builder.with_line_number);
    }

    #[test]
    fn test_file_writer_creates_directory() {
        let dir = std::env::temp_dir().join(format!("cinder-logging-{}", std::process::id()));
        let builder = LoggingBuilder::new()
            .output(LogOutput::File)
            .file_path(dir.join("app.log"))
            .max_files(2);

        let (_writer, guard) = builder.make_writer().unwrap();
        assert!(guard.is_some());
        assert!(dir.is_dir());

        drop(guard);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_output_without_path_uses_stdout() {
        let (_writer, guard) = LoggingBuilder::new()
            .output(LogOutput::File)
            .make_writer()
            .unwrap();
        assert!(guard.is_none());
    }
}
