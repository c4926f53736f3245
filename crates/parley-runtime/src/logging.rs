//! Logging setup for Parley.
//!
//! Everything in the workspace logs through `tracing` macros with structured
//! fields. This module installs the global subscriber: an [`EnvFilter`] built
//! from the configured level and per-module directives (`RUST_LOG` wins when
//! set) and one `fmt` layer writing to stdout, stderr or a file.
//!
//! # Example
//!
//! ```rust,ignore
//! use parley_runtime::logging::{LoggingBuilder, SpanEvents};
//!
//! let _guard = LoggingBuilder::new()
//!     .with_level(tracing::Level::DEBUG)
//!     .directive("parley_core::framework=trace")
//!     .span_events(SpanEvents::LIFECYCLE)
//!     .init();
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig, SpanEventConfig};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Which span lifecycle events are logged.
///
/// The event loop wraps each dispatch pass in a `dispatch` span, so
/// [`SpanEvents::LIFECYCLE`] shows how long every event took to dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

impl SpanEvents {
    /// No span events.
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Creation and close.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    /// Every span event.
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

/// Installs the global subscriber described by `config`.
///
/// Returns the file writer's guard when logging to a file; keep it alive for
/// as long as logs should be flushed. A second call is a no-op.
pub fn init_from_config(config: &LoggingConfig) -> Option<WorkerGuard> {
    LoggingBuilder::from_config(config).init()
}

/// A builder for the global subscriber.
#[derive(Debug)]
pub struct LoggingBuilder {
    level: tracing::Level,
    directives: Vec<String>,
    span_events: SpanEvents,
    format: LogFormat,
    output: LogOutput,
    file_path: Option<PathBuf>,
    thread_ids: bool,
    file_location: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    /// Compact lines on stdout at `INFO`.
    pub fn new() -> Self {
        Self {
            level: tracing::Level::INFO,
            directives: Vec::new(),
            span_events: SpanEvents::NONE,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            thread_ids: false,
            file_location: false,
        }
    }

    /// Creates a builder from the `[logging]` section.
    pub fn from_config(config: &LoggingConfig) -> Self {
        let mut directives: Vec<String> = config
            .filters
            .iter()
            .map(|(module, level)| format!("{module}={level}"))
            .collect();
        directives.sort();

        Self {
            level: config.level.to_tracing_level(),
            directives,
            span_events: SpanEvents::from(&config.span_events),
            format: config.format,
            output: config.output,
            file_path: config.file_path.clone(),
            thread_ids: config.thread_ids,
            file_location: config.file_location,
        }
    }

    /// Sets the base level.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `parley_core=debug`.
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

    /// Sets the log file and switches output to it.
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self.output = LogOutput::File;
        self
    }

    fn build_filter(&self) -> EnvFilter {
        let base = self.level.to_string().to_lowercase();
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base));

        for directive in &self.directives {
            match directive.parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(e) => eprintln!("Ignoring invalid log directive {directive:?}: {e}"),
            }
        }
        filter
    }

    fn fmt_layer<W>(&self, writer: W) -> BoxedLayer
    where
        W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    {
        let spans = self.span_events.to_fmt_span();
        match self.format {
            #[cfg(feature = "json-log")]
            LogFormat::Json => fmt::layer()
                .json()
                .with_span_events(spans)
                .with_writer(writer)
                .boxed(),
            LogFormat::Full => fmt::layer()
                .with_span_events(spans)
                .with_thread_ids(self.thread_ids)
                .with_file(self.file_location)
                .with_line_number(self.file_location)
                .with_writer(writer)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_span_events(spans)
                .with_thread_ids(self.thread_ids)
                .with_file(self.file_location)
                .with_line_number(self.file_location)
                .with_writer(writer)
                .boxed(),
            _ => fmt::layer()
                .compact()
                .with_span_events(spans)
                .with_thread_ids(self.thread_ids)
                .with_file(self.file_location)
                .with_line_number(self.file_location)
                .with_writer(writer)
                .boxed(),
        }
    }

    /// Installs the subscriber, ignoring an already installed one.
    pub fn init(self) -> Option<WorkerGuard> {
        self.try_init().ok().flatten()
    }

    /// Installs the subscriber.
    pub fn try_init(self) -> Result<Option<WorkerGuard>, TryInitError> {
        let filter = self.build_filter();
        let (layer, guard) = match (self.output, &self.file_path) {
            (LogOutput::File, Some(path)) => {
                let appender = tracing_appender::rolling::never(
                    path.parent().unwrap_or_else(|| Path::new(".")),
                    path.file_name().unwrap_or_else(|| OsStr::new("parley.log")),
                );
                let (writer, guard) = tracing_appender::non_blocking(appender);
                (self.fmt_layer(writer), Some(guard))
            }
            (LogOutput::Stderr, _) => (self.fmt_layer(std::io::stderr), None),
            _ => (self.fmt_layer(std::io::stdout), None),
        };

        tracing_subscriber::registry()
            .with(layer)
            .with(filter)
            .try_init()?;
        Ok(guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_span_event_presets() {
        assert_eq!(SpanEvents::NONE.to_fmt_span(), FmtSpan::NONE);
        assert_eq!(
            SpanEvents::LIFECYCLE.to_fmt_span(),
            FmtSpan::NEW | FmtSpan::CLOSE
        );
        assert_eq!(SpanEvents::FULL.to_fmt_span(), FmtSpan::FULL);
    }

    #[test]
    fn test_from_config_collects_module_filters() {
        let mut config = LoggingConfig {
            level: LogLevel::Warn,
            ..Default::default()
        };
        config.filters.insert("parley_core".into(), LogLevel::Debug);
        config.filters.insert("meeting".into(), LogLevel::Trace);

        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(builder.level, tracing::Level::WARN);
        assert_eq!(builder.directives, ["meeting=trace", "parley_core=debug"]);
    }

    #[test]
    fn test_file_path_switches_output() {
        let builder = LoggingBuilder::new().file_path("/tmp/parley.log");
        assert_eq!(builder.output, LogOutput::File);
    }
}
