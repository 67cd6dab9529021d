//! Logging configuration and initialization
//!
//! Every Starline stage binary installs the same subscriber:
//!
//! - console, rolling file, or both
//! - human-readable text or JSON lines
//! - a base level plus extra `EnvFilter` directives
//!
//! Library code only ever uses the `tracing` macros with structured fields:
//!
//! ```rust,ignore
//! info!(table = %table_name, rows = table.len(), "Extracted rows");
//! error!(table = %table_name, stage = "extract", error = %err, "Stage failed");
//! ```

use crate::error::{CommonError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Minimum level that reaches the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(CommonError::LogConfig(format!("invalid log level: {}", s))),
        }
    }
}

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Console,
    File,
    Both,
}

impl LogOutput {
    fn to_console(self) -> bool {
        matches!(self, LogOutput::Console | LogOutput::Both)
    }

    fn to_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

impl std::str::FromStr for LogOutput {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(CommonError::LogConfig(format!("invalid log output: {}", s))),
        }
    }
}

/// Stream the console layer writes to
///
/// Binaries that print machine-readable output on stdout log to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleStream {
    #[default]
    Stdout,
    Stderr,
}

impl std::str::FromStr for ConsoleStream {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stdout" => Ok(ConsoleStream::Stdout),
            "stderr" => Ok(ConsoleStream::Stderr),
            _ => Err(CommonError::LogConfig(format!("invalid console stream: {}", s))),
        }
    }
}

/// Line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = CommonError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(CommonError::LogConfig(format!("invalid log format: {}", s))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    pub output: LogOutput,
    pub format: LogFormat,
    pub console_stream: ConsoleStream,
    /// Directory for rolling log files
    pub log_dir: PathBuf,
    /// File name prefix, e.g. "starline-extract" -> "starline-extract.2025-06-01"
    pub log_file_prefix: String,
    /// Extra directives such as "sqlx=warn,aws_config=warn"
    pub filter_directives: Option<String>,
    pub include_targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            output: LogOutput::Console,
            format: LogFormat::Text,
            console_stream: ConsoleStream::Stdout,
            log_dir: PathBuf::from("./logs"),
            log_file_prefix: "starline".to_string(),
            filter_directives: None,
            include_targets: true,
        }
    }
}

impl LogConfig {
    /// Overlay `LOG_*` environment variables on top of `self`
    ///
    /// - `LOG_LEVEL`: trace, debug, info, warn, error
    /// - `LOG_OUTPUT`: console, file, both
    /// - `LOG_FORMAT`: text, json
    /// - `LOG_STREAM`: stdout, stderr
    /// - `LOG_DIR`, `LOG_FILE_PREFIX`, `LOG_FILTER`
    pub fn merge_env(mut self) -> Result<Self> {
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.level = level.parse()?;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.output = output.parse()?;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.format = format.parse()?;
        }
        if let Ok(stream) = std::env::var("LOG_STREAM") {
            self.console_stream = stream.parse()?;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.log_dir = PathBuf::from(dir);
        }
        if let Ok(prefix) = std::env::var("LOG_FILE_PREFIX") {
            self.log_file_prefix = prefix;
        }
        if let Ok(filter) = std::env::var("LOG_FILTER") {
            self.filter_directives = Some(filter);
        }
        Ok(self)
    }

    /// Defaults overlaid with the environment
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env()
    }

    pub fn builder() -> LogConfigBuilder {
        LogConfigBuilder::default()
    }

    fn env_filter(&self) -> Result<EnvFilter> {
        let mut filter =
            EnvFilter::from_default_env().add_directive(self.level.to_tracing_level().into());

        if let Some(ref directives) = self.filter_directives {
            for directive in directives.split(',').filter(|d| !d.trim().is_empty()) {
                let parsed = directive.trim().parse().map_err(|e| {
                    CommonError::LogConfig(format!("bad filter directive '{}': {}", directive, e))
                })?;
                filter = filter.add_directive(parsed);
            }
        }

        Ok(filter)
    }
}

#[derive(Default)]
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl LogConfigBuilder {
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn console_stream(mut self, stream: ConsoleStream) -> Self {
        self.config.console_stream = stream;
        self
    }

    pub fn log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.log_dir = dir.into();
        self
    }

    pub fn log_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.log_file_prefix = prefix.into();
        self
    }

    pub fn filter_directives(mut self, filter: impl Into<String>) -> Self {
        self.config.filter_directives = Some(filter.into());
        self
    }

    pub fn build(self) -> LogConfig {
        self.config
    }
}

/// Install the global subscriber described by `config`
///
/// The returned guard flushes the file writer on drop and must be held by
/// `main` for the lifetime of the process. It is `None` for console-only
/// output.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = config.env_filter()?;
    let json = config.format == LogFormat::Json;

    let (file_writer, guard) = if config.output.to_file() {
        std::fs::create_dir_all(&config.log_dir)?;
        let appender = tracing_appender::rolling::daily(&config.log_dir, &config.log_file_prefix);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (Some(writer), Some(guard))
    } else {
        (None, None)
    };

    let console = config.output.to_console().then(|| {
        let writer = match config.console_stream {
            ConsoleStream::Stdout => BoxMakeWriter::new(std::io::stdout),
            ConsoleStream::Stderr => BoxMakeWriter::new(std::io::stderr),
        };
        fmt::layer()
            .with_writer(writer)
            .with_target(config.include_targets)
            .with_span_events(FmtSpan::CLOSE)
    });
    let file = file_writer.map(|writer| {
        fmt::layer()
            .with_writer(writer)
            .with_target(config.include_targets)
            .with_span_events(FmtSpan::CLOSE)
            .with_ansi(false)
    });

    let console = console.map(|layer| if json { layer.json().boxed() } else { layer.boxed() });
    let file = file.map(|layer| if json { layer.json().boxed() } else { layer.boxed() });

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| CommonError::LogInit(e.to_string()))?;

    Ok(guard)
}
