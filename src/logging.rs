/// Structured logging for the AOD viewer
///
/// Provides context-rich logging tagged with the pipeline stage and the
/// source being processed. Console output goes to stderr at every level,
/// keeping stdout for the chart; an append-only log file is optional.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::model::PipelineError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Parses the level names accepted in the `[logging]` config section.
    pub fn parse(name: &str) -> Option<LogLevel> {
        match name.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Parse,
    Schema,
    Query,
    Plot,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => write!(f, "FETCH"),
            Stage::Parse => write!(f, "PARSE"),
            Stage::Schema => write!(f, "SCHEMA"),
            Stage::Query => write!(f, "QUERY"),
            Stage::Plot => write!(f, "PLOT"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

impl From<&PipelineError> for Stage {
    fn from(err: &PipelineError) -> Self {
        match err {
            PipelineError::FetchFailure { .. } => Stage::Fetch,
            PipelineError::ParseFailure { .. } => Stage::Parse,
            PipelineError::SchemaFailure { .. } => Stage::Schema,
            PipelineError::RangeFailure { .. } | PipelineError::UnknownChannelFailure { .. } => {
                Stage::Query
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - placeholder URL, file not published yet
    Expected,
    /// Unexpected failure - server error, malformed export, network trouble
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut guard) = LOGGER.lock() {
            *guard = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, stage: Stage, source: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let log_entry = format_entry(level, stage, source, message);

        if self.console_timestamps {
            eprintln!("{}", log_entry);
        } else {
            eprintln!("{}", console_line(level, stage, source, message));
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

/// Formats one log line: `<utc time> <LEVEL> <STAGE> [source]: message`.
fn format_entry(level: LogLevel, stage: Stage, source: Option<&str>, message: &str) -> String {
    let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
    let source_part = source.map(|s| format!(" [{}]", s)).unwrap_or_default();
    format!("{} {} {}{}: {}", timestamp, level, stage, source_part, message)
}

/// Short console form used when timestamps are off.
fn console_line(level: LogLevel, stage: Stage, source: Option<&str>, message: &str) -> String {
    let source_part = source.map(|s| format!(" [{}]", s)).unwrap_or_default();
    match level {
        LogLevel::Error => format!("   ✗ {}{}: {}", stage, source_part, message),
        LogLevel::Warning => format!("   ⚠ {}{}: {}", stage, source_part, message),
        LogLevel::Info => format!("   {}", message),
        LogLevel::Debug => format!("   [DEBUG] {}", message),
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, stage: Stage, source: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, stage, source, message);
        }
    }
}

/// Log a general informational message
pub fn info(stage: Stage, source: Option<&str>, message: &str) {
    emit(LogLevel::Info, stage, source, message);
}

/// Log a warning message
pub fn warn(stage: Stage, source: Option<&str>, message: &str) {
    emit(LogLevel::Warning, stage, source, message);
}

/// Log an error message
pub fn error(stage: Stage, source: Option<&str>, message: &str) {
    emit(LogLevel::Error, stage, source, message);
}

/// Log a debug message
pub fn debug(stage: Stage, source: Option<&str>, message: &str) {
    emit(LogLevel::Debug, stage, source, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a pipeline failure by what usually causes it.
pub fn classify_failure(err: &PipelineError) -> FailureType {
    match err {
        PipelineError::FetchFailure { source, cause } => {
            // The default config ships placeholder URLs that 404 until edited.
            if source.contains("your_username") || cause.contains("HTTP error: 404") {
                FailureType::Expected
            } else if cause.contains("HTTP error") || cause.contains("timed out") {
                FailureType::Unexpected
            } else {
                FailureType::Unknown
            }
        }
        PipelineError::ParseFailure { .. } => FailureType::Unexpected,
        PipelineError::SchemaFailure { .. } => FailureType::Unknown,
        PipelineError::RangeFailure { .. } | PipelineError::UnknownChannelFailure { .. } => {
            FailureType::Unexpected
        }
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a pipeline failure with automatic classification
pub fn log_failure(operation: &str, err: &PipelineError) {
    let failure_type = classify_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);
    let stage = Stage::from(err);
    let source = err.source_id();

    match failure_type {
        FailureType::Expected => debug(stage, source, &message),
        FailureType::Unexpected => error(stage, source, &message),
        FailureType::Unknown => warn(stage, source, &message),
    }
}

// ---------------------------------------------------------------------------
// Session Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of one viewer run
pub fn log_session_summary(total: usize, loaded: usize, failed: usize, chart_ready: bool) {
    let message = format!(
        "Session complete: {}/{} sources loaded, {} failed, chart {}",
        loaded,
        total,
        failed,
        if chart_ready { "ready" } else { "not produced" }
    );

    if failed == 0 && chart_ready {
        info(Stage::System, None, &message);
    } else if loaded == 0 {
        error(Stage::System, None, &message);
    } else {
        warn(Stage::System, None, &message);
    }
}
