//! Viewer configuration loading.
//!
//! All inputs of a viewer run (the two source locations, the date range,
//! the resampling cadence, the y-axis bounds) come from a TOML file so a
//! run is a pure function of its configuration. Every key has a default
//! matching the stock Turlock viewer, so an empty file is a valid config.
//!
//! Path resolution: first CLI argument, then `AOD_VIEWER_CONFIG` (a `.env`
//! file is honored), then `./aod_viewer.toml`.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Deserialize;

use crate::ingest::NormalizeOptions;
use crate::ingest::aeronet::DEFAULT_HEADER_SKIP;
use crate::ingest::fetch::DEFAULT_TIMEOUT_SECS;
use crate::logging::LogLevel;
use crate::model::{Cadence, QueryWindow, SourceDescriptor};
use crate::plot::AxisBounds;

pub const DEFAULT_CONFIG_PATH: &str = "./aod_viewer.toml";
pub const CONFIG_PATH_ENV: &str = "AOD_VIEWER_CONFIG";

const DEFAULT_SOURCES: [&str; 2] = [
    "https://raw.githubusercontent.com/your_username/your_repository/main/20230101_20241231_Turlock_CA_USA_part1.lev15",
    "https://raw.githubusercontent.com/your_username/your_repository/main/20230101_20241231_Turlock_CA_USA_part2.lev15",
];

// ---------------------------------------------------------------------------
// File structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    site: SiteSection,
    ingest: IngestSection,
    query: QuerySection,
    plot: PlotSection,
    sources: Option<Vec<SourceEntry>>,
    logging: LoggingSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SiteSection {
    name: String,
}

impl Default for SiteSection {
    fn default() -> Self {
        SiteSection {
            name: "Turlock CA USA".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct IngestSection {
    header_skip: usize,
    timezone: String,
    timeout_secs: u64,
}

impl Default for IngestSection {
    fn default() -> Self {
        IngestSection {
            header_skip: DEFAULT_HEADER_SKIP,
            timezone: "US/Pacific".to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct QuerySection {
    start_date: NaiveDate,
    end_date: NaiveDate,
    cadence: String,
}

impl Default for QuerySection {
    fn default() -> Self {
        QuerySection {
            start_date: NaiveDate::from_ymd_opt(2024, 10, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2024, 10, 7).unwrap_or_default(),
            cadence: "1h".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PlotSection {
    y_min: f64,
    y_max: f64,
}

impl Default for PlotSection {
    fn default() -> Self {
        PlotSection {
            y_min: AxisBounds::DEFAULT.min,
            y_max: AxisBounds::DEFAULT.max,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SourceEntry {
    location: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct LoggingSection {
    level: String,
    file: Option<String>,
    console_timestamps: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        LoggingSection {
            level: "info".to_string(),
            file: None,
            console_timestamps: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Validated configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<String>,
    pub console_timestamps: bool,
}

/// A fully validated viewer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub site_name: String,
    pub sources: [SourceDescriptor; 2],
    pub normalize: NormalizeOptions,
    pub timeout_secs: u64,
    pub window: QueryWindow,
    pub cadence: Cadence,
    pub y_limits: AxisBounds,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    Io { path: String, source: std::io::Error },
    /// The file is not valid TOML or has wrongly typed keys.
    Syntax(toml::de::Error),
    /// A key parsed but its value is not acceptable.
    Invalid { key: &'static str, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Failed to read config {}: {}", path, source)
            }
            ConfigError::Syntax(e) => write!(f, "Invalid config: {}", e),
            ConfigError::Invalid { key, message } => write!(f, "Invalid `{}`: {}", key, message),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Syntax(e) => Some(e),
            ConfigError::Invalid { .. } => None,
        }
    }
}

fn invalid(key: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Picks the config path from the CLI argument, the environment, or the default.
pub fn resolve_config_path(cli_arg: Option<PathBuf>) -> PathBuf {
    dotenv::dotenv().ok();
    cli_arg
        .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Reads and validates the config at `path`.
pub fn load_config(path: &Path) -> Result<ViewerConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&text)
}

/// Parses and validates TOML config text.
pub fn parse_config(text: &str) -> Result<ViewerConfig, ConfigError> {
    let file: ConfigFile = toml::from_str(text).map_err(ConfigError::Syntax)?;

    let timezone: Tz = file
        .ingest
        .timezone
        .parse()
        .map_err(|e| invalid("ingest.timezone", format!("{}", e)))?;

    if file.ingest.timeout_secs == 0 {
        return Err(invalid("ingest.timeout_secs", "must be at least 1"));
    }

    let cadence = Cadence::parse(&file.query.cadence).map_err(|e| invalid("query.cadence", e))?;

    let window = QueryWindow::from_dates(file.query.start_date, file.query.end_date)
        .map_err(|e| invalid("query.start_date", e.to_string()))?;

    let y_limits = AxisBounds::new(file.plot.y_min, file.plot.y_max)
        .map_err(|e| invalid("plot", e))?;

    let sources = match file.sources {
        None => [
            SourceDescriptor::new(DEFAULT_SOURCES[0]),
            SourceDescriptor::new(DEFAULT_SOURCES[1]),
        ],
        Some(entries) => {
            let [first, second]: [SourceEntry; 2] = entries.try_into().map_err(|v: Vec<SourceEntry>| {
                invalid("sources", format!("exactly two sources are required, got {}", v.len()))
            })?;
            for entry in [&first, &second] {
                if entry.location.trim().is_empty() {
                    return Err(invalid("sources.location", "must not be empty"));
                }
            }
            [
                SourceDescriptor::new(first.location),
                SourceDescriptor::new(second.location),
            ]
        }
    };

    let level = LogLevel::parse(&file.logging.level)
        .ok_or_else(|| invalid("logging.level", format!("unknown level '{}'", file.logging.level)))?;

    Ok(ViewerConfig {
        site_name: file.site.name,
        sources,
        normalize: NormalizeOptions {
            header_skip: file.ingest.header_skip,
            timezone,
        },
        timeout_secs: file.ingest.timeout_secs,
        window,
        cadence,
        y_limits,
        logging: LoggingConfig {
            level,
            file: file.logging.file,
            console_timestamps: file.logging.console_timestamps,
        },
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
