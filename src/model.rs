/// Core data types for the AOD viewer.
///
/// This module defines the shared domain model imported by all other
/// modules: the channel constants, the normalized series produced by
/// ingest, the query window and cadence consumed by the resample stage,
/// and the pipeline error taxonomy. It performs no I/O.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, Timelike};
use chrono_tz::Tz;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Channel names
// ---------------------------------------------------------------------------

/// AERONET column for aerosol optical depth at 500 nm.
pub const CHANNEL_AOD_500NM: &str = "AOD_500nm";

/// AERONET column for aerosol optical depth at 870 nm.
pub const CHANNEL_AOD_870NM: &str = "AOD_870nm";

/// Channels that must be present before a source can be plotted.
pub const REQUIRED_CHANNELS: [&str; 2] = [CHANNEL_AOD_500NM, CHANNEL_AOD_870NM];

/// AERONET writes this value into cells with no measurement.
pub const AERONET_FILL_VALUE: f64 = -999.0;

// ---------------------------------------------------------------------------
// Source descriptor
// ---------------------------------------------------------------------------

/// Location of one tabular file. Either an `http(s)://` URL or a local path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDescriptor(String);

impl SourceDescriptor {
    pub fn new(location: impl Into<String>) -> Self {
        SourceDescriptor(location.into())
    }

    pub fn location(&self) -> &str {
        &self.0
    }

    /// True when the location should be fetched over HTTP.
    pub fn is_remote(&self) -> bool {
        let lower = self.0.trim().to_ascii_lowercase();
        lower.starts_with("http://") || lower.starts_with("https://")
    }
}

impl std::fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Normalized series
// ---------------------------------------------------------------------------

/// One row of a normalized `.lev15` file.
///
/// The two required wavelength channels are typed fields; every other
/// column lands in `extra`. `None` means the cell was empty, non-numeric,
/// or carried the AERONET fill value.
#[derive(Debug, Clone, PartialEq)]
pub struct AodRecord {
    pub timestamp: DateTime<Tz>,
    pub aod_500nm: Option<f64>,
    pub aod_870nm: Option<f64>,
    pub extra: BTreeMap<String, Option<f64>>,
}

impl AodRecord {
    /// Value of `channel` for this row; `None` when missing or unknown.
    pub fn value(&self, channel: &str) -> Option<f64> {
        match channel {
            CHANNEL_AOD_500NM => self.aod_500nm,
            CHANNEL_AOD_870NM => self.aod_870nm,
            other => self.extra.get(other).copied().flatten(),
        }
    }
}

/// Required channels absent from a source, together with what it did have.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDeficiency {
    pub missing: Vec<String>,
    pub available: Vec<String>,
}

/// A parsed, timezone-converted table from one source.
///
/// Records keep source order. Produced once by `ingest::normalize` and
/// never mutated afterwards.
#[derive(Debug, Clone)]
pub struct NormalizedSeries {
    source: SourceDescriptor,
    timezone: Tz,
    columns: Vec<String>,
    records: Vec<AodRecord>,
    deficiency: Option<SchemaDeficiency>,
}

impl NormalizedSeries {
    /// Builds a series and checks it against `REQUIRED_CHANNELS`.
    pub fn new(
        source: SourceDescriptor,
        timezone: Tz,
        columns: Vec<String>,
        records: Vec<AodRecord>,
    ) -> Self {
        let missing: Vec<String> = REQUIRED_CHANNELS
            .iter()
            .filter(|name| !columns.iter().any(|c| c == *name))
            .map(|name| name.to_string())
            .collect();

        let deficiency = if missing.is_empty() {
            None
        } else {
            Some(SchemaDeficiency {
                missing,
                available: columns.clone(),
            })
        };

        NormalizedSeries {
            source,
            timezone,
            columns,
            records,
            deficiency,
        }
    }

    pub fn source(&self) -> &SourceDescriptor {
        &self.source
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Column names after the date and time columns, in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn records(&self) -> &[AodRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn schema_deficiency(&self) -> Option<&SchemaDeficiency> {
        self.deficiency.as_ref()
    }

    /// `Err(SchemaFailure)` when a required channel is missing.
    pub fn validate_schema(&self) -> Result<(), PipelineError> {
        match &self.deficiency {
            None => Ok(()),
            Some(d) => Err(PipelineError::SchemaFailure {
                source: self.source.to_string(),
                missing: d.missing.clone(),
                available: d.available.clone(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Query window
// ---------------------------------------------------------------------------

/// Closed interval `[start, end]` of wall-clock times in the series' zone.
///
/// Both bounds are truncated to whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl QueryWindow {
    /// Returns `RangeFailure` when `start > end`.
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, PipelineError> {
        let start = truncate_to_second(start);
        let end = truncate_to_second(end);
        if start > end {
            return Err(PipelineError::RangeFailure {
                start: start.to_string(),
                end: end.to_string(),
            });
        }
        Ok(QueryWindow { start, end })
    }

    /// Whole calendar days: `start_date 00:00:00` through `end_date 23:59:00`.
    pub fn from_dates(
        start_date: chrono::NaiveDate,
        end_date: chrono::NaiveDate,
    ) -> Result<Self, PipelineError> {
        let start = start_date.and_time(NaiveTime::MIN);
        let end = end_date.and_time(day_end_time());
        QueryWindow::new(start, end)
    }

    pub fn contains(&self, local: NaiveDateTime) -> bool {
        let local = truncate_to_second(local);
        local >= self.start && local <= self.end
    }
}

fn day_end_time() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 0).unwrap_or(NaiveTime::MIN)
}

fn truncate_to_second(dt: NaiveDateTime) -> NaiveDateTime {
    dt.with_nanosecond(0).unwrap_or(dt)
}

// ---------------------------------------------------------------------------
// Cadence
// ---------------------------------------------------------------------------

/// A supported resampling cadence.
///
/// Sub-day cadences must divide a day evenly so buckets stay aligned to
/// midnight; day cadences may be any positive count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Minutes(u32),
    Hours(u32),
    Days(u32),
}

const SECONDS_PER_MINUTE: i64 = 60;
const SECONDS_PER_HOUR: i64 = 60 * 60;
const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

impl Cadence {
    pub const HOURLY: Cadence = Cadence::Hours(1);

    /// Parses strings like `1h`, `30min`, `2D`.
    pub fn parse(text: &str) -> Result<Cadence, String> {
        let text = text.trim();
        let split = text
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("cadence '{}' has no unit", text))?;
        let (count, unit) = text.split_at(split);

        let count: u32 = if count.is_empty() {
            1
        } else {
            count
                .parse()
                .map_err(|_| format!("cadence '{}' has an invalid count", text))?
        };

        let cadence = match unit {
            "min" | "T" => Cadence::Minutes(count),
            "h" | "H" => Cadence::Hours(count),
            "D" | "d" => Cadence::Days(count),
            other => return Err(format!("unsupported cadence unit '{}'", other)),
        };

        cadence.validate()?;
        Ok(cadence)
    }

    fn validate(&self) -> Result<(), String> {
        let secs = self.seconds();
        if secs <= 0 {
            return Err("cadence must be positive".to_string());
        }
        if secs < SECONDS_PER_DAY && SECONDS_PER_DAY % secs != 0 {
            return Err(format!("cadence of {} seconds does not divide a day", secs));
        }
        if secs > SECONDS_PER_DAY && secs % SECONDS_PER_DAY != 0 {
            return Err(format!("cadence of {} seconds is not a whole number of days", secs));
        }
        Ok(())
    }

    pub fn seconds(&self) -> i64 {
        match *self {
            Cadence::Minutes(n) => n as i64 * SECONDS_PER_MINUTE,
            Cadence::Hours(n) => n as i64 * SECONDS_PER_HOUR,
            Cadence::Days(n) => n as i64 * SECONDS_PER_DAY,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.seconds())
    }
}

impl std::fmt::Display for Cadence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cadence::Minutes(n) => write!(f, "{}min", n),
            Cadence::Hours(n) => write!(f, "{}h", n),
            Cadence::Days(n) => write!(f, "{}D", n),
        }
    }
}

// ---------------------------------------------------------------------------
// Resampled output
// ---------------------------------------------------------------------------

/// One cadence-length bucket and the mean of its contributing values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bucket {
    pub start: DateTime<Tz>,
    pub mean: Option<f64>,
}

/// Mean-aggregated values of one channel over a query window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResampledSeries {
    pub channel: String,
    pub buckets: Vec<Bucket>,
}

impl ResampledSeries {
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Buckets that received at least one value.
    pub fn present(&self) -> impl Iterator<Item = (&DateTime<Tz>, f64)> {
        self.buckets
            .iter()
            .filter_map(|b| b.mean.map(|m| (&b.start, m)))
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures reported by the ingest and query stages.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// The source could not be retrieved: unreachable, non-2xx, timeout,
    /// or an unreadable local file.
    FetchFailure { source: String, cause: String },
    /// The content was fetched but is not a well-formed table.
    ParseFailure {
        source: String,
        line: Option<usize>,
        cause: String,
    },
    /// One or more required channels are absent.
    SchemaFailure {
        source: String,
        missing: Vec<String>,
        available: Vec<String>,
    },
    /// The query window ends before it starts.
    RangeFailure { start: String, end: String },
    /// The requested channel is not a column of the series.
    UnknownChannelFailure { source: String, channel: String },
}

impl PipelineError {
    /// Source identifier the failure belongs to, where there is one.
    pub fn source_id(&self) -> Option<&str> {
        match self {
            PipelineError::FetchFailure { source, .. }
            | PipelineError::ParseFailure { source, .. }
            | PipelineError::SchemaFailure { source, .. }
            | PipelineError::UnknownChannelFailure { source, .. } => Some(source),
            PipelineError::RangeFailure { .. } => None,
        }
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::FetchFailure { source, cause } => {
                write!(f, "Failed to fetch {}: {}", source, cause)
            }
            PipelineError::ParseFailure { source, line: Some(line), cause } => {
                write!(f, "Parse error in {} at line {}: {}", source, line, cause)
            }
            PipelineError::ParseFailure { source, line: None, cause } => {
                write!(f, "Parse error in {}: {}", source, cause)
            }
            PipelineError::SchemaFailure { source, missing, available } => write!(
                f,
                "Missing expected columns {:?} in {}. Available columns: {:?}",
                missing, source, available
            ),
            PipelineError::RangeFailure { start, end } => {
                write!(f, "Invalid range: start {} is after end {}", start, end)
            }
            PipelineError::UnknownChannelFailure { source, channel } => {
                write!(f, "Channel '{}' is not a column of {}", channel, source)
            }
        }
    }
}

impl std::error::Error for PipelineError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
