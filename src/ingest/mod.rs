/// Ingest/normalize pipeline.
///
/// Submodules:
/// - `fetch`   — retrieves raw text from a URL or local path.
/// - `aeronet` — parses AERONET `.lev15` text into a `NormalizedSeries`.
///
/// `normalize` is the stage boundary: fetch and parse failures come back
/// as `Err`, while a missing required channel is recorded on the returned
/// series so callers can still inspect what was loaded.

pub mod aeronet;
pub mod fetch;

use chrono_tz::Tz;

use crate::logging::{self, Stage};
use crate::model::{NormalizedSeries, PipelineError, SourceDescriptor};

/// Knobs for turning a raw file into a normalized series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeOptions {
    /// Metadata lines preceding the header row.
    pub header_skip: usize,
    /// Zone the UTC timestamps are converted into.
    pub timezone: Tz,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        NormalizeOptions {
            header_skip: aeronet::DEFAULT_HEADER_SKIP,
            timezone: chrono_tz::US::Pacific,
        }
    }
}

/// Fetches `source` and normalizes its content.
pub fn normalize(
    client: &reqwest::blocking::Client,
    source: &SourceDescriptor,
    options: &NormalizeOptions,
) -> Result<NormalizedSeries, PipelineError> {
    let text = fetch::fetch_text(client, source)?;
    logging::debug(
        Stage::Fetch,
        Some(source.location()),
        &format!("Fetched {} bytes", text.len()),
    );
    normalize_text(source, &text, options)
}

/// Normalizes already-fetched content.
pub fn normalize_text(
    source: &SourceDescriptor,
    text: &str,
    options: &NormalizeOptions,
) -> Result<NormalizedSeries, PipelineError> {
    let series = aeronet::parse_table(source, text, options.header_skip, options.timezone)?;

    logging::debug(
        Stage::Parse,
        Some(source.location()),
        &format!("Columns in the dataset: {:?}", series.columns()),
    );
    logging::info(
        Stage::Parse,
        Some(source.location()),
        &format!("Loaded {} rows ({})", series.len(), options.timezone.name()),
    );

    Ok(series)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
