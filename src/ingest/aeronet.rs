/// AERONET `.lev15` table parser
///
/// Turns the text of an AERONET Level 1.5 export into a `NormalizedSeries`.
///
/// File layout:
///   - a fixed number of metadata lines (site name, version banner, units)
///   - one header row, e.g. `Date(dd:mm:yyyy),Time(hh:mm:ss),Day_of_Year,AOD_1640nm,...`
///   - comma-separated data rows whose first two fields are the UTC date
///     (`DD:MM:YYYY`) and time (`HH:MM:SS`)
///
/// Missing measurements appear as `-999` (or `-999.000000`), empty cells,
/// or text such as `N/A`; all of them become `None`.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::model::{
    AERONET_FILL_VALUE, AodRecord, CHANNEL_AOD_500NM, CHANNEL_AOD_870NM, NormalizedSeries,
    PipelineError, SourceDescriptor,
};

/// Number of metadata lines above the header row in AERONET exports.
pub const DEFAULT_HEADER_SKIP: usize = 6;

/// Format of the combined `"<date> <time>"` field.
pub const TIMESTAMP_FORMAT: &str = "%d:%m:%Y %H:%M:%S";

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Parses `text` into a series whose timestamps are converted from UTC to `tz`.
///
/// Any malformed row fails the whole table; schema deficiencies do not.
pub fn parse_table(
    source: &SourceDescriptor,
    text: &str,
    header_skip: usize,
    tz: Tz,
) -> Result<NormalizedSeries, PipelineError> {
    let body = skip_metadata_lines(text, header_skip).ok_or_else(|| parse_failure(
        source,
        None,
        format!("file ends before the header row (expected {} metadata lines)", header_skip),
    ))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| csv_failure(source, header_skip, e))?
        .clone();

    if headers.len() < 2 {
        return Err(parse_failure(
            source,
            Some(header_skip + 1),
            format!("header has {} column(s); expected date and time columns", headers.len()),
        ));
    }

    let columns: Vec<String> = headers.iter().skip(2).map(str::to_string).collect();
    let idx_500 = columns.iter().position(|c| c == CHANNEL_AOD_500NM);
    let idx_870 = columns.iter().position(|c| c == CHANNEL_AOD_870NM);

    let mut records = Vec::new();

    for result in reader.records() {
        let row = result.map_err(|e| csv_failure(source, header_skip, e))?;
        // Position lines are 1-based within `body`.
        let line = row
            .position()
            .map(|p| p.line() as usize + header_skip)
            .unwrap_or(header_skip + records.len() + 2);

        let date = row.get(0).unwrap_or_default();
        let time = row.get(1).unwrap_or_default();
        let timestamp = parse_timestamp(date, time, tz).map_err(|cause| {
            parse_failure(source, Some(line), cause)
        })?;

        let values: Vec<Option<f64>> = row.iter().skip(2).map(parse_cell).collect();

        let mut extra = BTreeMap::new();
        for (i, name) in columns.iter().enumerate() {
            if Some(i) == idx_500 || Some(i) == idx_870 {
                continue;
            }
            extra.insert(name.clone(), values.get(i).copied().flatten());
        }

        records.push(AodRecord {
            timestamp,
            aod_500nm: idx_500.and_then(|i| values.get(i).copied().flatten()),
            aod_870nm: idx_870.and_then(|i| values.get(i).copied().flatten()),
            extra,
        });
    }

    Ok(NormalizedSeries::new(source.clone(), tz, columns, records))
}

/// Returns the text after the first `count` lines, or `None` if the
/// text has fewer lines than that.
fn skip_metadata_lines(text: &str, count: usize) -> Option<&str> {
    let mut rest = text;
    for _ in 0..count {
        let newline = rest.find('\n')?;
        rest = &rest[newline + 1..];
    }
    Some(rest)
}

/// Combines the date and time fields, parses them as UTC, and converts to `tz`.
pub fn parse_timestamp(date: &str, time: &str, tz: Tz) -> Result<DateTime<Tz>, String> {
    let combined = format!("{} {}", date.trim(), time.trim());
    let naive = NaiveDateTime::parse_from_str(&combined, TIMESTAMP_FORMAT)
        .map_err(|e| format!("timestamp '{}' does not match {}: {}", combined, TIMESTAMP_FORMAT, e))?;
    Ok(Utc.from_utc_datetime(&naive).with_timezone(&tz))
}

/// Parses one measurement cell; empty, non-numeric, and fill cells are `None`.
fn parse_cell(cell: &str) -> Option<f64> {
    let value: f64 = cell.trim().parse().ok()?;
    if !value.is_finite() || (value - AERONET_FILL_VALUE).abs() < 1e-9 {
        None
    } else {
        Some(value)
    }
}

fn parse_failure(source: &SourceDescriptor, line: Option<usize>, cause: String) -> PipelineError {
    PipelineError::ParseFailure {
        source: source.to_string(),
        line,
        cause,
    }
}

fn csv_failure(source: &SourceDescriptor, header_skip: usize, err: csv::Error) -> PipelineError {
    let line = err.position().map(|p| p.line() as usize + header_skip);
    let cause = match err.kind() {
        csv::ErrorKind::UnequalLengths { expected_len, len, .. } => {
            format!("row has {} fields, header has {}", len, expected_len)
        }
        _ => err.to_string(),
    };
    parse_failure(source, line, cause)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Offset, Timelike};

    const METADATA: &str = "AERONET Version 3; Level 1.5\n\
                            Turlock_CA_USA\n\
                            Version 3: AOD Level 1.5\n\
                            The following data are automatically cloud cleared\n\
                            Contact: PI=example\n\
                            UNITS: AOD unitless\n";

    fn source() -> SourceDescriptor {
        SourceDescriptor::new("fixture.lev15")
    }

    fn table(header: &str, rows: &[&str]) -> String {
        let mut text = String::from(METADATA);
        text.push_str(header);
        text.push('\n');
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text
    }

    const HEADER: &str = "Date(dd:mm:yyyy),Time(hh:mm:ss),Day_of_Year,AOD_870nm,AOD_675nm,AOD_500nm";

    #[test]
    fn test_rows_become_records_in_source_order() {
        let text = table(
            HEADER,
            &[
                "01:10:2024,00:00:00,275,0.080000,0.095000,0.120000",
                "01:10:2024,01:00:00,275,0.081000,-999.000000,0.121000",
                "01:10:2024,02:00:00,275,-999.,0.097000,",
            ],
        );
        let series = parse_table(&source(), &text, DEFAULT_HEADER_SKIP, chrono_tz::US::Pacific)
            .expect("well-formed table should parse");

        assert_eq!(series.len(), 3);
        assert_eq!(series.columns(), &["Day_of_Year", "AOD_870nm", "AOD_675nm", "AOD_500nm"]);
        assert!(series.schema_deficiency().is_none());

        let first = &series.records()[0];
        assert_eq!(first.aod_500nm, Some(0.12));
        assert_eq!(first.aod_870nm, Some(0.08));
        assert_eq!(first.value("AOD_675nm"), Some(0.095));

        let second = &series.records()[1];
        assert_eq!(second.value("AOD_675nm"), None, "fill value is missing");

        let third = &series.records()[2];
        assert_eq!(third.aod_870nm, None);
        assert_eq!(third.aod_500nm, None, "empty cell is missing");

        let stamps: Vec<_> = series.records().iter().map(|r| r.timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_timestamps_convert_from_utc_to_pacific() {
        let text = table(HEADER, &["01:10:2024,00:00:00,275,0.08,0.09,0.12"]);
        let series = parse_table(&source(), &text, DEFAULT_HEADER_SKIP, chrono_tz::US::Pacific).unwrap();
        let ts = series.records()[0].timestamp;

        // 2024-10-01 00:00 UTC is 2024-09-30 17:00 PDT (UTC-7).
        assert_eq!(ts.timezone(), chrono_tz::US::Pacific);
        assert_eq!(ts.offset().fix().local_minus_utc(), -7 * 3600);
        assert_eq!(ts.naive_local().to_string(), "2024-09-30 17:00:00");
        assert_eq!(ts.with_timezone(&Utc).hour(), 0);
    }

    #[test]
    fn test_winter_rows_use_standard_time_offset() {
        let ts = parse_timestamp("15:01:2024", "12:00:00", chrono_tz::US::Pacific).unwrap();
        assert_eq!(ts.offset().fix().local_minus_utc(), -8 * 3600);
    }

    #[test]
    fn test_bad_timestamp_is_parse_failure_with_line() {
        let text = table(
            HEADER,
            &[
                "01:10:2024,00:00:00,275,0.08,0.09,0.12",
                "2024-10-01,01:00:00,275,0.08,0.09,0.12",
            ],
        );
        match parse_table(&source(), &text, DEFAULT_HEADER_SKIP, chrono_tz::US::Pacific) {
            Err(PipelineError::ParseFailure { line, cause, .. }) => {
                assert_eq!(line, Some(9), "metadata 6 + header 1 + second data row");
                assert!(cause.contains("2024-10-01"), "cause should quote the value: {}", cause);
            }
            other => panic!("expected ParseFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_column_count_mismatch_is_parse_failure() {
        let text = table(HEADER, &["01:10:2024,00:00:00,275,0.08"]);
        let result = parse_table(&source(), &text, DEFAULT_HEADER_SKIP, chrono_tz::US::Pacific);
        assert!(
            matches!(result, Err(PipelineError::ParseFailure { .. })),
            "short row should fail, got {:?}",
            result
        );
    }

    #[test]
    fn test_truncated_metadata_is_parse_failure() {
        let result = parse_table(&source(), "only\ntwo lines", DEFAULT_HEADER_SKIP, chrono_tz::UTC);
        assert!(matches!(result, Err(PipelineError::ParseFailure { line: None, .. })));
    }

    #[test]
    fn test_header_only_yields_empty_series() {
        let text = table(HEADER, &[]);
        let series = parse_table(&source(), &text, DEFAULT_HEADER_SKIP, chrono_tz::UTC).unwrap();
        assert!(series.is_empty());
        assert_eq!(series.columns().len(), 4);
    }

    #[test]
    fn test_missing_channel_is_recorded_not_fatal() {
        let text = table(
            "Date(dd:mm:yyyy),Time(hh:mm:ss),AOD_500nm,AOD_675nm",
            &["01:10:2024,00:00:00,0.12,0.09"],
        );
        let series = parse_table(&source(), &text, DEFAULT_HEADER_SKIP, chrono_tz::UTC)
            .expect("schema deficiency must not fail parsing");
        assert_eq!(series.len(), 1);
        let deficiency = series.schema_deficiency().expect("870nm missing");
        assert_eq!(deficiency.missing, vec!["AOD_870nm"]);
        assert_eq!(deficiency.available, vec!["AOD_500nm", "AOD_675nm"]);
    }

    #[test]
    fn test_parse_cell_variants() {
        assert_eq!(parse_cell(" 0.25 "), Some(0.25));
        assert_eq!(parse_cell("-999"), None);
        assert_eq!(parse_cell("-999.000000"), None);
        assert_eq!(parse_cell("N/A"), None);
        assert_eq!(parse_cell(""), None);
        assert_eq!(parse_cell("NaN"), None);
    }

    #[test]
    fn test_utc_to_zone_round_trip_is_lossless() {
        for (date, time) in [
            ("01:10:2024", "00:00:00"),
            ("10:03:2024", "10:30:00"),  // US spring-forward day
            ("03:11:2024", "09:15:42"),  // US fall-back day, ambiguous local hour
            ("31:12:2023", "23:59:59"),
        ] {
            let local = parse_timestamp(date, time, chrono_tz::US::Pacific).unwrap();
            let back = local.with_timezone(&Utc);
            let expected = NaiveDateTime::parse_from_str(
                &format!("{} {}", date, time),
                TIMESTAMP_FORMAT,
            )
            .unwrap();
            assert_eq!(back.naive_utc(), expected, "round trip for {} {}", date, time);
        }
    }
}
