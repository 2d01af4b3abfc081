//! Range query and fixed-cadence mean resampling.
//!
//! Sub-daily buckets are fixed-length instants counted from local midnight
//! of the window's first day, so an hourly cadence lines up with the hours
//! on the local clock. Daily buckets follow local calendar dates instead, so
//! a day that crosses a DST change spans 23 or 25 hours. Row selection
//! compares wall-clock times in the series' zone, truncated to whole
//! seconds, against the closed window.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone};
use chrono_tz::Tz;

use crate::model::{Bucket, Cadence, NormalizedSeries, PipelineError, QueryWindow, ResampledSeries};

/// Mean of `channel` per `cadence` bucket over `window`.
///
/// Errors:
/// - `RangeFailure` when `window.start > window.end`.
/// - `UnknownChannelFailure` when `channel` is not a column of `series`.
///
/// Buckets with no non-missing values carry `mean: None`.
pub fn query(
    series: &NormalizedSeries,
    window: &QueryWindow,
    cadence: Cadence,
    channel: &str,
) -> Result<ResampledSeries, PipelineError> {
    if window.start > window.end {
        return Err(PipelineError::RangeFailure {
            start: window.start.to_string(),
            end: window.end.to_string(),
        });
    }

    if !series.has_column(channel) {
        return Err(PipelineError::UnknownChannelFailure {
            source: series.source().to_string(),
            channel: channel.to_string(),
        });
    }

    let tz = series.timezone();
    let grid = BucketGrid::new(tz, window.start.date(), cadence);

    let first = grid.index(&resolve_local(tz, window.start, false));
    let last = grid.index(&resolve_local(tz, window.end, true));
    let count = (last - first + 1).max(0) as usize;

    let mut sums = vec![0.0_f64; count];
    let mut hits = vec![0_usize; count];

    for record in series.records() {
        if !window.contains(record.timestamp.naive_local()) {
            continue;
        }
        let Some(value) = record.value(channel) else {
            continue;
        };
        let slot = grid.index(&record.timestamp) - first;
        if slot < 0 || slot as usize >= count {
            continue;
        }
        sums[slot as usize] += value;
        hits[slot as usize] += 1;
    }

    let buckets = (0..count)
        .map(|k| Bucket {
            start: grid.start(first + k as i64),
            mean: (hits[k] > 0).then(|| sums[k] / hits[k] as f64),
        })
        .collect();

    Ok(ResampledSeries {
        channel: channel.to_string(),
        buckets,
    })
}

/// Bucket numbering anchored at local midnight of `day0`.
struct BucketGrid {
    tz: Tz,
    day0: NaiveDate,
    origin: DateTime<Tz>,
    cadence: Cadence,
}

impl BucketGrid {
    fn new(tz: Tz, day0: NaiveDate, cadence: Cadence) -> Self {
        BucketGrid {
            tz,
            day0,
            origin: resolve_local(tz, day0.and_time(NaiveTime::MIN), false),
            cadence,
        }
    }

    fn index(&self, t: &DateTime<Tz>) -> i64 {
        match self.cadence {
            Cadence::Days(n) => (t.naive_local().date() - self.day0)
                .num_days()
                .div_euclid(i64::from(n)),
            _ => (*t - self.origin)
                .num_seconds()
                .div_euclid(self.cadence.seconds()),
        }
    }

    fn start(&self, k: i64) -> DateTime<Tz> {
        match self.cadence {
            Cadence::Days(n) => {
                let day = self.day0 + Duration::days(k * i64::from(n));
                resolve_local(self.tz, day.and_time(NaiveTime::MIN), false)
            }
            _ => self.origin + Duration::seconds(k * self.cadence.seconds()),
        }
    }
}

/// Maps a wall-clock time onto an instant in `tz`.
///
/// In a repeated (fall-back) hour, picks the later instant when
/// `prefer_latest`, otherwise the earlier one. A time skipped by a
/// spring-forward gap moves forward in 15-minute steps to the first
/// wall-clock time that exists. A gap longer than two hours keeps the
/// wall-clock reading under the offset in force one day earlier.
pub fn resolve_local(tz: Tz, local: NaiveDateTime, prefer_latest: bool) -> DateTime<Tz> {
    let mut candidate = local;
    for _ in 0..8 {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return dt,
            LocalResult::Ambiguous(a, b) => {
                let (early, late) = if a <= b { (a, b) } else { (b, a) };
                return if prefer_latest { late } else { early };
            }
            LocalResult::None => candidate += Duration::minutes(15),
        }
    }
    let before = tz.offset_from_utc_datetime(&(local - Duration::days(1))).fix();
    tz.from_utc_datetime(&(local - Duration::seconds(i64::from(before.local_minus_utc()))))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
