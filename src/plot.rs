//! Chart description for resampled AOD series.
//!
//! Drawing pixels is left to whatever consumes the JSON this module
//! produces. What lives here is everything the chart needs to be drawn the
//! same way every time: per-series marker style and legend label, the
//! y-axis limits, and date-axis ticks in the target zone (a major tick at
//! each local midnight, a minor tick every 12 hours, major labels `%m-%d`).

use chrono::{DateTime, Duration, NaiveTime};
use chrono_tz::Tz;
use serde::Serialize;

use crate::analysis::resample::resolve_local;
use crate::model::{CHANNEL_AOD_500NM, CHANNEL_AOD_870NM, QueryWindow, ResampledSeries};

/// Label format for major (daily) ticks.
pub const MAJOR_TICK_FORMAT: &str = "%m-%d";

/// Spacing of minor ticks.
pub const MINOR_TICK_HOURS: i64 = 12;

// ---------------------------------------------------------------------------
// Axis bounds
// ---------------------------------------------------------------------------

/// Y-axis limits, both within `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisBounds {
    pub min: f64,
    pub max: f64,
}

impl AxisBounds {
    pub const DEFAULT: AxisBounds = AxisBounds { min: 0.0, max: 0.3 };

    pub fn new(min: f64, max: f64) -> Result<Self, String> {
        for (name, v) in [("y_min", min), ("y_max", max)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(format!("{} must be within [0.0, 1.0], got {}", name, v));
            }
        }
        if min > max {
            return Err(format!("y_min ({}) must not exceed y_max ({})", min, max));
        }
        Ok(AxisBounds { min, max })
    }
}

// ---------------------------------------------------------------------------
// Chart types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub time: DateTime<Tz>,
    pub value: f64,
}

/// One (source, channel) series drawn as discrete points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotSeries {
    pub label: String,
    pub channel: String,
    /// 1-based position of the source in the session.
    pub source_index: usize,
    pub marker: &'static str,
    pub color: &'static str,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub timezone: String,
    pub y_limits: AxisBounds,
    pub major_ticks: Vec<DateTime<Tz>>,
    pub major_tick_labels: Vec<String>,
    pub minor_ticks: Vec<DateTime<Tz>>,
    pub series: Vec<PlotSeries>,
}

impl ChartSpec {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Short console rendering: one line per series.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} [{}] y={:.2}..{:.2}, {} day ticks\n",
            self.title,
            self.timezone,
            self.y_limits.min,
            self.y_limits.max,
            self.major_ticks.len()
        );
        for s in &self.series {
            let clipped = s
                .points
                .iter()
                .filter(|p| p.value < self.y_limits.min || p.value > self.y_limits.max)
                .count();
            out.push_str(&format!(
                "  {}{} {:<18} {:>4} points ({} outside y-limits)\n",
                s.marker,
                s.color,
                s.label,
                s.points.len(),
                clipped
            ));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Marker color and legend prefix for a channel.
pub fn channel_style(channel: &str) -> (&'static str, String) {
    match channel {
        CHANNEL_AOD_500NM => ("g", "500 nm".to_string()),
        CHANNEL_AOD_870NM => ("b", "870 nm".to_string()),
        other => ("k", other.to_string()),
    }
}

/// Turns one resampled channel into plottable points; missing buckets are skipped.
pub fn plot_series(source_index: usize, resampled: &ResampledSeries) -> PlotSeries {
    let (color, prefix) = channel_style(&resampled.channel);
    PlotSeries {
        label: format!("{} (Repo {})", prefix, source_index),
        channel: resampled.channel.clone(),
        source_index,
        marker: ".",
        color,
        points: resampled
            .present()
            .map(|(time, value)| ChartPoint { time: *time, value })
            .collect(),
    }
}

/// Assembles the chart for `window` in zone `tz`.
pub fn build_chart(
    title: &str,
    window: &QueryWindow,
    tz: Tz,
    y_limits: AxisBounds,
    series: Vec<PlotSeries>,
) -> ChartSpec {
    let (major_ticks, minor_ticks) = date_ticks(window, tz);
    let major_tick_labels = major_ticks
        .iter()
        .map(|t| t.format(MAJOR_TICK_FORMAT).to_string())
        .collect();

    ChartSpec {
        title: title.to_string(),
        timezone: tz.name().to_string(),
        y_limits,
        major_ticks,
        major_tick_labels,
        minor_ticks,
        series,
    }
}

/// Local midnights and 12-hour marks that fall inside `window`.
pub fn date_ticks(window: &QueryWindow, tz: Tz) -> (Vec<DateTime<Tz>>, Vec<DateTime<Tz>>) {
    let mut major = Vec::new();
    let mut minor = Vec::new();

    let mut day = window.start.date();
    while day <= window.end.date() {
        for hour in (0..24).step_by(MINOR_TICK_HOURS as usize) {
            let local = day.and_time(NaiveTime::MIN) + Duration::hours(hour);
            if !window.contains(local) {
                continue;
            }
            let tick = resolve_local(tz, local, false);
            if hour == 0 {
                major.push(tick);
            }
            minor.push(tick);
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }

    (major, minor)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Bucket;
    use chrono::{NaiveDate, TimeZone};

    fn week() -> QueryWindow {
        QueryWindow::from_dates(
            NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 10, 7).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn test_axis_bounds_validation() {
        assert!(AxisBounds::new(0.0, 0.3).is_ok());
        assert!(AxisBounds::new(0.5, 0.5).is_ok());
        assert!(AxisBounds::new(-0.1, 0.3).is_err());
        assert!(AxisBounds::new(0.0, 1.2).is_err());
        assert!(AxisBounds::new(0.4, 0.2).is_err());
    }

    #[test]
    fn test_week_has_seven_day_ticks_and_fourteen_minor_ticks() {
        let (major, minor) = date_ticks(&week(), chrono_tz::US::Pacific);
        assert_eq!(major.len(), 7);
        assert_eq!(minor.len(), 14);
        assert_eq!(major[0].naive_local().to_string(), "2024-10-01 00:00:00");
        assert_eq!(minor[1].naive_local().to_string(), "2024-10-01 12:00:00");
    }

    #[test]
    fn test_major_labels_use_month_day() {
        let chart = build_chart("Turlock CA USA", &week(), chrono_tz::US::Pacific, AxisBounds::DEFAULT, Vec::new());
        assert_eq!(chart.major_tick_labels.first().map(String::as_str), Some("10-01"));
        assert_eq!(chart.major_tick_labels.last().map(String::as_str), Some("10-07"));
        assert_eq!(chart.timezone, "US/Pacific");
    }

    #[test]
    fn test_plot_series_skips_missing_buckets_and_styles_channel() {
        let tz = chrono_tz::US::Pacific;
        let t0 = tz.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap();
        let resampled = ResampledSeries {
            channel: CHANNEL_AOD_870NM.to_string(),
            buckets: vec![
                Bucket { start: t0, mean: Some(0.08) },
                Bucket { start: t0 + Duration::hours(1), mean: None },
                Bucket { start: t0 + Duration::hours(2), mean: Some(0.09) },
            ],
        };
        let s = plot_series(2, &resampled);
        assert_eq!(s.label, "870 nm (Repo 2)");
        assert_eq!((s.marker, s.color), (".", "b"));
        assert_eq!(s.points.len(), 2);
        assert_eq!(s.points[1].value, 0.09);
    }

    #[test]
    fn test_summary_counts_points_outside_limits() {
        let tz = chrono_tz::US::Pacific;
        let t0 = tz.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap();
        let series = vec![PlotSeries {
            label: "500 nm (Repo 1)".to_string(),
            channel: CHANNEL_AOD_500NM.to_string(),
            source_index: 1,
            marker: ".",
            color: "g",
            points: vec![
                ChartPoint { time: t0, value: 0.1 },
                ChartPoint { time: t0, value: 0.6 },
            ],
        }];
        let chart = build_chart("Turlock CA USA", &week(), tz, AxisBounds::DEFAULT, series);
        let text = chart.summary();
        assert!(text.contains("500 nm (Repo 1)"));
        assert!(text.contains("(1 outside y-limits)"), "got {}", text);
    }

    #[test]
    fn test_chart_serializes_to_json() {
        let chart = build_chart("Turlock CA USA", &week(), chrono_tz::US::Pacific, AxisBounds::DEFAULT, Vec::new());
        let json = chart.to_json().expect("chart should serialize");
        assert!(json.contains("\"major_tick_labels\""));
        assert!(json.contains("2024-10-01T00:00:00-07:00"));
    }
}
