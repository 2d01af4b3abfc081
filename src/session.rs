/// One viewer run: fetch → normalize → query → chart, for both sources.
///
/// Every input arrives in `SessionParams`; nothing is remembered between
/// runs. Sources are processed one after the other and never share state,
/// so a failure in one is recorded on its `SourceOutcome` and the other
/// carries on. The chart is only assembled when both sources loaded and
/// both have the required channels.

use crate::analysis;
use crate::config::ViewerConfig;
use crate::ingest::{self, NormalizeOptions};
use crate::logging::{self, Stage};
use crate::model::{
    Cadence, NormalizedSeries, PipelineError, QueryWindow, REQUIRED_CHANNELS, ResampledSeries,
    SourceDescriptor,
};
use crate::plot::{self, AxisBounds, ChartSpec};

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// Everything a run depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionParams {
    pub site_name: String,
    pub sources: [SourceDescriptor; 2],
    pub normalize: NormalizeOptions,
    pub window: QueryWindow,
    pub cadence: Cadence,
    pub y_limits: AxisBounds,
}

impl From<&ViewerConfig> for SessionParams {
    fn from(config: &ViewerConfig) -> Self {
        SessionParams {
            site_name: config.site_name.clone(),
            sources: config.sources.clone(),
            normalize: config.normalize,
            window: config.window,
            cadence: config.cadence,
            y_limits: config.y_limits,
        }
    }
}

/// What happened to one source during a run.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    /// 1-based position of the source.
    pub index: usize,
    pub source: SourceDescriptor,
    /// The loaded table, if fetch and parse succeeded.
    pub series: Option<NormalizedSeries>,
    /// Resampled required channels, present when the schema is complete.
    pub resampled: Vec<ResampledSeries>,
    /// Every failure for this source, in the order it occurred.
    pub errors: Vec<PipelineError>,
}

impl SourceOutcome {
    pub fn is_loaded(&self) -> bool {
        self.series.is_some()
    }

    /// Loaded and carrying every required channel.
    pub fn is_plottable(&self) -> bool {
        self.series
            .as_ref()
            .is_some_and(|s| s.schema_deficiency().is_none())
    }

    pub fn resampled_channel(&self, channel: &str) -> Option<&ResampledSeries> {
        self.resampled.iter().find(|r| r.channel == channel)
    }
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub outcomes: Vec<SourceOutcome>,
    pub chart: Option<ChartSpec>,
}

impl SessionReport {
    /// User-facing error messages, one per failure, in source order.
    pub fn messages(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .flat_map(|o| {
                o.errors
                    .iter()
                    .map(move |e| format!("Source {}: {}", o.index, e))
            })
            .collect()
    }

    pub fn loaded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_loaded()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_loaded()).count()
    }
}

// ---------------------------------------------------------------------------
// Running
// ---------------------------------------------------------------------------

/// Runs the full pipeline for both sources.
pub fn run_session(client: &reqwest::blocking::Client, params: &SessionParams) -> SessionReport {
    let outcomes: Vec<SourceOutcome> = params
        .sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let loaded = ingest::normalize(client, source, &params.normalize);
            process_source(i + 1, source, loaded, params)
        })
        .collect();

    let report = finish(outcomes, params);
    logging::log_session_summary(
        report.outcomes.len(),
        report.loaded_count(),
        report.failed_count(),
        report.chart.is_some(),
    );
    report
}

/// Takes the ingest result for one source through schema check and queries.
pub fn process_source(
    index: usize,
    source: &SourceDescriptor,
    loaded: Result<NormalizedSeries, PipelineError>,
    params: &SessionParams,
) -> SourceOutcome {
    let mut outcome = SourceOutcome {
        index,
        source: source.clone(),
        series: None,
        resampled: Vec::new(),
        errors: Vec::new(),
    };

    let series = match loaded {
        Ok(series) => series,
        Err(e) => {
            logging::log_failure("Load", &e);
            outcome.errors.push(e);
            return outcome;
        }
    };

    if let Err(e) = series.validate_schema() {
        logging::log_failure("Schema check", &e);
        outcome.errors.push(e);
        outcome.series = Some(series);
        return outcome;
    }

    for channel in REQUIRED_CHANNELS {
        match analysis::query(&series, &params.window, params.cadence, channel) {
            Ok(resampled) => {
                logging::debug(
                    Stage::Query,
                    Some(source.location()),
                    &format!(
                        "{}: {} buckets, {} with data",
                        channel,
                        resampled.len(),
                        resampled.present().count()
                    ),
                );
                outcome.resampled.push(resampled);
            }
            Err(e) => {
                logging::log_failure("Query", &e);
                outcome.errors.push(e);
            }
        }
    }

    outcome.series = Some(series);
    outcome
}

/// Builds the chart when every source is plottable.
pub fn finish(outcomes: Vec<SourceOutcome>, params: &SessionParams) -> SessionReport {
    let chart = if outcomes.iter().all(SourceOutcome::is_plottable) {
        let series = outcomes
            .iter()
            .flat_map(|o| o.resampled.iter().map(move |r| plot::plot_series(o.index, r)))
            .collect();
        let chart = plot::build_chart(
            &params.site_name,
            &params.window,
            params.normalize.timezone,
            params.y_limits,
            series,
        );
        logging::info(
            Stage::Plot,
            None,
            &format!("Chart ready with {} series", chart.series.len()),
        );
        Some(chart)
    } else {
        logging::warn(
            Stage::Plot,
            None,
            "Chart not produced: both sources must load with AOD_500nm and AOD_870nm",
        );
        None
    };

    SessionReport { outcomes, chart }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::normalize_text;
    use chrono::NaiveDate;

    fn params() -> SessionParams {
        SessionParams {
            site_name: "Turlock CA USA".to_string(),
            sources: [SourceDescriptor::new("one"), SourceDescriptor::new("two")],
            normalize: NormalizeOptions {
                header_skip: 6,
                timezone: chrono_tz::UTC,
            },
            window: QueryWindow::from_dates(
                NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 10, 1).unwrap(),
            )
            .unwrap(),
            cadence: Cadence::HOURLY,
            y_limits: AxisBounds::DEFAULT,
        }
    }

    fn load(name: &str, header: &str, row: &str) -> Result<NormalizedSeries, PipelineError> {
        let text = format!("1\n2\n3\n4\n5\n6\n{}\n{}\n", header, row);
        normalize_text(&SourceDescriptor::new(name), &text, &params().normalize)
    }

    const FULL: &str = "Date(dd:mm:yyyy),Time(hh:mm:ss),AOD_500nm,AOD_870nm";

    #[test]
    fn test_two_good_sources_produce_chart_with_four_series() {
        let p = params();
        let a = process_source(1, &p.sources[0], load("one", FULL, "01:10:2024,03:00:00,0.2,0.1"), &p);
        let b = process_source(2, &p.sources[1], load("two", FULL, "01:10:2024,04:00:00,0.3,0.1"), &p);
        let report = finish(vec![a, b], &p);

        assert!(report.messages().is_empty());
        let chart = report.chart.as_ref().expect("chart should be produced");
        let labels: Vec<_> = chart.series.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["500 nm (Repo 1)", "870 nm (Repo 1)", "500 nm (Repo 2)", "870 nm (Repo 2)"]
        );
        assert_eq!(report.loaded_count(), 2);
    }

    #[test]
    fn test_schema_failure_blocks_chart_but_keeps_series() {
        let p = params();
        let a = process_source(
            1,
            &p.sources[0],
            load("one", "Date(dd:mm:yyyy),Time(hh:mm:ss),AOD_500nm", "01:10:2024,03:00:00,0.2"),
            &p,
        );
        let b = process_source(2, &p.sources[1], load("two", FULL, "01:10:2024,04:00:00,0.3,0.1"), &p);

        assert!(a.is_loaded());
        assert!(!a.is_plottable());
        assert!(matches!(a.errors[0], PipelineError::SchemaFailure { .. }));
        assert!(b.is_plottable(), "second source is unaffected");
        assert_eq!(b.resampled.len(), 2);

        let report = finish(vec![a, b], &p);
        assert!(report.chart.is_none());
        let messages = report.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].starts_with("Source 1:"));
        assert!(messages[0].contains("Available columns"));
    }

    #[test]
    fn test_fetch_failure_is_isolated_to_its_source() {
        let p = params();
        let failed = Err(PipelineError::FetchFailure {
            source: "one".to_string(),
            cause: "HTTP error: 503".to_string(),
        });
        let a = process_source(1, &p.sources[0], failed, &p);
        let b = process_source(2, &p.sources[1], load("two", FULL, "01:10:2024,04:00:00,0.3,0.1"), &p);

        assert!(!a.is_loaded());
        let resampled = b.resampled_channel("AOD_500nm").expect("500nm resampled");
        assert_eq!(resampled.buckets[4].mean, Some(0.3));

        let report = finish(vec![a, b], &p);
        assert!(report.chart.is_none());
        assert_eq!(report.loaded_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert!(report.messages()[0].contains("HTTP error: 503"));
    }

    #[test]
    fn test_params_from_config() {
        let config = crate::config::parse_config("").unwrap();
        let p = SessionParams::from(&config);
        assert_eq!(p.site_name, "Turlock CA USA");
        assert_eq!(p.cadence, Cadence::HOURLY);
        assert_eq!(p.sources, config.sources);
    }
}
