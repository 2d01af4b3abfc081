//! `aod_viewer [CONFIG] [--json]`
//!
//! Runs one viewer session from the given config (see `config` for path
//! resolution), prints any per-source errors and a chart summary, and with
//! `--json` writes the chart description to stdout. Log lines and errors go
//! to stderr, so stdout carries only the chart.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use aod_viewer::config;
use aod_viewer::ingest::fetch;
use aod_viewer::logging::{self, Stage};
use aod_viewer::session::{self, SessionParams};

#[derive(Debug, Parser)]
#[command(version, about = "Plot resampled AERONET AOD from two .lev15 sources")]
struct Cli {
    /// Config file; defaults to $AOD_VIEWER_CONFIG, then ./aod_viewer.toml
    config: Option<PathBuf>,

    /// Print the chart description as JSON instead of a summary
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            eprintln!("aod_viewer: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether a chart was produced.
fn run(cli: Cli) -> Result<bool, Box<dyn Error>> {
    let explicit = cli.config.is_some();
    let path = config::resolve_config_path(cli.config);
    let config = if !explicit && !path.exists() {
        // No file anywhere: run with the built-in defaults.
        config::parse_config("")?
    } else {
        config::load_config(&path)?
    };

    logging::init_logger(
        config.logging.level,
        config.logging.file.as_deref(),
        config.logging.console_timestamps,
    );
    logging::info(
        Stage::System,
        None,
        &format!(
            "{}: {} to {}, {} cadence",
            config.site_name, config.window.start, config.window.end, config.cadence
        ),
    );

    let client = fetch::build_client(config.timeout_secs)?;
    let params = SessionParams::from(&config);
    let report = session::run_session(&client, &params);

    for message in report.messages() {
        eprintln!("{}", message);
    }

    match &report.chart {
        Some(chart) => {
            if cli.json {
                println!("{}", chart.to_json()?);
            } else {
                print!("{}", chart.summary());
            }
            Ok(true)
        }
        None => Ok(false),
    }
}
