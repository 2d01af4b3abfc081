//! AOD viewer: loads two AERONET `.lev15` exports, converts their UTC
//! timestamps to a local zone, resamples the 500 nm and 870 nm channels
//! over a date range, and describes the resulting chart.

pub mod analysis;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod plot;
pub mod session;
