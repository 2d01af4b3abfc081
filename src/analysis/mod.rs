/// Range-query and resampling stage.
///
/// Takes a `NormalizedSeries` from ingest and reduces one channel to a
/// fixed-cadence mean series over a closed window. Nothing here performs
/// I/O or holds state between calls.
///
/// Submodules:
/// - `resample` — window selection, bucket alignment, and mean aggregation.

pub mod resample;

pub use resample::query;
