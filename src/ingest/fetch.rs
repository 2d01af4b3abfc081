/// Raw content retrieval for `.lev15` sources
///
/// Remote sources (`http://`, `https://`) are downloaded with a blocking
/// reqwest client; anything else is read from the local filesystem. Both
/// paths report failures as `PipelineError::FetchFailure` carrying the
/// source location.

use std::time::Duration;

use crate::model::{PipelineError, SourceDescriptor};

/// Default request timeout; a viewer run blocks on each download.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Builds the blocking HTTP client shared by both sources in a session.
pub fn build_client(timeout_secs: u64) -> reqwest::Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("aod_viewer/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Returns the full text of `source`.
pub fn fetch_text(
    client: &reqwest::blocking::Client,
    source: &SourceDescriptor,
) -> Result<String, PipelineError> {
    if source.is_remote() {
        fetch_remote(client, source)
    } else {
        std::fs::read_to_string(source.location().trim()).map_err(|e| fetch_failure(
            source,
            format!("Failed to read file: {}", e),
        ))
    }
}

fn fetch_remote(
    client: &reqwest::blocking::Client,
    source: &SourceDescriptor,
) -> Result<String, PipelineError> {
    let response = client
        .get(source.location().trim())
        .send()
        .map_err(|e| fetch_failure(source, describe_request_error(&e)))?;

    if !response.status().is_success() {
        return Err(fetch_failure(
            source,
            format!("HTTP error: {}", response.status().as_u16()),
        ));
    }

    response
        .text()
        .map_err(|e| fetch_failure(source, format!("Failed to read response: {}", e)))
}

fn describe_request_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("request timed out: {}", err)
    } else if err.is_connect() {
        format!("connection failed: {}", err)
    } else {
        format!("Request failed: {}", err)
    }
}

fn fetch_failure(source: &SourceDescriptor, cause: String) -> PipelineError {
    PipelineError::FetchFailure {
        source: source.to_string(),
        cause,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
