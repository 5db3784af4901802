//! OTLP endpoint validation.

use url::Url;

use crate::telemetry::{Signal, TelemetryError};

/// Check that `raw` is an absolute `http`/`https` URL with a host.
pub fn validate_endpoint(signal: Signal, raw: &str) -> Result<Url, TelemetryError> {
    let invalid = |reason: String| TelemetryError::InvalidEndpoint {
        signal,
        endpoint: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {:?}", other))),
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }
    Ok(url)
}
