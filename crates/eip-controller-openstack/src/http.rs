//! Shared HTTP plumbing for the OpenStack clients

use eip_core::{Error, Result};
use std::time::Duration;

/// Default HTTP timeout for API requests (30 seconds)
pub(crate) const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the pre-issued Keystone token
pub(crate) const AUTH_HEADER: &str = "X-Auth-Token";

/// Build the HTTP client used by both APIs
pub(crate) fn build_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .build()
        .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))
}

/// Strip trailing slashes so paths can be appended verbatim
pub(crate) fn base_url(endpoint: &str) -> String {
    endpoint.trim_end_matches('/').to_string()
}

/// Turn a transport failure into a provider error
pub(crate) fn transport(api: &'static str, err: reqwest::Error) -> Error {
    Error::provider(api, format!("HTTP request failed: {}", err))
}

/// Pass a successful response through, map anything else to an error
pub(crate) async fn check(
    api: &'static str,
    what: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());
    Err(map_status(api, what, status.as_u16(), &body))
}

/// Map an OpenStack error status to the error taxonomy
///
/// Neutron reports exhausted quota as 409 `OverQuota`; Nova uses 403 (or the
/// older 413 `overLimit`) with a quota or "maximum number" message.
pub(crate) fn map_status(api: &'static str, what: &str, status: u16, body: &str) -> Error {
    let lowered = body.to_ascii_lowercase();
    let mentions_quota = lowered.contains("quota") || lowered.contains("maximum number");
    match status {
        401 => Error::auth(format!(
            "{} rejected the token. Status: {}",
            api, status
        )),
        403 if mentions_quota => Error::quota_exceeded(format!("{}: {}", what, body)),
        403 => Error::auth(format!(
            "Insufficient permissions for {}. Status: {}",
            what, status
        )),
        404 => Error::not_found(what.to_string()),
        409 if body.contains("OverQuota") => Error::quota_exceeded(format!("{}: {}", what, body)),
        409 => Error::provider(api, format!("Conflict on {}: {}", what, body)),
        413 if mentions_quota => Error::quota_exceeded(format!("{}: {}", what, body)),
        429 => Error::rate_limited(format!("{} rate limit exceeded. Status: {}", api, status)),
        500..=599 => Error::provider(
            api,
            format!("Server error (transient): {} - {}", status, body),
        ),
        _ => Error::provider(api, format!("{} failed: {} - {}", what, status, body)),
    }
}
