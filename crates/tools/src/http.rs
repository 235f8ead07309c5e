//! Shared HTTP plumbing for capabilities that call JSON APIs.

use std::time::Duration;
use wayfarer_core::error::CapabilityError;

/// Build a client whose every request is bounded by `timeout_secs`.
pub fn client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("wayfarer/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// GET `url` with `query` and decode the body as JSON.
///
/// Transport failures, non-2xx statuses and undecodable bodies all become
/// [`CapabilityError::Upstream`]; elapsed timeouts become
/// [`CapabilityError::Timeout`].
pub async fn get_json(
    client: &reqwest::Client,
    url: reqwest::Url,
    query: &[(&str, String)],
    timeout_secs: u64,
) -> Result<serde_json::Value, CapabilityError> {
    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            CapabilityError::Timeout { timeout_secs }
        } else {
            CapabilityError::Upstream(e.to_string())
        }
    };

    let response = client.get(url.clone()).query(query).send().await.map_err(map_err)?;

    let status = response.status();
    if !status.is_success() {
        return Err(CapabilityError::Upstream(format!(
            "{} returned status {}",
            url.host_str().unwrap_or("upstream"),
            status.as_u16()
        )));
    }

    response
        .json()
        .await
        .map_err(|e| CapabilityError::Upstream(format!("malformed response: {e}")))
}

/// Parse a configured base URL.
pub fn parse_url(raw: &str) -> Result<reqwest::Url, CapabilityError> {
    reqwest::Url::parse(raw)
        .map_err(|e| CapabilityError::Upstream(format!("invalid upstream url '{raw}': {e}")))
}
