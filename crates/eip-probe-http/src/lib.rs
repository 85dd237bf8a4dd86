// # HTTP liveness probe
//
// Asks a routing looking glass whether a public address is routed yet.
//
// ## Protocol
//
// ```http
// GET {url}/routes/{public_ip}
// ```
//
// The looking glass answers with the plain-text route detail of its router
// (`show route <ip> detail`). A line of the form
//
// ```text
//     Protocol next hop: 10.20.0.7
// ```
//
// means the route has been installed and the address is `active`. Any other
// answer, including 404 for an unknown route, means `pending`.
//
// Each probe is one request; nothing is cached.

use async_trait::async_trait;
use eip_core::config::ProbeConfig;
use eip_core::model::LivenessStatus;
use eip_core::traits::{LivenessProbe, LivenessProbeFactory};
use eip_core::{ComponentRegistry, Error, Result};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

const NEXT_HOP_PREFIX: &str = "Protocol next hop:";

/// Looking-glass probe
#[derive(Debug)]
pub struct HttpProbe {
    /// Base URL of the looking glass
    url: String,

    client: reqwest::Client,
}

impl HttpProbe {
    /// Create a probe
    ///
    /// # Parameters
    ///
    /// - `url`: base URL of the looking glass (e.g. "http://lg.example:8080")
    /// - `timeout`: per-request timeout
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            url: url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn route_url(&self, public_ip: IpAddr) -> String {
        format!("{}/routes/{}", self.url, public_ip)
    }
}

/// Whether route detail text shows a protocol next hop
pub fn has_next_hop(detail: &str) -> bool {
    detail.lines().any(|line| {
        line.trim()
            .strip_prefix(NEXT_HOP_PREFIX)
            .and_then(|rest| rest.split_whitespace().next())
            .is_some_and(|hop| hop.parse::<IpAddr>().is_ok())
    })
}

#[async_trait]
impl LivenessProbe for HttpProbe {
    async fn probe(&self, public_ip: IpAddr) -> Result<LivenessStatus> {
        let response = self
            .client
            .get(self.route_url(public_ip))
            .send()
            .await
            .map_err(|e| Error::provider("http-probe", format!("Request failed: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!("No route for {}", public_ip);
            return Ok(LivenessStatus::Pending);
        }
        if !response.status().is_success() {
            return Err(Error::provider(
                "http-probe",
                format!("Looking glass error: {}", response.status()),
            ));
        }

        let detail = response
            .text()
            .await
            .map_err(|e| Error::provider("http-probe", format!("Failed to read response: {}", e)))?;

        let status = if has_next_hop(&detail) {
            LivenessStatus::Active
        } else {
            LivenessStatus::Pending
        };
        tracing::debug!("Probed {}: {}", public_ip, status);
        Ok(status)
    }

    fn probe_name(&self) -> &'static str {
        "http"
    }
}

/// Factory for looking-glass probes
pub struct HttpProbeFactory;

impl LivenessProbeFactory for HttpProbeFactory {
    fn create(&self, config: &ProbeConfig) -> Result<Arc<dyn LivenessProbe>> {
        match config {
            ProbeConfig::Http { url, timeout_secs } => Ok(Arc::new(HttpProbe::new(
                url.clone(),
                Duration::from_secs(*timeout_secs),
            )?)),
            _ => Err(Error::config("Invalid config for HTTP probe")),
        }
    }
}

/// Register the HTTP probe with a registry
pub fn register(registry: &ComponentRegistry) {
    registry.register_probe("http", Box::new(HttpProbeFactory));
}
