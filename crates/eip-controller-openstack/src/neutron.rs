//! Overlay controller over the Neutron Networking v2.0 API
//!
//! ```http
//! POST   /v2.0/floatingips            {"floatingip": {"floating_network_id", "tenant_id"}}
//! PUT    /v2.0/floatingips/{id}       {"floatingip": {"port_id", "fixed_ip_address"}}
//! DELETE /v2.0/floatingips/{id}
//! GET    /v2.0/floatingips/{id}
//! GET    /v2.0/floatingips?tenant_id={owner}
//! GET    /v2.0/ports?tenant_id={owner}
//! ```

use async_trait::async_trait;
use eip_core::model::{CreateAddressSpec, ExternalAddressView, ExternalPort};
use eip_core::traits::NetworkController;
use eip_core::{Error, Result};
use serde::Deserialize;
use serde_json::json;
use std::net::IpAddr;

use crate::http::{base_url, build_client, check, transport, AUTH_HEADER};

const API: &str = "neutron";

#[derive(Debug, Deserialize)]
pub(crate) struct FloatingIp {
    id: String,
    floating_ip_address: IpAddr,
    #[serde(default)]
    port_id: Option<String>,
    #[serde(default)]
    fixed_ip_address: Option<IpAddr>,
}

impl From<FloatingIp> for ExternalAddressView {
    fn from(fip: FloatingIp) -> Self {
        ExternalAddressView {
            external_id: fip.id,
            address: fip.floating_ip_address,
            port_id: fip.port_id,
            fixed_ip_address: fip.fixed_ip_address,
            instance_id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FloatingIpBody {
    floatingip: FloatingIp,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FloatingIpList {
    floatingips: Vec<FloatingIp>,
}

#[derive(Debug, Deserialize)]
struct FixedIp {
    ip_address: IpAddr,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Port {
    id: String,
    #[serde(default)]
    device_id: Option<String>,
    #[serde(default)]
    fixed_ips: Vec<FixedIp>,
}

impl From<Port> for ExternalPort {
    fn from(port: Port) -> Self {
        ExternalPort {
            id: port.id,
            device_id: port.device_id.filter(|d| !d.is_empty()),
            fixed_ip_address: port.fixed_ips.first().map(|f| f.ip_address),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PortList {
    ports: Vec<Port>,
}

/// Neutron floating-IP client
pub struct NeutronController {
    /// Base URL of the Networking API
    endpoint: String,

    /// Keystone token
    /// ⚠️ NEVER log this value
    auth_token: String,

    client: reqwest::Client,
}

// Keeps the token out of logs
impl std::fmt::Debug for NeutronController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeutronController")
            .field("endpoint", &self.endpoint)
            .field("auth_token", &"<REDACTED>")
            .finish()
    }
}

impl NeutronController {
    /// Create a Neutron client
    ///
    /// Fails if the token is empty or the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, auth_token: impl Into<String>) -> Result<Self> {
        let auth_token = auth_token.into();
        if auth_token.is_empty() {
            return Err(Error::config("Neutron auth token cannot be empty"));
        }
        Ok(Self {
            endpoint: base_url(&endpoint.into()),
            auth_token,
            client: build_client()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2.0/{}", self.endpoint, path)
    }

    async fn send(&self, what: &str, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .header(AUTH_HEADER, &self.auth_token)
            .send()
            .await
            .map_err(|e| transport(API, e))?;
        check(API, what, response).await
    }

    async fn put_binding(&self, external_id: &str, binding: serde_json::Value) -> Result<()> {
        let what = format!("floatingip {}", external_id);
        self.send(
            &what,
            self.client
                .put(self.url(&format!("floatingips/{}", external_id)))
                .json(&json!({ "floatingip": binding })),
        )
        .await?;
        Ok(())
    }
}

async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| Error::provider(API, format!("Failed to parse response: {}", e)))
}

#[async_trait]
impl NetworkController for NeutronController {
    async fn create_address(&self, spec: &CreateAddressSpec) -> Result<ExternalAddressView> {
        tracing::debug!(
            "Creating floatingip on network {} for {}",
            spec.floating_network_id,
            spec.owner
        );
        let payload = json!({
            "floatingip": {
                "floating_network_id": spec.floating_network_id,
                "tenant_id": spec.owner,
            }
        });
        let response = self
            .send(
                "create floatingip",
                self.client.post(self.url("floatingips")).json(&payload),
            )
            .await?;
        let body: FloatingIpBody = parse(response).await?;
        tracing::info!(
            "Created floatingip {} ({})",
            body.floatingip.id,
            body.floatingip.floating_ip_address
        );
        Ok(body.floatingip.into())
    }

    async fn delete_address(&self, external_id: &str) -> Result<()> {
        let what = format!("floatingip {}", external_id);
        self.send(
            &what,
            self.client
                .delete(self.url(&format!("floatingips/{}", external_id))),
        )
        .await?;
        tracing::info!("Deleted floatingip {}", external_id);
        Ok(())
    }

    async fn bind_address(&self, external_id: &str, port_id: &str, fixed_ip: IpAddr) -> Result<()> {
        self.put_binding(
            external_id,
            json!({ "port_id": port_id, "fixed_ip_address": fixed_ip.to_string() }),
        )
        .await
    }

    async fn unbind_address(&self, external_id: &str) -> Result<()> {
        self.put_binding(external_id, json!({ "port_id": null }))
            .await
    }

    async fn list_addresses(&self, owner: &str) -> Result<Vec<ExternalAddressView>> {
        let response = self
            .send(
                "list floatingips",
                self.client
                    .get(self.url("floatingips"))
                    .query(&[("tenant_id", owner)]),
            )
            .await?;
        let body: FloatingIpList = parse(response).await?;
        Ok(body.floatingips.into_iter().map(Into::into).collect())
    }

    async fn list_ports(&self, owner: &str) -> Result<Vec<ExternalPort>> {
        let response = self
            .send(
                "list ports",
                self.client
                    .get(self.url("ports"))
                    .query(&[("tenant_id", owner)]),
            )
            .await?;
        let body: PortList = parse(response).await?;
        Ok(body.ports.into_iter().map(Into::into).collect())
    }

    async fn show_address(&self, external_id: &str) -> Result<ExternalAddressView> {
        let what = format!("floatingip {}", external_id);
        let response = self
            .send(
                &what,
                self.client
                    .get(self.url(&format!("floatingips/{}", external_id))),
            )
            .await?;
        let body: FloatingIpBody = parse(response).await?;
        Ok(body.floatingip.into())
    }

    fn controller_name(&self) -> &'static str {
        API
    }
}
