//! Legacy compute client over the Nova `os-floating-ips` API
//!
//! ```http
//! POST   /os-floating-ips             {}
//! DELETE /os-floating-ips/{id}
//! GET    /os-floating-ips
//! POST   /servers/{id}/action         {"addFloatingIp": {"address"}}
//! POST   /servers/{id}/action         {"removeFloatingIp": {"address"}}
//! ```

use async_trait::async_trait;
use eip_core::model::ExternalAddressView;
use eip_core::traits::LegacyComputeClient;
use eip_core::{Error, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::IpAddr;

use crate::http::{base_url, build_client, check, transport, AUTH_HEADER};

const API: &str = "nova";

#[derive(Debug, Deserialize)]
pub(crate) struct NovaFloatingIp {
    // nova-network used integer ids, Neutron-backed Nova uses UUIDs
    id: Value,
    ip: IpAddr,
    #[serde(default)]
    fixed_ip: Option<IpAddr>,
    #[serde(default)]
    instance_id: Option<String>,
}

impl From<NovaFloatingIp> for ExternalAddressView {
    fn from(fip: NovaFloatingIp) -> Self {
        let external_id = match fip.id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        ExternalAddressView {
            external_id,
            address: fip.ip,
            port_id: None,
            fixed_ip_address: fip.fixed_ip,
            instance_id: fip.instance_id.filter(|i| !i.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NovaFloatingIpBody {
    floating_ip: NovaFloatingIp,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NovaFloatingIpList {
    floating_ips: Vec<NovaFloatingIp>,
}

/// Nova floating-IP client
pub struct NovaCompute {
    /// Base URL of the Compute API, including the version
    endpoint: String,

    /// Keystone token
    /// ⚠️ NEVER log this value
    auth_token: String,

    client: reqwest::Client,
}

// Keeps the token out of logs
impl std::fmt::Debug for NovaCompute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NovaCompute")
            .field("endpoint", &self.endpoint)
            .field("auth_token", &"<REDACTED>")
            .finish()
    }
}

impl NovaCompute {
    /// Create a Nova client
    pub fn new(endpoint: impl Into<String>, auth_token: impl Into<String>) -> Result<Self> {
        let auth_token = auth_token.into();
        if auth_token.is_empty() {
            return Err(Error::config("Nova auth token cannot be empty"));
        }
        Ok(Self {
            endpoint: base_url(&endpoint.into()),
            auth_token,
            client: build_client()?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    async fn send(&self, what: &str, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request
            .header(AUTH_HEADER, &self.auth_token)
            .send()
            .await
            .map_err(|e| transport(API, e))?;
        check(API, what, response).await
    }

    async fn server_action(&self, instance_id: &str, action: Value) -> Result<()> {
        let what = format!("server {}", instance_id);
        self.send(
            &what,
            self.client
                .post(self.url(&format!("servers/{}/action", instance_id)))
                .json(&action),
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
impl LegacyComputeClient for NovaCompute {
    async fn create_floating_ip(&self) -> Result<ExternalAddressView> {
        let response = self
            .send(
                "create floating ip",
                self.client.post(self.url("os-floating-ips")).json(&json!({})),
            )
            .await?;
        let body: NovaFloatingIpBody = parse(response).await?;
        tracing::info!("Created floating ip {}", body.floating_ip.ip);
        Ok(body.floating_ip.into())
    }

    async fn delete_floating_ip(&self, external_id: &str) -> Result<()> {
        let what = format!("floating ip {}", external_id);
        self.send(
            &what,
            self.client
                .delete(self.url(&format!("os-floating-ips/{}", external_id))),
        )
        .await?;
        tracing::info!("Deleted floating ip {}", external_id);
        Ok(())
    }

    async fn list_floating_ips(&self) -> Result<Vec<ExternalAddressView>> {
        let response = self
            .send(
                "list floating ips",
                self.client.get(self.url("os-floating-ips")),
            )
            .await?;
        let body: NovaFloatingIpList = parse(response).await?;
        Ok(body.floating_ips.into_iter().map(Into::into).collect())
    }

    async fn add_floating_ip(&self, instance_id: &str, public_ip: IpAddr) -> Result<()> {
        self.server_action(
            instance_id,
            json!({ "addFloatingIp": { "address": public_ip.to_string() } }),
        )
        .await
    }

    async fn remove_floating_ip(&self, instance_id: &str, public_ip: IpAddr) -> Result<()> {
        self.server_action(
            instance_id,
            json!({ "removeFloatingIp": { "address": public_ip.to_string() } }),
        )
        .await
    }

    fn client_name(&self) -> &'static str {
        API
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floating_ip_wire_format() {
        let list: NovaFloatingIpList = serde_json::from_str(
            r#"{"floating_ips": [
                {"id": 1, "ip": "10.10.10.1", "fixed_ip": null, "instance_id": null, "pool": "nova"},
                {"id": "a4b1f8c9-8c2e-4f0e-9c3b-6a7d2e1f0b11", "ip": "10.10.10.2",
                 "fixed_ip": "192.168.0.3", "instance_id": "vm-1", "pool": "nova"}
            ]}"#,
        )
        .unwrap();
        let views: Vec<ExternalAddressView> =
            list.floating_ips.into_iter().map(Into::into).collect();

        assert_eq!(views[0].external_id, "1");
        assert_eq!(views[0].instance_id, None);
        assert_eq!(views[1].external_id, "a4b1f8c9-8c2e-4f0e-9c3b-6a7d2e1f0b11");
        assert_eq!(views[1].instance_id.as_deref(), Some("vm-1"));
        assert_eq!(views[1].fixed_ip_address, Some("192.168.0.3".parse().unwrap()));
        assert!(views.iter().all(|v| v.port_id.is_none()));
    }

    #[test]
    fn test_token_not_exposed_in_debug() {
        let compute = NovaCompute::new("http://nova:8774/v2.1", "secret_token_12345").unwrap();
        let debug_str = format!("{:?}", compute);
        assert!(!debug_str.contains("secret_token"));
        assert_eq!(
            compute.url("servers/vm-1/action"),
            "http://nova:8774/v2.1/servers/vm-1/action"
        );
    }
}
