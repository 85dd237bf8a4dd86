// # Controller Traits
//
// Interfaces of the two external control planes an address can live in.
//
// ## Implementations
//
// - OpenStack (Neutron floating IPs + Nova os-floating-ips):
//   `eip-controller-openstack` crate
//
// ## Error Contract
//
// Clients report outcomes through the shared error type so the provisioning
// code can react without knowing the wire protocol:
//
// - quota rejections → `Error::QuotaExceeded`
// - missing objects → `Error::NotFound`
// - everything else is propagated uninterpreted
//
// Clients are single-shot: no retries, no caching, no background tasks.

use async_trait::async_trait;
use std::net::IpAddr;

use crate::config::ControllerConfig;
use crate::model::{CreateAddressSpec, ExternalAddressView, ExternalPort};

/// Overlay network controller
///
/// Addresses are independent objects that are bound to and unbound from
/// ports.
#[async_trait]
pub trait NetworkController: Send + Sync {
    /// Create an address object
    ///
    /// # Returns
    ///
    /// - `Ok(ExternalAddressView)`: the created object
    /// - `Err(Error::QuotaExceeded)`: the owner has no quota left
    async fn create_address(
        &self,
        spec: &CreateAddressSpec,
    ) -> Result<ExternalAddressView, crate::Error>;

    /// Delete an address object
    ///
    /// Returns `Err(Error::NotFound)` if the object is already gone.
    async fn delete_address(&self, external_id: &str) -> Result<(), crate::Error>;

    /// Bind an address to a port and private address
    async fn bind_address(
        &self,
        external_id: &str,
        port_id: &str,
        fixed_ip_address: IpAddr,
    ) -> Result<(), crate::Error>;

    /// Remove any binding of an address
    async fn unbind_address(&self, external_id: &str) -> Result<(), crate::Error>;

    /// List every address object of an owner
    async fn list_addresses(&self, owner: &str) -> Result<Vec<ExternalAddressView>, crate::Error>;

    /// List every port of an owner
    async fn list_ports(&self, owner: &str) -> Result<Vec<ExternalPort>, crate::Error>;

    /// Fetch one address object
    ///
    /// Returns `Err(Error::NotFound)` if the controller does not know it.
    async fn show_address(&self, external_id: &str) -> Result<ExternalAddressView, crate::Error>;

    /// Controller name (for logging)
    fn controller_name(&self) -> &'static str;
}

/// Legacy compute API
///
/// There is no independent address object: addresses belong to the account
/// and are attached straight to compute instances.
#[async_trait]
pub trait LegacyComputeClient: Send + Sync {
    /// Allocate an address to the account
    ///
    /// Returns `Err(Error::QuotaExceeded)` when the account is out of quota.
    async fn create_floating_ip(&self) -> Result<ExternalAddressView, crate::Error>;

    /// Return an address to the pool
    async fn delete_floating_ip(&self, external_id: &str) -> Result<(), crate::Error>;

    /// List the account's addresses
    async fn list_floating_ips(&self) -> Result<Vec<ExternalAddressView>, crate::Error>;

    /// Attach an address to an instance
    async fn add_floating_ip(&self, instance_id: &str, public_ip: IpAddr)
    -> Result<(), crate::Error>;

    /// Detach an address from an instance
    async fn remove_floating_ip(
        &self,
        instance_id: &str,
        public_ip: IpAddr,
    ) -> Result<(), crate::Error>;

    /// Client name (for logging)
    fn client_name(&self) -> &'static str;
}

/// Helper trait for constructing network controllers from configuration
pub trait NetworkControllerFactory: Send + Sync {
    /// Create a NetworkController instance from configuration
    fn create(
        &self,
        config: &ControllerConfig,
    ) -> Result<std::sync::Arc<dyn NetworkController>, crate::Error>;
}

/// Helper trait for constructing legacy compute clients from configuration
pub trait LegacyComputeFactory: Send + Sync {
    /// Create a LegacyComputeClient instance from configuration
    fn create(
        &self,
        config: &ControllerConfig,
    ) -> Result<std::sync::Arc<dyn LegacyComputeClient>, crate::Error>;
}
