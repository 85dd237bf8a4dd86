// # OpenStack controllers
//
// Clients for the two OpenStack APIs the address service drives:
//
// - **Neutron** (Networking v2.0): floating IPs as independent objects bound
//   to ports. Backs the overlay deployment mode.
// - **Nova** (`os-floating-ips`): floating IPs attached straight to servers.
//   Backs the legacy mode and bare-address calls in overlay mode.
//
// ## Constraints
//
// - One HTTP request per trait call; retries and compensation belong to the
//   service
// - HTTP timeout of 30 seconds
// - Status codes map onto the core error taxonomy (401/403 auth, 404 not
//   found, 409/403 quota, 429 rate limit, 5xx transient provider errors)
// - The auth token never appears in logs or `Debug` output
//
// ## Authentication
//
// A pre-issued Keystone token is sent as `X-Auth-Token`. Obtaining and
// refreshing it is left to the deployment.

mod http;
pub mod neutron;
pub mod nova;

pub use neutron::NeutronController;
pub use nova::NovaCompute;

use eip_core::config::ControllerConfig;
use eip_core::traits::{
    LegacyComputeClient, LegacyComputeFactory, NetworkController, NetworkControllerFactory,
};
use eip_core::{ComponentRegistry, Error, Result};
use std::sync::Arc;

/// Factory for Neutron controllers
pub struct NeutronFactory;

impl NetworkControllerFactory for NeutronFactory {
    fn create(&self, config: &ControllerConfig) -> Result<Arc<dyn NetworkController>> {
        match config {
            ControllerConfig::Openstack {
                network_endpoint,
                auth_token,
                ..
            } => Ok(Arc::new(NeutronController::new(
                network_endpoint.clone(),
                auth_token.clone(),
            )?)),
            _ => Err(Error::config("Invalid config for OpenStack controller")),
        }
    }
}

/// Factory for Nova legacy compute clients
pub struct NovaFactory;

impl LegacyComputeFactory for NovaFactory {
    fn create(&self, config: &ControllerConfig) -> Result<Arc<dyn LegacyComputeClient>> {
        match config {
            ControllerConfig::Openstack {
                compute_endpoint,
                auth_token,
                ..
            } => Ok(Arc::new(NovaCompute::new(
                compute_endpoint.clone(),
                auth_token.clone(),
            )?)),
            _ => Err(Error::config("Invalid config for OpenStack compute client")),
        }
    }
}

/// Register the OpenStack clients with a registry
///
/// # Example
///
/// ```rust
/// use eip_core::ComponentRegistry;
///
/// let registry = ComponentRegistry::with_builtins();
/// eip_controller_openstack::register(&registry);
/// assert!(registry.has_controller("openstack"));
/// ```
pub fn register(registry: &ComponentRegistry) {
    registry.register_controller("openstack", Box::new(NeutronFactory));
    registry.register_legacy_client("openstack", Box::new(NovaFactory));
}
