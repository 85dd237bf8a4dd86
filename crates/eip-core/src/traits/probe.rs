// # Liveness Probe Trait
//
// Asks the routing layer whether traffic for a public address is actually
// being forwarded. The answer is authoritative: callers overwrite whatever
// status they stored before, and never cache it beyond the current call.
//
// ## Implementations
//
// - HTTP looking glass: `eip-probe-http` crate
// - Fixed answer: `StaticProbe` in this crate

use async_trait::async_trait;
use std::net::IpAddr;

use crate::config::ProbeConfig;
use crate::model::LivenessStatus;

/// Trait for liveness probe implementations
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    /// Probe the routing state of an address
    ///
    /// # Returns
    ///
    /// - `Ok(LivenessStatus::Active)`: a route with a next hop exists
    /// - `Ok(LivenessStatus::Pending)`: no such route (yet)
    /// - `Err(Error)`: the probe itself failed
    async fn probe(&self, public_ip: IpAddr) -> Result<LivenessStatus, crate::Error>;

    /// Probe name (for logging)
    fn probe_name(&self) -> &'static str;
}

/// Helper trait for constructing probes from configuration
pub trait LivenessProbeFactory: Send + Sync {
    /// Create a LivenessProbe instance from configuration
    fn create(
        &self,
        config: &ProbeConfig,
    ) -> Result<std::sync::Arc<dyn LivenessProbe>, crate::Error>;
}
