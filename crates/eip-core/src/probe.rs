//! Fixed-answer liveness probe
//!
//! Useful where no routing looking glass is reachable: every address is
//! reported with the configured status.

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;

use crate::config::ProbeConfig;
use crate::model::LivenessStatus;
use crate::traits::{LivenessProbe, LivenessProbeFactory};
use crate::{Error, Result};

/// Probe that always reports the same status
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe {
    status: LivenessStatus,
}

impl StaticProbe {
    /// Create a probe answering `status`
    pub fn new(status: LivenessStatus) -> Self {
        Self { status }
    }
}

#[async_trait]
impl LivenessProbe for StaticProbe {
    async fn probe(&self, public_ip: IpAddr) -> Result<LivenessStatus> {
        tracing::trace!("Static probe for {}: {}", public_ip, self.status);
        Ok(self.status)
    }

    fn probe_name(&self) -> &'static str {
        "static"
    }
}

/// Factory for [`StaticProbe`]
pub struct StaticProbeFactory;

impl LivenessProbeFactory for StaticProbeFactory {
    fn create(&self, config: &ProbeConfig) -> Result<Arc<dyn LivenessProbe>> {
        match config {
            ProbeConfig::Static { status } => Ok(Arc::new(StaticProbe::new(*status))),
            other => Err(Error::config(format!(
                "Static probe factory cannot build a '{}' probe",
                other.type_name()
            ))),
        }
    }
}
