//! Backend strategies
//!
//! The same allocation and association protocol has two implementations:
//!
//! - [`OverlayBackend`]: independent address objects bound to ports, with a
//!   local record per address
//! - [`LegacyBackend`]: flat-network addresses attached straight to compute
//!   instances, no local record
//!
//! One backend is chosen per deployment by [`create_backend`]. The overlay
//! backend hands bare public addresses it does not own over to the legacy
//! one, so both kinds stay reachable in overlay deployments.

pub mod legacy;
pub mod overlay;

pub use legacy::LegacyBackend;
pub use overlay::OverlayBackend;

use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use crate::attachment::PortAttachmentResolver;
use crate::cleanup::CrashCleaner;
use crate::config::{BackendKind, ServiceConfig};
use crate::events::{AddressEvent, EventSink};
use crate::model::{AddressRecord, Domain, ExternalAddressView, ExternalPort, LivenessStatus};
use crate::traits::{
    AddressStore, AttachmentPointResolver, LegacyComputeClient, LivenessProbe, NetworkController,
};
use crate::{Error, Result};

/// Address named by an allocate-side call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressRef {
    /// Bare public address
    PublicIp(IpAddr),
    /// Local allocation id
    Allocation(String),
}

impl fmt::Display for AddressRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressRef::PublicIp(ip) => write!(f, "{}", ip),
            AddressRef::Allocation(id) => f.write_str(id),
        }
    }
}

/// Address named by a disassociate call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisassociateRef {
    /// Bare public address
    PublicIp(IpAddr),
    /// Association id
    Association(String),
}

impl fmt::Display for DisassociateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisassociateRef::PublicIp(ip) => write!(f, "{}", ip),
            DisassociateRef::Association(id) => f.write_str(id),
        }
    }
}

/// Where an address should be attached
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentTarget {
    /// Compute instance
    pub instance_id: Option<String>,
    /// Explicit attachment point
    pub network_interface_id: Option<String>,
}

/// Result of an allocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Local record (overlay addresses only)
    pub record: Option<AddressRecord>,
    /// Controller view of the new address
    pub external: ExternalAddressView,
}

/// Allocation and association protocol of one deployment mode
#[async_trait]
pub trait AddressBackend: Send + Sync {
    /// Allocate an address
    async fn allocate(&self, domain: Option<Domain>) -> Result<Allocation>;

    /// Associate an address, returning the association id if there is one
    async fn associate(
        &self,
        address: &AddressRef,
        target: &AttachmentTarget,
        private_ip_address: Option<IpAddr>,
    ) -> Result<Option<String>>;

    /// Disassociate an address, returning the probed status if there is one
    async fn disassociate(&self, address: &DisassociateRef) -> Result<Option<LivenessStatus>>;

    /// Release an address
    async fn release(&self, address: &AddressRef) -> Result<()>;

    /// Every address the controller knows for this owner
    async fn external_addresses(&self) -> Result<Vec<ExternalAddressView>>;

    /// Every port the controller knows for this owner
    async fn external_ports(&self) -> Result<Vec<ExternalPort>>;

    /// Deployment mode served by this backend
    fn kind(&self) -> BackendKind;
}

/// Collaborators a backend is built from
#[derive(Clone)]
pub struct BackendParts {
    /// Overlay controller (required by the overlay backend)
    pub controller: Option<Arc<dyn NetworkController>>,
    /// Legacy compute API
    pub legacy: Arc<dyn LegacyComputeClient>,
    /// Attachment point lookup; defaults to the controller's ports
    pub resolver: Option<Arc<dyn AttachmentPointResolver>>,
    /// Local records
    pub store: Arc<dyn AddressStore>,
    /// Routing liveness
    pub probe: Arc<dyn LivenessProbe>,
}

/// Build the backend for a deployment mode
pub fn create_backend(
    kind: BackendKind,
    parts: &BackendParts,
    service: &ServiceConfig,
    events: EventSink,
) -> Result<Arc<dyn AddressBackend>> {
    let legacy = Arc::new(LegacyBackend::new(Arc::clone(&parts.legacy)));

    match kind {
        BackendKind::Legacy => Ok(legacy as Arc<dyn AddressBackend>),
        BackendKind::Overlay => {
            let controller = parts.controller.clone().ok_or_else(|| {
                Error::config("The overlay backend requires a network controller")
            })?;
            let resolver: Arc<dyn AttachmentPointResolver> = match parts.resolver.clone() {
                Some(resolver) => resolver,
                None => Arc::new(PortAttachmentResolver::new(
                    Arc::clone(&controller),
                    service.project_id.clone(),
                )),
            };
            Ok(Arc::new(OverlayBackend {
                controller,
                legacy,
                resolver,
                store: Arc::clone(&parts.store),
                probe: Arc::clone(&parts.probe),
                events,
                owner: service.project_id.clone(),
                public_network_id: service.public_network_id.clone(),
            }))
        }
    }
}

/// Close a scope, reporting an unwind as an event
pub(crate) async fn settle_scope<T>(
    events: &EventSink,
    cleaner: CrashCleaner,
    outcome: Result<T>,
) -> Result<T> {
    let (result, report) = cleaner.settle_with_report(outcome).await;
    if let Some(report) = report {
        events.emit(AddressEvent::CompensationRan {
            operation: report.operation,
            executed: report.executed,
            failed: report.failed,
        });
    }
    result
}

/// Map a controller quota rejection to the caller-facing error
pub(crate) fn quota_to_limit(err: Error) -> Error {
    match err {
        Error::QuotaExceeded(msg) => {
            tracing::debug!("Controller rejected allocation: {}", msg);
            Error::AddressLimitExceeded
        }
        other => other,
    }
}
