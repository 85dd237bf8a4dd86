//! Address service
//!
//! Entry points for the four provisioning operations and describe. Every
//! call checks its arguments before touching the store or the controller,
//! then hands off to the configured backend.
//!
//! ## Architecture
//!
//! ```text
//!            ┌────────────────┐
//! caller ──▶ │ AddressService │── AddressEvent ──▶ mpsc receiver
//!            └────────────────┘
//!              │            │
//!              ▼            ▼
//!     ┌────────────────┐  ┌────────────┐
//!     │ AddressBackend │  │ Reconciler │  (describe)
//!     └────────────────┘  └────────────┘
//!        │     │     │        │     │
//!        ▼     ▼     ▼        ▼     ▼
//!  controller store probe   store probe
//! ```

pub mod format;

pub use format::format_address;

use serde::Serialize;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::backend::{
    create_backend, AddressBackend, AddressRef, AttachmentTarget, BackendParts, DisassociateRef,
};
use crate::config::{BackendKind, EipConfig};
use crate::events::{AddressEvent, EventSink};
use crate::model::{AddressDescription, AddressRecord, Domain, LivenessStatus};
use crate::reconcile::Reconciler;
use crate::traits::AddressStore;
use crate::{Error, Result};

/// Arguments of an associate call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociateRequest {
    pub public_ip: Option<IpAddr>,
    pub allocation_id: Option<String>,
    pub instance_id: Option<String>,
    pub network_interface_id: Option<String>,
    pub private_ip_address: Option<IpAddr>,
}

/// Arguments of a disassociate call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisassociateRequest {
    pub public_ip: Option<IpAddr>,
    pub association_id: Option<String>,
}

/// Arguments of a release call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReleaseRequest {
    pub public_ip: Option<IpAddr>,
    pub allocation_id: Option<String>,
}

/// Describe filters; empty lists select everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescribeRequest {
    pub allocation_ids: Vec<String>,
    pub public_ips: Vec<IpAddr>,
}

/// Result of an associate call
///
/// Both fields are absent for standard addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociateOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub association_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LivenessStatus>,
}

/// Elastic address service
pub struct AddressService {
    backend: Arc<dyn AddressBackend>,
    store: Arc<dyn AddressStore>,
    reconciler: Reconciler,
    events: EventSink,
    owner: String,
}

impl AddressService {
    /// Create a service
    ///
    /// # Returns
    ///
    /// A tuple of (service, event_receiver)
    pub fn new(
        parts: BackendParts,
        config: &EipConfig,
    ) -> Result<(Self, mpsc::Receiver<AddressEvent>)> {
        config.validate()?;

        let (events, rx) = EventSink::channel(config.service.event_channel_capacity);
        let backend = create_backend(config.backend, &parts, &config.service, events.clone())?;
        let reconciler = Reconciler::new(
            Arc::clone(&parts.store),
            Arc::clone(&parts.probe),
            events.clone(),
        );

        info!(
            "Address service ready: backend={}, probe={}",
            config.backend.as_str(),
            parts.probe.probe_name()
        );

        let service = Self {
            backend,
            store: parts.store,
            reconciler,
            events,
            owner: config.service.project_id.clone(),
        };
        Ok((service, rx))
    }

    /// Deployment mode in use
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Allocate an address
    ///
    /// `domain` must be `vpc` or absent; absent allocates a standard address.
    pub async fn allocate_address(&self, domain: Option<&str>) -> Result<AddressDescription> {
        let domain = match domain.map(str::parse::<Domain>).transpose()? {
            Some(Domain::Standard) => {
                return Err(Error::invalid_value(
                    "Invalid value 'standard' for domain.",
                ));
            }
            other => other,
        };

        let allocation = self.backend.allocate(domain).await?;
        self.events.emit(AddressEvent::Allocated {
            allocation_id: allocation.record.as_ref().map(|r| r.id.clone()),
            public_ip: allocation.external.address,
        });
        Ok(format_address(
            allocation.record.as_ref(),
            &allocation.external,
            &[],
            &self.owner,
        ))
    }

    /// Associate an address with an instance or network interface
    pub async fn associate_address(&self, request: &AssociateRequest) -> Result<AssociateOutcome> {
        let address = match (&request.public_ip, &request.allocation_id) {
            (None, None) => {
                return Err(Error::missing_parameter(
                    "Either public IP or allocation id must be specified",
                ));
            }
            (Some(_), Some(_)) => {
                return Err(Error::invalid_combination(
                    "You may specify public IP or allocation id, but not both in the same call",
                ));
            }
            (Some(ip), None) => AddressRef::PublicIp(*ip),
            (None, Some(id)) => AddressRef::Allocation(id.clone()),
        };
        if request.instance_id.is_none() && request.network_interface_id.is_none() {
            return Err(Error::missing_parameter(
                "Either instance ID or network interface id must be specified",
            ));
        }

        let target = AttachmentTarget {
            instance_id: request.instance_id.clone(),
            network_interface_id: request.network_interface_id.clone(),
        };
        let association_id = self
            .backend
            .associate(&address, &target, request.private_ip_address)
            .await?;

        self.events.emit(AddressEvent::Associated {
            association_id: association_id.clone(),
            public_ip: request.public_ip,
        });
        let status = association_id.as_ref().map(|_| LivenessStatus::Pending);
        Ok(AssociateOutcome {
            association_id,
            status,
        })
    }

    /// Disassociate an address
    ///
    /// Returns the probed status for overlay addresses.
    pub async fn disassociate_address(
        &self,
        request: &DisassociateRequest,
    ) -> Result<Option<LivenessStatus>> {
        let address = match (&request.public_ip, &request.association_id) {
            (None, None) => {
                return Err(Error::missing_parameter(
                    "Either public IP or association id must be specified",
                ));
            }
            (Some(_), Some(_)) => {
                return Err(Error::invalid_combination(
                    "You may specify public IP or association id, but not both in the same call",
                ));
            }
            (Some(ip), None) => DisassociateRef::PublicIp(*ip),
            (None, Some(id)) => DisassociateRef::Association(id.clone()),
        };

        let status = self.backend.disassociate(&address).await?;
        self.events.emit(AddressEvent::Disassociated {
            association_id: request.association_id.clone(),
            status,
        });
        Ok(status)
    }

    /// Release an address
    pub async fn release_address(&self, request: &ReleaseRequest) -> Result<()> {
        let address = match (&request.public_ip, &request.allocation_id) {
            (None, None) => {
                return Err(Error::missing_parameter(
                    "Either public IP or allocation id must be specified",
                ));
            }
            (Some(_), Some(_)) => {
                return Err(Error::invalid_combination(
                    "You may specify public IP or allocation id, but not both in the same call",
                ));
            }
            (Some(ip), None) => AddressRef::PublicIp(*ip),
            (None, Some(id)) => AddressRef::Allocation(id.clone()),
        };

        self.backend.release(&address).await?;
        self.events.emit(AddressEvent::Released {
            allocation_id: request.allocation_id.clone(),
            public_ip: request.public_ip,
        });
        Ok(())
    }

    /// Describe addresses, reconciling the selected records on the way
    pub async fn describe_addresses(
        &self,
        request: &DescribeRequest,
    ) -> Result<Vec<AddressDescription>> {
        let views = self.backend.external_addresses().await?;
        let ports = self.backend.external_ports().await?;
        let records = self.store.list().await?;

        let selected: Vec<AddressRecord> = records
            .into_iter()
            .filter(|r| {
                request.allocation_ids.is_empty() || request.allocation_ids.contains(&r.id)
            })
            .filter(|r| request.public_ips.is_empty() || request.public_ips.contains(&r.public_ip))
            .collect();

        if let Some(missing) = request
            .public_ips
            .iter()
            .find(|ip| !views.iter().any(|v| v.address == **ip))
        {
            return Err(Error::not_found(format!("Address '{}'", missing)));
        }

        let reconciled = self.reconciler.sweep(selected, &views).await;
        let by_external_id: HashMap<&str, &AddressRecord> = reconciled
            .iter()
            .map(|r| (r.external_id.as_str(), r))
            .collect();

        let descriptions: Vec<AddressDescription> = views
            .iter()
            .filter(|v| request.public_ips.is_empty() || request.public_ips.contains(&v.address))
            .filter_map(|view| match by_external_id.get(view.external_id.as_str()) {
                Some(record) => Some(format_address(Some(*record), view, &ports, &self.owner)),
                None if request.allocation_ids.is_empty() => {
                    Some(format_address(None, view, &ports, &self.owner))
                }
                None => None,
            })
            .collect();

        // Records removed or left without an upstream object are not described
        if let Some(missing) = request.allocation_ids.iter().find(|id| {
            !descriptions
                .iter()
                .any(|d| d.allocation_id.as_deref() == Some(id.as_str()))
        }) {
            return Err(Error::allocation_not_found(missing.clone()));
        }

        debug!(
            "Described {} addresses ({} local records)",
            descriptions.len(),
            reconciled.len()
        );
        Ok(descriptions)
    }

    /// Flush the address store (call before shutdown)
    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await
    }
}
