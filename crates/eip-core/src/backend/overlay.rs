//! Overlay network backend
//!
//! Every address is an object in the network controller plus a local record
//! carrying its allocation id, association and last probed status. Each
//! operation interleaves controller calls with record writes inside a
//! [`CrashCleaner`] scope so a failure part way through is rolled back.
//!
//! Before a record is used it is checked against the controller:
//!
//! - the controller object is gone: the record is stale and removed
//! - the controller binding differs from the recorded association: the
//!   association is cleared locally

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::{
    quota_to_limit, settle_scope, AddressBackend, AddressRef, Allocation, AttachmentTarget,
    DisassociateRef, LegacyBackend,
};
use crate::cleanup::CrashCleaner;
use crate::config::BackendKind;
use crate::events::{AddressEvent, DriftRepair, EventSink};
use crate::ids;
use crate::model::{
    AddressRecord, AttachmentPoint, Association, CreateAddressSpec, Domain, ExternalAddressView,
    ExternalPort, LivenessStatus,
};
use crate::records;
use crate::traits::{AddressStore, AttachmentPointResolver, LivenessProbe, NetworkController};
use crate::{Error, Result};

/// Backend over an overlay network controller
pub struct OverlayBackend {
    pub(super) controller: Arc<dyn NetworkController>,
    pub(super) legacy: Arc<LegacyBackend>,
    pub(super) resolver: Arc<dyn AttachmentPointResolver>,
    pub(super) store: Arc<dyn AddressStore>,
    pub(super) probe: Arc<dyn LivenessProbe>,
    pub(super) events: EventSink,
    pub(super) owner: String,
    pub(super) public_network_id: String,
}

impl OverlayBackend {
    /// Controller view of a record's address, `None` if the object is gone
    async fn upstream(&self, record: &AddressRecord) -> Result<Option<ExternalAddressView>> {
        match self.controller.show_address(&record.external_id).await {
            Ok(view) => Ok(Some(view)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Local record for a bare address, if one exists and is still upstream
    async fn owned_record(&self, public_ip: IpAddr) -> Result<Option<AddressRecord>> {
        match self.store.get_by_public_ip(public_ip).await? {
            Some(record) if self.upstream(&record).await?.is_some() => Ok(Some(record)),
            _ => Ok(None),
        }
    }

    /// Drop a record whose controller object no longer exists
    async fn forget_stale(&self, record: &AddressRecord) {
        error!(
            "Address {} ({}) is gone from {}. Removing the local record.",
            record.id,
            record.public_ip,
            self.controller.controller_name()
        );
        match records::hard_delete(self.store.as_ref(), &record.id).await {
            Ok(_) => self.events.emit(AddressEvent::DriftRepaired {
                allocation_id: record.id.clone(),
                external_id: record.external_id.clone(),
                repair: DriftRepair::Deleted,
            }),
            Err(e) => error!("Failed to remove stale record {}: {}", record.id, e),
        }
    }

    /// Clear a recorded association the controller no longer has
    async fn validate_db(
        &self,
        record: &mut AddressRecord,
        view: &ExternalAddressView,
    ) -> Result<()> {
        let diverged = match &record.association {
            Some(association) => !view.matches(association),
            None => false,
        };
        if !diverged {
            return Ok(());
        }

        error!(
            "Address {} is bound to {:?}/{:?} upstream but recorded as {:?}. Disassociating locally.",
            record.id, view.port_id, view.fixed_ip_address, record.association
        );
        let status =
            records::disassociate_item(self.store.as_ref(), self.probe.as_ref(), record).await?;
        self.events.emit(AddressEvent::DriftRepaired {
            allocation_id: record.id.clone(),
            external_id: record.external_id.clone(),
            repair: DriftRepair::Disassociated { status },
        });
        Ok(())
    }

    /// Load a record by allocation id and check it against the controller
    async fn checked_record(&self, allocation_id: &str) -> Result<AddressRecord> {
        let mut record = self
            .store
            .get(allocation_id)
            .await?
            .ok_or_else(|| Error::allocation_not_found(allocation_id))?;

        let Some(view) = self.upstream(&record).await? else {
            self.forget_stale(&record).await;
            return Err(Error::allocation_not_found(allocation_id));
        };

        self.validate_db(&mut record, &view).await?;
        Ok(record)
    }

    /// Resolve the attachment point an association targets
    async fn resolve_target(
        &self,
        target: &AttachmentTarget,
        instance_points: Vec<AttachmentPoint>,
    ) -> Result<AttachmentPoint> {
        if let Some(instance_id) = &target.instance_id {
            let mut points = instance_points;
            return match points.len() {
                0 => Err(Error::invalid_combination(
                    "You must specify an IP address when mapping to a non-VPC instance",
                )),
                1 => Ok(points.remove(0)),
                _ => Err(Error::InvalidInstanceId(instance_id.clone())),
            };
        }

        let network_interface_id = target.network_interface_id.as_deref().ok_or_else(|| {
            Error::missing_parameter("Either instance ID or network interface id must be specified")
        })?;
        self.resolver.get(network_interface_id).await
    }

    async fn unique_allocation_id(&self) -> Result<String> {
        loop {
            let id = ids::new_allocation_id();
            if self.store.get(&id).await?.is_none() {
                return Ok(id);
            }
            debug!("Allocation id {} already taken, drawing another", id);
        }
    }
}

#[async_trait]
impl AddressBackend for OverlayBackend {
    async fn allocate(&self, domain: Option<Domain>) -> Result<Allocation> {
        if domain != Some(Domain::Vpc) {
            return self.legacy.allocate(domain).await;
        }

        let spec = CreateAddressSpec {
            floating_network_id: self.public_network_id.clone(),
            owner: self.owner.clone(),
        };

        let mut cleaner = CrashCleaner::enter("allocate_address");
        let outcome: Result<Allocation> = async {
            let external = self
                .controller
                .create_address(&spec)
                .await
                .map_err(quota_to_limit)?;

            let controller = Arc::clone(&self.controller);
            let external_id = external.external_id.clone();
            cleaner.add_cleanup(
                format!("delete address object {}", external_id),
                async move { controller.delete_address(&external_id).await },
            );

            let id = self.unique_allocation_id().await?;
            let record = AddressRecord::new(id, external.external_id.clone(), external.address);
            self.store.add(&record).await?;

            Ok(Allocation {
                record: Some(record),
                external,
            })
        }
        .await;

        let allocation = settle_scope(&self.events, cleaner, outcome).await?;
        if let Some(record) = &allocation.record {
            info!("Allocated {} ({})", record.id, record.public_ip);
        }
        Ok(allocation)
    }

    async fn associate(
        &self,
        address: &AddressRef,
        target: &AttachmentTarget,
        private_ip_address: Option<IpAddr>,
    ) -> Result<Option<String>> {
        let instance_points = match &target.instance_id {
            Some(instance_id) => self.resolver.for_instance(instance_id).await?,
            None => Vec::new(),
        };

        let allocation_id = match address {
            AddressRef::PublicIp(public_ip) => {
                if !instance_points.is_empty() {
                    return Err(Error::invalid_combination(
                        "You must specify an allocation id when mapping an address to a VPC instance",
                    ));
                }
                if self.owned_record(*public_ip).await?.is_some() {
                    return Err(Error::AddressNotOwned(public_ip.to_string()));
                }
                return self
                    .legacy
                    .associate(address, target, private_ip_address)
                    .await;
            }
            AddressRef::Allocation(id) => id.as_str(),
        };

        let point = self.resolve_target(target, instance_points).await?;
        let private_ip_address = private_ip_address.unwrap_or(point.private_ip_address);
        let mut record = self.checked_record(allocation_id).await?;

        match record.network_interface_id() {
            Some(current) if current == point.id => {
                debug!("{} already associated with {}", record.id, point.id);
                return Ok(Some(record.association_id()));
            }
            Some(_) => {
                return Err(Error::already_associated(format!(
                    "resource {} is already associated with associate-id {}",
                    allocation_id,
                    record.association_id()
                )));
            }
            None => {}
        }

        if record.status.is_some()
            && self.probe.probe(record.public_ip).await? == LivenessStatus::Active
        {
            return Err(Error::still_disassociating(format!(
                "address {} is still disassociating. Retry in a few seconds",
                record.association_id()
            )));
        }

        let mut cleaner = CrashCleaner::enter("associate_address");
        let outcome: Result<()> = async {
            let association = Association {
                network_interface_id: point.id.clone(),
                private_ip_address,
            };
            records::associate_item(self.store.as_ref(), &mut record, association).await?;
            cleaner.add_cleanup(
                format!("clear association of {}", record.id),
                records::undo_association(
                    Arc::clone(&self.store),
                    Arc::clone(&self.probe),
                    record.clone(),
                ),
            );

            self.controller
                .bind_address(
                    &record.external_id,
                    &point.external_port_id,
                    private_ip_address,
                )
                .await
        }
        .await;

        settle_scope(&self.events, cleaner, outcome).await?;
        info!(
            "Associated {} with {} ({})",
            record.id, point.id, private_ip_address
        );
        Ok(Some(record.association_id()))
    }

    async fn disassociate(&self, address: &DisassociateRef) -> Result<Option<LivenessStatus>> {
        let association_id = match address {
            DisassociateRef::PublicIp(public_ip) => {
                if self.owned_record(*public_ip).await?.is_some() {
                    return Err(Error::invalid_value(
                        "You must specify an association id when unmapping an address from a VPC instance",
                    ));
                }
                return self.legacy.disassociate(address).await;
            }
            DisassociateRef::Association(id) => id.as_str(),
        };

        let allocation_id = ids::allocation_id(association_id);
        let mut record = match self.store.get(&allocation_id).await? {
            Some(record) => record,
            None => return Err(Error::association_not_found(association_id)),
        };
        if self.upstream(&record).await?.is_none() {
            return Err(Error::association_not_found(association_id));
        }

        if !record.is_associated() {
            debug!("{} is not associated, nothing to do", record.id);
            return Ok(None);
        }

        let mut cleaner = CrashCleaner::enter("disassociate_address");
        let outcome: Result<LivenessStatus> = async {
            let snapshot = record.clone();
            let status =
                records::disassociate_item(self.store.as_ref(), self.probe.as_ref(), &mut record)
                    .await?;
            cleaner.add_cleanup(
                format!("restore association of {}", record.id),
                records::restore_snapshot(Arc::clone(&self.store), snapshot),
            );

            self.controller.unbind_address(&record.external_id).await?;
            Ok(status)
        }
        .await;

        let status = settle_scope(&self.events, cleaner, outcome).await?;
        info!("Disassociated {} (status {})", record.id, status);
        Ok(Some(status))
    }

    async fn release(&self, address: &AddressRef) -> Result<()> {
        let allocation_id = match address {
            AddressRef::PublicIp(public_ip) => {
                if self.owned_record(*public_ip).await?.is_some() {
                    return Err(Error::invalid_value(
                        "You must specify an allocation id when releasing a VPC elastic IP address",
                    ));
                }
                return self.legacy.release(address).await;
            }
            AddressRef::Allocation(id) => id.as_str(),
        };

        let record = self.checked_record(allocation_id).await?;
        if record.is_associated() {
            return Err(Error::InvalidIpAddressInUse(record.public_ip.to_string()));
        }

        let mut cleaner = CrashCleaner::enter("release_address");
        let outcome: Result<()> = async {
            let deleted = self.store.delete(&record.id).await?;
            let store = Arc::clone(&self.store);
            cleaner.add_cleanup(format!("restore record {}", record.id), async move {
                store.restore(&deleted).await
            });

            match self.controller.delete_address(&record.external_id).await {
                Err(e) if e.is_not_found() => {
                    debug!("Address object {} already gone", record.external_id);
                    Ok(())
                }
                other => other,
            }
        }
        .await;

        settle_scope(&self.events, cleaner, outcome).await?;

        // The controller object is gone; a leftover tombstone is harmless
        if let Err(e) = self.store.purge(&record.id).await {
            warn!("Failed to purge released record {}: {}", record.id, e);
        }
        info!("Released {} ({})", record.id, record.public_ip);
        Ok(())
    }

    async fn external_addresses(&self) -> Result<Vec<ExternalAddressView>> {
        self.controller.list_addresses(&self.owner).await
    }

    async fn external_ports(&self) -> Result<Vec<ExternalPort>> {
        self.controller.list_ports(&self.owner).await
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Overlay
    }
}
