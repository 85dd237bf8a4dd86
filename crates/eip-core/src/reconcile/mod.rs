//! Drift reconciliation
//!
//! Runs on every describe. Each local record is joined with the controller
//! view sharing its external id and repaired in place:
//!
//! ```text
//!   controller object       record                      action
//!   -----------------       ------                      ------
//!   gone                    associated                  clear association, probe, persist
//!   gone                    not associated              remove record
//!   binding differs         associated                  clear association, probe, persist
//!   matches                 associated, pending         probe; active is persisted
//!   matches                 associated, no status       probe; result persisted
//!   matches                 not associated, pending     drop status
//!   matches                 not associated, active      probe; pending drops status
//! ```
//!
//! A record repaired for drift skips the status rules until the next sweep.
//! Failures (probe or store) are logged and leave the record as it was; a
//! sweep never fails because of one record.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::events::{AddressEvent, DriftRepair, EventSink};
use crate::model::{AddressRecord, ExternalAddressView, LivenessStatus, RecordShape};
use crate::records;
use crate::traits::{AddressStore, LivenessProbe};
use crate::Result;

/// Repairs local records against controller state
pub struct Reconciler {
    store: Arc<dyn AddressStore>,
    probe: Arc<dyn LivenessProbe>,
    events: EventSink,
}

impl Reconciler {
    /// Create a reconciler
    pub fn new(store: Arc<dyn AddressStore>, probe: Arc<dyn LivenessProbe>, events: EventSink) -> Self {
        Self {
            store,
            probe,
            events,
        }
    }

    /// Reconcile a batch of records against the controller's full view
    ///
    /// Returns the records that still exist, in input order.
    pub async fn sweep(
        &self,
        records: Vec<AddressRecord>,
        views: &[ExternalAddressView],
    ) -> Vec<AddressRecord> {
        let by_external_id: HashMap<&str, &ExternalAddressView> =
            views.iter().map(|v| (v.external_id.as_str(), v)).collect();

        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            let view = by_external_id.get(record.external_id.as_str()).copied();
            if let Some(record) = self.reconcile(record, view).await {
                kept.push(record);
            }
        }
        kept
    }

    /// Reconcile one record
    ///
    /// Returns `None` if the record was removed.
    pub async fn reconcile(
        &self,
        record: AddressRecord,
        view: Option<&ExternalAddressView>,
    ) -> Option<AddressRecord> {
        let original = record.clone();
        match self.repair(record, view).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Reconciliation of {} failed: {}", original.id, e);
                Some(original)
            }
        }
    }

    async fn repair(
        &self,
        mut record: AddressRecord,
        view: Option<&ExternalAddressView>,
    ) -> Result<Option<AddressRecord>> {
        let Some(view) = view else {
            if record.is_associated() {
                error!(
                    "Address {} ({}) is gone upstream while associated as {:?}. Disassociating locally.",
                    record.id, record.public_ip, record.association
                );
                self.disassociate(&mut record).await?;
                return Ok(Some(record));
            }

            error!(
                "Address {} ({}) is gone upstream. Removing the local record.",
                record.id, record.public_ip
            );
            records::hard_delete(self.store.as_ref(), &record.id).await?;
            self.events.emit(AddressEvent::DriftRepaired {
                allocation_id: record.id.clone(),
                external_id: record.external_id.clone(),
                repair: DriftRepair::Deleted,
            });
            return Ok(None);
        };

        let diverged = match &record.association {
            Some(association) => !view.matches(association),
            None => false,
        };
        if diverged {
            error!(
                "Address {} is bound to {:?}/{:?} upstream but recorded as {:?}. Disassociating locally.",
                record.id, view.port_id, view.fixed_ip_address, record.association
            );
            self.disassociate(&mut record).await?;
            return Ok(Some(record));
        }

        let previous = record.status;
        let store = self.store.as_ref();
        match record.shape() {
            RecordShape::Associated(Some(LivenessStatus::Pending)) => {
                if self.probe.probe(record.public_ip).await? == LivenessStatus::Active {
                    records::update_status(store, &mut record, LivenessStatus::Active).await?;
                }
            }
            RecordShape::Associated(None) => {
                let status = self.probe.probe(record.public_ip).await?;
                records::update_status(store, &mut record, status).await?;
            }
            RecordShape::Draining(LivenessStatus::Pending) => {
                records::pop_status(store, &mut record).await?;
            }
            RecordShape::Draining(LivenessStatus::Active) => {
                if self.probe.probe(record.public_ip).await? == LivenessStatus::Pending {
                    records::pop_status(store, &mut record).await?;
                }
            }
            RecordShape::Associated(Some(LivenessStatus::Active)) | RecordShape::Idle => {
                debug!("{} is settled", record.id);
            }
        }

        if record.status != previous {
            info!(
                "Status of {} changed: {:?} -> {:?}",
                record.id, previous, record.status
            );
            self.events.emit(AddressEvent::StatusChanged {
                allocation_id: record.id.clone(),
                previous,
                current: record.status,
            });
        }
        Ok(Some(record))
    }

    async fn disassociate(&self, record: &mut AddressRecord) -> Result<()> {
        let status =
            records::disassociate_item(self.store.as_ref(), self.probe.as_ref(), record).await?;
        self.events.emit(AddressEvent::DriftRepaired {
            allocation_id: record.id.clone(),
            external_id: record.external_id.clone(),
            repair: DriftRepair::Disassociated { status },
        });
        Ok(())
    }
}
