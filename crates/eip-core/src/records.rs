//! Record mutations shared by provisioning and reconciliation
//!
//! Each helper mutates the caller's copy of the record and persists the
//! whole document in one write, so the in-memory value and the store never
//! disagree after a successful call.

use std::sync::Arc;

use tracing::debug;

use crate::model::{AddressRecord, Association, LivenessStatus};
use crate::traits::{AddressStore, LivenessProbe};
use crate::Result;

/// Record an association, marking the address as not yet routed
pub async fn associate_item(
    store: &dyn AddressStore,
    record: &mut AddressRecord,
    association: Association,
) -> Result<()> {
    debug!(
        "Associating {} with {} ({})",
        record.id, association.network_interface_id, association.private_ip_address
    );
    record.association = Some(association);
    record.status = Some(LivenessStatus::Pending);
    store.update(record).await
}

/// Clear the association and store a fresh probe result
///
/// Returns the probed status. The probe runs after the fields are cleared
/// and before anything is written.
pub async fn disassociate_item(
    store: &dyn AddressStore,
    probe: &dyn LivenessProbe,
    record: &mut AddressRecord,
) -> Result<LivenessStatus> {
    debug!("Disassociating {}", record.id);
    record.association = None;
    let status = probe.probe(record.public_ip).await?;
    record.status = Some(status);
    store.update(record).await?;
    Ok(status)
}

/// Overwrite the stored status
pub async fn update_status(
    store: &dyn AddressStore,
    record: &mut AddressRecord,
    status: LivenessStatus,
) -> Result<()> {
    record.status = Some(status);
    store.update(record).await
}

/// Drop the stored status
pub async fn pop_status(store: &dyn AddressStore, record: &mut AddressRecord) -> Result<()> {
    record.status = None;
    store.update(record).await
}

/// Remove a record for good, bypassing the restorable state
pub async fn hard_delete(store: &dyn AddressStore, id: &str) -> Result<AddressRecord> {
    let record = store.delete(id).await?;
    store.purge(id).await?;
    Ok(record)
}

/// Write back a record exactly as it was captured, usable as a compensation
pub async fn restore_snapshot(store: Arc<dyn AddressStore>, snapshot: AddressRecord) -> Result<()> {
    debug!("Restoring {} to its previous state", snapshot.id);
    store.update(&snapshot).await
}

/// Owned form of [`disassociate_item`], usable as a compensation
pub async fn undo_association(
    store: Arc<dyn AddressStore>,
    probe: Arc<dyn LivenessProbe>,
    mut record: AddressRecord,
) -> Result<()> {
    disassociate_item(store.as_ref(), probe.as_ref(), &mut record)
        .await
        .map(|_| ())
}
