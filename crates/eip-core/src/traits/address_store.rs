// # Address Store Trait
//
// Defines the interface for local address records.
//
// ## Purpose
//
// The store keeps one record per overlay address, keyed by allocation id,
// with secondary lookups by controller id and by public address. Deletion is
// soft: a deleted record is kept aside so a failed release can put it back,
// and is only dropped for good by `purge` once the controller object is gone.
//
// ## Consistency
//
// Every write replaces a whole record atomically. Records are validated
// before they are persisted.
//
// ## Implementations
//
// - In-memory: `MemoryAddressStore`
// - JSON file: `FileAddressStore`

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::model::AddressRecord;

/// Trait for address store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait AddressStore: Send + Sync {
    /// Insert a new record
    ///
    /// Fails if a live record with the same id exists.
    async fn add(&self, record: &AddressRecord) -> Result<(), crate::Error>;

    /// Replace an existing record as a whole
    ///
    /// Must be called after any field mutation. Fails with
    /// `Error::NotFound` if the record does not exist.
    async fn update(&self, record: &AddressRecord) -> Result<(), crate::Error>;

    /// Soft-delete a record
    ///
    /// # Returns
    ///
    /// - `Ok(AddressRecord)`: the record as it was before deletion
    /// - `Err(Error::NotFound)`: no live record with this id
    async fn delete(&self, id: &str) -> Result<AddressRecord, crate::Error>;

    /// Put a record back, undoing a soft delete
    async fn restore(&self, record: &AddressRecord) -> Result<(), crate::Error>;

    /// Drop a soft-deleted record for good
    ///
    /// Purging an id that is not soft-deleted is a no-op.
    async fn purge(&self, id: &str) -> Result<(), crate::Error>;

    /// Get a live record by allocation id
    async fn get(&self, id: &str) -> Result<Option<AddressRecord>, crate::Error>;

    /// Get a live record by controller id
    async fn get_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<AddressRecord>, crate::Error>;

    /// Get a live record by public address
    async fn get_by_public_ip(&self, public_ip: IpAddr)
    -> Result<Option<AddressRecord>, crate::Error>;

    /// List all live records
    async fn list(&self) -> Result<Vec<AddressRecord>, crate::Error>;

    /// Persist any pending changes
    async fn flush(&self) -> Result<(), crate::Error>;
}

/// Helper trait for constructing address stores from configuration
#[async_trait]
pub trait AddressStoreFactory: Send + Sync {
    /// Create an AddressStore instance from configuration
    async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn AddressStore>, crate::Error>;
}
