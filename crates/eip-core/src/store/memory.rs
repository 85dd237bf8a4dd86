// # Memory Address Store
//
// In-memory implementation of AddressStore.
//
// ## Crash Behavior
//
// - All records are lost on restart
// - The next describe lists every controller address as `standard` since no
//   local record claims it
//
// ## When to Use
//
// - Tests
// - Single-process deployments where records can be rebuilt by hand

use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::RecordTable;
use crate::config::StoreConfig;
use crate::model::AddressRecord;
use crate::traits::{AddressStore, AddressStoreFactory};
use crate::Error;

/// In-memory address store
#[derive(Debug, Clone, Default)]
pub struct MemoryAddressStore {
    inner: Arc<RwLock<RecordTable>>,
}

impl MemoryAddressStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether the store holds no live record
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of soft-deleted records awaiting purge
    pub async fn tombstones(&self) -> usize {
        self.inner.read().await.tombstones()
    }
}

#[async_trait]
impl AddressStore for MemoryAddressStore {
    async fn add(&self, record: &AddressRecord) -> Result<(), Error> {
        self.inner.write().await.add(record)
    }

    async fn update(&self, record: &AddressRecord) -> Result<(), Error> {
        self.inner.write().await.update(record)
    }

    async fn delete(&self, id: &str) -> Result<AddressRecord, Error> {
        self.inner.write().await.delete(id)
    }

    async fn restore(&self, record: &AddressRecord) -> Result<(), Error> {
        self.inner.write().await.restore(record)
    }

    async fn purge(&self, id: &str) -> Result<(), Error> {
        self.inner.write().await.purge(id);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<AddressRecord>, Error> {
        Ok(self.inner.read().await.get(id))
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<AddressRecord>, Error> {
        Ok(self.inner.read().await.by_external_id(external_id))
    }

    async fn get_by_public_ip(&self, public_ip: IpAddr) -> Result<Option<AddressRecord>, Error> {
        Ok(self.inner.read().await.by_public_ip(public_ip))
    }

    async fn list(&self) -> Result<Vec<AddressRecord>, Error> {
        Ok(self.inner.read().await.list())
    }

    async fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Factory for [`MemoryAddressStore`]
pub struct MemoryAddressStoreFactory;

#[async_trait]
impl AddressStoreFactory for MemoryAddressStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn AddressStore>, Error> {
        match config {
            StoreConfig::Memory => Ok(Arc::new(MemoryAddressStore::new())),
            other => Err(Error::config(format!(
                "Memory store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}
