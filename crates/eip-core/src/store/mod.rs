// # Address Store Implementations
//
// This module provides implementations of the AddressStore trait for
// different persistence strategies. Both keep the same in-memory table of
// live records plus soft-deleted ones; they differ in whether the table is
// written to disk.

pub mod file;
pub mod memory;

pub use file::{FileAddressStore, FileAddressStoreFactory};
pub use memory::{MemoryAddressStore, MemoryAddressStoreFactory};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

use crate::model::AddressRecord;
use crate::{Error, Result};

/// Live and soft-deleted records, keyed by allocation id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct RecordTable {
    records: HashMap<String, AddressRecord>,
    #[serde(default)]
    deleted: HashMap<String, AddressRecord>,
}

impl RecordTable {
    pub(crate) fn add(&mut self, record: &AddressRecord) -> Result<()> {
        record.validate()?;
        if self.records.contains_key(&record.id) {
            return Err(Error::store(format!("Record {} already exists", record.id)));
        }
        self.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    pub(crate) fn update(&mut self, record: &AddressRecord) -> Result<()> {
        record.validate()?;
        match self.records.get_mut(&record.id) {
            Some(slot) => {
                *slot = record.clone();
                Ok(())
            }
            None => Err(Error::not_found(format!("Record {}", record.id))),
        }
    }

    pub(crate) fn delete(&mut self, id: &str) -> Result<AddressRecord> {
        let record = self
            .records
            .remove(id)
            .ok_or_else(|| Error::not_found(format!("Record {}", id)))?;
        self.deleted.insert(id.to_string(), record.clone());
        Ok(record)
    }

    pub(crate) fn restore(&mut self, record: &AddressRecord) -> Result<()> {
        record.validate()?;
        self.deleted.remove(&record.id);
        self.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    pub(crate) fn purge(&mut self, id: &str) {
        self.deleted.remove(id);
    }

    pub(crate) fn get(&self, id: &str) -> Option<AddressRecord> {
        self.records.get(id).cloned()
    }

    pub(crate) fn find(&self, pred: impl Fn(&AddressRecord) -> bool) -> Option<AddressRecord> {
        self.records.values().find(|r| pred(r)).cloned()
    }

    pub(crate) fn by_external_id(&self, external_id: &str) -> Option<AddressRecord> {
        self.find(|r| r.external_id == external_id)
    }

    pub(crate) fn by_public_ip(&self, public_ip: IpAddr) -> Option<AddressRecord> {
        self.find(|r| r.public_ip == public_ip)
    }

    /// Live records ordered by id
    pub(crate) fn list(&self) -> Vec<AddressRecord> {
        let mut records: Vec<_> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn tombstones(&self) -> usize {
        self.deleted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, ext: &str, ip: &str) -> AddressRecord {
        AddressRecord::new(id, ext, ip.parse().unwrap())
    }

    #[test]
    fn test_soft_delete_and_restore() {
        let mut table = RecordTable::default();
        let item = record("eipalloc-00000001", "fip-1", "203.0.113.1");
        table.add(&item).unwrap();

        let deleted = table.delete(&item.id).unwrap();
        assert_eq!(deleted, item);
        assert!(table.get(&item.id).is_none());
        assert_eq!(table.tombstones(), 1);

        table.restore(&deleted).unwrap();
        assert_eq!(table.get(&item.id), Some(item));
        assert_eq!(table.tombstones(), 0);
    }

    #[test]
    fn test_duplicate_add_rejected() {
        let mut table = RecordTable::default();
        let item = record("eipalloc-00000001", "fip-1", "203.0.113.1");
        table.add(&item).unwrap();
        assert!(matches!(table.add(&item), Err(Error::Store(_))));
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let mut table = RecordTable::default();
        let item = record("eipalloc-00000001", "fip-1", "203.0.113.1");
        assert!(table.update(&item).unwrap_err().is_not_found());
        assert!(table.delete(&item.id).unwrap_err().is_not_found());
    }

    #[test]
    fn test_secondary_lookups() {
        let mut table = RecordTable::default();
        table
            .add(&record("eipalloc-00000002", "fip-2", "203.0.113.2"))
            .unwrap();
        table
            .add(&record("eipalloc-00000001", "fip-1", "203.0.113.1"))
            .unwrap();

        assert_eq!(
            table.by_external_id("fip-2").map(|r| r.id),
            Some("eipalloc-00000002".to_string())
        );
        assert_eq!(
            table
                .by_public_ip("203.0.113.1".parse().unwrap())
                .map(|r| r.id),
            Some("eipalloc-00000001".to_string())
        );
        let ids: Vec<_> = table.list().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["eipalloc-00000001", "eipalloc-00000002"]);
    }
}
