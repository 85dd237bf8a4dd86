// # File Address Store
//
// File-based implementation of AddressStore with crash recovery.
//
// ## Crash Recovery
//
// - Atomic writes: every mutation is applied to a copy of the table, written
//   to a temporary file and renamed into place before it becomes visible
// - Corruption detection: documents are parsed and validated on load
// - Automatic backup: keeps a `.backup` of the previous file
// - Recovery: falls back to the backup if the main file is corrupted
//
// Soft-deleted records are persisted too, so a release interrupted between
// the local delete and the controller call can still be restored after a
// restart.
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "records": {
//     "eipalloc-1a2b3c4d": {
//       "id": "eipalloc-1a2b3c4d",
//       "external_id": "6f1c...",
//       "public_ip": "203.0.113.7",
//       "network_interface_id": "eni-0f0e0d0c",
//       "private_ip_address": "10.0.0.5",
//       "status": "pending",
//       "allocated_at": "2025-01-09T12:00:00Z"
//     }
//   },
//   "deleted": {}
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::RecordTable;
use crate::config::StoreConfig;
use crate::model::AddressRecord;
use crate::traits::{AddressStore, AddressStoreFactory};
use crate::{Error, Result};

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

/// File-based address store with crash recovery
///
/// # Example
///
/// ```rust,no_run
/// use eip_core::store::FileAddressStore;
/// use eip_core::model::AddressRecord;
/// use eip_core::traits::AddressStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileAddressStore::new("/var/lib/eip/addresses.json").await?;
///     let record = AddressRecord::new("eipalloc-1a2b3c4d", "fip-1", "203.0.113.7".parse()?);
///     store.add(&record).await?;
///     assert!(store.get("eipalloc-1a2b3c4d").await?.is_some());
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileAddressStore {
    path: PathBuf,
    table: RwLock<RecordTable>,
}

/// Serializable store file format
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    #[serde(flatten)]
    table: RecordTable,
}

impl FileAddressStore {
    /// Create or load a file store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Load the existing file
    /// 3. If it is corrupted, load the backup instead
    /// 4. If both fail, start empty
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let table = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            table: RwLock::new(table),
        })
    }

    async fn load_with_recovery(path: &Path) -> Result<RecordTable> {
        let err = match Self::load(path).await {
            Ok(table) => {
                tracing::debug!("Loaded address store: {} records", table.len());
                return Ok(table);
            }
            Err(Error::Json(e)) => e,
            Err(e) => return Err(e),
        };

        tracing::warn!(
            "Address store {} appears corrupted: {}. Attempting recovery from backup.",
            path.display(),
            err
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with an empty store.");
            return Ok(RecordTable::default());
        }

        match Self::load(&backup_path).await {
            Ok(table) => {
                tracing::info!("Recovered address store from backup: {} records", table.len());
                if let Err(e) = fs::copy(&backup_path, path).await {
                    tracing::error!("Failed to restore store file from backup: {}", e);
                }
                Ok(table)
            }
            Err(backup_err) => {
                tracing::error!(
                    "Backup also unreadable: {}. Starting with an empty store.",
                    backup_err
                );
                Ok(RecordTable::default())
            }
        }
    }

    async fn load(path: &Path) -> Result<RecordTable> {
        if !path.exists() {
            tracing::debug!("Store file does not exist: {}", path.display());
            return Ok(RecordTable::default());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::store(format!("Failed to read store file {}: {}", path.display(), e))
        })?;

        let file: StoreFileFormat = serde_json::from_str(&content)?;
        if file.version != STORE_FILE_VERSION {
            tracing::warn!(
                "Store file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION,
                file.version
            );
        }

        Ok(file.table)
    }

    async fn write(&self, table: &RecordTable) -> Result<()> {
        let json = serde_json::to_string_pretty(&StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            table: table.clone(),
        })?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            file.write_all(json.as_bytes()).await?;
            file.flush().await?;
        }

        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, Self::backup_path(&self.path)).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Address store written: {}", self.path.display());
        Ok(())
    }

    /// Apply a mutation, persisting it before it becomes visible
    async fn mutate<T>(&self, op: impl FnOnce(&mut RecordTable) -> Result<T>) -> Result<T> {
        let mut guard = self.table.write().await;
        let mut next = guard.clone();
        let out = op(&mut next)?;
        self.write(&next).await?;
        *guard = next;
        Ok(out)
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }
}

#[async_trait]
impl AddressStore for FileAddressStore {
    async fn add(&self, record: &AddressRecord) -> Result<()> {
        self.mutate(|table| table.add(record)).await
    }

    async fn update(&self, record: &AddressRecord) -> Result<()> {
        self.mutate(|table| table.update(record)).await
    }

    async fn delete(&self, id: &str) -> Result<AddressRecord> {
        self.mutate(|table| table.delete(id)).await
    }

    async fn restore(&self, record: &AddressRecord) -> Result<()> {
        self.mutate(|table| table.restore(record)).await
    }

    async fn purge(&self, id: &str) -> Result<()> {
        if self.table.read().await.tombstones() == 0 {
            return Ok(());
        }
        self.mutate(|table| {
            table.purge(id);
            Ok(())
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<AddressRecord>> {
        Ok(self.table.read().await.get(id))
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<AddressRecord>> {
        Ok(self.table.read().await.by_external_id(external_id))
    }

    async fn get_by_public_ip(&self, public_ip: IpAddr) -> Result<Option<AddressRecord>> {
        Ok(self.table.read().await.by_public_ip(public_ip))
    }

    async fn list(&self) -> Result<Vec<AddressRecord>> {
        Ok(self.table.read().await.list())
    }

    async fn flush(&self) -> Result<()> {
        let guard = self.table.read().await;
        self.write(&guard).await
    }
}

/// Factory for [`FileAddressStore`]
pub struct FileAddressStoreFactory;

#[async_trait]
impl AddressStoreFactory for FileAddressStoreFactory {
    async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn AddressStore>> {
        match config {
            StoreConfig::File { path } => Ok(Arc::new(FileAddressStore::new(path).await?)),
            other => Err(Error::config(format!(
                "File store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Association, LivenessStatus};
    use tempfile::tempdir;

    fn record(id: &str, ip: &str) -> AddressRecord {
        AddressRecord::new(id, format!("fip-{}", id), ip.parse().unwrap())
    }

    #[tokio::test]
    async fn test_file_store_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("addresses.json");

        let store = FileAddressStore::new(&path).await.unwrap();
        let mut item = record("eipalloc-00000001", "203.0.113.1");
        store.add(&item).await.unwrap();

        item.association = Some(Association {
            network_interface_id: "eni-1".into(),
            private_ip_address: "10.0.0.5".parse().unwrap(),
        });
        item.status = Some(LivenessStatus::Pending);
        store.update(&item).await.unwrap();
        assert!(path.exists());

        let reloaded = FileAddressStore::new(&path).await.unwrap();
        assert_eq!(reloaded.get(&item.id).await.unwrap(), Some(item));
    }

    #[tokio::test]
    async fn test_soft_delete_survives_restart() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("addresses.json");

        let store = FileAddressStore::new(&path).await.unwrap();
        let item = record("eipalloc-00000001", "203.0.113.1");
        store.add(&item).await.unwrap();
        let deleted = store.delete(&item.id).await.unwrap();

        let reloaded = FileAddressStore::new(&path).await.unwrap();
        assert!(reloaded.get(&item.id).await.unwrap().is_none());
        reloaded.restore(&deleted).await.unwrap();
        assert_eq!(reloaded.get(&item.id).await.unwrap(), Some(item));
    }

    #[tokio::test]
    async fn test_corruption_recovery() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("addresses.json");

        let store = FileAddressStore::new(&path).await.unwrap();
        store
            .add(&record("eipalloc-00000001", "203.0.113.1"))
            .await
            .unwrap();
        store
            .add(&record("eipalloc-00000002", "203.0.113.2"))
            .await
            .unwrap();

        let backup_path = FileAddressStore::backup_path(&path);
        assert!(backup_path.exists());

        fs::write(&path, b"corrupted json data").await.unwrap();

        // Backup holds the state before the last write
        let recovered = FileAddressStore::new(&path).await.unwrap();
        let ids: Vec<_> = recovered
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["eipalloc-00000001"]);
    }

    #[tokio::test]
    async fn test_invalid_document_treated_as_corruption() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("addresses.json");

        // Interface id without a private address
        let doc = serde_json::json!({
            "version": "1.0",
            "records": {
                "eipalloc-00000001": {
                    "id": "eipalloc-00000001",
                    "external_id": "fip-1",
                    "public_ip": "203.0.113.1",
                    "network_interface_id": "eni-1",
                    "allocated_at": "2025-01-09T12:00:00Z"
                }
            }
        });
        fs::write(&path, doc.to_string()).await.unwrap();

        let store = FileAddressStore::new(&path).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_mutation_is_not_visible() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("addresses.json");
        let store = FileAddressStore::new(&path).await.unwrap();

        let item = record("eipalloc-00000001", "203.0.113.1");
        assert!(store.update(&item).await.is_err());
        assert!(store.get(&item.id).await.unwrap().is_none());
    }
}
