//! Storage factory for creating storage implementations based on configuration

use std::sync::Arc;

use crate::core::config::{StorageConfig, StorageType};
use crate::storage::{FileStore, MemStore, SharedStore, StoreResult};

/// Create the configured storage backend
pub async fn create_store(config: &StorageConfig) -> StoreResult<SharedStore> {
    match config.storage_type {
        StorageType::Memory => Ok(Arc::new(MemStore::new())),
        StorageType::Disk => {
            let store = FileStore::open(&config.data_dir).await?;
            Ok(Arc::new(store))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_memory_storage_creation() {
        let config = StorageConfig {
            storage_type: StorageType::Memory,
            ..Default::default()
        };

        let store = create_store(&config).await.unwrap();
        assert!(store.list_notes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disk_storage_creation() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig {
            storage_type: StorageType::Disk,
            data_dir: dir.path().to_path_buf(),
        };

        let store = create_store(&config).await.unwrap();
        store.increment_counter("ticketId", 0).await.unwrap();
        assert!(dir.path().join("counters.json").exists());
    }
}
