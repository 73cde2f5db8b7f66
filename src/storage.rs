//! Durable local storage
//!
//! The queue and configuration are treated as the source of truth across
//! process restarts: every mutation is flushed through a `StorageBackend`
//! before the mutating call returns. Two backends are provided: a file
//! store (one JSON document per key) and an in-memory store for tests.

use crate::error::IntegrationError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Storage key for the persisted sync queue
pub const QUEUE_KEY: &str = "sync_queue";
/// Storage key for the persisted configuration document
pub const CONFIG_KEY: &str = "device_integration_config";
/// Storage key for the persisted capability snapshot
pub const CAPABILITIES_KEY: &str = "device_capabilities";

/// Async key/value storage seam for durable state
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the document stored under `key`, if any
    async fn read(&self, key: &str) -> Result<Option<String>, IntegrationError>;

    /// Write `value` under `key`, replacing any previous document
    async fn write(&self, key: &str, value: &str) -> Result<(), IntegrationError>;

    /// Remove the document stored under `key`, if any
    async fn remove(&self, key: &str) -> Result<(), IntegrationError>;
}

/// File-backed storage: one `<key>.json` document per key under a directory
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl StorageBackend for FileStore {
    async fn read(&self, key: &str) -> Result<Option<String>, IntegrationError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(IntegrationError::Storage(format!(
                "read {key}: {e}"
            ))),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), IntegrationError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| IntegrationError::Storage(format!("create dir: {e}")))?;
        tokio::fs::write(self.path_for(key), value)
            .await
            .map_err(|e| IntegrationError::Storage(format!("write {key}: {e}")))
    }

    async fn remove(&self, key: &str) -> Result<(), IntegrationError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(IntegrationError::Storage(format!(
                "remove {key}: {e}"
            ))),
        }
    }
}

/// In-memory storage backend for tests
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<String>, IntegrationError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| IntegrationError::Storage("memory store poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), IntegrationError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| IntegrationError::Storage("memory store poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), IntegrationError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| IntegrationError::Storage("memory store poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}
