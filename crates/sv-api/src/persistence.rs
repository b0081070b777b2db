use std::collections::BTreeMap;

use async_trait::async_trait;
use sv_core::VarError;
use tokio::sync::RwLock;

/// Storage for serialized scope snapshots, addressed by `ScopeId::lock_key()`.
#[async_trait]
pub trait ScopePersistence: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>, VarError>;
    async fn save(&self, key: &str, blob: &str) -> Result<(), VarError>;
}

/// In-process persistence for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    blobs: RwLock<BTreeMap<String, String>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.blobs.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl ScopePersistence for MemoryPersistence {
    async fn load(&self, key: &str) -> Result<Option<String>, VarError> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn save(&self, key: &str, blob: &str) -> Result<(), VarError> {
        self.blobs
            .write()
            .await
            .insert(key.to_string(), blob.to_string());
        Ok(())
    }
}
