pub mod fixtures;

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tessera_storage::{MemoryStore, SqliteStore, TableStore};

/// A backend under test. Holds the temp dir so the SQLite file outlives the store.
#[allow(dead_code)]
pub struct TestStore {
    pub store: Arc<dyn TableStore>,
    _dir: Option<TempDir>,
}

#[allow(dead_code)]
impl TestStore {
    pub fn memory() -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            _dir: None,
        }
    }

    pub async fn sqlite() -> Self {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::new(dir.path().join("tessera.db"), Duration::from_secs(5))
            .await
            .unwrap();
        Self {
            store: Arc::new(store),
            _dir: Some(dir),
        }
    }

    /// Every backend, for contract tests.
    pub async fn all() -> Vec<Self> {
        vec![Self::memory(), Self::sqlite().await]
    }
}
