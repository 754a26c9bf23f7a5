pub mod fixtures;

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tessera_core::config::{
    AppConfig, BatchConfig, ChunkingConfig, CompressionConfig, RetryConfig, StoreConfig,
    TimeoutConfig,
};
use tessera_engine::ChunkedStore;
use tessera_storage::{
    BatchDeleteOutput, BatchGetOutput, BatchLimits, BatchPutOutput, Condition, Item, MemoryStore,
    PutOutcome, ScanPage, ScanRequest, SqliteStore, StorageError, StorageResult, Table,
    TableStore,
};

/// Small chunks, small batches, fast retries.
#[allow(dead_code)]
pub fn test_config() -> AppConfig {
    AppConfig {
        store: StoreConfig::Memory,
        chunking: ChunkingConfig {
            max_chunk_size: 5,
            compression: CompressionConfig::None,
        },
        retry: RetryConfig {
            max_attempts: 4,
            base_delay_ms: 1,
            max_delay_ms: 4,
        },
        batch: BatchConfig {
            write_batch_size: 3,
            read_batch_size: 4,
            max_concurrency: 2,
        },
        timeouts: TimeoutConfig {
            operation_timeout_ms: 500,
        },
        ..AppConfig::default()
    }
}

#[allow(dead_code)]
pub fn engine(store: Arc<dyn TableStore>) -> ChunkedStore {
    ChunkedStore::new(store, &test_config()).unwrap()
}

/// A backend under test. Holds the temp dir so the SQLite file outlives the store.
#[allow(dead_code)]
pub struct TestBackend {
    pub name: &'static str,
    pub store: Arc<dyn TableStore>,
    _dir: Option<TempDir>,
}

#[allow(dead_code)]
impl TestBackend {
    pub async fn all() -> Vec<Self> {
        let dir = TempDir::new().unwrap();
        let sqlite = SqliteStore::new(dir.path().join("tessera.db"), Duration::from_secs(5))
            .await
            .unwrap();

        vec![
            Self {
                name: "memory",
                store: Arc::new(MemoryStore::new()),
                _dir: None,
            },
            Self {
                name: "sqlite",
                store: Arc::new(sqlite),
                _dir: Some(dir),
            },
        ]
    }
}

/// Wrapper injecting the failure modes a managed key-value store exhibits:
/// partial batches, throttling, unordered results, missing rows and latency.
#[allow(dead_code)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    /// Batch puts that only write their first half (rounded down).
    pub partial_puts: AtomicUsize,
    /// Batch gets that only answer their first half (rounded down).
    pub partial_gets: AtomicUsize,
    /// Calls (any kind) that fail with a throttling error.
    pub throttled_calls: AtomicUsize,
    /// Return batch get results in reverse order.
    pub reverse_gets: AtomicBool,
    /// Keys batch get pretends not to have.
    pub hidden_keys: Mutex<HashSet<String>>,
    /// Delay before every batch put, in milliseconds.
    pub put_delay_ms: AtomicU64,
    /// Delay before every manifest put, in milliseconds.
    pub commit_delay_ms: AtomicU64,
    pub batch_put_calls: AtomicUsize,
    pub batch_get_calls: AtomicUsize,
    pub put_item_calls: AtomicUsize,
}

#[allow(dead_code)]
impl FaultyStore {
    pub fn new() -> Arc<Self> {
        Self::with_limits(BatchLimits::default())
    }

    pub fn with_limits(limits: BatchLimits) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::with_limits(limits),
            partial_puts: AtomicUsize::new(0),
            partial_gets: AtomicUsize::new(0),
            throttled_calls: AtomicUsize::new(0),
            reverse_gets: AtomicBool::new(false),
            hidden_keys: Mutex::new(HashSet::new()),
            put_delay_ms: AtomicU64::new(0),
            commit_delay_ms: AtomicU64::new(0),
            batch_put_calls: AtomicUsize::new(0),
            batch_get_calls: AtomicUsize::new(0),
            put_item_calls: AtomicUsize::new(0),
        })
    }

    pub fn hide(&self, key: impl Into<String>) {
        self.hidden_keys.lock().unwrap().insert(key.into());
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn throttle(&self) -> StorageResult<()> {
        if Self::take(&self.throttled_calls) {
            return Err(StorageError::Throttled("injected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TableStore for FaultyStore {
    async fn get_item(&self, table: Table, key: &str) -> StorageResult<Option<Item>> {
        self.throttle()?;
        self.inner.get_item(table, key).await
    }

    async fn put_item(
        &self,
        table: Table,
        item: Item,
        condition: Option<Condition>,
    ) -> StorageResult<PutOutcome> {
        self.put_item_calls.fetch_add(1, Ordering::SeqCst);
        self.throttle()?;
        let delay = self.commit_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.inner.put_item(table, item, condition).await
    }

    async fn batch_put_items(
        &self,
        table: Table,
        mut items: Vec<Item>,
    ) -> StorageResult<BatchPutOutput> {
        self.batch_put_calls.fetch_add(1, Ordering::SeqCst);
        self.throttle()?;
        let delay = self.put_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let unprocessed = if Self::take(&self.partial_puts) {
            items.split_off(items.len() / 2)
        } else {
            Vec::new()
        };
        let mut output = self.inner.batch_put_items(table, items).await?;
        output.unprocessed = unprocessed;
        Ok(output)
    }

    async fn batch_get_items(
        &self,
        table: Table,
        mut keys: Vec<String>,
    ) -> StorageResult<BatchGetOutput> {
        self.batch_get_calls.fetch_add(1, Ordering::SeqCst);
        self.throttle()?;

        let unprocessed_keys = if Self::take(&self.partial_gets) {
            keys.split_off(keys.len() / 2)
        } else {
            Vec::new()
        };
        let hidden = self.hidden_keys.lock().unwrap().clone();
        keys.retain(|key| !hidden.contains(key));

        let mut output = self.inner.batch_get_items(table, keys).await?;
        if self.reverse_gets.load(Ordering::SeqCst) {
            output.items.reverse();
        }
        output.unprocessed_keys = unprocessed_keys;
        Ok(output)
    }

    async fn batch_delete_items(
        &self,
        table: Table,
        keys: Vec<String>,
    ) -> StorageResult<BatchDeleteOutput> {
        self.throttle()?;
        self.inner.batch_delete_items(table, keys).await
    }

    async fn scan_keys(&self, table: Table, request: ScanRequest) -> StorageResult<ScanPage> {
        self.throttle()?;
        self.inner.scan_keys(table, request).await
    }

    fn limits(&self) -> BatchLimits {
        self.inner.limits()
    }

    fn backend_name(&self) -> &'static str {
        "faulty"
    }
}
