//! In-memory table store.

use super::{check_batch, check_key, check_scan};
use crate::condition::Condition;
use crate::error::StorageResult;
use crate::item::{Item, Table};
use crate::traits::{
    BatchDeleteOutput, BatchGetOutput, BatchLimits, BatchPutOutput, PutOutcome, ScanPage,
    ScanRequest, TableStore,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use tokio::sync::RwLock;
use tracing::instrument;

/// Process-local table store backed by ordered maps.
///
/// Every call completes fully, so batch outputs never carry unprocessed
/// entries. Batch sizes are still checked against [`BatchLimits`].
pub struct MemoryStore {
    tables: RwLock<HashMap<Table, BTreeMap<String, Item>>>,
    limits: BatchLimits,
}

impl MemoryStore {
    /// Create an empty store with default batch limits.
    pub fn new() -> Self {
        Self::with_limits(BatchLimits::default())
    }

    /// Create an empty store with custom batch limits.
    pub fn with_limits(limits: BatchLimits) -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            limits,
        }
    }

    /// Number of items in a table.
    pub async fn item_count(&self, table: Table) -> usize {
        self.tables
            .read()
            .await
            .get(&table)
            .map_or(0, BTreeMap::len)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn get_item(&self, table: Table, key: &str) -> StorageResult<Option<Item>> {
        Ok(self
            .tables
            .read()
            .await
            .get(&table)
            .and_then(|rows| rows.get(key))
            .cloned())
    }

    #[instrument(skip(self, item, condition), fields(table = %table, key = %item.key))]
    async fn put_item(
        &self,
        table: Table,
        item: Item,
        condition: Option<Condition>,
    ) -> StorageResult<PutOutcome> {
        check_key(&item.key)?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table).or_default();

        if let Some(condition) = condition {
            let current = rows.get(&item.key);
            if !condition.evaluate(current) {
                tracing::debug!("conditional put rejected");
                return Ok(PutOutcome::ConditionFailed {
                    current: current.cloned(),
                });
            }
        }

        rows.insert(item.key.clone(), item);
        Ok(PutOutcome::Written)
    }

    async fn batch_put_items(
        &self,
        table: Table,
        items: Vec<Item>,
    ) -> StorageResult<BatchPutOutput> {
        check_batch("batch put", items.len(), self.limits.max_put_items)?;
        for item in &items {
            check_key(&item.key)?;
        }

        let mut tables = self.tables.write().await;
        let rows = tables.entry(table).or_default();
        let written = items.len();
        for item in items {
            rows.insert(item.key.clone(), item);
        }

        Ok(BatchPutOutput {
            written,
            unprocessed: Vec::new(),
        })
    }

    async fn batch_get_items(
        &self,
        table: Table,
        keys: Vec<String>,
    ) -> StorageResult<BatchGetOutput> {
        check_batch("batch get", keys.len(), self.limits.max_get_keys)?;

        let tables = self.tables.read().await;
        let items = match tables.get(&table) {
            Some(rows) => keys.iter().filter_map(|key| rows.get(key).cloned()).collect(),
            None => Vec::new(),
        };

        Ok(BatchGetOutput {
            items,
            unprocessed_keys: Vec::new(),
        })
    }

    async fn batch_delete_items(
        &self,
        table: Table,
        keys: Vec<String>,
    ) -> StorageResult<BatchDeleteOutput> {
        check_batch("batch delete", keys.len(), self.limits.max_delete_keys)?;

        let mut tables = self.tables.write().await;
        if let Some(rows) = tables.get_mut(&table) {
            for key in &keys {
                rows.remove(key);
            }
        }

        Ok(BatchDeleteOutput {
            deleted: keys.len(),
            unprocessed_keys: Vec::new(),
        })
    }

    async fn scan_keys(&self, table: Table, request: ScanRequest) -> StorageResult<ScanPage> {
        check_scan(&request)?;

        let tables = self.tables.read().await;
        let Some(rows) = tables.get(&table) else {
            return Ok(ScanPage::default());
        };

        let lower = match &request.after {
            Some(after) => Bound::Excluded(after.clone()),
            None => Bound::Unbounded,
        };
        let mut keys: Vec<String> = rows
            .range((lower, Bound::Unbounded))
            .take(request.limit + 1)
            .map(|(key, _)| key.clone())
            .collect();

        let next = if keys.len() > request.limit {
            keys.truncate(request.limit);
            keys.last().cloned()
        } else {
            None
        };

        Ok(ScanPage { keys, next })
    }

    fn limits(&self) -> BatchLimits {
        self.limits
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
