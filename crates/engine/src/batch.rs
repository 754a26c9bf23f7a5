//! Splitting work into store-sized batches and driving them concurrently.

use crate::error::Result;
use crate::retry::RetryPolicy;
use futures::{Stream, StreamExt, TryStreamExt, stream};
use std::pin::Pin;
use std::sync::Arc;
use tessera_core::config::BatchConfig;
use tessera_storage::{Item, ScanPage, ScanRequest, StorageError, Table, TableStore};
use tokio_util::sync::CancellationToken;

/// Pages of keys from a table scan, in ascending key order.
pub type KeyPages<'a> = Pin<Box<dyn Stream<Item = Result<Vec<String>>> + Send + 'a>>;

/// Batched reads, writes and deletes against one store.
///
/// Batch sizes are clamped to the backend's [`tessera_storage::BatchLimits`];
/// at most `max_concurrency` batch calls are in flight per operation.
#[derive(Clone)]
pub struct Batcher {
    store: Arc<dyn TableStore>,
    policy: RetryPolicy,
    write_batch_size: usize,
    read_batch_size: usize,
    delete_batch_size: usize,
    max_concurrency: usize,
}

impl Batcher {
    pub fn new(store: Arc<dyn TableStore>, policy: RetryPolicy, config: &BatchConfig) -> Self {
        let limits = store.limits();
        Self {
            write_batch_size: config.write_batch_size.clamp(1, limits.max_put_items.max(1)),
            read_batch_size: config.read_batch_size.clamp(1, limits.max_get_keys.max(1)),
            delete_batch_size: limits.max_delete_keys.max(1),
            max_concurrency: config.max_concurrency.max(1),
            store,
            policy,
        }
    }

    pub fn write_batch_size(&self) -> usize {
        self.write_batch_size
    }

    pub fn read_batch_size(&self) -> usize {
        self.read_batch_size
    }

    /// Write every item, returning how many were written.
    pub async fn put_all(
        &self,
        table: Table,
        items: Vec<Item>,
        cancel: Option<&CancellationToken>,
    ) -> Result<usize> {
        let batches = split(items, self.write_batch_size);
        tracing::debug!(%table, batches = batches.len(), "writing batches");

        stream::iter(batches)
            .map(|batch| self.put_batch(table, batch, cancel))
            .buffer_unordered(self.max_concurrency)
            .try_fold(0, |total, written| async move { Ok(total + written) })
            .await
    }

    async fn put_batch(
        &self,
        table: Table,
        batch: Vec<Item>,
        cancel: Option<&CancellationToken>,
    ) -> Result<usize> {
        let store = &self.store;
        let written = self
            .policy
            .call_partial("batch put", cancel, batch, |pending| async move {
                let output = store.batch_put_items(table, pending).await?;
                Ok::<_, StorageError>((output.written, output.unprocessed))
            })
            .await?;
        Ok(written.into_iter().sum())
    }

    /// Read every key. Keys the store does not have are simply absent from
    /// the result; keys still unprocessed when the retry budget runs out
    /// fail the whole read.
    pub async fn get_all(&self, table: Table, keys: Vec<String>) -> Result<Vec<Item>> {
        let batches = split(keys, self.read_batch_size);
        tracing::debug!(%table, batches = batches.len(), "reading batches");

        stream::iter(batches)
            .map(|batch| self.get_batch(table, batch))
            .buffer_unordered(self.max_concurrency)
            .try_concat()
            .await
    }

    async fn get_batch(&self, table: Table, batch: Vec<String>) -> Result<Vec<Item>> {
        let store = &self.store;
        let found = self
            .policy
            .call_partial("batch get", None, batch, |pending| async move {
                let output = store.batch_get_items(table, pending).await?;
                Ok::<_, StorageError>((output.items, output.unprocessed_keys))
            })
            .await?;
        Ok(found.into_iter().flatten().collect())
    }

    /// One page of a key scan, retried like any other store call.
    pub async fn scan_page(&self, table: Table, request: ScanRequest) -> Result<ScanPage> {
        let store = &self.store;
        self.policy
            .call("scan keys", None, || store.scan_keys(table, request.clone()))
            .await
    }

    /// Scan every key of `table`, `page_size` keys per retried call.
    /// Pages are fetched as the stream is polled; dropping it stops the scan.
    pub fn scan_pages(&self, table: Table, page_size: usize) -> KeyPages<'_> {
        let stream = async_stream::try_stream! {
            let mut request = ScanRequest::first(page_size);
            loop {
                let page = self.scan_page(table, request.clone()).await?;
                let next = page.next;
                yield page.keys;
                match next {
                    Some(next) => request.after = Some(next),
                    None => break,
                }
            }
        };

        Box::pin(stream)
    }

    /// Delete every key, returning how many were processed.
    pub async fn delete_all(&self, table: Table, keys: Vec<String>) -> Result<usize> {
        let batches = split(keys, self.delete_batch_size);

        stream::iter(batches)
            .map(|batch| self.delete_batch(table, batch))
            .buffer_unordered(self.max_concurrency)
            .try_fold(0, |total, deleted| async move { Ok(total + deleted) })
            .await
    }

    async fn delete_batch(&self, table: Table, batch: Vec<String>) -> Result<usize> {
        let store = &self.store;
        let deleted = self
            .policy
            .call_partial("batch delete", None, batch, |pending| async move {
                let output = store.batch_delete_items(table, pending).await?;
                Ok::<_, StorageError>((output.deleted, output.unprocessed_keys))
            })
            .await?;
        Ok(deleted.into_iter().sum())
    }
}

fn split<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(size).collect());
    }
    batches
}
