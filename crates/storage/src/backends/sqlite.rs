//! SQLite table store.

use super::{check_batch, check_key, check_scan};
use crate::condition::Condition;
use crate::error::{StorageError, StorageResult};
use crate::item::{Item, Table};
use crate::traits::{
    BatchDeleteOutput, BatchGetOutput, BatchLimits, BatchPutOutput, PutOutcome, ScanPage,
    ScanRequest, TableStore,
};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqlitePoolOptions};
use sqlx::{Pool, QueryBuilder, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::instrument;

const UPSERT_SQL: &str = "INSERT INTO items (table_name, key, attributes) VALUES (?, ?, ?) \
     ON CONFLICT (table_name, key) DO UPDATE SET attributes = excluded.attributes";

/// Table store persisted in a single SQLite file.
///
/// Both logical tables share one `items` relation keyed by
/// `(table_name, key)`; attributes are stored as a JSON document.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    limits: BatchLimits,
}

impl SqliteStore {
    /// Open (or create) a store at `path`.
    pub async fn new(path: impl AsRef<Path>, busy_timeout: Duration) -> StorageResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(busy_timeout);

        let pool = SqlitePoolOptions::new()
            // A single writer connection keeps lock contention inside the pool.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self {
            pool,
            limits: BatchLimits::default(),
        };
        store.migrate().await?;

        tracing::debug!(path = %path.display(), "opened sqlite table store");
        Ok(store)
    }

    /// Override the per-call batch limits.
    pub fn with_limits(mut self, limits: BatchLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn migrate(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                table_name TEXT NOT NULL,
                key TEXT NOT NULL,
                attributes TEXT NOT NULL,
                PRIMARY KEY (table_name, key)
            ) WITHOUT ROWID
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_item(
        conn: &mut SqliteConnection,
        table: Table,
        key: &str,
    ) -> StorageResult<Option<Item>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT attributes FROM items WHERE table_name = ? AND key = ?")
                .bind(table.as_str())
                .bind(key)
                .fetch_optional(&mut *conn)
                .await?;

        row.map(|(attributes,)| Item::from_json(key.to_string(), &attributes))
            .transpose()
    }

    async fn check_and_put(
        conn: &mut SqliteConnection,
        table: Table,
        item: &Item,
        attributes: &str,
        condition: &Condition,
    ) -> StorageResult<PutOutcome> {
        let current = Self::fetch_item(conn, table, &item.key).await?;
        if !condition.evaluate(current.as_ref()) {
            return Ok(PutOutcome::ConditionFailed { current });
        }

        sqlx::query(UPSERT_SQL)
            .bind(table.as_str())
            .bind(&item.key)
            .bind(attributes)
            .execute(&mut *conn)
            .await?;
        Ok(PutOutcome::Written)
    }

    /// Evaluate `condition` and write inside one `BEGIN IMMEDIATE`
    /// transaction, so no other writer can interleave. Dropping the
    /// transaction unfinished rolls it back.
    async fn put_conditional(
        &self,
        table: Table,
        item: &Item,
        attributes: &str,
        condition: &Condition,
    ) -> StorageResult<PutOutcome> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let outcome = Self::check_and_put(&mut tx, table, item, attributes, condition).await?;

        match outcome {
            PutOutcome::Written => tx.commit().await?,
            PutOutcome::ConditionFailed { .. } => tx.rollback().await?,
        }
        Ok(outcome)
    }
}

#[async_trait]
impl TableStore for SqliteStore {
    async fn get_item(&self, table: Table, key: &str) -> StorageResult<Option<Item>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_item(&mut conn, table, key).await
    }

    #[instrument(skip(self, item, condition), fields(table = %table, key = %item.key))]
    async fn put_item(
        &self,
        table: Table,
        item: Item,
        condition: Option<Condition>,
    ) -> StorageResult<PutOutcome> {
        check_key(&item.key)?;
        let attributes = item.attributes_to_json()?;

        let outcome = match condition {
            Some(condition) => {
                self.put_conditional(table, &item, &attributes, &condition)
                    .await?
            }
            None => {
                sqlx::query(UPSERT_SQL)
                    .bind(table.as_str())
                    .bind(&item.key)
                    .bind(&attributes)
                    .execute(&self.pool)
                    .await?;
                PutOutcome::Written
            }
        };

        if matches!(outcome, PutOutcome::ConditionFailed { .. }) {
            tracing::debug!("conditional put rejected");
        }
        Ok(outcome)
    }

    async fn batch_put_items(
        &self,
        table: Table,
        items: Vec<Item>,
    ) -> StorageResult<BatchPutOutput> {
        check_batch("batch put", items.len(), self.limits.max_put_items)?;

        let mut rows = Vec::with_capacity(items.len());
        for item in &items {
            check_key(&item.key)?;
            rows.push((item.key.as_str(), item.attributes_to_json()?));
        }

        let mut tx = self.pool.begin().await?;
        for (key, attributes) in &rows {
            sqlx::query(UPSERT_SQL)
                .bind(table.as_str())
                .bind(*key)
                .bind(attributes)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(BatchPutOutput {
            written: rows.len(),
            unprocessed: Vec::new(),
        })
    }

    async fn batch_get_items(
        &self,
        table: Table,
        keys: Vec<String>,
    ) -> StorageResult<BatchGetOutput> {
        check_batch("batch get", keys.len(), self.limits.max_get_keys)?;
        if keys.is_empty() {
            return Ok(BatchGetOutput::default());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT key, attributes FROM items WHERE table_name = ",
        );
        query.push_bind(table.as_str());
        query.push(" AND key IN (");
        let mut separated = query.separated(", ");
        for key in &keys {
            separated.push_bind(key.as_str());
        }
        separated.push_unseparated(")");

        let rows: Vec<(String, String)> = query.build_query_as().fetch_all(&self.pool).await?;
        let items = rows
            .into_iter()
            .map(|(key, attributes)| Item::from_json(key, &attributes))
            .collect::<StorageResult<Vec<_>>>()?;

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

        let mut tx = self.pool.begin().await?;
        for key in &keys {
            sqlx::query("DELETE FROM items WHERE table_name = ? AND key = ?")
                .bind(table.as_str())
                .bind(key)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(BatchDeleteOutput {
            deleted: keys.len(),
            unprocessed_keys: Vec::new(),
        })
    }

    async fn scan_keys(&self, table: Table, request: ScanRequest) -> StorageResult<ScanPage> {
        check_scan(&request)?;
        let fetch = i64::try_from(request.limit.saturating_add(1)).map_err(|_| {
            StorageError::InvalidRequest(format!("scan limit {} too large", request.limit))
        })?;

        let rows: Vec<(String,)> = match &request.after {
            Some(after) => {
                sqlx::query_as(
                    "SELECT key FROM items WHERE table_name = ? AND key > ? \
                     ORDER BY key LIMIT ?",
                )
                .bind(table.as_str())
                .bind(after)
                .bind(fetch)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT key FROM items WHERE table_name = ? ORDER BY key LIMIT ?")
                    .bind(table.as_str())
                    .bind(fetch)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut keys: Vec<String> = rows.into_iter().map(|(key,)| key).collect();
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
        "sqlite"
    }

    async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::CompareOp;
    use crate::item::AttributeValue;
    use tempfile::tempdir;

    async fn open(dir: &tempfile::TempDir) -> SqliteStore {
        SqliteStore::new(dir.path().join("items.db"), Duration::from_secs(5))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_reopen_persists_items() {
        let dir = tempdir().unwrap();
        let item = Item::new("k").with("N", AttributeValue::N(7));
        {
            let store = open(&dir).await;
            store
                .put_item(Table::Manifest, item.clone(), None)
                .await
                .unwrap();
        }

        let store = open(&dir).await;
        assert_eq!(
            store.get_item(Table::Manifest, "k").await.unwrap(),
            Some(item)
        );
    }

    #[tokio::test]
    async fn test_conditional_put_rolls_back_on_rejection() {
        let dir = tempdir().unwrap();
        let store = open(&dir).await;
        let newer = Item::new("k").with("T", AttributeValue::N(200));
        store
            .put_item(Table::Manifest, newer.clone(), None)
            .await
            .unwrap();

        let older = Item::new("k").with("T", AttributeValue::N(100));
        let condition = Condition::NotExists.or(Condition::compare(
            "T",
            CompareOp::Le,
            AttributeValue::N(100),
        ));
        let outcome = store
            .put_item(Table::Manifest, older, Some(condition))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            PutOutcome::ConditionFailed {
                current: Some(newer.clone())
            }
        );
        // The connection must be usable again after the rollback.
        assert_eq!(
            store.get_item(Table::Manifest, "k").await.unwrap(),
            Some(newer)
        );
    }

    #[tokio::test]
    async fn test_tables_are_isolated() {
        let dir = tempdir().unwrap();
        let store = open(&dir).await;
        store
            .batch_put_items(Table::Chunk, vec![Item::new("shared")])
            .await
            .unwrap();

        assert!(
            store
                .get_item(Table::Manifest, "shared")
                .await
                .unwrap()
                .is_none()
        );
        let page = store
            .scan_keys(Table::Manifest, ScanRequest::first(10))
            .await
            .unwrap();
        assert!(page.keys.is_empty());
    }
}
