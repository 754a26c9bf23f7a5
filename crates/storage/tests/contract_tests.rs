// Behavior every TableStore backend must share.

mod common;

use common::TestStore;
use common::fixtures::{body_item, versioned_item};
use std::collections::HashSet;
use tessera_storage::{
    AttributeValue, CompareOp, Condition, Item, PutOutcome, ScanRequest, StorageError, Table,
};

/// The manifest acceptance condition: absent, older, or same time and a
/// version that does not sort after the incoming one.
fn accepts(update_time: i64, version: &str) -> Condition {
    let newer_time = Condition::compare("UpdateTime", CompareOp::Lt, AttributeValue::N(update_time));
    let same_time = Condition::compare("UpdateTime", CompareOp::Eq, AttributeValue::N(update_time))
        .and(Condition::compare(
            "VersionID",
            CompareOp::Le,
            AttributeValue::S(version.to_string()),
        ));
    Condition::NotExists.or(newer_time).or(same_time)
}

#[tokio::test]
async fn test_get_missing_item_is_none() {
    for t in TestStore::all().await {
        let got = t.store.get_item(Table::Manifest, "absent").await.unwrap();
        assert!(got.is_none(), "{}", t.store.backend_name());
    }
}

#[tokio::test]
async fn test_binary_attributes_survive() {
    for t in TestStore::all().await {
        let item = body_item("chunk-1", 7, 4096);
        t.store
            .batch_put_items(Table::Chunk, vec![item.clone()])
            .await
            .unwrap();

        let got = t.store.get_item(Table::Chunk, "chunk-1").await.unwrap();
        assert_eq!(got, Some(item), "{}", t.store.backend_name());
    }
}

#[tokio::test]
async fn test_conditional_put_last_writer_wins() {
    for t in TestStore::all().await {
        let name = t.store.backend_name();
        let newer = versioned_item("r", 200, "b");
        let older = versioned_item("r", 100, "a");

        let outcome = t
            .store
            .put_item(Table::Manifest, newer.clone(), Some(accepts(200, "b")))
            .await
            .unwrap();
        assert_eq!(outcome, PutOutcome::Written, "{name}");

        let outcome = t
            .store
            .put_item(Table::Manifest, older, Some(accepts(100, "a")))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            PutOutcome::ConditionFailed {
                current: Some(newer.clone())
            },
            "{name}"
        );

        // Same time: the larger version wins, and re-committing is accepted.
        let same_time_larger = versioned_item("r", 200, "c");
        let outcome = t
            .store
            .put_item(
                Table::Manifest,
                same_time_larger.clone(),
                Some(accepts(200, "c")),
            )
            .await
            .unwrap();
        assert_eq!(outcome, PutOutcome::Written, "{name}");

        let outcome = t
            .store
            .put_item(Table::Manifest, newer, Some(accepts(200, "b")))
            .await
            .unwrap();
        assert!(
            matches!(outcome, PutOutcome::ConditionFailed { .. }),
            "{name}"
        );

        let outcome = t
            .store
            .put_item(
                Table::Manifest,
                same_time_larger.clone(),
                Some(accepts(200, "c")),
            )
            .await
            .unwrap();
        assert_eq!(outcome, PutOutcome::Written, "{name}");
        assert_eq!(
            t.store.get_item(Table::Manifest, "r").await.unwrap(),
            Some(same_time_larger),
            "{name}"
        );
    }
}

#[tokio::test]
async fn test_batch_get_reports_only_existing_keys() {
    for t in TestStore::all().await {
        let items: Vec<Item> = (0..5).map(|i| body_item(&format!("k{i}"), i, 16)).collect();
        t.store
            .batch_put_items(Table::Chunk, items)
            .await
            .unwrap();

        let keys = vec!["k4".to_string(), "missing".to_string(), "k0".to_string()];
        let output = t.store.batch_get_items(Table::Chunk, keys).await.unwrap();

        let found: HashSet<String> = output.items.into_iter().map(|i| i.key).collect();
        assert_eq!(
            found,
            HashSet::from(["k0".to_string(), "k4".to_string()]),
            "{}",
            t.store.backend_name()
        );
        assert!(output.unprocessed_keys.is_empty());
    }
}

#[tokio::test]
async fn test_oversized_batches_rejected() {
    for t in TestStore::all().await {
        let limits = t.store.limits();
        let items: Vec<Item> = (0..=limits.max_put_items)
            .map(|i| Item::new(format!("k{i}")))
            .collect();
        let err = t
            .store
            .batch_put_items(Table::Chunk, items)
            .await
            .unwrap_err();
        assert!(
            matches!(err, StorageError::InvalidRequest(_)),
            "{}",
            t.store.backend_name()
        );
        assert!(!err.is_retryable());
    }
}

#[tokio::test]
async fn test_batch_delete_removes_keys() {
    for t in TestStore::all().await {
        let items = vec![Item::new("a"), Item::new("b"), Item::new("c")];
        t.store
            .batch_put_items(Table::Chunk, items)
            .await
            .unwrap();

        let output = t
            .store
            .batch_delete_items(Table::Chunk, vec!["a".to_string(), "nope".to_string()])
            .await
            .unwrap();
        assert_eq!(output.deleted, 2);

        let page = t
            .store
            .scan_keys(Table::Chunk, ScanRequest::first(10))
            .await
            .unwrap();
        assert_eq!(page.keys, vec!["b", "c"], "{}", t.store.backend_name());
    }
}

#[tokio::test]
async fn test_scan_rejects_zero_limit() {
    for t in TestStore::all().await {
        let err = t
            .store
            .scan_keys(Table::Chunk, ScanRequest::first(0))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidRequest(_)));
    }
}
