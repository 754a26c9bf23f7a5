// Conditional writes racing from many tasks.

mod common;

use common::TestStore;
use common::fixtures::versioned_item;
use tessera_storage::{AttributeValue, CompareOp, Condition, PutOutcome, Table};

#[tokio::test]
async fn test_racing_conditional_puts_keep_the_newest() {
    for t in TestStore::all().await {
        let mut handles = Vec::new();
        for time in (1..=20).rev() {
            let store = t.store.clone();
            handles.push(tokio::spawn(async move {
                let condition = Condition::NotExists.or(Condition::compare(
                    "UpdateTime",
                    CompareOp::Le,
                    AttributeValue::N(time),
                ));
                store
                    .put_item(
                        Table::Manifest,
                        versioned_item("race", time, "v"),
                        Some(condition),
                    )
                    .await
                    .unwrap()
            }));
        }

        let mut written = 0;
        for handle in handles {
            if handle.await.unwrap() == PutOutcome::Written {
                written += 1;
            }
        }
        assert!(written >= 1);

        let stored = t.store.get_item(Table::Manifest, "race").await.unwrap().unwrap();
        assert_eq!(
            stored.get("UpdateTime").and_then(AttributeValue::as_n),
            Some(20),
            "{}",
            t.store.backend_name()
        );
    }
}
