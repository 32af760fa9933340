//! Backends that cannot report activity

use crate::*;

fn database(store: &MemoryStore) -> Database {
    Database::new(NoActivityHook(store.clone()))
}

#[test]
fn test_activity_inferred_by_probing() {
    let store = store();
    let db = database(&store);
    let tx = db.transaction(&["books"], TransactionMode::ReadOnly).unwrap();

    // Accepted probe: active, and the probe now counts as outstanding.
    assert_eq!(tx.state(), TxnState::Active);
    assert_eq!(tx.outstanding(), 1);

    store.end_turn();
    assert_eq!(tx.state(), TxnState::Inactive);

    assert!(store.run_task());
    assert_eq!(tx.outstanding(), 0);
    store.end_turn();
    // Refused probe with nothing outstanding: the store is committing.
    assert_eq!(tx.state(), TxnState::Committing);

    store.run_until_idle();
    assert_eq!(tx.state(), TxnState::Finished);
}

#[test]
fn test_extension_without_activity_hook() {
    let store = store();
    let db = database(&store);
    let tx = db.transaction(&["books"], TransactionMode::ReadWrite).unwrap();
    let books = tx.object_store("books").unwrap();
    let wait = store.sleep(4);

    let completion = tx.extend(async move {
        wait.await;
        books.put("k", json!("v"))?.await
    });

    store.run_until_idle();
    assert_eq!(settled(&completion), Some(Ok(())));
    assert_eq!(store.get("books", "k"), Some(json!("v")));
}
