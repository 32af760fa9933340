//! Database construction and transaction options

use crate::*;

#[test]
fn test_default_config_is_unbounded() {
    let (_store, db) = library();
    assert_eq!(db.config(), &TransactionConfig::default());
}

#[test]
fn test_builder_applies_probe_limit_to_every_transaction() {
    let store = MemoryStore::new();
    store.create_resource("books").unwrap();
    let db = Database::builder()
        .max_probe_rounds(2)
        .build(store.clone());
    assert_eq!(db.config().max_probe_rounds, Some(2));

    let tx = db.transaction(&["books"], TransactionMode::ReadOnly).unwrap();
    let forever = store.sleep(50);
    tx.extend(async move {
        forever.await;
        Ok::<_, Error>(())
    });
    store.run_until_idle();
    assert!(block(&store, tx.completion()).unwrap_err().is_abort());
}

#[test]
fn test_transaction_with_overrides_database_config() {
    let store = MemoryStore::new();
    store.create_resource("books").unwrap();
    let db = Database::builder()
        .max_probe_rounds(1)
        .build(store.clone());

    let tx = db
        .transaction_with(&["books"], TransactionMode::ReadOnly, TransactionConfig::default())
        .unwrap();
    let wait = store.sleep(6);
    tx.extend(async move {
        wait.await;
        Ok::<_, Error>(())
    });
    store.run_until_idle();
    assert_eq!(block(&store, tx.completion()), Ok(()));
}

#[test]
fn test_builder_probe_target_must_be_in_scope() {
    let store = MemoryStore::new();
    store.create_resource("books").unwrap();
    store.create_resource("members").unwrap();
    let db = Database::builder().probe_target("members").build(store);

    let err = db
        .transaction(&["books"], TransactionMode::ReadOnly)
        .unwrap_err();
    assert_eq!(err, Error::NotInScope("members".into()));
    assert!(db
        .transaction(&["books", "members"], TransactionMode::ReadOnly)
        .is_ok());
}

#[test]
fn test_config_from_json() {
    let config: TransactionConfig =
        serde_json::from_value(json!({ "probe_target": "books", "max_probe_rounds": 10 }))
            .unwrap();
    let store = MemoryStore::new();
    let db = Database::builder().config(config.clone()).build(store);
    assert_eq!(db.config(), &config);
}

#[test]
fn test_unknown_resource_fails_to_open() {
    let (_store, db) = library();
    let err = db
        .transaction(&["nowhere"], TransactionMode::ReadOnly)
        .unwrap_err();
    assert_eq!(err, Error::UnknownResource("nowhere".into()));
}

#[test]
fn test_empty_scope_requires_exclusive_mode() {
    let (_store, db) = library();
    let scope: [&str; 0] = [];
    let err = db.transaction(&scope, TransactionMode::ReadWrite).unwrap_err();
    assert!(matches!(err, Error::Data(_)));
    assert!(db.transaction(&scope, TransactionMode::Exclusive).is_ok());
}
