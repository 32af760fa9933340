//! Lifecycle without and around extensions

use crate::*;

// =============================================================================
// NEVER EXTENDED
// =============================================================================

#[test]
fn test_state_sequence_without_extension() {
    let store = store();
    let db = Database::new(store.clone());
    let tx = db.transaction(&["books"], TransactionMode::ReadOnly).unwrap();
    assert_eq!(tx.state(), TxnState::Active);

    tx.object_store("books").unwrap().get(1).unwrap();
    store.end_turn();
    assert_eq!(tx.state(), TxnState::Inactive);

    // The get runs and the store sees nothing left to do.
    assert!(store.run_task());
    store.end_turn();
    assert_eq!(tx.state(), TxnState::Committing);

    assert!(store.run_task());
    assert_eq!(tx.state(), TxnState::Finished);
    assert_eq!(settled(&tx.completion()), Some(Ok(())));
}

#[test]
fn test_idle_transaction_commits_at_end_of_turn() {
    let store = store();
    let db = Database::new(store.clone());
    let tx = db.transaction(&["books"], TransactionMode::ReadWrite).unwrap();
    store.end_turn();
    assert_eq!(tx.state(), TxnState::Committing);
    store.run_until_idle();
    assert_eq!(tx.state(), TxnState::Finished);
}

#[test]
fn test_completion_is_memoized() {
    let store = store();
    let db = Database::new(store.clone());
    let tx = db.transaction(&["books"], TransactionMode::ReadOnly).unwrap();
    let a = tx.completion();
    let b = tx.completion();
    assert!(a.ptr_eq(&b));
    assert!(tx.clone().completion().ptr_eq(&a));
}

// =============================================================================
// EXTENSION REFUSED
// =============================================================================

#[test]
fn test_extend_in_committing_is_rejected_without_state_change() {
    let store = store();
    let db = Database::new(store.clone());
    let tx = db.transaction(&["books"], TransactionMode::ReadOnly).unwrap();
    store.end_turn();
    assert_eq!(tx.state(), TxnState::Committing);

    let rejected = tx.extend(async { Ok::<_, Error>(()) });
    assert!(settled(&rejected).unwrap().unwrap_err().is_invalid_state());
    assert!(!rejected.ptr_eq(&tx.completion()));
    assert_eq!(tx.state(), TxnState::Committing);
    assert_eq!(tx.generation(), 0);

    store.run_until_idle();
    assert_eq!(settled(&tx.completion()), Some(Ok(())));
}

#[test]
fn test_extend_in_finished_is_rejected() {
    let store = store();
    let db = Database::new(store.clone());
    let tx = db.transaction(&["books"], TransactionMode::ReadOnly).unwrap();
    store.run_until_idle();
    assert_eq!(tx.state(), TxnState::Finished);

    let rejected = tx.extend(async { Ok::<_, Error>(()) });
    assert!(settled(&rejected).unwrap().unwrap_err().is_invalid_state());
    assert_eq!(tx.state(), TxnState::Finished);
}

// =============================================================================
// ABORT
// =============================================================================

#[test]
fn test_abort_rolls_back_and_rejects_completion() {
    let store = seeded_store();
    let db = Database::new(store.clone());
    let tx = db.transaction(&["books"], TransactionMode::ReadWrite).unwrap();
    let books = tx.object_store("books").unwrap();
    books.put(1, json!("Changed")).unwrap();

    store.end_turn();
    assert!(store.run_task());
    assert_eq!(store.get("books", 1), Some(json!("Changed")));

    tx.abort().unwrap();
    store.run_until_idle();
    assert_eq!(store.get("books", 1), Some(json!("Dune")));
    assert_eq!(
        settled(&tx.completion()),
        Some(Err(Error::aborted("transaction aborted by caller")))
    );
}

#[test]
fn test_abort_twice_is_invalid_state() {
    let store = store();
    let db = Database::new(store.clone());
    let tx = db.transaction(&["books"], TransactionMode::ReadWrite).unwrap();
    tx.abort().unwrap();
    assert!(tx.abort().unwrap_err().is_invalid_state());
}

#[test]
fn test_abort_after_store_commit_started_reports_backend_error() {
    let store = store();
    let db = Database::new(store.clone());
    let tx = db.transaction(&["books"], TransactionMode::ReadWrite).unwrap();
    store.end_turn();

    assert_eq!(tx.abort().unwrap_err(), Error::TransactionFinished);
    store.run_until_idle();
    // The store committed; the engine still reports the commit.
    assert_eq!(settled(&tx.completion()), Some(Ok(())));
}
