//! Requests issued while an extension is pending

use crate::*;
use linger::{ReadyState, Request};

/// Begin a transaction over `books` and `authors` that waits `turns` turns
fn waiting(store: &MemoryStore, mode: TransactionMode, turns: usize) -> Transaction {
    let db = Database::new(store.clone());
    let tx = db.transaction(&["books", "authors"], mode).unwrap();
    let wait = store.sleep(turns);
    tx.extend(async move {
        wait.await;
        Ok::<_, Error>(())
    });
    assert_eq!(tx.state(), TxnState::Waiting);
    tx
}

// =============================================================================
// ORDER AND RESULTS
// =============================================================================

#[test]
fn test_deferred_requests_replay_in_submission_order() {
    let store = store();
    let tx = waiting(&store, TransactionMode::ReadWrite, 3);
    let books = tx.object_store("books").unwrap();

    let put_a = books.put(1, json!("a")).unwrap();
    let read_a = books.get(1).unwrap();
    let put_b = books.put(1, json!("b")).unwrap();
    let read_b = books.get(1).unwrap();
    let count = books.count(KeyRange::all()).unwrap();
    assert!(put_a.is_deferred() && count.is_deferred());
    assert_eq!(tx.deferred_len(), 5);

    let results = store
        .run_until(async move {
            put_a.await?;
            let a = read_a.await?;
            put_b.await?;
            let b = read_b.await?;
            Ok::<_, Error>((a, b, count.await?))
        })
        .unwrap()
        .unwrap();
    assert_eq!(results, (Some(json!("a")), Some(json!("b")), 1));
    assert_eq!(tx.deferred_len(), 0);
    assert_eq!(store.get("books", 1), Some(json!("b")));
}

#[test]
fn test_proxy_is_unreadable_until_replayed() {
    let store = store();
    let tx = waiting(&store, TransactionMode::ReadWrite, 2);
    let request = tx
        .issue("books", Operation::Get { key: Key::Int(1) })
        .unwrap();

    let Request::Deferred(proxy) = &request else {
        panic!("expected a deferred request");
    };
    assert!(request.result().unwrap_err().is_invalid_state());
    assert!(request.error().unwrap_err().is_invalid_state());
    assert_eq!(request.ready_state(), ReadyState::Pending);
    assert!(!proxy.is_bound());

    store.run_until_idle();
    assert!(proxy.is_bound());
    assert_eq!(request.ready_state(), ReadyState::Done);
    assert_eq!(request.result().unwrap(), Some(linger::Output::Value(None)));
}

#[test]
fn test_out_of_scope_request_fails_synchronously_while_waiting() {
    let store = store();
    store.create_resource("loans").unwrap();
    let tx = waiting(&store, TransactionMode::ReadWrite, 1);
    let err = tx.issue("loans", Operation::Clear).unwrap_err();
    assert_eq!(err, Error::NotInScope("loans".into()));
    assert_eq!(tx.deferred_len(), 0);
}

#[test]
fn test_request_after_resolution_queues_behind_unreplayed_ones() {
    use futures::channel::oneshot;
    use futures::task::LocalSpawnExt;
    use std::cell::RefCell;
    use std::rc::Rc;

    let store = store();
    let db = Database::new(store.clone());
    let tx = db.transaction(&["books"], TransactionMode::ReadWrite).unwrap();

    let (open_gate, gate) = oneshot::channel::<()>();
    let (notify, resolved) = oneshot::channel::<()>();
    tx.extend(async move {
        let _ = gate.await;
        let _ = notify.send(());
        Ok::<_, Error>(())
    });

    // Deferred while waiting; replayed only once the keep-alive probe lands.
    let first = tx
        .issue("books", Operation::Put { key: Key::Int(1), value: json!("a") })
        .unwrap();
    assert!(first.is_deferred());

    // Issued in the same turn the extension resolves, before any replay.
    let later = Rc::new(RefCell::new(None));
    {
        let tx = tx.clone();
        let later = later.clone();
        store
            .spawn_local(async move {
                let _ = resolved.await;
                let state = tx.state();
                let request = tx.issue(
                    "books",
                    Operation::Put { key: Key::Int(1), value: json!("b") },
                );
                *later.borrow_mut() = Some((state, request));
            })
            .unwrap();
    }
    open_gate.send(()).unwrap();
    store.end_turn();

    let (state, second) = later.borrow_mut().take().unwrap();
    assert_eq!(state, TxnState::Committing);
    let second = second.unwrap();
    assert!(second.is_deferred());
    assert_eq!(tx.deferred_len(), 2);

    store.run_until_idle();
    assert_eq!(first.result().unwrap(), Some(linger::Output::Key(Key::Int(1))));
    assert_eq!(second.result().unwrap(), Some(linger::Output::Key(Key::Int(1))));
    assert_eq!(settled(&tx.completion()), Some(Ok(())));
    assert_eq!(store.get("books", 1), Some(json!("b")));
}

// =============================================================================
// FAILURES
// =============================================================================

#[test]
fn test_read_only_write_fails_only_at_replay() {
    let store = seeded_store();
    let tx = waiting(&store, TransactionMode::ReadOnly, 2);
    let books = tx.object_store("books").unwrap();

    // Deferred, so the mode check happens when it is dispatched.
    let write = books.put(1, json!("nope")).unwrap();
    let read = books.get(2).unwrap();

    let (write, read) = store
        .run_until(async move { (write.await, read.await) })
        .unwrap();
    assert!(matches!(write, Err(Error::ReadOnly { operation: "put", .. })));
    assert_eq!(read.unwrap(), Some(json!("Emma")));
    assert_eq!(settled(&tx.completion()), Some(Ok(())));
    assert_eq!(store.get("books", 1), Some(json!("Dune")));
}

#[test]
fn test_rejection_discards_queued_requests() {
    let store = store();
    let db = Database::new(store.clone());
    let tx = db.transaction(&["books"], TransactionMode::ReadWrite).unwrap();
    tx.extend(async { Err::<(), _>("cancelled by user") });

    let books = tx.object_store("books").unwrap();
    let first = books.put(1, json!(1)).unwrap();
    let second = books.put(2, json!(2)).unwrap();
    assert_eq!(tx.deferred_len(), 2);

    let outcomes = store
        .run_until(async move { (first.await, second.await) })
        .unwrap();
    assert_eq!(outcomes.0, Err(Error::aborted("cancelled by user")));
    assert_eq!(outcomes.1, Err(Error::aborted("cancelled by user")));
    assert_eq!(tx.deferred_len(), 0);
    assert!(store.entries("books").is_empty());
}

#[test]
fn test_issue_after_abort_is_refused() {
    let store = store();
    let tx = waiting(&store, TransactionMode::ReadWrite, 5);
    tx.abort().unwrap();
    let err = tx.issue("books", Operation::Clear).unwrap_err();
    assert_eq!(err, Error::TransactionFinished);
}
