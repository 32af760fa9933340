//! Cursor stepping bound to the opening request

use crate::*;
use linger::ReadyState;
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_three_steps_share_handle_with_fresh_adapters() {
    let store = seeded_store();
    let db = Database::new(store.clone());
    let tx = db.transaction(&["books"], TransactionMode::ReadOnly).unwrap();
    let open = tx
        .object_store("books")
        .unwrap()
        .open_cursor(KeyRange::all(), Direction::Next)
        .unwrap();

    let report = store
        .run_until(async move {
            let mut adapters = vec![open.adapter_id()];
            let mut keys = Vec::new();
            let mut readiness = Vec::new();
            let mut cursor = open.await?.ok_or(Error::Internal("empty".into()))?;
            let origin = cursor.request().ok_or(Error::Internal("closed".into()))?;
            keys.push(cursor.key().clone());

            for _ in 0..2 {
                let next = cursor.step()?;
                adapters.push(next.adapter_id());
                readiness.push(origin.ready_state());
                cursor = next.await?.ok_or(Error::Internal("exhausted".into()))?;
                readiness.push(origin.ready_state());
                let same = cursor.request().map_or(false, |r| r.ptr_eq(&origin));
                if !same {
                    return Err(Error::Internal("cursor moved to a new request".into()));
                }
                keys.push(cursor.key().clone());
            }
            let last = cursor.step()?.await?;
            Ok::<_, Error>((adapters, keys, readiness, last.is_none()))
        })
        .unwrap()
        .unwrap();

    let (adapters, keys, readiness, exhausted) = report;
    assert_eq!(adapters.len(), 3);
    assert!(adapters[0] != adapters[1] && adapters[1] != adapters[2] && adapters[0] != adapters[2]);
    assert_eq!(keys, vec![Key::Int(1), Key::Int(2), Key::Int(3)]);
    assert_eq!(
        readiness,
        vec![
            ReadyState::Pending,
            ReadyState::Done,
            ReadyState::Pending,
            ReadyState::Done
        ]
    );
    assert!(exhausted);
}

#[test]
fn test_cursor_steps_are_deferred_while_waiting() {
    let store = seeded_store();
    let db = Database::new(store.clone());
    let tx = db.transaction(&["books"], TransactionMode::ReadOnly).unwrap();
    let open = tx
        .open_cursor("books", KeyRange::all(), Direction::Prev)
        .unwrap();
    let pause = store.sleep(2);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let deferred_steps = Rc::new(RefCell::new(0));

    let keys = seen.clone();
    let deferred = deferred_steps.clone();
    let completion = tx.extend(async move {
        let mut cursor = open.await?;
        pause.await;
        while let Some(current) = cursor {
            keys.borrow_mut().push(current.key().clone());
            let next = current.step()?;
            if next.request().is_deferred() {
                *deferred.borrow_mut() += 1;
            }
            cursor = next.await?;
        }
        Ok::<_, Error>(())
    });

    store.run_until_idle();
    assert_eq!(settled(&completion), Some(Ok(())));
    assert_eq!(*seen.borrow(), vec![Key::Int(3), Key::Int(2), Key::Int(1)]);
    assert_eq!(*deferred_steps.borrow(), 3);
}

#[test]
fn test_continue_to_and_advance() {
    let store = seeded_store();
    let db = Database::new(store.clone());
    let tx = db.transaction(&["books"], TransactionMode::ReadOnly).unwrap();
    let open = tx
        .open_cursor("books", KeyRange::all(), Direction::Next)
        .unwrap();

    let (jumped, skipped) = store
        .run_until(async move {
            let cursor = open.await?.ok_or(Error::Internal("empty".into()))?;
            let cursor = cursor
                .continue_to(2)?
                .await?
                .ok_or(Error::Internal("exhausted".into()))?;
            let jumped = cursor.value().clone();
            let skipped = cursor.advance(5)?.await?;
            Ok::<_, Error>((jumped, skipped.is_none()))
        })
        .unwrap()
        .unwrap();
    assert_eq!(jumped, json!("Emma"));
    assert!(skipped);
}

#[test]
fn test_zero_advance_is_refused() {
    let store = seeded_store();
    let db = Database::new(store.clone());
    let tx = db.transaction(&["books"], TransactionMode::ReadOnly).unwrap();
    let open = tx
        .open_cursor("books", KeyRange::all(), Direction::Next)
        .unwrap();

    let err = store
        .run_until(async move {
            let cursor = open.await?.ok_or(Error::Internal("empty".into()))?;
            Ok::<_, Error>(cursor.advance(0).map(|_| ()))
        })
        .unwrap()
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, Error::Data(_)));
}
