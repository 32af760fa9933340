//! Deferred replay behaves like direct execution

use crate::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Step {
    Put(i64, u8),
    Add(i64, u8),
    Delete(i64),
    Get(i64),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0i64..5, any::<u8>()).prop_map(|(k, v)| Step::Put(k, v)),
        (0i64..5, any::<u8>()).prop_map(|(k, v)| Step::Add(k, v)),
        (0i64..5).prop_map(Step::Delete),
        (0i64..5).prop_map(Step::Get),
    ]
}

/// Run `steps` in one transaction, deferred behind an extension or not
///
/// Returns each step's outcome (`None` for writes, the read value for gets,
/// `Err` text for failures) and the committed contents.
fn run(steps: &[Step], deferred: bool) -> (Vec<std::result::Result<Option<Value>, String>>, Vec<(Key, Value)>) {
    let store = store();
    let db = Database::new(store.clone());
    let tx = db.transaction(&["books"], TransactionMode::ReadWrite).unwrap();
    if deferred {
        let wait = store.sleep(1);
        tx.extend(async move {
            wait.await;
            Ok::<_, Error>(())
        });
    }

    let books = tx.object_store("books").unwrap();
    let mut pending: Vec<futures::future::LocalBoxFuture<'static, Result<Option<Value>>>> =
        Vec::new();
    for step in steps {
        use futures::FutureExt;
        let fut = match step {
            Step::Put(k, v) => books.put(*k, json!(v)).unwrap().map(|r| r.map(|_| None)).boxed_local(),
            Step::Add(k, v) => books.add(*k, json!(v)).unwrap().map(|r| r.map(|_| None)).boxed_local(),
            Step::Delete(k) => books.delete(*k).unwrap().map(|r| r.map(|_| None)).boxed_local(),
            Step::Get(k) => books.get(*k).unwrap().boxed_local(),
        };
        pending.push(fut);
    }
    assert_eq!(tx.deferred_len(), if deferred { steps.len() } else { 0 });

    let outcomes = store
        .run_until(async move {
            let mut outcomes = Vec::new();
            for fut in pending {
                outcomes.push(fut.await.map_err(|e| e.to_string()));
            }
            outcomes
        })
        .unwrap();
    (outcomes, store.entries("books"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_deferred_replay_matches_direct(steps in prop::collection::vec(step_strategy(), 1..24)) {
        let direct = run(&steps, false);
        let replayed = run(&steps, true);
        prop_assert_eq!(&direct.0, &replayed.0);
        prop_assert_eq!(&direct.1, &replayed.1);
    }
}
