//! Transaction ordering and abort behaviour.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use domains::{BoardPatch, ValidationError};
use integration_tests::{drain, memory_engine, names};
use services::{CoreError, CoreErrorKind, CoreEvent};

#[tokio::test]
async fn transactions_run_one_at_a_time_in_arrival_order() {
    let engine = memory_engine().await;
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for i in 0..4 {
        let engine = engine.clone();
        let log = log.clone();
        handles.push(tokio::spawn(async move {
            engine
                .transaction(|| async {
                    log.lock().unwrap().push(format!("start {i}"));
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    engine.create_board(BoardPatch::named(format!("tx{i}"))).await?;
                    log.lock().unwrap().push(format!("end {i}"));
                    Ok::<_, CoreError>(())
                })
                .await
        }));
        tokio::task::yield_now().await;
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let log = log.lock().unwrap().clone();
    let expected: Vec<String> =
        (0..4).flat_map(|i| [format!("start {i}"), format!("end {i}")]).collect();
    assert_eq!(log, expected);
    assert_eq!(names(&engine.all_boards()), vec!["tx0", "tx1", "tx2", "tx3"]);
}

#[tokio::test]
async fn failure_aborts_queued_transactions_only() {
    let engine = memory_engine().await;
    let (release, hold) = tokio::sync::oneshot::channel::<()>();

    let first = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .transaction(|| async {
                    engine.create_board(BoardPatch::named("kept")).await?;
                    let _ = hold.await;
                    Err::<(), _>(CoreError::from(ValidationError::single("board", "name", "rejected")))
                })
                .await
        })
    };
    // Let the first transaction take the gate.
    while engine.all_boards().is_empty() {
        tokio::task::yield_now().await;
    }

    let queued = {
        let engine = engine.clone();
        tokio::spawn(async move {
            engine
                .transaction(|| async {
                    engine.create_board(BoardPatch::named("never")).await?;
                    Ok::<_, CoreError>(())
                })
                .await
        })
    };
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }

    let mut rx = engine.subscribe();
    release.send(()).unwrap();

    assert!(first.await.unwrap().unwrap_err().is_validation());
    assert!(matches!(queued.await.unwrap(), Err(CoreError::TransactionAborted)));

    // Work done before the failure is not rolled back.
    assert_eq!(names(&engine.all_boards()), vec!["kept"]);

    let failures = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, CoreEvent::CoreError { kind: CoreErrorKind::TransactionFailed, .. }))
        .count();
    assert_eq!(failures, 2);

    // Later transactions run normally.
    engine
        .transaction(|| async {
            engine.create_board(BoardPatch::named("after")).await?;
            Ok::<_, CoreError>(())
        })
        .await
        .unwrap();
    assert_eq!(names(&engine.all_boards()), vec!["kept", "after"]);
}
