//! Worker pool dispatch, serialization and fault isolation.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use tessera::pool::WorkerPool;
use tessera::TesseraError;

#[test]
fn all_tasks_run_before_shutdown_returns() {
    let mut pool = WorkerPool::new(4, "pool");
    let counter = Arc::new(AtomicU32::new(0));
    for _ in 0..200 {
        let counter = Arc::clone(&counter);
        pool.execute(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }
    pool.shutdown();
    assert_eq!(counter.load(Ordering::SeqCst), 200);
}

#[test]
fn pinned_handle_serializes_in_submission_order() {
    let mut pool = WorkerPool::new(4, "pool");
    let handle = pool.pin();
    let log = Arc::new(Mutex::new(Vec::new()));
    for i in 0..100u32 {
        let log = Arc::clone(&log);
        handle
            .execute(move || {
                // Stagger a little so reordering would show up.
                if i % 10 == 0 {
                    thread::sleep(Duration::from_micros(200));
                }
                log.lock().push(i);
            })
            .unwrap();
    }
    pool.shutdown();
    assert_eq!(*log.lock(), (0..100).collect::<Vec<_>>());
}

#[test]
fn cloned_handles_share_one_executor() {
    let mut pool = WorkerPool::new(4, "pool");
    let handle = pool.pin();
    let clone = handle.clone();
    let (tx, rx) = mpsc::channel();
    for i in 0..10u32 {
        let tx = tx.clone();
        let target = if i % 2 == 0 { &handle } else { &clone };
        target
            .execute(move || {
                tx.send((thread::current().name().map(String::from), i)).unwrap();
            })
            .unwrap();
    }
    pool.shutdown();
    let results: Vec<_> = (0..10).map(|_| rx.recv().unwrap()).collect();
    let first_thread = results[0].0.clone();
    assert!(results.iter().all(|(name, _)| *name == first_thread));
    assert_eq!(results.iter().map(|(_, i)| *i).collect::<Vec<_>>(), (0..10).collect::<Vec<_>>());
}

#[test]
fn panicking_task_does_not_poison_the_executor() {
    let mut pool = WorkerPool::new(1, "pool");
    let counter = Arc::new(AtomicU32::new(0));
    for i in 0..10u32 {
        let counter = Arc::clone(&counter);
        pool.execute(move || {
            if i % 3 == 0 {
                panic!("task {i} failed");
            }
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }
    pool.shutdown();
    // 0, 3, 6, 9 panicked; the other six completed.
    assert_eq!(counter.load(Ordering::SeqCst), 6);
}

#[test]
fn round_robin_spreads_over_all_executors() {
    let mut pool = WorkerPool::new(3, "pool");
    let (tx, rx) = mpsc::channel();
    for _ in 0..9 {
        let tx = tx.clone();
        pool.execute_round_robin(move || {
            tx.send(thread::current().name().map(String::from)).unwrap();
        })
        .unwrap();
    }
    pool.shutdown();
    let mut counts = std::collections::HashMap::new();
    for _ in 0..9 {
        *counts.entry(rx.recv().unwrap()).or_insert(0u32) += 1;
    }
    assert_eq!(counts.len(), 3);
    assert!(counts.values().all(|&c| c == 3));
}

#[test]
fn submissions_after_shutdown_fail() {
    let mut pool = WorkerPool::new(2, "pool");
    let handle = pool.pin();
    pool.shutdown();
    assert!(matches!(pool.execute(|| {}), Err(TesseraError::Interrupted(_))));
    assert!(matches!(
        pool.execute_round_robin(|| {}),
        Err(TesseraError::Interrupted(_))
    ));
    assert!(matches!(handle.execute(|| {}), Err(TesseraError::Interrupted(_))));
}

#[test]
fn named_threads_carry_the_pool_name() {
    let mut pool = WorkerPool::new(1, "edge-expander");
    let (tx, rx) = mpsc::channel();
    pool.execute(move || {
        tx.send(thread::current().name().map(String::from)).unwrap();
    })
    .unwrap();
    pool.shutdown();
    assert_eq!(rx.recv().unwrap().as_deref(), Some("edge-expander-0"));
}
