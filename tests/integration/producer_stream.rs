//! Producer and bounded-queue streaming across real pool threads.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Once};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use tessera::iterator::{iter, Lazy};
use tessera::pool::WorkerPool;
use tessera::producer::{BufferedQueue, Producer, QueueSink};
use tessera::{Result, TesseraError};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("tessera::producer=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init();
    });
}

#[test]
fn three_threes_then_five_delivers_ten_and_one_done() {
    init_tracing();
    let mut pool = WorkerPool::new(4, "stream");
    let producer = Producer::new(iter((0..10u32).collect::<Vec<_>>()).boxed(), pool.pin());
    let queue = Arc::new(BufferedQueue::new(16));

    for _ in 0..3 {
        producer.produce(Arc::clone(&queue), 3).unwrap();
    }
    producer.produce(Arc::clone(&queue), 5).unwrap();

    let mut received = Vec::new();
    while let Some(item) = queue.take().unwrap() {
        received.push(item);
    }
    assert_eq!(received, (0..10).collect::<Vec<_>>());
    // A drained queue keeps reporting completion.
    assert_eq!(queue.take().unwrap(), None);
    pool.shutdown();
}

#[test]
fn consumer_sees_elements_before_production_finishes() {
    let mut pool = WorkerPool::new(1, "stream");
    // Capacity 1 forces the producer to block until the consumer takes.
    let queue = Arc::new(BufferedQueue::new(1));
    let producer = Producer::new(iter(vec![1u32, 2, 3, 4]).boxed(), pool.pin());
    // Over-request by one so the unit observes exhaustion and signals done.
    producer.produce(Arc::clone(&queue), 5).unwrap();

    let mut received = Vec::new();
    while let Some(item) = queue.take().unwrap() {
        received.push(item);
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(received, vec![1, 2, 3, 4]);
    pool.shutdown();
}

struct Failing {
    remaining: u32,
}

impl Lazy<u32> for Failing {
    fn has_next(&mut self) -> Result<bool> {
        if self.remaining == 0 {
            Err(TesseraError::Storage("backing scan lost".into()))
        } else {
            Ok(true)
        }
    }

    fn next(&mut self) -> Result<u32> {
        if self.remaining == 0 {
            Err(TesseraError::Storage("backing scan lost".into()))
        } else {
            self.remaining -= 1;
            Ok(self.remaining)
        }
    }

    fn recycle(&mut self) {
        self.remaining = 0;
    }
}

#[test]
fn pull_failure_reaches_the_consumer_once() {
    let mut pool = WorkerPool::new(1, "stream");
    let producer = Producer::new(Box::new(Failing { remaining: 2 }), pool.pin());
    let queue = Arc::new(BufferedQueue::new(8));
    producer.produce(Arc::clone(&queue), 10).unwrap();

    assert!(queue.take().unwrap().is_some());
    assert!(queue.take().unwrap().is_some());
    assert!(matches!(queue.take(), Err(TesseraError::Storage(_))));
    // The terminal error is sticky.
    assert!(matches!(queue.take(), Err(TesseraError::Storage(_))));
    pool.shutdown();
}

struct DoneCounter {
    items: Mutex<Vec<u32>>,
    done_calls: AtomicU32,
}

impl QueueSink<u32> for DoneCounter {
    fn put(&self, item: u32) {
        self.items.lock().push(item);
    }

    fn done(&self, _error: Option<TesseraError>) {
        self.done_calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn done_fires_once_under_produce_and_recycle_races() {
    init_tracing();
    for _ in 0..50 {
        let mut pool = WorkerPool::new(2, "stream");
        let producer =
            Producer::new(iter((0..1000u32).collect::<Vec<_>>()).boxed(), pool.pin());
        let sink = Arc::new(DoneCounter {
            items: Mutex::new(Vec::new()),
            done_calls: AtomicU32::new(0),
        });

        for _ in 0..4 {
            producer.produce(Arc::clone(&sink), 300).unwrap();
        }
        let racer = Arc::clone(&producer);
        let recycler = thread::spawn(move || racer.recycle());
        recycler.join().unwrap();
        pool.shutdown();

        assert!(sink.done_calls.load(Ordering::SeqCst) <= 1);
        let items = sink.items.lock();
        // Whatever was produced before cancellation arrived in order.
        assert!(items.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn requests_after_completion_are_no_ops() {
    let mut pool = WorkerPool::new(1, "stream");
    let producer = Producer::new(iter(vec![1u32]).boxed(), pool.pin());
    let sink = Arc::new(DoneCounter {
        items: Mutex::new(Vec::new()),
        done_calls: AtomicU32::new(0),
    });
    producer.produce(Arc::clone(&sink), 5).unwrap();
    // Wait for the first unit to finish, then request again.
    while sink.done_calls.load(Ordering::SeqCst) == 0 {
        thread::sleep(Duration::from_millis(1));
    }
    producer.produce(Arc::clone(&sink), 5).unwrap();
    pool.shutdown();
    assert_eq!(*sink.items.lock(), vec![1]);
    assert_eq!(sink.done_calls.load(Ordering::SeqCst), 1);
}
