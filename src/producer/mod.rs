//! Asynchronous production of iterator elements into a bounded queue.
//!
//! A [`Producer`] is the sole owner of a lazy iterator. Consumers never pull
//! from the iterator directly; they request batches with
//! [`Producer::produce`], which returns immediately, and read results from a
//! [`QueueSink`] such as [`BufferedQueue`]. Each request is dispatched as a
//! work unit on the executor the producer was pinned to at construction, so
//! units from overlapping requests run serially in submission order and the
//! source iterator is never pulled concurrently.
//!
//! Completion is reported through the sink exactly once: `done(None)` when
//! the iterator is exhausted before a batch is filled, `done(Some(err))` when
//! a pull fails. After either signal, or after [`Producer::recycle`], further
//! pulling stops.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use crate::error::{Result, TesseraError};
use crate::iterator::BoxLazy;
use crate::pool::ExecutorHandle;

/// Receives produced elements and the terminal completion signal.
pub trait QueueSink<T>: Send + Sync {
    /// Accepts one produced element, blocking if the sink applies
    /// backpressure.
    fn put(&self, item: T);

    /// Signals that production has finished, successfully (`None`) or with a
    /// terminal error. Called at most once per producer.
    fn done(&self, error: Option<TesseraError>);
}

struct QueueState<T> {
    items: VecDeque<T>,
    ended: Option<Option<TesseraError>>,
}

/// A bounded blocking queue bridging a producer thread and a consumer.
///
/// `put` blocks while the queue is at capacity; `take` blocks while it is
/// empty and production has not ended. Elements buffered before `done` are
/// still delivered; the terminal signal is observed only once the buffer
/// drains.
pub struct BufferedQueue<T> {
    capacity: usize,
    state: Mutex<QueueState<T>>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<T> BufferedQueue<T> {
    /// Creates a queue holding at most `capacity` buffered elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> BufferedQueue<T> {
        assert!(capacity > 0, "queue capacity must be positive");
        BufferedQueue {
            capacity,
            state: Mutex::new(QueueState { items: VecDeque::new(), ended: None }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Removes the next element, blocking until one is available or
    /// production ends. `Ok(None)` means clean completion; `Err` surfaces
    /// the producer's terminal failure.
    pub fn take(&self) -> Result<Option<T>> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.items.pop_front() {
                self.not_full.notify_one();
                return Ok(Some(item));
            }
            match &state.ended {
                Some(Some(error)) => return Err(error.clone()),
                Some(None) => return Ok(None),
                None => self.not_empty.wait(&mut state),
            }
        }
    }

    /// Number of currently buffered elements.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether no elements are currently buffered.
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }
}

impl<T: Send> QueueSink<T> for BufferedQueue<T> {
    fn put(&self, item: T) {
        let mut state = self.state.lock();
        while state.items.len() >= self.capacity && state.ended.is_none() {
            self.not_full.wait(&mut state);
        }
        if state.ended.is_some() {
            // The consumer has stopped listening; drop the element.
            return;
        }
        state.items.push_back(item);
        self.not_empty.notify_one();
    }

    fn done(&self, error: Option<TesseraError>) {
        let mut state = self.state.lock();
        if state.ended.is_none() {
            state.ended = Some(error);
        }
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}

/// Pulls elements from a lazy iterator on a pinned executor, in batches.
pub struct Producer<T> {
    iterator: Mutex<BoxLazy<T>>,
    executor: ExecutorHandle,
    done: AtomicBool,
}

impl<T: Send + 'static> Producer<T> {
    /// Takes ownership of `iterator` and pins production to `executor`.
    pub fn new(iterator: BoxLazy<T>, executor: ExecutorHandle) -> Arc<Producer<T>> {
        Arc::new(Producer { iterator: Mutex::new(iterator), executor, done: AtomicBool::new(false) })
    }

    /// Schedules a work unit pulling up to `request` elements into `sink`.
    ///
    /// Returns as soon as the unit is queued. Requests submitted after
    /// completion are accepted and do nothing.
    pub fn produce<Q>(self: &Arc<Self>, sink: Arc<Q>, request: usize) -> Result<()>
    where
        Q: QueueSink<T> + 'static,
    {
        if self.done.load(Ordering::Acquire) {
            return Ok(());
        }
        trace!(request, "scheduling production unit");
        let producer = Arc::clone(self);
        self.executor.execute(move || producer.run(&*sink, request))
    }

    fn run<Q: QueueSink<T> + ?Sized>(&self, sink: &Q, request: usize) {
        for pulled in 0..request {
            // Recycling may race with an in-flight unit; stop at the next
            // pull boundary. The check repeats after every put, which may
            // have blocked on backpressure for a long time.
            if self.done.load(Ordering::Acquire) {
                trace!(pulled, "production unit cancelled");
                return;
            }
            // The iterator lock covers one pull only. It must be released
            // before the element reaches the sink: put blocks while the
            // queue is full, and recycle waits on this same lock.
            let pull = {
                let mut iterator = self.iterator.lock();
                if self.done.load(Ordering::Acquire) {
                    trace!(pulled, "production unit cancelled");
                    return;
                }
                match iterator.has_next() {
                    Ok(true) => iterator.next(),
                    Ok(false) => {
                        debug!(pulled, "source exhausted");
                        self.finish(sink, None);
                        return;
                    }
                    Err(error) => Err(error),
                }
            };
            match pull {
                Ok(item) => sink.put(item),
                Err(error) => {
                    debug!(pulled, %error, "production failed");
                    self.finish(sink, Some(error));
                    return;
                }
            }
        }
    }

    fn finish<Q: QueueSink<T> + ?Sized>(&self, sink: &Q, error: Option<TesseraError>) {
        if self
            .done
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            sink.done(error);
        }
    }

    /// Stops production and recycles the source iterator. Safe to call
    /// concurrently with in-flight work units and more than once; it waits
    /// for at most one in-flight pull, never for a blocked sink.
    pub fn recycle(&self) {
        self.done.store(true, Ordering::Release);
        self.iterator.lock().recycle();
    }
}
