//! A fixed pool of single-threaded executors.
//!
//! Each executor owns one OS thread and a FIFO task queue, so two tasks
//! submitted to the same executor never run concurrently and run in
//! submission order. That per-executor serialization is what the producer
//! layer relies on to chain continuations without extra locking: it pins
//! itself to one executor and submits every continuation there.
//!
//! Pool-level dispatch offers two placement policies: least-loaded (scan
//! queue depths, ties broken by the lowest index) and round-robin (an atomic
//! cursor). A panicking task is caught and logged; the worker thread
//! survives and keeps draining its queue.

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{Builder, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::error;

use crate::error::{Result, TesseraError};

type Task = Box<dyn FnOnce() + Send + 'static>;

struct ExecutorState {
    tasks: VecDeque<Task>,
    shutdown: bool,
}

struct ExecutorShared {
    state: Mutex<ExecutorState>,
    signal: Condvar,
}

impl ExecutorShared {
    fn submit(&self, task: Task) -> Result<()> {
        let mut state = self.state.lock();
        if state.shutdown {
            return Err(TesseraError::Interrupted("worker pool is shut down"));
        }
        state.tasks.push_back(task);
        self.signal.notify_one();
        Ok(())
    }

    fn load(&self) -> usize {
        self.state.lock().tasks.len()
    }

    fn run(&self) {
        loop {
            let task = {
                let mut state = self.state.lock();
                loop {
                    if let Some(task) = state.tasks.pop_front() {
                        break task;
                    }
                    if state.shutdown {
                        return;
                    }
                    self.signal.wait(&mut state);
                }
            };
            if catch_unwind(AssertUnwindSafe(task)).is_err() {
                error!("worker task panicked; executor continues");
            }
        }
    }
}

struct Executor {
    shared: Arc<ExecutorShared>,
    thread: Option<JoinHandle<()>>,
}

/// A handle pinned to one executor of a [`WorkerPool`].
///
/// Tasks submitted through a clone of the same handle run serially, in
/// submission order, on the executor's thread.
#[derive(Clone)]
pub struct ExecutorHandle {
    shared: Arc<ExecutorShared>,
}

impl ExecutorHandle {
    /// Submits a task to the pinned executor.
    pub fn execute<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.submit(Box::new(task))
    }
}

/// A fixed set of single-threaded executors with shared dispatch policies.
pub struct WorkerPool {
    executors: Vec<Executor>,
    cursor: AtomicUsize,
}

impl WorkerPool {
    /// Spawns `size` executor threads named `{name}-{index}`.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero or a thread cannot be spawned.
    pub fn new(size: usize, name: &str) -> WorkerPool {
        assert!(size > 0, "worker pool requires at least one executor");
        let executors = (0..size)
            .map(|index| {
                let shared = Arc::new(ExecutorShared {
                    state: Mutex::new(ExecutorState { tasks: VecDeque::new(), shutdown: false }),
                    signal: Condvar::new(),
                });
                let worker = Arc::clone(&shared);
                let thread = Builder::new()
                    .name(format!("{name}-{index}"))
                    .spawn(move || worker.run())
                    .unwrap_or_else(|e| panic!("failed to spawn worker thread: {e}"));
                Executor { shared, thread: Some(thread) }
            })
            .collect();
        WorkerPool { executors, cursor: AtomicUsize::new(0) }
    }

    /// Number of executors.
    pub fn size(&self) -> usize {
        self.executors.len()
    }

    /// Submits a task to the least-loaded executor, breaking ties by the
    /// lowest index.
    pub fn execute<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut best = 0;
        let mut best_load = usize::MAX;
        for (index, executor) in self.executors.iter().enumerate() {
            let load = executor.shared.load();
            if load < best_load {
                best = index;
                best_load = load;
            }
        }
        self.executors[best].shared.submit(Box::new(task))
    }

    /// Submits a task to the next executor in round-robin order.
    pub fn execute_round_robin<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.executors.len();
        self.executors[index].shared.submit(Box::new(task))
    }

    /// Pins to the least-loaded executor and returns its handle.
    pub fn pin(&self) -> ExecutorHandle {
        let mut best = 0;
        let mut best_load = usize::MAX;
        for (index, executor) in self.executors.iter().enumerate() {
            let load = executor.shared.load();
            if load < best_load {
                best = index;
                best_load = load;
            }
        }
        ExecutorHandle { shared: Arc::clone(&self.executors[best].shared) }
    }

    /// Signals every executor to stop after draining its queue and joins
    /// the worker threads. Later submissions fail with `Interrupted`.
    pub fn shutdown(&mut self) {
        for executor in &self.executors {
            let mut state = executor.shared.state.lock();
            state.shutdown = true;
            executor.shared.signal.notify_all();
        }
        for executor in &mut self.executors {
            if let Some(thread) = executor.thread.take() {
                if thread.join().is_err() {
                    error!("worker thread terminated abnormally");
                }
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
