//! The request scheduler: a bounded priority queue with blocking
//! admission, drained in batches by a single dispatch thread that hands
//! requests to the executor. Higher-priority requests present in the
//! queue at dispatch time always go first; within one priority, admission
//! order is approximated by a sequence number.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, warn};
use parking_lot::{Condvar, Mutex};

use crate::errors::{ErrorCode, Result, VegoError};
use crate::io::executor::Executor;
use crate::io::request::IoRequest;

const DEFAULT_CAPACITY: usize = 1024;
const DISPATCH_BATCH: usize = 32;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { capacity: DEFAULT_CAPACITY }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub submitted: u64,
    pub completed: u64,
    pub errors: u64,
    pub queued: usize,
}

struct PrioEntry {
    request: IoRequest,
    seq: u64,
}

impl PartialEq for PrioEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == CmpOrdering::Equal
    }
}

impl Eq for PrioEntry {}

impl PartialOrd for PrioEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for PrioEntry {
    // BinaryHeap is a max-heap: the greatest entry is the one with the
    // most urgent priority, then the earliest admission.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .request
            .priority()
            .cmp(&self.request.priority())
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct SchedState {
    heap: BinaryHeap<PrioEntry>,
    stopped: bool,
}

struct SchedInner {
    state: Mutex<SchedState>,
    space: Condvar,
    work: Condvar,
    capacity: usize,
    seq: AtomicU64,
    submitted: AtomicU64,
    completed: AtomicU64,
    errors: AtomicU64,
    executor: Arc<Executor>,
}

pub struct Scheduler {
    inner: Arc<SchedInner>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(config: SchedulerConfig, executor: Arc<Executor>) -> Self {
        let inner = Arc::new(SchedInner {
            state: Mutex::new(SchedState { heap: BinaryHeap::new(), stopped: false }),
            space: Condvar::new(),
            work: Condvar::new(),
            capacity: config.capacity.max(1),
            seq: AtomicU64::new(0),
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            executor,
        });
        let dispatcher = {
            let inner = inner.clone();
            std::thread::Builder::new()
                .name("vego-io-dispatch".to_string())
                .spawn(move || dispatch_loop(&inner))
                .expect("spawn dispatch thread")
        };
        Self { inner, dispatcher: Mutex::new(Some(dispatcher)) }
    }

    /// Admit one request, blocking while the queue is full. On a stopped
    /// scheduler the request's callback is resolved with the error too,
    /// so the caller's receiver never dangles.
    pub fn submit(&self, request: IoRequest) -> Result<()> {
        self.admit(request)
    }

    /// Admit a batch. Stops at the first failure.
    pub fn submit_batch(&self, requests: Vec<IoRequest>) -> Result<()> {
        for request in requests {
            self.admit(request)?;
        }
        Ok(())
    }

    fn admit(&self, request: IoRequest) -> Result<()> {
        let mut state = self.inner.state.lock();
        loop {
            if state.stopped {
                drop(state);
                let error = stopped_error();
                request.complete(Err(stopped_error()));
                return Err(error);
            }
            if state.heap.len() < self.inner.capacity {
                let seq = self.inner.seq.fetch_add(1, Ordering::Relaxed);
                state.heap.push(PrioEntry { request, seq });
                self.inner.submitted.fetch_add(1, Ordering::Relaxed);
                self.inner.work.notify_one();
                return Ok(());
            }
            self.inner.space.wait(&mut state);
        }
    }

    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            submitted: self.inner.submitted.load(Ordering::Relaxed),
            completed: self.inner.completed.load(Ordering::Relaxed),
            errors: self.inner.errors.load(Ordering::Relaxed),
            queued: self.inner.state.lock().heap.len(),
        }
    }

    /// Stop admissions, join the dispatch thread, then fail every request
    /// still queued. Idempotent.
    pub fn stop(&self) {
        {
            let mut state = self.inner.state.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
        }
        self.inner.work.notify_all();
        self.inner.space.notify_all();
        if let Some(handle) = self.dispatcher.lock().take() {
            let _ = handle.join();
        }
        let drained: Vec<PrioEntry> = {
            let mut state = self.inner.state.lock();
            state.heap.drain().collect()
        };
        if !drained.is_empty() {
            debug!("scheduler stop drained {} queued requests", drained.len());
        }
        for entry in drained {
            self.inner.errors.fetch_add(1, Ordering::Relaxed);
            entry.request.complete(Err(stopped_error()));
        }
    }
}

fn stopped_error() -> VegoError {
    VegoError::new(ErrorCode::Stopped, "scheduler.submit", "scheduler is stopped")
}

fn dispatch_loop(inner: &SchedInner) {
    loop {
        let batch = {
            let mut state = inner.state.lock();
            while state.heap.is_empty() && !state.stopped {
                inner.work.wait(&mut state);
            }
            if state.stopped {
                // Whatever is left gets drained by stop().
                return;
            }
            let mut batch = Vec::with_capacity(DISPATCH_BATCH);
            for _ in 0..DISPATCH_BATCH {
                match state.heap.pop() {
                    Some(entry) => batch.push(entry),
                    None => break,
                }
            }
            batch
        };
        inner.space.notify_all();

        let mut pending = batch.into_iter();
        let mut handed_off = 0u64;
        while let Some(entry) = pending.next() {
            if let Some(deadline) = entry.request.deadline() {
                if Instant::now() > deadline {
                    inner.errors.fetch_add(1, Ordering::Relaxed);
                    entry.request.complete(Err(VegoError::new(
                        ErrorCode::Timeout,
                        "scheduler.dispatch",
                        "request deadline exceeded",
                    )));
                    continue;
                }
            }
            let seq = entry.seq;
            match inner.executor.submit(entry.request) {
                Ok(()) => handed_off += 1,
                Err(rejected) => {
                    // The executor refused (it is closing). Requeue this
                    // request and the rest of the batch at their original
                    // positions, then back off until something changes.
                    warn!("executor refused a request: {}", rejected.error);
                    let mut state = inner.state.lock();
                    state.heap.push(PrioEntry { request: rejected.request, seq });
                    for rest in pending.by_ref() {
                        state.heap.push(rest);
                    }
                    let _ = inner.work.wait_for(&mut state, Duration::from_millis(10));
                    break;
                }
            }
        }
        inner.completed.fetch_add(handed_off, Ordering::Relaxed);
    }
}
