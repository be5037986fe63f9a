//! The I/O executor: a bounded FIFO request queue feeding a pool of worker
//! threads that perform positional reads and writes against pooled files.
//! Read results are always freshly owned bytes; the pooled 64 KiB slabs
//! never leave the executor.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::{debug, warn};
use parking_lot::{Condvar, Mutex};

use crate::errors::{ErrorCode, Result, VegoError};
use crate::io::file_pool::{FilePool, read_full_at, write_all_at};
use crate::io::request::{IoCompletion, IoOp, IoRequest};

pub(crate) const READ_BUFFER_SIZE: usize = 64 * 1024;
const MAX_POOLED_BUFFERS: usize = 32;

const DEFAULT_WORKERS: usize = 4;
const DEFAULT_QUEUE_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { workers: DEFAULT_WORKERS, queue_capacity: DEFAULT_QUEUE_CAPACITY }
    }
}

/// A request the executor would not take, handed back to the caller along
/// with the reason.
#[derive(Debug)]
pub struct SubmitRejected {
    pub request: IoRequest,
    pub error: VegoError,
}

struct ExecQueue {
    deque: VecDeque<IoRequest>,
    closed: bool,
}

/// Pool of fixed-size read slabs. Requests larger than one slab allocate
/// directly and are never pooled.
#[derive(Default)]
struct BufferPool {
    slabs: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    fn take(&self, size: usize) -> Vec<u8> {
        if size <= READ_BUFFER_SIZE {
            self.slabs.lock().pop().unwrap_or_else(|| vec![0u8; READ_BUFFER_SIZE])
        } else {
            vec![0u8; size]
        }
    }

    fn put(&self, buf: Vec<u8>) {
        if buf.len() == READ_BUFFER_SIZE {
            let mut slabs = self.slabs.lock();
            if slabs.len() < MAX_POOLED_BUFFERS {
                slabs.push(buf);
            }
        }
    }
}

struct ExecInner {
    queue: Mutex<ExecQueue>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    pool: Arc<FilePool>,
    buffers: BufferPool,
    queued: AtomicU64,
    alive: Mutex<usize>,
    all_done: Condvar,
}

pub struct Executor {
    inner: Arc<ExecInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Executor {
    #[must_use]
    pub fn new(config: ExecutorConfig, pool: Arc<FilePool>) -> Self {
        let workers = config.workers.max(1);
        let capacity = config.queue_capacity.max(1);
        let inner = Arc::new(ExecInner {
            queue: Mutex::new(ExecQueue { deque: VecDeque::with_capacity(capacity.min(1024)), closed: false }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            pool,
            buffers: BufferPool::default(),
            queued: AtomicU64::new(0),
            alive: Mutex::new(workers),
            all_done: Condvar::new(),
        });
        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let inner = inner.clone();
            let handle = std::thread::Builder::new()
                .name(format!("vego-io-{i}"))
                .spawn(move || worker_loop(&inner))
                .expect("spawn io worker");
            handles.push(handle);
        }
        Self { inner, workers: Mutex::new(handles) }
    }

    /// Enqueue a request, blocking while the queue is full. Fails only
    /// once the executor is closed.
    pub fn submit(&self, request: IoRequest) -> std::result::Result<(), SubmitRejected> {
        let mut queue = self.inner.queue.lock();
        loop {
            if queue.closed {
                return Err(SubmitRejected {
                    request,
                    error: VegoError::new(ErrorCode::Stopped, "executor.submit", "executor is closed"),
                });
            }
            if queue.deque.len() < self.inner.capacity {
                queue.deque.push_back(request);
                self.inner.queued.fetch_add(1, Ordering::Relaxed);
                self.inner.not_empty.notify_one();
                return Ok(());
            }
            self.inner.not_full.wait(&mut queue);
        }
    }

    /// Enqueue without blocking; a full queue is reported instead of
    /// waited out.
    pub fn submit_async(&self, request: IoRequest) -> std::result::Result<(), SubmitRejected> {
        let mut queue = self.inner.queue.lock();
        if queue.closed {
            return Err(SubmitRejected {
                request,
                error: VegoError::new(ErrorCode::Stopped, "executor.submit", "executor is closed"),
            });
        }
        if queue.deque.len() >= self.inner.capacity {
            return Err(SubmitRejected {
                request,
                error: VegoError::new(ErrorCode::QueueFull, "executor.submit", "request queue is full")
                    .with_context("capacity", self.inner.capacity.to_string()),
            });
        }
        queue.deque.push_back(request);
        self.inner.queued.fetch_add(1, Ordering::Relaxed);
        self.inner.not_empty.notify_one();
        Ok(())
    }

    /// Requests currently waiting in the queue.
    #[must_use]
    pub fn queued(&self) -> u64 {
        self.inner.queued.load(Ordering::Relaxed)
    }

    /// Close the queue and wait for the workers to drain it. Idempotent.
    pub fn close(&self) {
        self.signal_close();
        let mut handles = self.workers.lock();
        for handle in handles.drain(..) {
            let _ = handle.join();
        }
    }

    /// Close and wait at most `timeout` for the workers to finish. On
    /// timeout the workers are left to drain in the background.
    pub fn close_timeout(&self, timeout: Duration) -> Result<()> {
        self.signal_close();
        let deadline = Instant::now() + timeout;
        let mut alive = self.inner.alive.lock();
        while *alive > 0 {
            if self.inner.all_done.wait_until(&mut alive, deadline).timed_out() {
                warn!("executor close timed out with {} workers still running", *alive);
                return Err(VegoError::new(
                    ErrorCode::Timeout,
                    "executor.close",
                    "timed out waiting for workers",
                )
                .with_context("workers", alive.to_string()));
            }
        }
        drop(alive);
        let mut handles = self.workers.lock();
        for handle in handles.drain(..) {
            let _ = handle.join();
        }
        Ok(())
    }

    fn signal_close(&self) {
        let mut queue = self.inner.queue.lock();
        if !queue.closed {
            queue.closed = true;
            debug!("executor closing with {} queued requests", queue.deque.len());
        }
        self.inner.not_empty.notify_all();
        self.inner.not_full.notify_all();
    }
}

fn worker_loop(inner: &ExecInner) {
    loop {
        let request = {
            let mut queue = inner.queue.lock();
            loop {
                if let Some(request) = queue.deque.pop_front() {
                    inner.not_full.notify_one();
                    break request;
                }
                if queue.closed {
                    drop(queue);
                    let mut alive = inner.alive.lock();
                    *alive -= 1;
                    inner.all_done.notify_all();
                    return;
                }
                inner.not_empty.wait(&mut queue);
            }
        };
        let _ = inner.queued.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
        execute(inner, request);
    }
}

fn execute(inner: &ExecInner, request: IoRequest) {
    if request.cancel_token().is_canceled() {
        request.complete(Err(VegoError::new(
            ErrorCode::Canceled,
            "executor.execute",
            "request canceled before execution",
        )));
        return;
    }
    let file_id = request.file_id().to_string();
    let file = match inner.pool.get(&file_id) {
        Ok(file) => file,
        Err(e) => {
            request.complete(Err(e));
            return;
        }
    };
    let request_id = request.id();
    let outcome = match &request.op {
        IoOp::Read { offset, size } => {
            let (offset, size) = (*offset, *size);
            let mut buf = inner.buffers.take(size);
            let result = read_full_at(file.file(), &mut buf[..size], offset);
            let outcome = match result {
                Err(e) => Err(VegoError::io("executor.read", e)
                    .with_context("file_id", file_id.as_str())
                    .with_context("offset", offset.to_string())),
                Ok(0) if size > 0 => Err(VegoError::new(
                    ErrorCode::Io,
                    "executor.read",
                    "read beyond file end",
                )
                .with_context("file_id", file_id.as_str())
                .with_context("offset", offset.to_string())),
                // A short read near the file tail returns what was there.
                Ok(n) => Ok(IoCompletion { request_id, data: buf[..n].to_vec(), bytes: n }),
            };
            inner.buffers.put(buf);
            outcome
        }
        IoOp::Write { offset, data } => match write_all_at(file.file(), data, *offset) {
            Ok(()) => Ok(IoCompletion { request_id, data: Vec::new(), bytes: data.len() }),
            Err(e) => Err(VegoError::io("executor.write", e)
                .with_context("file_id", file_id.as_str())
                .with_context("offset", offset.to_string())),
        },
    };
    inner.pool.put(&file_id);
    request.complete(outcome);
}
