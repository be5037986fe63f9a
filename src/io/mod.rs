//! Asynchronous I/O substrate: a priority scheduler feeding a worker-pool
//! executor over a pooled file registry, fronted by the [`AsyncIo`]
//! facade.

pub mod executor;
pub mod file_pool;
pub mod request;
pub mod scheduler;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::debug;

use crate::errors::{ErrorCode, Result, VegoError};

pub use executor::{Executor, ExecutorConfig, SubmitRejected};
pub use file_pool::{FilePool, FilePoolStats, PooledFile};
pub use request::{Callback, CancelToken, IoCompletion, IoRequest, Priority, RequestOptions};
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerStats};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default)]
pub struct AsyncIoConfig {
    pub executor: ExecutorConfig,
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsyncIoStats {
    pub scheduler: SchedulerStats,
    pub pool: FilePoolStats,
    pub executor_queued: u64,
}

/// Facade over scheduler + executor + file pool. Safe to share across
/// threads; all operations hand back one-shot callbacks.
pub struct AsyncIo {
    pool: Arc<FilePool>,
    executor: Arc<Executor>,
    scheduler: Scheduler,
    closed: AtomicBool,
}

impl Default for AsyncIo {
    fn default() -> Self {
        Self::new()
    }
}

impl AsyncIo {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(AsyncIoConfig::default())
    }

    #[must_use]
    pub fn with_config(config: AsyncIoConfig) -> Self {
        let pool = Arc::new(FilePool::new());
        let executor = Arc::new(Executor::new(config.executor, pool.clone()));
        let scheduler = Scheduler::new(config.scheduler, executor.clone());
        Self { pool, executor, scheduler, closed: AtomicBool::new(false) }
    }

    pub fn register_file(&self, file_id: &str, path: &Path) -> Result<()> {
        if self.is_closed() {
            return Err(closed_error());
        }
        self.pool.register(file_id, path)
    }

    /// Read `size` bytes at `offset`, at normal priority.
    pub fn read(&self, file_id: &str, offset: u64, size: usize) -> Callback {
        self.read_with(file_id, offset, size, RequestOptions::default())
    }

    pub fn read_with(&self, file_id: &str, offset: u64, size: usize, opts: RequestOptions) -> Callback {
        let (request, callback) = IoRequest::read(file_id, offset, size, opts);
        self.dispatch(request);
        callback
    }

    /// Batch read: one request per offset, all of `size` bytes.
    pub fn read_pages(&self, file_id: &str, offsets: &[u64], size: usize) -> Vec<Callback> {
        let mut requests = Vec::with_capacity(offsets.len());
        let mut callbacks = Vec::with_capacity(offsets.len());
        for &offset in offsets {
            let (request, callback) = IoRequest::read(file_id, offset, size, RequestOptions::default());
            requests.push(request);
            callbacks.push(callback);
        }
        if self.is_closed() {
            for request in requests {
                request.complete(Err(closed_error()));
            }
        } else {
            // On a stopped scheduler the rejected requests were already
            // resolved with errors; nothing more to do here.
            let _ = self.scheduler.submit_batch(requests);
        }
        callbacks
    }

    pub fn write(&self, file_id: &str, offset: u64, data: Vec<u8>) -> Callback {
        self.write_with(file_id, offset, data, RequestOptions::default())
    }

    pub fn write_with(&self, file_id: &str, offset: u64, data: Vec<u8>, opts: RequestOptions) -> Callback {
        let (request, callback) = IoRequest::write(file_id, offset, data, opts);
        self.dispatch(request);
        callback
    }

    fn dispatch(&self, request: IoRequest) {
        if self.is_closed() {
            request.complete(Err(closed_error()));
            return;
        }
        let _ = self.scheduler.submit(request);
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn stats(&self) -> AsyncIoStats {
        AsyncIoStats {
            scheduler: self.scheduler.stats(),
            pool: self.pool.stats(),
            executor_queued: self.executor.queued(),
        }
    }

    /// Shut down in order: stop the scheduler, wait for the executor
    /// (bounded), close the file pool. Idempotent; once closed, every
    /// operation resolves its callback with a `Stopped` error.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        debug!("asyncio closing");
        self.scheduler.stop();
        let executor_result = self.executor.close_timeout(CLOSE_TIMEOUT);
        let pool_result = self.pool.close();
        executor_result.and(pool_result)
    }
}

fn closed_error() -> VegoError {
    VegoError::new(ErrorCode::Stopped, "asyncio", "asyncio is closed")
}
