//! Request and completion types for the asynchronous I/O substrate.
//!
//! Every request carries a one-shot completion channel written exactly
//! once, by the executor or by the scheduler on timeout/stop. Consumers
//! must take the result exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use tokio::sync::oneshot;

use crate::errors::Result;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Process-wide monotonic request ids. Not persisted anywhere.
#[must_use]
pub fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

/// Service order: lower value is served earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    High = 0,
    #[default]
    Normal = 1,
    Low = 2,
}

/// Cloneable cancellation handle checked by the executor before I/O.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-request knobs for the facade.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub priority: Priority,
    pub deadline: Option<Instant>,
    pub cancel: Option<CancelToken>,
}

#[derive(Debug)]
pub enum IoOp {
    Read { offset: u64, size: usize },
    Write { offset: u64, data: Vec<u8> },
}

/// A resolved request: the bytes read (owned, never a pooled buffer) or
/// the byte count written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IoCompletion {
    pub request_id: u64,
    pub data: Vec<u8>,
    pub bytes: usize,
}

/// The receiving half of a request's completion channel.
pub type Callback = oneshot::Receiver<Result<IoCompletion>>;

#[derive(Debug)]
pub struct IoRequest {
    id: u64,
    file_id: String,
    pub(crate) op: IoOp,
    priority: Priority,
    deadline: Option<Instant>,
    cancel: CancelToken,
    done: Option<oneshot::Sender<Result<IoCompletion>>>,
}

impl IoRequest {
    #[must_use]
    pub fn read(file_id: impl Into<String>, offset: u64, size: usize, opts: RequestOptions) -> (Self, Callback) {
        Self::build(file_id, IoOp::Read { offset, size }, opts)
    }

    #[must_use]
    pub fn write(file_id: impl Into<String>, offset: u64, data: Vec<u8>, opts: RequestOptions) -> (Self, Callback) {
        Self::build(file_id, IoOp::Write { offset, data }, opts)
    }

    fn build(file_id: impl Into<String>, op: IoOp, opts: RequestOptions) -> (Self, Callback) {
        let (tx, rx) = oneshot::channel();
        let request = Self {
            id: next_request_id(),
            file_id: file_id.into(),
            op,
            priority: opts.priority,
            deadline: opts.deadline,
            cancel: opts.cancel.unwrap_or_default(),
            done: Some(tx),
        };
        (request, rx)
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Deliver the result. The send can only fail if the caller dropped
    /// the callback, which is their way of saying they stopped caring.
    pub(crate) fn complete(mut self, result: Result<IoCompletion>) {
        if let Some(tx) = self.done.take() {
            let _ = tx.send(result);
        }
    }
}
