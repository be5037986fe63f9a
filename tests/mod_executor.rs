use std::sync::Arc;

use vego::errors::ErrorCode;
use vego::io::{Executor, ExecutorConfig, FilePool, IoRequest, RequestOptions};

fn pool_with(dir: &tempfile::TempDir, id: &str, len: usize) -> Arc<FilePool> {
    let path = dir.path().join(format!("{id}.bin"));
    std::fs::write(&path, vec![0x5A; len]).unwrap();
    let pool = Arc::new(FilePool::new());
    pool.register(id, &path).unwrap();
    pool
}

#[tokio::test]
async fn unregistered_files_fail_the_request() {
    let pool = Arc::new(FilePool::new());
    let executor = Executor::new(ExecutorConfig::default(), pool);

    let (request, callback) = IoRequest::read("ghost", 0, 16, RequestOptions::default());
    executor.submit(request).unwrap();
    let err = callback.await.unwrap().unwrap_err();
    assert_eq!(err.code(), ErrorCode::FileNotRegistered);
    executor.close();
}

#[tokio::test]
async fn submit_async_reports_a_full_queue() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool_with(&dir, "f", 4096);
    // One slow lane: a single worker and a single queue slot.
    let executor = Executor::new(ExecutorConfig { workers: 1, queue_capacity: 1 }, pool);

    // Big writes occupy the worker and the queue slot long enough for the
    // next submission to see a full queue.
    let mut callbacks = Vec::new();
    let mut saw_queue_full = false;
    for _ in 0..64 {
        let (request, callback) =
            IoRequest::write("f", 0, vec![0u8; 8 * 1024 * 1024], RequestOptions::default());
        match executor.submit_async(request) {
            Ok(()) => callbacks.push(callback),
            Err(rejected) => {
                assert_eq!(rejected.error.code(), ErrorCode::QueueFull);
                saw_queue_full = true;
                break;
            }
        }
    }
    assert!(saw_queue_full, "a 1-deep queue should have filled");
    for callback in callbacks {
        callback.await.unwrap().unwrap();
    }
    executor.close();
}

#[test]
fn close_is_idempotent_and_rejects_new_work() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool_with(&dir, "f", 128);
    let executor = Executor::new(ExecutorConfig::default(), pool);
    executor.close();
    executor.close();

    let (request, mut callback) = IoRequest::read("f", 0, 16, RequestOptions::default());
    let rejected = executor.submit(request).unwrap_err();
    assert_eq!(rejected.error.code(), ErrorCode::Stopped);
    // The request came back unresolved; its callback is still pending.
    assert!(callback.try_recv().is_err());
}

#[tokio::test]
async fn queued_gauge_drains_to_zero() {
    let dir = tempfile::tempdir().unwrap();
    let pool = pool_with(&dir, "f", 64 * 1024);
    let executor = Executor::new(ExecutorConfig::default(), pool);

    let mut callbacks = Vec::new();
    for i in 0..32u64 {
        let (request, callback) = IoRequest::read("f", i * 128, 128, RequestOptions::default());
        executor.submit(request).unwrap();
        callbacks.push(callback);
    }
    for callback in callbacks {
        callback.await.unwrap().unwrap();
    }
    assert_eq!(executor.queued(), 0);
    executor.close();
}
