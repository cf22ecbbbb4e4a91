//! C3 — bounded worker pool.
//!
//! Runs the (CPU-ish, pure) race transform on a fixed set of OS threads so
//! the async runtime's own worker threads stay free for I/O. Modeled on the
//! staged-pipeline fan-out in `mmoldb-ingest` and the `crossbeam` dependency
//! already established for betting-system code in this pack
//! (`cooprefr-bettersys`), generalized into a small general-purpose pool
//! rather than a one-off staged pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::error::PoolClosedError;

/// A task takes `true` when the pool rejected it (closed before it could
/// run) and `false` when it should actually execute.
type Task = Box<dyn FnOnce(bool) + Send>;

pub struct WorkerPool {
    sender: Mutex<Option<Sender<Task>>>,
    /// Kept around purely so `shutdown` can drain anything still queued
    /// (not yet claimed by a worker thread) and reject it explicitly,
    /// rather than letting it silently run after shutdown was requested.
    receiver: Receiver<Task>,
    closed: Arc<AtomicBool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `size` worker threads sharing one MPMC task queue.
    pub fn new(size: usize) -> Arc<Self> {
        let size = size.max(1);
        let (sender, receiver): (Sender<Task>, Receiver<Task>) = crossbeam_channel::unbounded();

        let pool = Arc::new(Self {
            sender: Mutex::new(Some(sender)),
            receiver,
            closed: Arc::new(AtomicBool::new(false)),
            handles: Mutex::new(Vec::with_capacity(size)),
        });

        let mut handles = Vec::with_capacity(size);
        for worker_id in 0..size {
            let receiver = pool.receiver.clone();
            let handle = std::thread::Builder::new()
                .name(format!("raceday-transform-{worker_id}"))
                .spawn(move || {
                    // An exception inside a worker must only fail its own
                    // submitting task; catch_unwind keeps the worker alive
                    // and returned healthy to the pool (spec.md §4.3).
                    while let Ok(task) = receiver.recv() {
                        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| task(false)));
                    }
                })
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }
        *pool.handles.lock().unwrap() = handles;

        pool
    }

    /// Submit a CPU-bound closure; resolves with its result, or
    /// `PoolClosedError::Closed` if the pool is shutting down or has shut
    /// down, or `PoolClosedError::TaskPanicked` if the closure itself
    /// panicked (the worker thread survives; only this submission fails).
    pub async fn exec<F, T>(&self, f: F) -> Result<T, PoolClosedError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PoolClosedError::Closed);
        }

        let (tx, rx) = tokio::sync::oneshot::channel::<Result<T, PoolClosedError>>();
        let task: Task = Box::new(move |rejected| {
            let result = if rejected { Err(PoolClosedError::Closed) } else { Ok(f()) };
            let _ = tx.send(result);
        });

        let sent = {
            let guard = self.sender.lock().unwrap();
            match &*guard {
                Some(sender) => sender.send(task).is_ok(),
                None => false,
            }
        };

        if !sent {
            return Err(PoolClosedError::Closed);
        }

        // The sender is only dropped without sending when `catch_unwind`
        // caught a panic inside the task (worker_pool.rs's worker loop);
        // a clean shutdown always sends a `Closed` result explicitly. Tell
        // those two apart by the pool's own closed flag rather than
        // reporting every dropped sender as a shutdown.
        match rx.await {
            Ok(result) => result,
            Err(_) => {
                if self.closed.load(Ordering::SeqCst) {
                    Err(PoolClosedError::Closed)
                } else {
                    Err(PoolClosedError::TaskPanicked)
                }
            }
        }
    }

    /// Refuse new submissions, reject everything still queued (not yet
    /// picked up by a worker) with `PoolClosedError`, then wait for
    /// in-flight tasks (already picked up by a worker) to finish before
    /// returning.
    pub async fn shutdown(self: Arc<Self>) {
        self.closed.store(true, Ordering::SeqCst);

        // Drop our sender clone so the channel disconnects once drained;
        // any task still sitting in the queue is rejected explicitly
        // below rather than left to run after shutdown was requested.
        self.sender.lock().unwrap().take();

        while let Ok(task) = self.receiver.try_recv() {
            task(true);
        }

        let handles = {
            let mut guard = self.handles.lock().unwrap();
            std::mem::take(&mut *guard)
        };

        tokio::task::spawn_blocking(move || {
            for handle in handles {
                let _ = handle.join();
            }
        })
        .await
        .ok();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exec_runs_task_and_returns_result() {
        let pool = WorkerPool::new(2);
        let result = pool.exec(|| 2 + 2).await.unwrap();
        assert_eq!(result, 4);
        Arc::clone(&pool).shutdown().await;
    }

    #[tokio::test]
    async fn failure_in_one_task_does_not_poison_the_pool() {
        let pool = WorkerPool::new(1);
        let panicked = pool.exec(|| -> i32 { panic!("boom") }).await;
        assert_eq!(panicked, Err(PoolClosedError::TaskPanicked));

        let healthy = pool.exec(|| 7).await.unwrap();
        assert_eq!(healthy, 7);
        Arc::clone(&pool).shutdown().await;
    }

    #[tokio::test]
    async fn submissions_after_shutdown_are_rejected() {
        let pool = WorkerPool::new(1);
        Arc::clone(&pool).shutdown().await;
        let result = pool.exec(|| 1).await;
        assert_eq!(result, Err(PoolClosedError::Closed));
    }
}
