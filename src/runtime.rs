//! Runtime abstraction layer for async operations
//!
//! Every task the pipeline starts (pollers, fetch coordinators, frame timers,
//! error sweeps, renderer downloads) goes through the [`AsyncSpawner`] carried
//! by the loop context, which returns a [`TaskHandle`]. The handle aborts its
//! task when cancelled or dropped, so an owner tears down its work simply by
//! letting go of the handle.

use crate::prelude::{Arc, Future, Pin};
use crate::{LoopError, Result};

/// A trait for spawning async tasks (object-safe version)
pub trait AsyncSpawner: Send + Sync + 'static {
    /// Spawn a future and return a handle to it
    fn spawn_boxed(
        &self,
        future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
    ) -> Box<dyn AsyncHandle>;
}

/// Handle to a spawned async task
pub trait AsyncHandle: Send + Sync {
    /// Check if the task is finished
    fn is_finished(&self) -> bool;

    /// Cancel the task
    fn cancel(&self);
}

/// Owned handle to a spawned task. Dropping it cancels the task.
pub struct TaskHandle {
    inner: Option<Box<dyn AsyncHandle>>,
}

impl TaskHandle {
    pub fn new(inner: Box<dyn AsyncHandle>) -> Self {
        Self { inner: Some(inner) }
    }

    pub fn is_finished(&self) -> bool {
        self.inner.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }

    pub fn cancel(&self) {
        if let Some(handle) = &self.inner {
            handle.cancel();
        }
    }

    /// Lets the task run to completion without holding on to it
    pub fn detach(mut self) {
        self.inner.take();
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl dyn AsyncSpawner {
    /// Spawns a typed future and returns its owned handle
    pub fn spawn<F>(&self, future: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        TaskHandle::new(self.spawn_boxed(Box::pin(future)))
    }
}

/// Runs CPU-bound work (decoding, compositing) off the async worker threads.
pub async fn spawn_blocking<F, T>(work: F) -> Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        if e.is_cancelled() {
            LoopError::Cancelled
        } else {
            LoopError::Decode(format!("blocking task failed: {}", e))
        }
    })
}

/// Tokio-based async spawner, the default for every [`LoopContext`](crate::LoopContext)
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

impl AsyncSpawner for TokioSpawner {
    fn spawn_boxed(
        &self,
        future: Pin<Box<dyn Future<Output = ()> + Send + 'static>>,
    ) -> Box<dyn AsyncHandle> {
        let handle = ::tokio::spawn(future);
        Box::new(TokioHandle(handle))
    }
}

struct TokioHandle(::tokio::task::JoinHandle<()>);

impl AsyncHandle for TokioHandle {
    fn is_finished(&self) -> bool {
        self.0.is_finished()
    }

    fn cancel(&self) {
        self.0.abort();
    }
}

pub fn default_spawner() -> Arc<dyn AsyncSpawner> {
    Arc::new(TokioSpawner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn spawn<F>(future: F) -> TaskHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        default_spawner().spawn(future)
    }

    #[::tokio::test]
    async fn test_tokio_spawner() {
        let handle = spawn(async {
            ::tokio::time::sleep(::tokio::time::Duration::from_millis(10)).await;
        });

        // Should not be finished immediately
        assert!(!handle.is_finished());

        ::tokio::time::sleep(::tokio::time::Duration::from_millis(50)).await;
        assert!(handle.is_finished());
    }

    #[::tokio::test(start_paused = true)]
    async fn test_dropping_handle_aborts_task() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let handle = spawn(async move {
            ::tokio::time::sleep(::tokio::time::Duration::from_secs(1)).await;
            flag.store(true, Ordering::SeqCst);
        });

        drop(handle);
        ::tokio::time::sleep(::tokio::time::Duration::from_secs(2)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[::tokio::test(start_paused = true)]
    async fn test_detached_task_keeps_running() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        spawn(async move {
            ::tokio::time::sleep(::tokio::time::Duration::from_secs(1)).await;
            flag.store(true, Ordering::SeqCst);
        })
        .detach();

        ::tokio::time::sleep(::tokio::time::Duration::from_secs(2)).await;
        assert!(ran.load(Ordering::SeqCst));
    }

    #[::tokio::test]
    async fn test_spawn_blocking_returns_value() {
        let value = spawn_blocking(|| 21 * 2).await.unwrap();
        assert_eq!(value, 42);
    }
}
