//! Backend adapter spawning inference futures on a tokio runtime.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tracing::debug;

use crate::core::backend::{InferenceBackend, OutputMap};
use crate::core::pipeline::Completion;
use crate::core::slot_pool::SlotId;

/// Asynchronous per-item inference run as a tokio task.
#[async_trait]
pub trait AsyncSlotExecutor<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    /// Run inference on one item, producing named outputs.
    async fn infer(&self, item: T) -> anyhow::Result<OutputMap>;
}

/// [`InferenceBackend`] that executes each dispatch as a task on a tokio
/// runtime. Concurrency is bounded by the pipeline's slot count, not by
/// the runtime, so a multi-threaded runtime shared with other work is
/// fine.
pub struct TokioBackend<E> {
    handle: Handle,
    executor: Arc<E>,
}

impl<E> TokioBackend<E> {
    /// Create a backend on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime context; use
    /// [`with_handle`](Self::with_handle) to pass one explicitly.
    #[must_use]
    pub fn new(executor: E) -> Self {
        Self::with_handle(Handle::current(), executor)
    }

    /// Create a backend spawning onto the given runtime handle.
    #[must_use]
    pub fn with_handle(handle: Handle, executor: E) -> Self {
        Self {
            handle,
            executor: Arc::new(executor),
        }
    }
}

impl<T, M, E> InferenceBackend<T, M> for TokioBackend<E>
where
    T: Send + 'static,
    M: Send + 'static,
    E: AsyncSlotExecutor<T>,
{
    fn dispatch(&self, slot: SlotId, item: T, done: Completion<M>) {
        let executor = Arc::clone(&self.executor);
        debug!(
            frame_id = done.frame_id(),
            slot = slot.index(),
            "spawning inference task"
        );
        self.handle.spawn(async move {
            done.finish(executor.infer(item).await);
        });
    }
}
