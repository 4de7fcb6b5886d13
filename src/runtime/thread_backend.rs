//! Backend adapter running inference on dedicated OS threads.
//!
//! One worker thread per slot, fed over a bounded channel. Workers block
//! on `recv` (no polling) and exit when the sender is dropped. This is
//! the adapter to reach for when the "backend" is a synchronous library
//! call that should not block the driver thread.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::core::backend::{InferenceBackend, OutputMap};
use crate::core::pipeline::Completion;
use crate::core::slot_pool::SlotId;

/// Synchronous per-item inference run by a worker thread.
///
/// Implemented for any `Fn(T) -> anyhow::Result<OutputMap>` closure.
pub trait SlotExecutor<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    /// Run inference on one item, producing named outputs.
    fn run(&self, item: T) -> anyhow::Result<OutputMap>;
}

impl<T, F> SlotExecutor<T> for F
where
    T: Send + 'static,
    F: Fn(T) -> anyhow::Result<OutputMap> + Send + Sync + 'static,
{
    fn run(&self, item: T) -> anyhow::Result<OutputMap> {
        self(item)
    }
}

struct Job<T, M: Send + 'static> {
    slot: SlotId,
    item: T,
    done: Completion<M>,
}

/// [`InferenceBackend`] executing each dispatch on a pool of dedicated
/// OS threads.
///
/// Size it with the same slot count as the pipeline's
/// `max_parallel_requests`; the scheduler guarantees at most that many
/// dispatches are outstanding, so every job starts immediately on its
/// own thread.
///
/// Dropping the backend drops the job sender, which lets idle workers
/// exit on their own; call [`shutdown`](Self::shutdown) to also join
/// them.
pub struct ThreadBackend<T, M>
where
    T: Send + 'static,
    M: Send + 'static,
{
    /// Job sender to the workers. `None` after shutdown.
    job_tx: Mutex<Option<Sender<Job<T, M>>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<T, M> ThreadBackend<T, M>
where
    T: Send + 'static,
    M: Send + 'static,
{
    /// Spawn `slot_count` worker threads sharing `executor`.
    pub fn new<E>(slot_count: usize, executor: E) -> Self
    where
        E: SlotExecutor<T>,
    {
        let executor = Arc::new(executor);
        let (job_tx, job_rx) = bounded::<Job<T, M>>(slot_count.max(1));

        let workers = (0..slot_count)
            .map(|worker_id| spawn_worker(worker_id, job_rx.clone(), Arc::clone(&executor)))
            .collect();

        debug!(slot_count, "thread backend started");

        Self {
            job_tx: Mutex::new(Some(job_tx)),
            workers: Mutex::new(workers),
        }
    }

    /// Stop accepting dispatches and join every worker thread.
    ///
    /// In-flight jobs run to completion first. Dispatches arriving after
    /// shutdown drop their completion handle, which the scheduler
    /// records as a protocol violation rather than hanging.
    pub fn shutdown(&self) {
        {
            let mut job_tx = self.job_tx.lock();
            if job_tx.take().is_none() {
                return;
            }
        }

        let mut workers = self.workers.lock();
        for worker in workers.drain(..) {
            if worker.join().is_err() {
                warn!("thread backend worker panicked");
            }
        }
        debug!("thread backend shut down");
    }
}

impl<T, M> InferenceBackend<T, M> for ThreadBackend<T, M>
where
    T: Send + 'static,
    M: Send + 'static,
{
    fn dispatch(&self, slot: SlotId, item: T, done: Completion<M>) {
        let job_tx = self.job_tx.lock();
        let Some(job_tx) = job_tx.as_ref() else {
            warn!(slot = slot.index(), "dispatch after shutdown");
            return;
        };
        // With slot_count workers and at most slot_count outstanding
        // dispatches this never fills; an undersized backend makes it
        // wait for a worker instead of losing the job.
        if job_tx.send(Job { slot, item, done }).is_err() {
            warn!(slot = slot.index(), "worker channel closed, job lost");
        }
    }
}

impl<T, M> Drop for ThreadBackend<T, M>
where
    T: Send + 'static,
    M: Send + 'static,
{
    fn drop(&mut self) {
        // Drop the sender so idle workers exit; joining is left to an
        // explicit shutdown() in case an executor is stuck.
        self.job_tx.lock().take();
    }
}

fn spawn_worker<T, M, E>(
    worker_id: usize,
    job_rx: Receiver<Job<T, M>>,
    executor: Arc<E>,
) -> JoinHandle<()>
where
    T: Send + 'static,
    M: Send + 'static,
    E: SlotExecutor<T>,
{
    thread::Builder::new()
        .name(format!("infer-slot-{worker_id}"))
        .spawn(move || {
            debug!(worker_id, "worker thread started");
            // Blocking recv; a dropped sender ends the loop.
            while let Ok(job) = job_rx.recv() {
                let frame_id = job.done.frame_id();
                debug!(worker_id, frame_id, slot = job.slot.index(), "running inference");
                job.done.finish(executor.run(job.item));
            }
            debug!(worker_id, "worker thread exiting");
        })
        .unwrap_or_else(|e| panic!("failed to spawn worker thread: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::core::AsyncPipeline;
    use std::time::Duration;

    fn doubling_executor(item: f32) -> anyhow::Result<OutputMap> {
        let mut outputs = OutputMap::new();
        outputs.insert("doubled".into(), vec![item * 2.0]);
        Ok(outputs)
    }

    #[test]
    fn runs_jobs_on_worker_threads() {
        let backend = ThreadBackend::new(2, doubling_executor);
        let pipe = AsyncPipeline::new(
            &PipelineConfig::new().with_max_parallel_requests(2),
            backend,
        )
        .unwrap();

        assert!(pipe.submit(3.0, ()).is_submitted());
        assert!(pipe.submit(4.0, ()).is_submitted());

        for expected in [6.0, 8.0] {
            pipe.wait_for_result().unwrap();
            let result = pipe.consume().unwrap().unwrap();
            assert_eq!(result.outputs["doubled"], vec![expected]);
        }
    }

    #[test]
    fn shutdown_joins_workers() {
        let backend: ThreadBackend<f32, ()> = ThreadBackend::new(2, doubling_executor);
        backend.shutdown();
        // Second shutdown is a no-op.
        backend.shutdown();
        assert!(backend.workers.lock().is_empty());
    }

    #[test]
    fn slow_executor_still_completes() {
        let slow = |item: f32| -> anyhow::Result<OutputMap> {
            thread::sleep(Duration::from_millis(20));
            let mut outputs = OutputMap::new();
            outputs.insert("out".into(), vec![item]);
            Ok(outputs)
        };
        let pipe = AsyncPipeline::new(
            &PipelineConfig::new().with_max_parallel_requests(1),
            ThreadBackend::new(1, slow),
        )
        .unwrap();

        assert!(pipe.submit(1.0, ()).is_submitted());
        pipe.wait_for_result().unwrap();
        assert_eq!(pipe.consume().unwrap().unwrap().frame_id, 0);
    }
}
