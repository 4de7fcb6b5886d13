//! The pipeline scheduler: ordered result reassembly over a fixed set of
//! concurrently executing backend slots.
//!
//! Submission assigns a monotonic frame id and hands the item to the
//! backend on an idle slot; completions land on arbitrary backend
//! threads in arbitrary order; consumption hands results back in strict
//! frame-id order. One `Mutex` guards all shared state (slot
//! bookkeeping, completed results, the sticky error), one `Condvar`
//! wakes blocked waiters.
//!
//! # Design
//!
//! - `submit` never blocks: with no idle slot it returns
//!   [`SubmitOutcome::Rejected`] so the driver applies its own
//!   backpressure policy.
//! - A [`Completion`] is a one-shot handle moved into the backend;
//!   firing it consumes it, so double-fire is unrepresentable.
//! - The first completion failure is captured and re-surfaced on every
//!   later wait/consume call; later failures are secondary effects of
//!   the first and are dropped.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace, warn};

use crate::config::PipelineConfig;
use crate::core::backend::{InferenceBackend, OutputMap};
use crate::core::error::{AppResult, PipelineError};
use crate::core::result_store::{FrameId, InferenceResult, ResultStore};
use crate::core::slot_pool::{SlotId, SlotPool};
use crate::util::metrics::{LatencyMetrics, LatencySnapshot};

/// Hook invoked (under the scheduler lock) each time a slot is freed.
type SlotFreedHook = Box<dyn FnMut(SlotId) + Send>;

/// Outcome of a non-blocking submission attempt.
#[derive(Debug)]
pub enum SubmitOutcome<T, M> {
    /// The item was handed to the backend under this frame id.
    Submitted(FrameId),
    /// No slot was idle; the item and metadata are handed back so the
    /// driver can retry after a completion or a consume frees a slot.
    Rejected {
        /// The work item, returned unchanged.
        item: T,
        /// The caller metadata, returned unchanged.
        meta: M,
    },
}

impl<T, M> SubmitOutcome<T, M> {
    /// The assigned frame id, if the submission was accepted.
    pub fn frame_id(&self) -> Option<FrameId> {
        match self {
            Self::Submitted(id) => Some(*id),
            Self::Rejected { .. } => None,
        }
    }

    /// Whether the submission was accepted.
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted(_))
    }
}

/// Utilization snapshot in submission/delivery terms.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Total number of slots, idle or busy.
    pub slots: usize,
    /// Slots currently idle.
    pub idle_slots: usize,
    /// Submissions dispatched but not yet completed.
    pub in_flight: usize,
    /// Results completed but not yet consumed in order.
    pub pending: usize,
    /// Total accepted submissions.
    pub submitted: u64,
    /// Total results delivered to the consumer.
    pub delivered: u64,
    /// Whether a sticky error has been recorded.
    pub failed: bool,
}

/// Shared state guarded by the single scheduler lock.
struct PipelineState<M> {
    slots: SlotPool,
    completed: ResultStore<M>,
    /// Sticky first-writer-wins error; once set, never cleared.
    deferred: Option<PipelineError>,
    /// Next frame id expected by the consumer. Wraps with the submit id.
    next_consume: FrameId,
    delivered: u64,
    latency: LatencyMetrics,
    on_slot_freed: Option<SlotFreedHook>,
}

impl<M> PipelineState<M> {
    /// First failure wins; secondary failures are logged and dropped.
    fn record_error(&mut self, err: PipelineError) {
        if self.deferred.is_none() {
            warn!(error = %err, "pipeline failure captured, ordered delivery halts");
            self.deferred = Some(err);
        } else {
            debug!(error = %err, "secondary failure dropped, first error already captured");
        }
    }
}

struct Shared<M> {
    state: Mutex<PipelineState<M>>,
    ready: Condvar,
}

/// One-shot completion handle bound to a single submission.
///
/// Moved into the backend by [`AsyncPipeline::submit`]; the backend
/// resolves it exactly once, from any thread, via [`Completion::finish`].
/// Consuming `self` makes a second fire unrepresentable. Dropping the
/// handle without firing is recorded as a protocol violation (with the
/// slot still released, so drain cannot hang on a lost completion).
pub struct Completion<M: Send + 'static> {
    inner: Option<CompletionInner<M>>,
}

struct CompletionInner<M> {
    shared: Arc<Shared<M>>,
    frame_id: FrameId,
    slot: SlotId,
    started: Instant,
    meta: M,
}

impl<M: Send + 'static> Completion<M> {
    /// Frame id of the submission this handle resolves.
    pub fn frame_id(&self) -> FrameId {
        // Present until finish() or drop, both of which consume the handle.
        self.inner.as_ref().map_or(0, |inner| inner.frame_id)
    }

    /// Slot the submission is executing on.
    pub fn slot(&self) -> SlotId {
        self.inner.as_ref().map_or(SlotId(0), |inner| inner.slot)
    }

    /// Resolve this submission with the backend's outcome.
    ///
    /// `Ok` carries the named outputs, copied out of any backend-owned
    /// buffer; `Err` is captured as the pipeline's sticky error if none
    /// is set yet. Either way the slot returns to the idle set, the
    /// slot-freed hook runs, and all blocked waiters wake.
    pub fn finish(mut self, outcome: anyhow::Result<OutputMap>) {
        if let Some(inner) = self.inner.take() {
            inner.resolve(outcome.map_err(|e| PipelineError::Inference(format!("{e:#}"))));
        }
    }
}

impl<M: Send + 'static> Drop for Completion<M> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            let frame_id = inner.frame_id;
            warn!(frame_id, "completion handle dropped without firing");
            inner.resolve(Err(PipelineError::ProtocolViolation(format!(
                "completion for frame {frame_id} dropped without firing"
            ))));
        }
    }
}

impl<M: Send + 'static> CompletionInner<M> {
    /// The completion handler proper: runs under the shared lock, then
    /// wakes every waiter. Keyed insertion, slot release, and the hook
    /// are atomic with respect to other completions and the consumer.
    fn resolve(self, outcome: Result<OutputMap, PipelineError>) {
        let Self {
            shared,
            frame_id,
            slot,
            started,
            meta,
        } = self;
        {
            let mut st = shared.state.lock();
            match outcome {
                Ok(outputs) => {
                    let inserted = st.completed.insert(InferenceResult {
                        frame_id,
                        started,
                        meta,
                        outputs,
                    });
                    if inserted {
                        trace!(frame_id, slot = slot.index(), "completion stored");
                    } else {
                        st.record_error(PipelineError::ProtocolViolation(format!(
                            "frame {frame_id} completed twice"
                        )));
                    }
                }
                Err(err) => st.record_error(err),
            }
            st.slots.release(slot);
            if let Some(hook) = st.on_slot_freed.as_mut() {
                hook(slot);
            }
        }
        shared.ready.notify_all();
    }
}

/// Asynchronous inference scheduler with strict output-order reassembly.
///
/// Accepts a stream of items, runs each on one of a fixed set of backend
/// slots, and returns results in exact submission order regardless of
/// completion order. `submit`, `consume`, and the wait operations are
/// meant to be driven from a single logical driver loop; completions
/// arrive concurrently from the backend's threads.
///
/// Dropping the pipeline drains it first: the destructor blocks until
/// every in-flight submission has resolved, so no completion can fire
/// into freed state.
pub struct AsyncPipeline<T, M, B>
where
    T: Send + 'static,
    M: Send + 'static,
    B: InferenceBackend<T, M>,
{
    shared: Arc<Shared<M>>,
    backend: B,
    /// Next frame id to assign. Single producer; wraps mod 2^64.
    next_submit: AtomicU64,
    submitted: AtomicU64,
    _item: PhantomData<fn(T) -> T>,
}

impl<T, M, B> AsyncPipeline<T, M, B>
where
    T: Send + 'static,
    M: Send + 'static,
    B: InferenceBackend<T, M>,
{
    /// Create a pipeline over `backend` with `config.max_parallel_requests`
    /// slots, all idle.
    ///
    /// # Errors
    ///
    /// Fails if the configuration does not validate.
    pub fn new(config: &PipelineConfig, backend: B) -> AppResult<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!(e))
            .context("invalid pipeline config")?;

        debug!(
            slots = config.max_parallel_requests,
            "pipeline initialized"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PipelineState {
                    slots: SlotPool::new(config.max_parallel_requests),
                    completed: ResultStore::new(),
                    deferred: None,
                    next_consume: 0,
                    delivered: 0,
                    latency: LatencyMetrics::new(),
                    on_slot_freed: None,
                }),
                ready: Condvar::new(),
            }),
            backend,
            next_submit: AtomicU64::new(0),
            submitted: AtomicU64::new(0),
            _item: PhantomData,
        })
    }

    /// Install a hook invoked each time a completion frees a slot.
    ///
    /// Runs under the scheduler lock on the completing thread, so it
    /// must be quick and must not call back into the pipeline; signal
    /// the driver (e.g. over a channel) to submit opportunistically.
    pub fn set_slot_freed_hook(&self, hook: impl FnMut(SlotId) + Send + 'static) {
        self.shared.state.lock().on_slot_freed = Some(Box::new(hook));
    }

    /// Submit one item for asynchronous execution. Never blocks.
    ///
    /// With an idle slot available, assigns the next frame id, records
    /// the start timestamp, installs the one-shot completion, and hands
    /// the item to the backend; the frame id is returned immediately,
    /// before the work completes. With every slot busy the item and
    /// metadata come back as [`SubmitOutcome::Rejected`].
    ///
    /// Intended for a single driver thread; frame-id monotonicity is not
    /// specified across racing submitters.
    pub fn submit(&self, item: T, meta: M) -> SubmitOutcome<T, M> {
        let slot = self.shared.state.lock().slots.acquire_idle();
        let Some(slot) = slot else {
            trace!("no idle slot, submission rejected");
            return SubmitOutcome::Rejected { item, meta };
        };

        let frame_id = self.next_submit.fetch_add(1, Ordering::Relaxed);
        self.submitted.fetch_add(1, Ordering::Relaxed);

        let done = Completion {
            inner: Some(CompletionInner {
                shared: Arc::clone(&self.shared),
                frame_id,
                slot,
                started: Instant::now(),
                meta,
            }),
        };

        debug!(frame_id, slot = slot.index(), "frame submitted");
        // Lock is not held here: the backend may complete synchronously
        // on this thread.
        self.backend.dispatch(slot, item, done);
        SubmitOutcome::Submitted(frame_id)
    }

    /// Block until the pipeline has something for the driver to do:
    /// a slot is idle (submit more), the next-in-order result is ready
    /// (consume), or the sticky error is set (re-raised here and on
    /// every later call).
    pub fn wait_for_data(&self) -> Result<(), PipelineError> {
        let mut st = self.shared.state.lock();
        loop {
            if let Some(err) = st.deferred.clone() {
                return Err(err);
            }
            if st.slots.has_idle() || st.completed.contains(st.next_consume) {
                return Ok(());
            }
            self.shared.ready.wait(&mut st);
        }
    }

    /// Block until the next-in-order result is ready to consume, or the
    /// sticky error blocks further ordered progress.
    ///
    /// Unlike [`wait_for_data`](Self::wait_for_data) this ignores slot
    /// availability, so a pure consumer does not spin while slots sit
    /// idle. At least one submission must be outstanding or this waits
    /// forever.
    pub fn wait_for_result(&self) -> Result<(), PipelineError> {
        let mut st = self.shared.state.lock();
        loop {
            // A ready in-order result is delivered even after a failure;
            // the error surfaces once it blocks ordered progress.
            if st.completed.contains(st.next_consume) {
                return Ok(());
            }
            if let Some(err) = st.deferred.clone() {
                return Err(err);
            }
            self.shared.ready.wait(&mut st);
        }
    }

    /// Take the next-in-order result, if it has landed.
    ///
    /// `Ok(Some(..))` moves the result out, advances the expected frame
    /// id (wrapping as submission does), and folds the frame's latency
    /// into the rolling telemetry. `Ok(None)` means no ordered result is
    /// ready yet. `Err` re-raises the sticky error on the call that
    /// would otherwise have returned the failed frame, and on every call
    /// after that.
    pub fn consume(&self) -> Result<Option<InferenceResult<M>>, PipelineError> {
        let mut st = self.shared.state.lock();
        let next = st.next_consume;
        if let Some(result) = st.completed.take(next) {
            st.next_consume = next.wrapping_add(1);
            st.delivered += 1;
            st.latency.update(result.started);
            trace!(frame_id = result.frame_id, "frame consumed in order");
            return Ok(Some(result));
        }
        if let Some(err) = st.deferred.clone() {
            return Err(err);
        }
        Ok(None)
    }

    /// Block until no submission is in flight.
    ///
    /// Completed-but-unconsumed results stay in the store; only busy
    /// slots are waited on. Called by `Drop`, so tearing the pipeline
    /// down cannot race a completion firing into freed state.
    pub fn wait_idle(&self) {
        let mut st = self.shared.state.lock();
        while st.slots.busy_count() > 0 {
            self.shared.ready.wait(&mut st);
        }
    }

    /// Rolling latency telemetry over delivered results.
    pub fn latency(&self) -> LatencySnapshot {
        self.shared.state.lock().latency.snapshot()
    }

    /// Snapshot of current utilization.
    pub fn stats(&self) -> PipelineStats {
        let st = self.shared.state.lock();
        PipelineStats {
            slots: st.slots.total(),
            idle_slots: st.slots.idle_count(),
            in_flight: st.slots.busy_count(),
            pending: st.completed.len(),
            submitted: self.submitted.load(Ordering::Relaxed),
            delivered: st.delivered,
            failed: st.deferred.is_some(),
        }
    }

    /// Total number of slots.
    pub fn pool_size(&self) -> usize {
        self.shared.state.lock().slots.total()
    }
}

impl<T, M, B> Drop for AsyncPipeline<T, M, B>
where
    T: Send + 'static,
    M: Send + 'static,
    B: InferenceBackend<T, M>,
{
    fn drop(&mut self) {
        self.wait_idle();
        debug!("pipeline drained and shut down");
    }
}
