//! Pending-result storage drained in strict submission order.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::core::backend::OutputMap;

/// Monotonic submission-order id assigned at `submit` time.
///
/// Wraps modulo 2^64; a live collision between a wrapped id and an
/// unconsumed low id would need 2^64 in-flight submissions and is not
/// special-cased.
pub type FrameId = u64;

/// One completed inference, keyed by its submission order.
///
/// Built by the completion handler, owned by the store until the
/// consumer drains it, then moved out to the caller for domain-specific
/// postprocessing.
#[derive(Debug)]
pub struct InferenceResult<M> {
    /// Submission-order id of this result.
    pub frame_id: FrameId,
    /// When the submission was handed to the backend.
    pub started: Instant,
    /// Caller metadata, passed through unchanged.
    pub meta: M,
    /// Backend output per named output channel.
    pub outputs: OutputMap,
}

/// Thread-compatible map from frame id to completed result.
///
/// Lives inside the scheduler's shared lock: completion handlers insert,
/// the consumer removes in strict `FrameId` order. Holds at most
/// pool-size entries, since a slot stays busy until its result lands.
#[derive(Debug, Default)]
pub(crate) struct ResultStore<M> {
    completed: BTreeMap<FrameId, InferenceResult<M>>,
}

impl<M> ResultStore<M> {
    pub(crate) fn new() -> Self {
        Self {
            completed: BTreeMap::new(),
        }
    }

    /// Insert a completed result. Returns `false` if the frame id is
    /// already present (protocol violation; the store is unchanged).
    pub(crate) fn insert(&mut self, result: InferenceResult<M>) -> bool {
        let id = result.frame_id;
        if self.completed.contains_key(&id) {
            return false;
        }
        self.completed.insert(id, result);
        true
    }

    /// Whether the result for `frame_id` has landed.
    pub(crate) fn contains(&self, frame_id: FrameId) -> bool {
        self.completed.contains_key(&frame_id)
    }

    /// Remove and return the result for `frame_id`, if present.
    pub(crate) fn take(&mut self, frame_id: FrameId) -> Option<InferenceResult<M>> {
        self.completed.remove(&frame_id)
    }

    /// Number of completed-but-unconsumed results.
    pub(crate) fn len(&self) -> usize {
        self.completed.len()
    }
}
