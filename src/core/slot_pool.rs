//! Fixed-size pool of reusable backend execution slots.
//!
//! A slot stands for one concurrent execution unit of the inference
//! backend: at most one submission uses a given slot at a time. The pool
//! only does idle/busy bookkeeping; it never touches the backend itself.
//! It lives inside the scheduler's shared lock, so none of these methods
//! synchronize on their own.

/// Opaque handle identifying one execution slot of the backend.
///
/// Handed to [`InferenceBackend::dispatch`](crate::core::InferenceBackend::dispatch)
/// so the backend can map the dispatch onto its own per-slot state
/// (an infer request, a stream, a worker thread).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub(crate) usize);

impl SlotId {
    /// Numeric index of this slot, in `0..pool_size`.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Idle/busy bookkeeping for a fixed set of slots.
#[derive(Debug)]
pub(crate) struct SlotPool {
    /// Slots currently idle, in LIFO order (a just-released slot is the
    /// next one handed out, keeping backend state warm).
    idle: Vec<SlotId>,
    total: usize,
}

impl SlotPool {
    /// Create a pool of `total` idle slots.
    pub(crate) fn new(total: usize) -> Self {
        Self {
            idle: (0..total).map(SlotId).collect(),
            total,
        }
    }

    /// Non-blocking probe for an idle slot; marks it busy when found.
    pub(crate) fn acquire_idle(&mut self) -> Option<SlotId> {
        self.idle.pop()
    }

    /// Return a busy slot to the idle set.
    pub(crate) fn release(&mut self, slot: SlotId) {
        debug_assert!(
            !self.idle.contains(&slot),
            "slot {} released while idle",
            slot.0
        );
        self.idle.push(slot);
    }

    /// Whether at least one slot is idle.
    pub(crate) fn has_idle(&self) -> bool {
        !self.idle.is_empty()
    }

    /// Number of slots currently executing a submission.
    pub(crate) fn busy_count(&self) -> usize {
        self.total - self.idle.len()
    }

    /// Number of idle slots.
    pub(crate) fn idle_count(&self) -> usize {
        self.idle.len()
    }

    /// Total number of slots, idle or busy.
    pub(crate) fn total(&self) -> usize {
        self.total
    }
}
