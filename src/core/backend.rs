//! Boundary trait for the inference backend collaborator.

use std::collections::HashMap;

use crate::core::pipeline::Completion;
use crate::core::slot_pool::SlotId;

/// Raw backend output: named output channel to owned data.
///
/// The backend must copy data out of any buffer it may reuse for the
/// next dispatch on the same slot before handing the map to
/// [`Completion::finish`].
pub type OutputMap = HashMap<String, Vec<f32>>;

/// The external inference engine driven by the scheduler.
///
/// The scheduler never spawns threads for inference itself; the backend
/// owns its threading and may run dispatched work anywhere, including on
/// the calling thread. The one obligation is the completion contract:
/// every dispatch must eventually resolve its [`Completion`], from any
/// thread, exactly once (the handle enforces single-fire by value, and
/// dropping it unfired is reported as a protocol violation).
///
/// `dispatch` is called with an idle slot the scheduler just marked
/// busy; the slot returns to the idle set when the completion fires.
pub trait InferenceBackend<T, M>: Send + Sync
where
    T: Send + 'static,
    M: Send + 'static,
{
    /// Start asynchronous execution of `item` on `slot`.
    ///
    /// Must not block on the inference itself. May call
    /// `done.finish(..)` before returning (synchronous completion is
    /// legal; the scheduler does not hold its lock across `dispatch`).
    fn dispatch(&self, slot: SlotId, item: T, done: Completion<M>);
}
