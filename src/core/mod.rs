//! Core scheduling: slot pool, ordered result store, and the pipeline.

pub mod backend;
pub mod error;
pub mod pipeline;
pub mod result_store;
pub mod slot_pool;

pub use backend::{InferenceBackend, OutputMap};
pub use error::{AppResult, PipelineError};
pub use pipeline::{AsyncPipeline, Completion, PipelineStats, SubmitOutcome};
pub use result_store::{FrameId, InferenceResult};
pub use slot_pool::SlotId;
