//! Error types for pipeline operations.

use thiserror::Error;

/// Errors produced by the pipeline scheduler.
///
/// Slot exhaustion is not represented here: a submission with no idle
/// slot is a normal backpressure outcome and is reported through
/// [`SubmitOutcome::Rejected`](crate::core::SubmitOutcome) instead.
///
/// All variants are `Clone` so a captured error can be re-surfaced on
/// every subsequent wait/consume call (sticky, first writer wins).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// A completion handler failed to produce a valid result.
    ///
    /// Fatal to further ordered delivery: once recorded, every
    /// subsequent wait/consume call surfaces it again.
    #[error("inference failed: {0}")]
    Inference(String),
    /// A completion violated the scheduler protocol (duplicate frame id,
    /// or a completion handle dropped without firing). Indicates a
    /// backend or scheduler bug, never retried.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
