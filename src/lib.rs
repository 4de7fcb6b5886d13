//! # Infer Pipeline
//!
//! An asynchronous inference-request scheduler with strict output-order
//! reassembly.
//!
//! This library accepts a stream of input items, dispatches each to one of a
//! fixed set of concurrently executing backend slots, and guarantees that
//! results come back to the caller in the exact order the inputs were
//! submitted, even though completion order across slots is unpredictable.
//!
//! ## Core Problem Solved
//!
//! Streaming inference workloads (video frames through a vision model, audio
//! chunks through an ASR model) need pipelining to keep the accelerator busy,
//! but the surrounding application needs results back in frame order:
//!
//! - **Unpredictable completion order**: parallel infer requests finish
//!   whenever the device gets to them
//! - **Bounded memory**: at most pool-size results may be buffered, so
//!   submission must apply backpressure instead of queueing unboundedly
//! - **Callbacks on foreign threads**: the backend fires completion
//!   notifications on its own threads, concurrently with the driver loop
//! - **Fail-stop on errors**: a single failed request should halt ordered
//!   delivery loudly, not silently skip a frame
//!
//! ## Key Pieces
//!
//! - [`core::AsyncPipeline`] — submission (non-blocking, backpressured),
//!   blocking waits, and strictly ordered consumption
//! - [`core::InferenceBackend`] — the boundary trait your inference engine
//!   implements; one [`core::Completion`] handle per dispatch, fired exactly
//!   once from any thread
//! - [`runtime::ThreadBackend`] / [`runtime::TokioBackend`] — ready-made
//!   adapters for synchronous library calls and async engines
//!
//! ```rust
//! use infer_pipeline::config::PipelineConfig;
//! use infer_pipeline::core::{AsyncPipeline, OutputMap};
//! use infer_pipeline::runtime::ThreadBackend;
//!
//! # fn main() -> anyhow::Result<()> {
//! // "Inference" that sums the input tensor.
//! let backend = ThreadBackend::new(2, |item: Vec<f32>| -> anyhow::Result<OutputMap> {
//!     let mut outputs = OutputMap::new();
//!     outputs.insert("sum".into(), vec![item.iter().sum()]);
//!     Ok(outputs)
//! });
//!
//! let pipeline = AsyncPipeline::new(
//!     &PipelineConfig::new().with_max_parallel_requests(2),
//!     backend,
//! )?;
//!
//! // Metadata rides along opaquely; here, the frame dimensions.
//! assert!(pipeline.submit(vec![1.0, 2.0], (640, 480)).is_submitted());
//! assert!(pipeline.submit(vec![3.0, 4.0], (640, 480)).is_submitted());
//!
//! pipeline.wait_for_result()?;
//! let first = pipeline.consume()?.expect("frame 0 ready");
//! assert_eq!(first.frame_id, 0);
//! assert_eq!(first.outputs["sum"], vec![3.0]);
//! # Ok(())
//! # }
//! ```
//!
//! For complete examples, see `tests/pipeline_test.rs`.

#![deny(unsafe_code)]
#![warn(clippy::all)]

/// Core scheduling: slot pool, ordered result store, and the pipeline.
pub mod core;
/// Configuration models for the pipeline.
pub mod config;
/// Bundled backend adapters (OS threads, tokio).
pub mod runtime;
/// Shared utilities.
pub mod util;
