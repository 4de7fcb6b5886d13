//! Configuration models for the pipeline.

pub mod pipeline;

pub use pipeline::PipelineConfig;
