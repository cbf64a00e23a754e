//! The feature pipeline: indicator calculators and their orchestration.

mod error;
pub mod indicators;
mod pipeline;
mod reporter;

pub use error::PipelineError;
pub use pipeline::{FeaturePipeline, LatestFeatures, validate_input};
pub use reporter::{LogReporter, PipelineReporter, PipelineStage, SilentReporter};
