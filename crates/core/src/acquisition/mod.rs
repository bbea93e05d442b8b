//! Subtitle acquisition pipeline.

mod pipeline;
mod types;

pub use pipeline::AcquisitionPipeline;
pub use types::*;
