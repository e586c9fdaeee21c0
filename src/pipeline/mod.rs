// romsrs-regrid/src/pipeline/mod.rs

mod errors;
mod pipeline;
mod pipeline_builder;
mod source;
mod target;

pub use errors::PipelineError;
pub use pipeline::{DomainReport, PipelinePhase, RegridOutput, RegridPipeline};
pub use pipeline_builder::RegridPipelineBuilder;
pub use source::{StepRecord, StepSource, StepSourceError, VecStepSource};
pub use target::{TargetSampling, TargetSamplingError};
