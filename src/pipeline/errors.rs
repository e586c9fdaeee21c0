// romsrs-regrid/src/pipeline/errors.rs

use crate::grid::ActiveSetError;
use crate::interp::horizontal::HorizontalInterpolantError;
use crate::interp::temporal::TimeResamplerError;
use crate::interp::vertical::DepthResamplerError;
use crate::rotate::RotationError;
use crate::transforms::sigma::SigmaCoordinateError;
use thiserror::Error;

use super::source::StepSourceError;
use super::target::TargetSamplingError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unitialized field on RegridPipelineBuilder: {0}")]
    UninitializedFieldError(String),
    #[error(transparent)]
    ActiveSetError(#[from] ActiveSetError),
    #[error(transparent)]
    HorizontalInterpolantError(#[from] HorizontalInterpolantError),
    #[error(transparent)]
    SigmaCoordinateError(#[from] SigmaCoordinateError),
    #[error(transparent)]
    RotationError(#[from] RotationError),
    #[error(transparent)]
    DepthResamplerError(#[from] DepthResamplerError),
    #[error(transparent)]
    TimeResamplerError(#[from] TimeResamplerError),
    #[error(transparent)]
    TargetSamplingError(#[from] TargetSamplingError),
    #[error(transparent)]
    StepSourceError(#[from] StepSourceError),
    #[error("the source record holds no native steps")]
    NoNativeSteps,
    #[error("the pipeline has already run to completion; build a new one to run again")]
    AlreadyFinalized,
    #[error("step {step}: field '{name}' has shape {got:?}, but the grid requires {expected:?}")]
    FieldShape {
        step: usize,
        name: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },
    #[error("step {step}: velocity regridding was requested but the record carries no u/v")]
    MissingVelocities { step: usize },
}
