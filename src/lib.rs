use pretty_env_logger;
use std::sync::Once;

static INIT: Once = Once::new();

pub fn _setup_pretty_env_logger_default() {
    INIT.call_once(|| {
        pretty_env_logger::init();
    });
}

pub mod grid;
pub mod interp;
pub mod pipeline;
pub mod rotate;
pub mod transforms;

pub use grid::{ActiveSet, Grid, GridBuilder, PointClass, PointSet};
pub use interp::{DepthResampler, HorizontalInterpolant, InterpMethod, OutOfRangePolicy,
    TimeResampler, VariogramModel};
pub use pipeline::{
    DomainReport, RegridOutput, RegridPipeline, RegridPipelineBuilder, StepRecord, StepSource,
    TargetSampling, VecStepSource,
};
pub use rotate::{average_uv_to_interior, rotate_components, rotate_uv};
pub use transforms::{SigmaCoordinate, SigmaCoordinateBuilder, VerticalTransform};
