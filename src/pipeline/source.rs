// romsrs-regrid/src/pipeline/source.rs
//
// Data-access seam between the pipeline and whatever holds the native model
// output. The pipeline pulls one step at a time and never looks back, so a
// source can stream from disk without keeping the full record in memory.

use ndarray::{Array2, Array3};
use thiserror::Error;

/// One native output step: the free surface, the tracer fields and,
/// optionally, the staggered velocity components, all on their native grids.
///
/// `zeta` is `[eta, xi]` on rho points; `temp` and `salt` are
/// `[nlevels, eta, xi]` on rho points; `u` is `[nlevels, eta, xi-1]` and `v`
/// is `[nlevels, eta-1, xi]` on their staggered classes.
#[derive(Clone, Debug)]
pub struct StepRecord {
    pub seconds: f64,
    pub zeta: Array2<f64>,
    pub temp: Array3<f64>,
    pub salt: Array3<f64>,
    pub u: Option<Array3<f64>>,
    pub v: Option<Array3<f64>>,
}

/// Supplier of native output steps, indexed `0..num_steps()` in time order.
pub trait StepSource {
    fn num_steps(&self) -> usize;

    /// Load one step. Any failure here aborts the whole run; there is no
    /// partial output.
    fn load_step(&mut self, index: usize) -> Result<StepRecord, StepSourceError>;
}

/// In-memory source over a pre-built step list.
pub struct VecStepSource {
    steps: Vec<StepRecord>,
}

impl VecStepSource {
    pub fn new(steps: Vec<StepRecord>) -> Self {
        Self { steps }
    }
}

impl StepSource for VecStepSource {
    fn num_steps(&self) -> usize {
        self.steps.len()
    }

    fn load_step(&mut self, index: usize) -> Result<StepRecord, StepSourceError> {
        self.steps
            .get(index)
            .cloned()
            .ok_or(StepSourceError::StepOutOfRange {
                index,
                len: self.steps.len(),
            })
    }
}

#[derive(Error, Debug)]
pub enum StepSourceError {
    #[error("step {step} is missing required field '{name}'")]
    MissingField { step: usize, name: &'static str },
    #[error("step index {index} is out of range for a {len}-step record")]
    StepOutOfRange { index: usize, len: usize },
    #[error("source backend failure: {0}")]
    Backend(String),
}
