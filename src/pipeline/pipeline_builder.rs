// romsrs-regrid/src/pipeline/pipeline_builder.rs

use log::{debug, info};
use ndarray::Array2;
use ndarray_stats::QuantileExt;
use std::time::Instant;

use crate::grid::{ActiveSet, Grid, PointClass};
use crate::interp::horizontal::{HorizontalInterpolant, InterpMethod};
use crate::interp::temporal::OutOfRangePolicy;
use crate::interp::vertical::DepthResampler;
use crate::transforms::sigma::SigmaCoordinate;

use super::errors::PipelineError;
use super::pipeline::{PipelineParts, RegridPipeline};
use super::target::TargetSampling;

/// Builds a pipeline's `Initializing` phase: active sets, interpolation
/// weights and the target-point bathymetry, all computed exactly once.
///
/// `grid`, `sigma` and `target` are required. `method` defaults to
/// inverse-distance over 3 neighbors, `time_policy` to fail-closed, and
/// `velocities` to true; disable velocities for scalar-only records or for
/// grids too small to carry interior velocity points.
#[derive(Default)]
pub struct RegridPipelineBuilder<'a> {
    grid: Option<&'a Grid>,
    sigma: Option<&'a SigmaCoordinate>,
    target: Option<&'a TargetSampling>,
    method: Option<&'a InterpMethod>,
    time_policy: Option<&'a OutOfRangePolicy>,
    velocities: Option<&'a bool>,
}

impl<'a> RegridPipelineBuilder<'a> {
    pub fn build(&self) -> Result<RegridPipeline, PipelineError> {
        let grid = self
            .grid
            .ok_or_else(|| PipelineError::UninitializedFieldError("grid".to_string()))?;
        let sigma = self
            .sigma
            .ok_or_else(|| PipelineError::UninitializedFieldError("sigma".to_string()))?;
        let target = self
            .target
            .ok_or_else(|| PipelineError::UninitializedFieldError("target".to_string()))?;
        let method = self.method.copied().unwrap_or_default();
        let time_policy = self.time_policy.copied().unwrap_or_default();
        let velocities = self.velocities.copied().unwrap_or(true);

        let start = Instant::now();
        let target_xy = target.xy();

        let rho_set = grid.active_set(PointClass::Rho)?;
        let f_rho = HorizontalInterpolant::build(rho_set.coords(), &target_xy, &method)?;
        let h_active = rho_set.extract(grid.h().view())?;
        let h_target = f_rho.apply(&h_active)?;
        if let (Ok(h_min), Ok(h_max)) = (h_target.min(), h_target.max()) {
            debug!("Target bathymetry spans [{:.3}, {:.3}] m", h_min, h_max);
        }

        let (uv_set, f_uv, interior_angle): (
            Option<ActiveSet>,
            Option<HorizontalInterpolant>,
            Option<Array2<f64>>,
        ) = if velocities {
            let uv_set = grid.interior_active_set()?;
            let f_uv = HorizontalInterpolant::build(uv_set.coords(), &target_xy, &method)?;
            (Some(uv_set), Some(f_uv), Some(grid.interior_angle()))
        } else {
            (None, None, None)
        };

        let depth_resampler = DepthResampler::new(target.z_levels().clone())?;

        debug!(
            "Pipeline initialized in {:?}: {} active rho point(s), velocities {}",
            start.elapsed(),
            rho_set.len(),
            if velocities { "on" } else { "off" }
        );
        info!(
            "Pipeline ready: {} target point(s), {} level(s), {} instant(s)",
            target.num_points(),
            target.num_levels(),
            target.num_instants()
        );

        Ok(RegridPipeline::from_parts(PipelineParts {
            sigma: sigma.clone(),
            target: target.clone(),
            time_policy,
            rho_set,
            uv_set,
            interior_angle,
            f_rho,
            f_uv,
            h_target,
            depth_resampler,
        }))
    }

    pub fn grid(&mut self, grid: &'a Grid) -> &mut Self {
        self.grid = Some(grid);
        self
    }

    pub fn sigma(&mut self, sigma: &'a SigmaCoordinate) -> &mut Self {
        self.sigma = Some(sigma);
        self
    }

    pub fn target(&mut self, target: &'a TargetSampling) -> &mut Self {
        self.target = Some(target);
        self
    }

    pub fn method(&mut self, method: &'a InterpMethod) -> &mut Self {
        self.method = Some(method);
        self
    }

    pub fn time_policy(&mut self, time_policy: &'a OutOfRangePolicy) -> &mut Self {
        self.time_policy = Some(time_policy);
        self
    }

    pub fn velocities(&mut self, velocities: &'a bool) -> &mut Self {
        self.velocities = Some(velocities);
        self
    }
}
