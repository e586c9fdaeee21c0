// romsrs-regrid/src/pipeline/pipeline.rs
//
// Per-step orchestration: pull a native step, move every field onto the
// target sampling (horizontal, then vertical against that step's depths),
// then resample the accumulated record onto the target instants.

use log::{debug, info};
use ndarray::{s, Array1, Array2, Array3};
use rayon::prelude::*;
use std::time::Instant;

use crate::grid::ActiveSet;
use crate::interp::horizontal::HorizontalInterpolant;
use crate::interp::temporal::{OutOfRangePolicy, TimeResampler};
use crate::interp::vertical::{DepthResampler, DepthResamplerError};
use crate::rotate::{average_uv_to_interior, rotate_uv};
use crate::transforms::sigma::SigmaCoordinate;

use super::errors::PipelineError;
use super::source::{StepRecord, StepSource};
use super::target::TargetSampling;

/// Values at or beyond this magnitude are masked-point sentinels, not data.
const FILL_THRESHOLD: f64 = 1.0e36;

/// Where the pipeline is in its one-way lifecycle. Construction completes
/// `Initializing`; `run` moves through `Stepping` into `Finalizing` and the
/// pipeline never goes back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelinePhase {
    Initializing,
    Stepping,
    Finalizing,
}

/// Degraded-domain counters for one run. Zero everywhere means every target
/// sample was an ordinary interpolation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DomainReport {
    /// Sentinel-magnitude or non-finite horizontal values replaced by 0.0.
    pub filled_horizontal: usize,
    /// Depth targets outside a native profile span, held at the boundary.
    pub held_depth_targets: usize,
    /// Target instants outside the native time span, held at the record ends.
    pub clamped_time_targets: usize,
}

/// Regridded record on the target sampling. `zeta` is `[nt, nx]`; the 3-D
/// fields are `[nt, nz_target, nx]`. `u` and `v` are earth-relative and
/// present only when the pipeline was built with velocities enabled.
#[derive(Clone, Debug)]
pub struct RegridOutput {
    pub zeta: Array2<f64>,
    pub temp: Array3<f64>,
    pub salt: Array3<f64>,
    pub u: Option<Array3<f64>>,
    pub v: Option<Array3<f64>>,
    pub report: DomainReport,
}

pub(super) struct PipelineParts {
    pub sigma: SigmaCoordinate,
    pub target: TargetSampling,
    pub time_policy: OutOfRangePolicy,
    pub rho_set: ActiveSet,
    pub uv_set: Option<ActiveSet>,
    pub interior_angle: Option<Array2<f64>>,
    pub f_rho: HorizontalInterpolant,
    pub f_uv: Option<HorizontalInterpolant>,
    pub h_target: Array1<f64>,
    pub depth_resampler: DepthResampler,
}

/// One-shot regridding engine. All geometry-dependent work (active sets,
/// interpolation weights, target bathymetry) happened in the builder; `run`
/// only streams steps through the precomputed operators.
pub struct RegridPipeline {
    sigma: SigmaCoordinate,
    target: TargetSampling,
    time_policy: OutOfRangePolicy,
    rho_set: ActiveSet,
    uv_set: Option<ActiveSet>,
    interior_angle: Option<Array2<f64>>,
    f_rho: HorizontalInterpolant,
    f_uv: Option<HorizontalInterpolant>,
    h_target: Array1<f64>,
    depth_resampler: DepthResampler,
    phase: PipelinePhase,
}

impl RegridPipeline {
    pub(super) fn from_parts(parts: PipelineParts) -> Self {
        Self {
            sigma: parts.sigma,
            target: parts.target,
            time_policy: parts.time_policy,
            rho_set: parts.rho_set,
            uv_set: parts.uv_set,
            interior_angle: parts.interior_angle,
            f_rho: parts.f_rho,
            f_uv: parts.f_uv,
            h_target: parts.h_target,
            depth_resampler: parts.depth_resampler,
            phase: PipelinePhase::Initializing,
        }
    }

    pub fn phase(&self) -> PipelinePhase {
        self.phase
    }

    pub fn velocities(&self) -> bool {
        self.uv_set.is_some()
    }

    /// Target-point bathymetry, interpolated once at construction.
    pub fn h_target(&self) -> &Array1<f64> {
        &self.h_target
    }

    /// Regrid every step of `source` and resample onto the target instants.
    ///
    /// Consumes the pipeline's lifecycle: a second call returns
    /// `AlreadyFinalized`. Any step failure aborts the run with no partial
    /// output.
    pub fn run(&mut self, source: &mut dyn StepSource) -> Result<RegridOutput, PipelineError> {
        if self.phase != PipelinePhase::Initializing {
            return Err(PipelineError::AlreadyFinalized);
        }
        let nsteps = source.num_steps();
        if nsteps == 0 {
            return Err(PipelineError::NoNativeSteps);
        }
        self.phase = PipelinePhase::Stepping;

        let nx = self.target.num_points();
        let with_velocities = self.velocities();
        info!(
            "Regridding {} native step(s) onto {} point(s) x {} level(s) x {} instant(s)",
            nsteps,
            nx,
            self.target.num_levels(),
            self.target.num_instants()
        );
        let run_start = Instant::now();

        let mut report = DomainReport::default();
        let mut times = Vec::with_capacity(nsteps);
        let mut zeta_steps = Vec::with_capacity(nsteps);
        let mut temp_steps = Vec::with_capacity(nsteps);
        let mut salt_steps = Vec::with_capacity(nsteps);
        let mut u_steps = Vec::with_capacity(if with_velocities { nsteps } else { 0 });
        let mut v_steps = Vec::with_capacity(if with_velocities { nsteps } else { 0 });

        for step in 0..nsteps {
            let step_start = Instant::now();
            let record = source.load_step(step)?;
            self.validate_record(step, &record)?;
            times.push(record.seconds);

            let mut zeta_active = self.rho_set.extract(record.zeta.view())?;
            report.filled_horizontal += fill_invalid(&mut zeta_active);
            let mut zeta_t = self.f_rho.apply(&zeta_active)?;
            report.filled_horizontal += fill_invalid(&mut zeta_t);

            let temp_layers = self.interp_layers(&record.temp, &mut report)?;
            let salt_layers = self.interp_layers(&record.salt, &mut report)?;

            let uv_layers = if with_velocities {
                // Present after validate_record.
                let (u, v) = (record.u.as_ref().unwrap(), record.v.as_ref().unwrap());
                let (u_rho, v_rho) = average_uv_to_interior(u, v)?;
                let angle = self.interior_angle.as_ref().unwrap();
                let (u_east, v_north) = rotate_uv(&u_rho, &v_rho, angle)?;
                Some((
                    self.interp_uv_layers(&u_east, &mut report)?,
                    self.interp_uv_layers(&v_north, &mut report)?,
                ))
            } else {
                None
            };

            // Native depths at the target points for this step's free surface.
            let depths = self.sigma.depths(&self.h_target, Some(&zeta_t))?;

            let (temp_t, held) = self.resample_columns(&depths, &temp_layers)?;
            report.held_depth_targets += held;
            let (salt_t, held) = self.resample_columns(&depths, &salt_layers)?;
            report.held_depth_targets += held;
            if let Some((u_layers, v_layers)) = uv_layers {
                let (u_t, held) = self.resample_columns(&depths, &u_layers)?;
                report.held_depth_targets += held;
                let (v_t, held) = self.resample_columns(&depths, &v_layers)?;
                report.held_depth_targets += held;
                u_steps.push(u_t);
                v_steps.push(v_t);
            }
            temp_steps.push(temp_t);
            salt_steps.push(salt_t);
            zeta_steps.push(zeta_t);

            debug!(
                "Step {}/{} (t = {} s) regridded in {:?}",
                step + 1,
                nsteps,
                record.seconds,
                step_start.elapsed()
            );
        }

        self.phase = PipelinePhase::Finalizing;
        let resampler = TimeResampler::new(Array1::from(times), self.time_policy)?;
        let targets = self.target.seconds().clone();
        let nzt = self.depth_resampler.nlevels();

        let (zeta, clamped) = resampler.resample(&stack_rows(&zeta_steps), &targets)?;
        // All fields share the time axis; count each clamped instant once.
        report.clamped_time_targets = clamped;
        let temp = resample_time_3d(&resampler, &temp_steps, &targets, nzt, nx)?;
        let salt = resample_time_3d(&resampler, &salt_steps, &targets, nzt, nx)?;
        let (u, v) = if with_velocities {
            (
                Some(resample_time_3d(&resampler, &u_steps, &targets, nzt, nx)?),
                Some(resample_time_3d(&resampler, &v_steps, &targets, nzt, nx)?),
            )
        } else {
            (None, None)
        };

        info!(
            "Regrid finished in {:?}: {} filled, {} depth-held, {} time-clamped",
            run_start.elapsed(),
            report.filled_horizontal,
            report.held_depth_targets,
            report.clamped_time_targets
        );

        Ok(RegridOutput {
            zeta,
            temp,
            salt,
            u,
            v,
            report,
        })
    }

    fn validate_record(&self, step: usize, record: &StepRecord) -> Result<(), PipelineError> {
        let (eta, xi) = self.rho_set.field_shape();
        let ns = self.sigma.nlevels();
        check_shape_2d(step, "zeta", record.zeta.dim(), (eta, xi))?;
        check_shape_3d(step, "temp", record.temp.dim(), (ns, eta, xi))?;
        check_shape_3d(step, "salt", record.salt.dim(), (ns, eta, xi))?;
        if self.velocities() {
            match (&record.u, &record.v) {
                (Some(u), Some(v)) => {
                    check_shape_3d(step, "u", u.dim(), (ns, eta, xi - 1))?;
                    check_shape_3d(step, "v", v.dim(), (ns, eta - 1, xi))?;
                }
                _ => return Err(PipelineError::MissingVelocities { step }),
            }
        }
        Ok(())
    }

    /// Horizontally interpolate every sigma layer of a rho-point field onto
    /// the target points, filling sentinel values along the way.
    fn interp_layers(
        &self,
        field: &Array3<f64>,
        report: &mut DomainReport,
    ) -> Result<Array2<f64>, PipelineError> {
        Self::interp_layers_with(&self.rho_set, &self.f_rho, field, report)
    }

    fn interp_uv_layers(
        &self,
        field: &Array3<f64>,
        report: &mut DomainReport,
    ) -> Result<Array2<f64>, PipelineError> {
        // Both are Some whenever velocities are enabled.
        let set = self.uv_set.as_ref().unwrap();
        let f = self.f_uv.as_ref().unwrap();
        Self::interp_layers_with(set, f, field, report)
    }

    fn interp_layers_with(
        set: &ActiveSet,
        f: &HorizontalInterpolant,
        field: &Array3<f64>,
        report: &mut DomainReport,
    ) -> Result<Array2<f64>, PipelineError> {
        let nz = field.dim().0;
        let mut out = Array2::<f64>::zeros((nz, f.n_target()));
        for k in 0..nz {
            let mut values = set.extract(field.slice(s![k, .., ..]))?;
            report.filled_horizontal += fill_invalid(&mut values);
            let mut row = f.apply(&values)?;
            report.filled_horizontal += fill_invalid(&mut row);
            out.row_mut(k).assign(&row);
        }
        Ok(out)
    }

    /// Vertically resample every target column from this step's native
    /// depths onto the fixed target levels. Columns are independent, so the
    /// loop parallelizes over the horizontal point index.
    fn resample_columns(
        &self,
        depths: &Array2<f64>,
        layers: &Array2<f64>,
    ) -> Result<(Array2<f64>, usize), DepthResamplerError> {
        let nx = layers.ncols();
        let columns = (0..nx)
            .into_par_iter()
            .map(|i| {
                let z = depths.column(i).to_owned();
                let v = layers.column(i).to_owned();
                self.depth_resampler.resample(&z, &v)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut out = Array2::<f64>::zeros((self.depth_resampler.nlevels(), nx));
        let mut held = 0;
        for (i, (column, count)) in columns.into_iter().enumerate() {
            out.column_mut(i).assign(&column);
            held += count;
        }
        Ok((out, held))
    }
}

fn fill_invalid(values: &mut Array1<f64>) -> usize {
    let mut filled = 0;
    for v in values.iter_mut() {
        if !v.is_finite() || v.abs() >= FILL_THRESHOLD {
            *v = 0.0;
            filled += 1;
        }
    }
    filled
}

fn check_shape_2d(
    step: usize,
    name: &'static str,
    got: (usize, usize),
    expected: (usize, usize),
) -> Result<(), PipelineError> {
    if got != expected {
        return Err(PipelineError::FieldShape {
            step,
            name,
            expected: vec![expected.0, expected.1],
            got: vec![got.0, got.1],
        });
    }
    Ok(())
}

fn check_shape_3d(
    step: usize,
    name: &'static str,
    got: (usize, usize, usize),
    expected: (usize, usize, usize),
) -> Result<(), PipelineError> {
    if got != expected {
        return Err(PipelineError::FieldShape {
            step,
            name,
            expected: vec![expected.0, expected.1, expected.2],
            got: vec![got.0, got.1, got.2],
        });
    }
    Ok(())
}

fn stack_rows(rows: &[Array1<f64>]) -> Array2<f64> {
    let mut out = Array2::<f64>::zeros((rows.len(), rows[0].len()));
    for (r, row) in rows.iter().enumerate() {
        out.row_mut(r).assign(row);
    }
    out
}

/// Resample a per-step stack of `[nz, nx]` snapshots along time by
/// flattening each snapshot to one row.
fn resample_time_3d(
    resampler: &TimeResampler,
    steps: &[Array2<f64>],
    targets: &Array1<f64>,
    nz: usize,
    nx: usize,
) -> Result<Array3<f64>, PipelineError> {
    let mut stacked = Array2::<f64>::zeros((steps.len(), nz * nx));
    for (r, step) in steps.iter().enumerate() {
        for ((k, i), &value) in step.indexed_iter() {
            stacked[[r, k * nx + i]] = value;
        }
    }
    let (rows, _) = resampler.resample(&stacked, targets)?;
    Ok(Array3::from_shape_fn((targets.len(), nz, nx), |(t, k, i)| {
        rows[[t, k * nx + i]]
    }))
}
