// romsrs-regrid/src/interp/horizontal.rs
//
// Scattered-point horizontal interpolation bound to one fixed
// (source-point-set, target-point-set) pair. All neighbor searching and
// weight computation happens at construction; `apply` is a plain weighted
// sum and is called once per field per time step.

use libm::exp;
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};
use std::time::Instant;
use thiserror::Error;

/// Distance below which a target is treated as coincident with a source
/// point and short-circuits to that point's value.
const COINCIDENT_DIST_SQ: f64 = 1e-24;

/// Theoretical variogram models for the kriging weights.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariogramModel {
    Spherical,
    Exponential,
    Gaussian,
}

impl VariogramModel {
    /// Semivariance at lag `dist` for the given nugget/sill/range.
    fn gamma(&self, dist: f64, nugget: f64, sill: f64, range: f64) -> f64 {
        if dist <= 0.0 {
            return 0.0;
        }
        let partial = sill - nugget;
        match self {
            VariogramModel::Spherical => {
                if dist >= range {
                    sill
                } else {
                    let r = dist / range;
                    nugget + partial * (1.5 * r - 0.5 * r * r * r)
                }
            }
            VariogramModel::Exponential => nugget + partial * (1.0 - exp(-3.0 * dist / range)),
            VariogramModel::Gaussian => {
                nugget + partial * (1.0 - exp(-3.0 * dist * dist / (range * range)))
            }
        }
    }
}

/// Interpolation strategy, selected at construction. Defaults match the
/// upstream convention: inverse-distance over 3 neighbors with power 1.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InterpMethod {
    /// Plain mean over the nearest `neighbors` source points.
    Nearest { neighbors: usize },
    /// Inverse-distance weighting with the given power exponent.
    InverseDistance { neighbors: usize, power: f64 },
    /// Ordinary kriging over the nearest `neighbors` source points.
    Kriging {
        model: VariogramModel,
        nugget: f64,
        sill: f64,
        range: f64,
        neighbors: usize,
    },
}

impl Default for InterpMethod {
    fn default() -> Self {
        InterpMethod::InverseDistance {
            neighbors: 3,
            power: 1.0,
        }
    }
}

impl InterpMethod {
    fn neighbors(&self) -> usize {
        match *self {
            InterpMethod::Nearest { neighbors } => neighbors,
            InterpMethod::InverseDistance { neighbors, .. } => neighbors,
            InterpMethod::Kriging { neighbors, .. } => neighbors,
        }
    }

    fn validate(&self) -> Result<(), HorizontalInterpolantError> {
        if self.neighbors() == 0 {
            return Err(HorizontalInterpolantError::InvalidNeighborCount);
        }
        match *self {
            InterpMethod::InverseDistance { power, .. } => {
                if !power.is_finite() || power <= 0.0 {
                    return Err(HorizontalInterpolantError::InvalidPower(power));
                }
            }
            InterpMethod::Kriging {
                nugget,
                sill,
                range,
                ..
            } => {
                if !(nugget >= 0.0 && sill > nugget) {
                    return Err(HorizontalInterpolantError::InvalidVariogramSill {
                        nugget,
                        sill,
                    });
                }
                if !range.is_finite() || range <= 0.0 {
                    return Err(HorizontalInterpolantError::InvalidVariogramRange(range));
                }
            }
            InterpMethod::Nearest { .. } => {}
        }
        Ok(())
    }
}

/// Build-once, apply-many scattered-point interpolant.
///
/// Holds, per target point, the source indices and weights that `apply`
/// combines. Read-only after construction; safe to share across threads.
pub struct HorizontalInterpolant {
    n_source: usize,
    weights: Vec<Vec<(usize, f64)>>,
}

impl HorizontalInterpolant {
    /// Build the interpolant for a fixed pair of point sets. `source` and
    /// `target` are `[n, 2]` coordinate arrays. This is the expensive step;
    /// perform it exactly once per point class.
    pub fn build(
        source: &Array2<f64>,
        target: &Array2<f64>,
        method: &InterpMethod,
    ) -> Result<Self, HorizontalInterpolantError> {
        method.validate()?;
        if source.ncols() != 2 || target.ncols() != 2 {
            return Err(HorizontalInterpolantError::CoordinateColumns {
                source_cols: source.ncols(),
                target: target.ncols(),
            });
        }
        let n_source = source.nrows();
        let n_target = target.nrows();
        if n_source == 0 {
            return Err(HorizontalInterpolantError::EmptySourcePoints);
        }
        if n_target == 0 {
            return Err(HorizontalInterpolantError::EmptyTargetPoints);
        }
        let nnear = method.neighbors();
        if nnear > n_source {
            return Err(HorizontalInterpolantError::NotEnoughSourcePoints {
                needed: nnear,
                available: n_source,
            });
        }

        info!(
            "Building horizontal interpolant: {} source points, {} target points, {:?}",
            n_source, n_target, method
        );
        let start = Instant::now();

        let mut weights = Vec::with_capacity(n_target);
        let mut dist_sq = vec![(0usize, 0.0f64); n_source];
        for t in 0..n_target {
            let (tx, ty) = (target[[t, 0]], target[[t, 1]]);
            for (row, entry) in dist_sq.iter_mut().enumerate() {
                let dx = source[[row, 0]] - tx;
                let dy = source[[row, 1]] - ty;
                *entry = (row, dx * dx + dy * dy);
            }
            dist_sq.select_nth_unstable_by(nnear - 1, |a, b| {
                a.1.partial_cmp(&b.1).expect("finite distances")
            });
            let mut neighborhood: Vec<(usize, f64)> = dist_sq[..nnear].to_vec();
            neighborhood
                .sort_unstable_by(|a, b| a.1.partial_cmp(&b.1).expect("finite distances"));

            Self::check_for_duplicates(source, &neighborhood)?;

            // A target sitting on a source point reproduces that value for
            // every strategy.
            if neighborhood[0].1 < COINCIDENT_DIST_SQ {
                weights.push(vec![(neighborhood[0].0, 1.0)]);
                continue;
            }

            let w = match *method {
                InterpMethod::Nearest { neighbors } => {
                    let share = 1.0 / neighbors as f64;
                    neighborhood.iter().map(|&(row, _)| (row, share)).collect()
                }
                InterpMethod::InverseDistance { power, .. } => {
                    let raw: Vec<f64> = neighborhood
                        .iter()
                        .map(|&(_, d2)| 1.0 / d2.sqrt().powf(power))
                        .collect();
                    let total: f64 = raw.iter().sum();
                    neighborhood
                        .iter()
                        .zip(raw.iter())
                        .map(|(&(row, _), &w)| (row, w / total))
                        .collect()
                }
                InterpMethod::Kriging {
                    model,
                    nugget,
                    sill,
                    range,
                    ..
                } => Self::kriging_weights(
                    source,
                    (tx, ty),
                    &neighborhood,
                    model,
                    nugget,
                    sill,
                    range,
                )
                .ok_or(HorizontalInterpolantError::SingularKrigingSystem { target: t })?,
            };
            weights.push(w);
        }

        debug!(
            "Horizontal interpolant built in {:?} ({} weight sets)",
            start.elapsed(),
            weights.len()
        );

        Ok(Self { n_source, weights })
    }

    /// Ordinary kriging: solve the augmented semivariance system for one
    /// neighborhood. Returns `None` when the system is singular.
    fn kriging_weights(
        source: &Array2<f64>,
        target: (f64, f64),
        neighborhood: &[(usize, f64)],
        model: VariogramModel,
        nugget: f64,
        sill: f64,
        range: f64,
    ) -> Option<Vec<(usize, f64)>> {
        let k = neighborhood.len();
        let mut a = DMatrix::<f64>::zeros(k + 1, k + 1);
        for p in 0..k {
            let (rp, _) = neighborhood[p];
            for q in 0..k {
                let (rq, _) = neighborhood[q];
                let dx = source[[rp, 0]] - source[[rq, 0]];
                let dy = source[[rp, 1]] - source[[rq, 1]];
                a[(p, q)] = model.gamma((dx * dx + dy * dy).sqrt(), nugget, sill, range);
            }
            a[(p, k)] = 1.0;
            a[(k, p)] = 1.0;
        }
        let b = DVector::<f64>::from_fn(k + 1, |p, _| {
            if p == k {
                1.0
            } else {
                model.gamma(neighborhood[p].1.sqrt(), nugget, sill, range)
            }
        });
        let solution = a.lu().solve(&b)?;
        if solution.iter().take(k).any(|w| !w.is_finite()) {
            return None;
        }
        Some(
            neighborhood
                .iter()
                .enumerate()
                .map(|(p, &(row, _))| (row, solution[p]))
                .collect(),
        )
    }

    fn check_for_duplicates(
        source: &Array2<f64>,
        neighborhood: &[(usize, f64)],
    ) -> Result<(), HorizontalInterpolantError> {
        for p in 0..neighborhood.len() {
            for q in p + 1..neighborhood.len() {
                let (rp, rq) = (neighborhood[p].0, neighborhood[q].0);
                let dx = source[[rp, 0]] - source[[rq, 0]];
                let dy = source[[rp, 1]] - source[[rq, 1]];
                if dx * dx + dy * dy < COINCIDENT_DIST_SQ {
                    return Err(HorizontalInterpolantError::DuplicateSourcePoints {
                        first: rp,
                        second: rq,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn n_source(&self) -> usize {
        self.n_source
    }

    pub fn n_target(&self) -> usize {
        self.weights.len()
    }

    /// Map one array of source-point values (ordered as the construction
    /// coordinates) onto the target points. Pure function of `values`.
    pub fn apply(&self, values: &Array1<f64>) -> Result<Array1<f64>, HorizontalInterpolantError> {
        if values.len() != self.n_source {
            return Err(HorizontalInterpolantError::SourceLengthMismatch {
                expected: self.n_source,
                got: values.len(),
            });
        }
        let mut out = Array1::<f64>::zeros(self.weights.len());
        for (t, weights) in self.weights.iter().enumerate() {
            out[t] = weights.iter().map(|&(row, w)| w * values[row]).sum();
        }
        Ok(out)
    }
}

#[derive(Error, Debug)]
pub enum HorizontalInterpolantError {
    #[error("the source point set is empty")]
    EmptySourcePoints,
    #[error("the target point set is empty")]
    EmptyTargetPoints,
    #[error("coordinate arrays must have 2 columns, but got {source_cols} (source) and {target} (target)")]
    CoordinateColumns { source_cols: usize, target: usize },
    #[error("the neighbor count must be at least 1")]
    InvalidNeighborCount,
    #[error("{needed} neighbors requested but only {available} source points available")]
    NotEnoughSourcePoints { needed: usize, available: usize },
    #[error("the inverse-distance power must be finite and positive, but got {0}")]
    InvalidPower(f64),
    #[error("the variogram sill must exceed the nugget, but got nugget {nugget} and sill {sill}")]
    InvalidVariogramSill { nugget: f64, sill: f64 },
    #[error("the variogram range must be finite and positive, but got {0}")]
    InvalidVariogramRange(f64),
    #[error("source points {first} and {second} are duplicates")]
    DuplicateSourcePoints { first: usize, second: usize },
    #[error("the kriging system for target point {target} is singular")]
    SingularKrigingSystem { target: usize },
    #[error("expected {expected} source values, but got {got}")]
    SourceLengthMismatch { expected: usize, got: usize },
}
