// romsrs-regrid/src/interp/temporal.rs
//
// Linear resampling of flattened field snapshots from the native output
// instants onto requested target instants. Runs once, after every native
// step has been regridded, over fields flattened to [nsteps, npoints].

use log::warn;
use ndarray::{s, Array1, Array2};
use thiserror::Error;

/// What to do with a target instant outside the native time span.
///
/// The default refuses the request outright. `Clamp` holds the nearest
/// native snapshot and counts the occurrence, for callers that knowingly
/// sample past the ends of a record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutOfRangePolicy {
    #[default]
    Error,
    Clamp,
}

/// Linear time resampler over a fixed native instant axis.
#[derive(Clone, Debug)]
pub struct TimeResampler {
    times: Array1<f64>,
    policy: OutOfRangePolicy,
}

impl TimeResampler {
    pub fn new(times: Array1<f64>, policy: OutOfRangePolicy) -> Result<Self, TimeResamplerError> {
        if times.is_empty() {
            return Err(TimeResamplerError::EmptyTimeAxis);
        }
        if times.iter().any(|t| !t.is_finite()) {
            return Err(TimeResamplerError::NonFiniteTimeAxis);
        }
        for idx in 1..times.len() {
            if !(times[idx] > times[idx - 1]) {
                return Err(TimeResamplerError::NonIncreasingTimeAxis { index: idx });
            }
        }
        Ok(Self { times, policy })
    }

    pub fn times(&self) -> &Array1<f64> {
        &self.times
    }

    pub fn policy(&self) -> OutOfRangePolicy {
        self.policy
    }

    /// Resample `snapshots` (`[nsteps, npoints]`, one row per native
    /// instant) onto `targets`. Returns the resampled rows together with
    /// the number of clamped target instants.
    ///
    /// A single-snapshot record is passed through unconditionally: every
    /// target gets the lone row, and any target away from the record's one
    /// instant counts as clamped regardless of policy.
    pub fn resample(
        &self,
        snapshots: &Array2<f64>,
        targets: &Array1<f64>,
    ) -> Result<(Array2<f64>, usize), TimeResamplerError> {
        let n = self.times.len();
        if snapshots.nrows() != n {
            return Err(TimeResamplerError::SnapshotCountMismatch {
                times: n,
                snapshots: snapshots.nrows(),
            });
        }
        if targets.iter().any(|t| !t.is_finite()) {
            return Err(TimeResamplerError::NonFiniteTarget);
        }

        let npoints = snapshots.ncols();
        let mut out = Array2::<f64>::zeros((targets.len(), npoints));
        let mut clamped = 0;

        if n == 1 {
            for (t, &tt) in targets.iter().enumerate() {
                if tt != self.times[0] {
                    clamped += 1;
                }
                out.slice_mut(s![t, ..]).assign(&snapshots.slice(s![0, ..]));
            }
            if clamped > 0 {
                warn!(
                    "single-snapshot record held for {} target instant(s) away from t={}",
                    clamped, self.times[0]
                );
            }
            return Ok((out, clamped));
        }

        let start = self.times[0];
        let end = self.times[n - 1];
        for (t, &tt) in targets.iter().enumerate() {
            if tt < start || tt > end {
                match self.policy {
                    OutOfRangePolicy::Error => {
                        return Err(TimeResamplerError::OutOfRange {
                            requested: tt,
                            start,
                            end,
                        });
                    }
                    OutOfRangePolicy::Clamp => {
                        clamped += 1;
                        let row = if tt < start { 0 } else { n - 1 };
                        out.slice_mut(s![t, ..]).assign(&snapshots.slice(s![row, ..]));
                        continue;
                    }
                }
            }
            // first index with time >= tt
            let mut lo = 0;
            let mut hi = n - 1;
            while hi - lo > 1 {
                let mid = lo + (hi - lo) / 2;
                if self.times[mid] < tt {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            let w = (tt - self.times[lo]) / (self.times[hi] - self.times[lo]);
            let lo_row = snapshots.slice(s![lo, ..]);
            let hi_row = snapshots.slice(s![hi, ..]);
            let blended = &lo_row * (1.0 - w) + &hi_row * w;
            out.slice_mut(s![t, ..]).assign(&blended);
        }
        if clamped > 0 {
            warn!(
                "{} target instant(s) outside [{}, {}] were clamped to the record ends",
                clamped, start, end
            );
        }
        Ok((out, clamped))
    }
}

#[derive(Error, Debug)]
pub enum TimeResamplerError {
    #[error("the native time axis is empty")]
    EmptyTimeAxis,
    #[error("the native time axis must be finite")]
    NonFiniteTimeAxis,
    #[error("the native time axis is not strictly increasing at index {index}")]
    NonIncreasingTimeAxis { index: usize },
    #[error("time axis has {times} instants but {snapshots} snapshot rows were given")]
    SnapshotCountMismatch { times: usize, snapshots: usize },
    #[error("target instants must be finite")]
    NonFiniteTarget,
    #[error("target instant {requested} is outside the native span [{start}, {end}]")]
    OutOfRange {
        requested: f64,
        start: f64,
        end: f64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const TOL: f64 = 1e-12;

    #[test]
    fn exact_native_instant_returns_that_snapshot() {
        let resampler =
            TimeResampler::new(array![0.0, 3600.0], OutOfRangePolicy::Error).unwrap();
        let snaps = array![[1.0, 2.0], [5.0, 6.0]];
        let (out, clamped) = resampler.resample(&snaps, &array![3600.0]).unwrap();
        assert!((out[[0, 0]] - 5.0).abs() < TOL);
        assert!((out[[0, 1]] - 6.0).abs() < TOL);
        assert_eq!(clamped, 0);
    }

    #[test]
    fn midpoint_blends_the_bracketing_snapshots() {
        let resampler =
            TimeResampler::new(array![0.0, 3600.0], OutOfRangePolicy::Error).unwrap();
        let snaps = array![[1.0, 2.0], [5.0, 6.0]];
        let (out, _) = resampler.resample(&snaps, &array![1800.0]).unwrap();
        assert!((out[[0, 0]] - 3.0).abs() < TOL);
        assert!((out[[0, 1]] - 4.0).abs() < TOL);
    }

    #[test]
    fn single_snapshot_records_pass_through() {
        let resampler = TimeResampler::new(array![100.0], OutOfRangePolicy::Error).unwrap();
        let snaps = array![[7.0, 8.0]];
        let (out, clamped) = resampler
            .resample(&snaps, &array![100.0, 250.0, -4.0])
            .unwrap();
        for t in 0..3 {
            assert!((out[[t, 0]] - 7.0).abs() < TOL);
            assert!((out[[t, 1]] - 8.0).abs() < TOL);
        }
        assert_eq!(clamped, 2);
    }

    #[test]
    fn out_of_range_fails_by_default() {
        let resampler =
            TimeResampler::new(array![0.0, 3600.0], OutOfRangePolicy::default()).unwrap();
        let snaps = array![[1.0], [5.0]];
        assert!(matches!(
            resampler.resample(&snaps, &array![7200.0]),
            Err(TimeResamplerError::OutOfRange { .. })
        ));
    }

    #[test]
    fn clamp_policy_holds_the_ends_and_counts() {
        let resampler =
            TimeResampler::new(array![0.0, 3600.0], OutOfRangePolicy::Clamp).unwrap();
        let snaps = array![[1.0], [5.0]];
        let (out, clamped) = resampler
            .resample(&snaps, &array![-100.0, 1800.0, 7200.0])
            .unwrap();
        assert!((out[[0, 0]] - 1.0).abs() < TOL);
        assert!((out[[1, 0]] - 3.0).abs() < TOL);
        assert!((out[[2, 0]] - 5.0).abs() < TOL);
        assert_eq!(clamped, 2);
    }

    #[test]
    fn rejects_non_increasing_axis() {
        assert!(matches!(
            TimeResampler::new(array![0.0, 10.0, 10.0], OutOfRangePolicy::Error),
            Err(TimeResamplerError::NonIncreasingTimeAxis { index: 2 })
        ));
    }

    #[test]
    fn rejects_mismatched_snapshot_count() {
        let resampler =
            TimeResampler::new(array![0.0, 3600.0], OutOfRangePolicy::Error).unwrap();
        let snaps = array![[1.0], [2.0], [3.0]];
        assert!(matches!(
            resampler.resample(&snaps, &array![0.0]),
            Err(TimeResamplerError::SnapshotCountMismatch {
                times: 2,
                snapshots: 3
            })
        ));
    }
}
