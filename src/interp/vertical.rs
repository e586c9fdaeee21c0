// romsrs-regrid/src/interp/vertical.rs
//
// Per-column 1-D interpolation from a native depth profile onto fixed
// target depth levels. The native profile changes with every time step
// (it depends on that step's free surface), so this stage runs once per
// horizontal output point per step.

use ndarray::Array1;
use thiserror::Error;

/// Linear resampler onto a fixed set of target depth levels.
///
/// Targets outside the native profile span hold the boundary-nearest native
/// value; no slope extrapolation is ever performed. This is a deliberate
/// policy, not a library default.
#[derive(Clone, Debug)]
pub struct DepthResampler {
    target_z: Array1<f64>,
}

impl DepthResampler {
    pub fn new(target_z: Array1<f64>) -> Result<Self, DepthResamplerError> {
        if target_z.is_empty() {
            return Err(DepthResamplerError::EmptyTargetLevels);
        }
        if target_z.iter().any(|z| !z.is_finite()) {
            return Err(DepthResamplerError::NonFiniteTargetLevels);
        }
        Ok(Self { target_z })
    }

    pub fn target_z(&self) -> &Array1<f64> {
        &self.target_z
    }

    pub fn nlevels(&self) -> usize {
        self.target_z.len()
    }

    /// Interpolate one value profile onto the target levels.
    ///
    /// `z_native` must be strictly monotonic (either direction) and match
    /// `values` in length. Returns the resampled values together with the
    /// number of targets that fell outside the native span and were held at
    /// the boundary value.
    pub fn resample(
        &self,
        z_native: &Array1<f64>,
        values: &Array1<f64>,
    ) -> Result<(Array1<f64>, usize), DepthResamplerError> {
        let n = z_native.len();
        if n == 0 {
            return Err(DepthResamplerError::EmptyProfile);
        }
        if values.len() != n {
            return Err(DepthResamplerError::ProfileLengthMismatch {
                depths: n,
                values: values.len(),
            });
        }

        if n == 1 {
            // A single-layer profile degenerates to a constant column.
            let mut held = 0;
            let out = self.target_z.mapv(|zt| {
                if zt != z_native[0] {
                    held += 1;
                }
                values[0]
            });
            return Ok((out, held));
        }

        // Normalize to an ascending profile.
        let ascending = z_native[1] > z_native[0];
        let z_at = |idx: usize| {
            if ascending {
                z_native[idx]
            } else {
                z_native[n - 1 - idx]
            }
        };
        let v_at = |idx: usize| {
            if ascending {
                values[idx]
            } else {
                values[n - 1 - idx]
            }
        };
        for idx in 1..n {
            if !(z_at(idx) > z_at(idx - 1)) {
                return Err(DepthResamplerError::NonMonotonicProfile { index: idx });
            }
        }

        let mut held = 0;
        let mut out = Array1::<f64>::zeros(self.target_z.len());
        for (t, &zt) in self.target_z.iter().enumerate() {
            out[t] = if zt <= z_at(0) {
                if zt < z_at(0) {
                    held += 1;
                }
                v_at(0)
            } else if zt >= z_at(n - 1) {
                if zt > z_at(n - 1) {
                    held += 1;
                }
                v_at(n - 1)
            } else {
                // first index with z > zt; zt sits in (idx-1, idx]
                let mut lo = 0;
                let mut hi = n - 1;
                while hi - lo > 1 {
                    let mid = lo + (hi - lo) / 2;
                    if z_at(mid) < zt {
                        lo = mid;
                    } else {
                        hi = mid;
                    }
                }
                let w = (zt - z_at(lo)) / (z_at(hi) - z_at(lo));
                v_at(lo) + w * (v_at(hi) - v_at(lo))
            };
        }
        Ok((out, held))
    }
}

#[derive(Error, Debug)]
pub enum DepthResamplerError {
    #[error("the target depth level set is empty")]
    EmptyTargetLevels,
    #[error("target depth levels must be finite")]
    NonFiniteTargetLevels,
    #[error("the native depth profile is empty")]
    EmptyProfile,
    #[error("depth profile has {depths} levels but the value profile has {values}")]
    ProfileLengthMismatch { depths: usize, values: usize },
    #[error("the native depth profile is not strictly monotonic at index {index}")]
    NonMonotonicProfile { index: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const TOL: f64 = 1e-12;

    #[test]
    fn exact_native_depth_returns_native_value() {
        let resampler = DepthResampler::new(array![-5.0]).unwrap();
        let z = array![-8.3, -5.0, -1.7];
        let v = array![8.3, 5.0, 1.7];
        let (out, held) = resampler.resample(&z, &v).unwrap();
        assert!((out[0] - 5.0).abs() < TOL);
        assert_eq!(held, 0);
    }

    #[test]
    fn midpoint_is_linear() {
        let resampler = DepthResampler::new(array![-5.0]).unwrap();
        let z = array![-10.0, 0.0];
        let v = array![2.0, 4.0];
        let (out, _) = resampler.resample(&z, &v).unwrap();
        assert!((out[0] - 3.0).abs() < TOL);
    }

    #[test]
    fn out_of_range_targets_hold_the_boundary_value() {
        let resampler = DepthResampler::new(array![-50.0, 3.0]).unwrap();
        let z = array![-8.0, -4.0, -1.0];
        let v = array![1.0, 2.0, 3.0];
        let (out, held) = resampler.resample(&z, &v).unwrap();
        assert!((out[0] - 1.0).abs() < TOL, "deep target holds bottom value");
        assert!((out[1] - 3.0).abs() < TOL, "shallow target holds top value");
        assert_eq!(held, 2);
    }

    #[test]
    fn descending_profiles_are_handled() {
        let resampler = DepthResampler::new(array![-5.0, -20.0]).unwrap();
        let z = array![-1.0, -4.0, -8.0];
        let v = array![3.0, 2.0, 1.0];
        let (out, held) = resampler.resample(&z, &v).unwrap();
        assert!((out[0] - 1.75).abs() < TOL);
        assert!((out[1] - 1.0).abs() < TOL);
        assert_eq!(held, 1);
    }

    #[test]
    fn single_sample_profile_broadcasts() {
        let resampler = DepthResampler::new(array![-5.0, -1.0]).unwrap();
        let (out, held) = resampler.resample(&array![-3.0], &array![9.0]).unwrap();
        assert!((out[0] - 9.0).abs() < TOL);
        assert!((out[1] - 9.0).abs() < TOL);
        assert_eq!(held, 2);
    }

    #[test]
    fn rejects_non_monotonic_profile() {
        let resampler = DepthResampler::new(array![-5.0]).unwrap();
        let z = array![-8.0, -2.0, -4.0];
        let v = array![1.0, 2.0, 3.0];
        assert!(matches!(
            resampler.resample(&z, &v),
            Err(DepthResamplerError::NonMonotonicProfile { .. })
        ));
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let resampler = DepthResampler::new(array![-5.0]).unwrap();
        assert!(matches!(
            resampler.resample(&array![-8.0, -2.0], &array![1.0]),
            Err(DepthResamplerError::ProfileLengthMismatch {
                depths: 2,
                values: 1
            })
        ));
    }
}
