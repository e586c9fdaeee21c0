// romsrs-regrid/src/pipeline/target.rs

use ndarray::{Array1, Array2};
use thiserror::Error;

/// Where the caller wants values: scattered horizontal points, fixed depth
/// levels and output time instants. Immutable once constructed.
#[derive(Clone, Debug)]
pub struct TargetSampling {
    x: Array1<f64>,
    y: Array1<f64>,
    z_levels: Array1<f64>,
    seconds: Array1<f64>,
}

impl TargetSampling {
    pub fn new(
        x: Array1<f64>,
        y: Array1<f64>,
        z_levels: Array1<f64>,
        seconds: Array1<f64>,
    ) -> Result<Self, TargetSamplingError> {
        if x.len() != y.len() {
            return Err(TargetSamplingError::CoordinateLengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        if x.is_empty() {
            return Err(TargetSamplingError::NoPoints);
        }
        if z_levels.is_empty() {
            return Err(TargetSamplingError::NoDepthLevels);
        }
        if seconds.is_empty() {
            return Err(TargetSamplingError::NoInstants);
        }
        for (name, values) in [
            ("x", &x),
            ("y", &y),
            ("z_levels", &z_levels),
            ("seconds", &seconds),
        ] {
            if values.iter().any(|v| !v.is_finite()) {
                return Err(TargetSamplingError::NonFiniteValues { name });
            }
        }
        Ok(Self {
            x,
            y,
            z_levels,
            seconds,
        })
    }

    pub fn num_points(&self) -> usize {
        self.x.len()
    }

    pub fn num_levels(&self) -> usize {
        self.z_levels.len()
    }

    pub fn num_instants(&self) -> usize {
        self.seconds.len()
    }

    pub fn x(&self) -> &Array1<f64> {
        &self.x
    }

    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn z_levels(&self) -> &Array1<f64> {
        &self.z_levels
    }

    pub fn seconds(&self) -> &Array1<f64> {
        &self.seconds
    }

    /// `[n, 2]` coordinate pairs in point order, the layout the horizontal
    /// interpolant builder consumes.
    pub fn xy(&self) -> Array2<f64> {
        let mut xy = Array2::<f64>::zeros((self.x.len(), 2));
        for i in 0..self.x.len() {
            xy[[i, 0]] = self.x[i];
            xy[[i, 1]] = self.y[i];
        }
        xy
    }
}

#[derive(Error, Debug)]
pub enum TargetSamplingError {
    #[error("x has {x} points but y has {y}")]
    CoordinateLengthMismatch { x: usize, y: usize },
    #[error("the target sampling holds no horizontal points")]
    NoPoints,
    #[error("the target sampling holds no depth levels")]
    NoDepthLevels,
    #[error("the target sampling holds no time instants")]
    NoInstants,
    #[error("target {name} values must be finite")]
    NonFiniteValues { name: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn xy_pairs_follow_point_order() {
        let target = TargetSampling::new(
            array![1.0, 2.0],
            array![3.0, 4.0],
            array![-5.0],
            array![0.0],
        )
        .unwrap();
        let xy = target.xy();
        assert_eq!(xy.row(0).to_vec(), vec![1.0, 3.0]);
        assert_eq!(xy.row(1).to_vec(), vec![2.0, 4.0]);
    }

    #[test]
    fn rejects_mismatched_coordinates() {
        assert!(matches!(
            TargetSampling::new(array![1.0], array![1.0, 2.0], array![-5.0], array![0.0]),
            Err(TargetSamplingError::CoordinateLengthMismatch { x: 1, y: 2 })
        ));
    }

    #[test]
    fn rejects_empty_axes() {
        assert!(matches!(
            TargetSampling::new(array![], array![], array![-5.0], array![0.0]),
            Err(TargetSamplingError::NoPoints)
        ));
        assert!(matches!(
            TargetSampling::new(array![1.0], array![1.0], array![], array![0.0]),
            Err(TargetSamplingError::NoDepthLevels)
        ));
        assert!(matches!(
            TargetSampling::new(array![1.0], array![1.0], array![-5.0], array![]),
            Err(TargetSamplingError::NoInstants)
        ));
    }

    #[test]
    fn rejects_non_finite_values() {
        assert!(matches!(
            TargetSampling::new(
                array![1.0, f64::NAN],
                array![1.0, 2.0],
                array![-5.0],
                array![0.0]
            ),
            Err(TargetSamplingError::NonFiniteValues { name: "x" })
        ));
    }
}
