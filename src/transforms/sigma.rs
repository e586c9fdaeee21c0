// romsrs-regrid/src/transforms/sigma.rs

use ndarray::{Array1, Array2};
use thiserror::Error;

/// Which closed-form sigma-to-depth mapping applies. ROMS history files carry
/// this as the `Vtransform` flag; any value other than 1 or 2 is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerticalTransform {
    Transform1,
    Transform2,
}

impl TryFrom<i32> for VerticalTransform {
    type Error = SigmaCoordinateError;

    fn try_from(flag: i32) -> Result<Self, Self::Error> {
        match flag {
            1 => Ok(VerticalTransform::Transform1),
            2 => Ok(VerticalTransform::Transform2),
            other => Err(SigmaCoordinateError::InvalidTransformFlag(other)),
        }
    }
}

/// Terrain-following vertical coordinate definition: the dimensionless sigma
/// levels `s`, the matching stretching curve values `c`, the critical depth
/// `hc` and the transform selector.
///
/// `depths` is a pure function of its inputs; the pipeline calls it once per
/// native time step because the free surface varies with time.
#[derive(Clone, Debug)]
pub struct SigmaCoordinate {
    s: Array1<f64>,
    c: Array1<f64>,
    hc: f64,
    transform: VerticalTransform,
}

impl SigmaCoordinate {
    pub fn nlevels(&self) -> usize {
        self.s.len()
    }

    pub fn s(&self) -> &Array1<f64> {
        &self.s
    }

    pub fn c(&self) -> &Array1<f64> {
        &self.c
    }

    pub fn hc(&self) -> f64 {
        self.hc
    }

    pub fn transform(&self) -> VerticalTransform {
        self.transform
    }

    /// Physical depth of every (layer, point) pair at the supplied free
    /// surface. `h` is the local water-column depth (positive down), one
    /// entry per horizontal point; `zeta` is the free-surface elevation at
    /// the same points, or `None` for a flat zero surface.
    ///
    /// Returns an `[nlevels, npoints]` array. Depths are negative below the
    /// reference level, matching the sign convention of `s`.
    pub fn depths(
        &self,
        h: &Array1<f64>,
        zeta: Option<&Array1<f64>>,
    ) -> Result<Array2<f64>, SigmaCoordinateError> {
        for (index, &value) in h.iter().enumerate() {
            if !(value > 0.0) {
                return Err(SigmaCoordinateError::NonPositiveBathymetry { index, value });
            }
        }
        if let Some(zeta) = zeta {
            if zeta.len() != h.len() {
                return Err(SigmaCoordinateError::ZetaShapeMismatch {
                    expected: h.len(),
                    got: zeta.len(),
                });
            }
        }

        let n = self.s.len();
        let npoints = h.len();
        let mut z = Array2::<f64>::zeros((n, npoints));

        for k in 0..n {
            let (sk, ck) = (self.s[k], self.c[k]);
            let mut row = z.row_mut(k);
            match self.transform {
                VerticalTransform::Transform1 => {
                    for (i, zki) in row.iter_mut().enumerate() {
                        let eta = zeta.map_or(0.0, |zeta| zeta[i]);
                        let z0 = (sk - ck) * self.hc + ck * h[i];
                        *zki = z0 + eta * (1.0 + z0 / h[i]);
                    }
                }
                VerticalTransform::Transform2 => {
                    for (i, zki) in row.iter_mut().enumerate() {
                        let eta = zeta.map_or(0.0, |zeta| zeta[i]);
                        let z0 = (self.hc * sk + ck * h[i]) / (self.hc + h[i]);
                        *zki = eta + (eta + h[i]) * z0;
                    }
                }
            }
        }

        Ok(z)
    }
}

#[derive(Default)]
pub struct SigmaCoordinateBuilder<'a> {
    s: Option<&'a Array1<f64>>,
    c: Option<&'a Array1<f64>>,
    hc: Option<&'a f64>,
    transform: Option<&'a VerticalTransform>,
}

impl<'a> SigmaCoordinateBuilder<'a> {
    pub fn build(&self) -> Result<SigmaCoordinate, SigmaCoordinateError> {
        let s = self
            .s
            .ok_or_else(|| SigmaCoordinateError::UninitializedFieldError("s".to_string()))?;
        let c = self
            .c
            .ok_or_else(|| SigmaCoordinateError::UninitializedFieldError("c".to_string()))?;
        Self::validate_levels(s, c)?;
        let hc = self
            .hc
            .ok_or_else(|| SigmaCoordinateError::UninitializedFieldError("hc".to_string()))?;
        Self::validate_hc(hc)?;
        let transform = self.transform.ok_or_else(|| {
            SigmaCoordinateError::UninitializedFieldError("transform".to_string())
        })?;
        Ok(SigmaCoordinate {
            s: s.clone(),
            c: c.clone(),
            hc: *hc,
            transform: *transform,
        })
    }

    fn validate_levels(s: &Array1<f64>, c: &Array1<f64>) -> Result<(), SigmaCoordinateError> {
        if s.is_empty() {
            return Err(SigmaCoordinateError::EmptyLevels);
        }
        if s.len() != c.len() {
            return Err(SigmaCoordinateError::LevelLengthMismatch {
                s: s.len(),
                c: c.len(),
            });
        }
        if s.iter().any(|v| !v.is_finite()) || c.iter().any(|v| !v.is_finite()) {
            return Err(SigmaCoordinateError::NonFiniteLevels);
        }
        if s.len() > 1 {
            let ascending = s
                .as_slice()
                .expect("contiguous")
                .windows(2)
                .all(|pair| pair[0] < pair[1]);
            let descending = s
                .as_slice()
                .expect("contiguous")
                .windows(2)
                .all(|pair| pair[0] > pair[1]);
            if !ascending && !descending {
                return Err(SigmaCoordinateError::NonMonotonicLevels);
            }
        }
        Ok(())
    }

    fn validate_hc(hc: &f64) -> Result<(), SigmaCoordinateError> {
        if !hc.is_finite() || *hc < 0.0 {
            return Err(SigmaCoordinateError::InvalidCriticalDepth(*hc));
        }
        Ok(())
    }

    pub fn s(&mut self, s: &'a Array1<f64>) -> &mut Self {
        self.s = Some(s);
        self
    }

    pub fn c(&mut self, c: &'a Array1<f64>) -> &mut Self {
        self.c = Some(c);
        self
    }

    pub fn hc(&mut self, hc: &'a f64) -> &mut Self {
        self.hc = Some(hc);
        self
    }

    pub fn transform(&mut self, transform: &'a VerticalTransform) -> &mut Self {
        self.transform = Some(transform);
        self
    }
}

#[derive(Error, Debug)]
pub enum SigmaCoordinateError {
    #[error("Unitialized field on SigmaCoordinateBuilder: {0}")]
    UninitializedFieldError(String),
    #[error("vertical transform flag must be 1 or 2, but got {0}")]
    InvalidTransformFlag(i32),
    #[error("s and c must be of the same length. Got lengths {s} and {c} respectively")]
    LevelLengthMismatch { s: usize, c: usize },
    #[error("sigma level arrays must not be empty")]
    EmptyLevels,
    #[error("sigma level arrays must contain only finite values")]
    NonFiniteLevels,
    #[error("s must be strictly monotonic")]
    NonMonotonicLevels,
    #[error("hc must be finite and non-negative, but got {0}")]
    InvalidCriticalDepth(f64),
    #[error("bathymetry must be strictly positive, but h[{index}] = {value}")]
    NonPositiveBathymetry { index: usize, value: f64 },
    #[error("zeta must match the bathymetry length {expected}, but got {got}")]
    ZetaShapeMismatch { expected: usize, got: usize },
}
