// romsrs-regrid/src/grid.rs
//
// Curvilinear horizontal mesh with the four staggered point classes of a
// ROMS-style discretization, plus the ActiveSet type that pins the
// mask-to-coordinate ordering used by the horizontal interpolants.

use ndarray::{s, Array1, Array2, ArrayView2};
use thiserror::Error;

/// One of the co-located horizontal grids of the staggered discretization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointClass {
    Rho,
    U,
    V,
    Psi,
}

/// Longitude, latitude and active/inactive mask for one point class.
/// All three arrays share the same 2-D shape.
#[derive(Clone, Debug)]
pub struct PointSet {
    lon: Array2<f64>,
    lat: Array2<f64>,
    mask: Array2<bool>,
}

impl PointSet {
    pub fn new(
        lon: Array2<f64>,
        lat: Array2<f64>,
        mask: Array2<bool>,
    ) -> Result<Self, GridBuilderError> {
        if lon.dim() != lat.dim() || lon.dim() != mask.dim() {
            return Err(GridBuilderError::PointSetShapeMismatch {
                lon: lon.dim(),
                lat: lat.dim(),
                mask: mask.dim(),
            });
        }
        Ok(Self { lon, lat, mask })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.lon.dim()
    }

    pub fn lon(&self) -> &Array2<f64> {
        &self.lon
    }

    pub fn lat(&self) -> &Array2<f64> {
        &self.lat
    }

    pub fn mask(&self) -> &Array2<bool> {
        &self.mask
    }
}

/// The ordered set of unmasked points of one point class.
///
/// The coordinate list and the value extraction both derive from a single
/// row-major pass over the mask captured at construction, so the pairing
/// between `coords()` and `extract()` cannot drift apart. Every horizontal
/// interpolant built from `coords()` must be fed values obtained through
/// `extract()` of the same `ActiveSet`.
#[derive(Clone, Debug)]
pub struct ActiveSet {
    coords: Array2<f64>,
    indices: Vec<(usize, usize)>,
    shape: (usize, usize),
}

impl ActiveSet {
    pub fn new(
        lon: ArrayView2<f64>,
        lat: ArrayView2<f64>,
        mask: ArrayView2<bool>,
    ) -> Result<Self, ActiveSetError> {
        if lon.dim() != lat.dim() || lon.dim() != mask.dim() {
            return Err(ActiveSetError::ShapeMismatch {
                lon: lon.dim(),
                lat: lat.dim(),
                mask: mask.dim(),
            });
        }
        let mut indices = Vec::new();
        for ((j, i), &active) in mask.indexed_iter() {
            if active {
                indices.push((j, i));
            }
        }
        if indices.is_empty() {
            return Err(ActiveSetError::NoActivePoints);
        }
        let mut coords = Array2::<f64>::zeros((indices.len(), 2));
        for (row, &(j, i)) in indices.iter().enumerate() {
            coords[[row, 0]] = lon[[j, i]];
            coords[[row, 1]] = lat[[j, i]];
        }
        Ok(Self {
            coords,
            indices,
            shape: mask.dim(),
        })
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// `[n_active, 2]` lon/lat pairs, in extraction order.
    pub fn coords(&self) -> &Array2<f64> {
        &self.coords
    }

    /// Shape of the 2-D fields this set selects from.
    pub fn field_shape(&self) -> (usize, usize) {
        self.shape
    }

    /// Values of `field` at the active points, in the same order as
    /// `coords()`.
    pub fn extract(&self, field: ArrayView2<f64>) -> Result<Array1<f64>, ActiveSetError> {
        if field.dim() != self.shape {
            return Err(ActiveSetError::FieldShapeMismatch {
                expected: self.shape,
                got: field.dim(),
            });
        }
        let mut values = Array1::<f64>::zeros(self.indices.len());
        for (row, &(j, i)) in self.indices.iter().enumerate() {
            values[row] = field[[j, i]];
        }
        Ok(values)
    }
}

/// Immutable grid container. Built once, then shared read-only by the
/// pipeline for its lifetime.
#[derive(Clone, Debug)]
pub struct Grid {
    rho: PointSet,
    u: PointSet,
    v: PointSet,
    psi: PointSet,
    h: Array2<f64>,
    angle: Array2<f64>,
    pm: Option<Array2<f64>>,
    pn: Option<Array2<f64>>,
}

impl Grid {
    pub fn points(&self, class: PointClass) -> &PointSet {
        match class {
            PointClass::Rho => &self.rho,
            PointClass::U => &self.u,
            PointClass::V => &self.v,
            PointClass::Psi => &self.psi,
        }
    }

    pub fn rho_shape(&self) -> (usize, usize) {
        self.rho.shape()
    }

    /// Rho-point bathymetry, positive down.
    pub fn h(&self) -> &Array2<f64> {
        &self.h
    }

    /// Grid-to-earth rotation angle at rho points, radians.
    pub fn angle(&self) -> &Array2<f64> {
        &self.angle
    }

    /// Inverse grid spacing factors, when the grid file carried them. The
    /// interpolation core never consumes these; they exist for derivative
    /// operators layered on top.
    pub fn spacing(&self) -> Option<(&Array2<f64>, &Array2<f64>)> {
        match (&self.pm, &self.pn) {
            (Some(pm), Some(pn)) => Some((pm, pn)),
            _ => None,
        }
    }

    /// Bathymetry averaged onto the requested point class.
    pub fn h_on(&self, class: PointClass) -> Array2<f64> {
        let h = &self.h;
        match class {
            PointClass::Rho => h.clone(),
            PointClass::Psi => {
                0.5 * (&h.slice(s![1.., 1..]) + &h.slice(s![..-1, ..-1]))
            }
            PointClass::U => 0.5 * (&h.slice(s![.., 1..]) + &h.slice(s![.., ..-1])),
            PointClass::V => 0.5 * (&h.slice(s![1.., ..]) + &h.slice(s![..-1, ..])),
        }
    }

    /// Active set of one point class, ordering fixed at construction.
    pub fn active_set(&self, class: PointClass) -> Result<ActiveSet, ActiveSetError> {
        let points = self.points(class);
        ActiveSet::new(
            points.lon().view(),
            points.lat().view(),
            points.mask().view(),
        )
    }

    /// Active set on the interior rho points (`1..eta-1` x `1..xi-1`), the
    /// grid that `rotate::average_uv_to_interior` produces velocity fields
    /// on. Requires at least a 3x3 rho grid.
    pub fn interior_active_set(&self) -> Result<ActiveSet, ActiveSetError> {
        let (eta, xi) = self.rho.shape();
        if eta < 3 || xi < 3 {
            return Err(ActiveSetError::GridTooSmall { eta, xi });
        }
        ActiveSet::new(
            self.rho.lon().slice(s![1..-1, 1..-1]),
            self.rho.lat().slice(s![1..-1, 1..-1]),
            self.rho.mask().slice(s![1..-1, 1..-1]),
        )
    }

    /// Rotation angle at the interior rho points.
    pub fn interior_angle(&self) -> Array2<f64> {
        self.angle.slice(s![1..-1, 1..-1]).to_owned()
    }

    /// (j, i) index of the grid cell nearest to (x, y) on the given class.
    pub fn nearest_index(&self, x: f64, y: f64, class: PointClass) -> (usize, usize) {
        let points = self.points(class);
        let mut best = (0, 0);
        let mut best_dist = f64::INFINITY;
        for ((j, i), &lon) in points.lon().indexed_iter() {
            let lat = points.lat()[[j, i]];
            let dist = (lon - x) * (lon - x) + (lat - y) * (lat - y);
            if dist < best_dist {
                best_dist = dist;
                best = (j, i);
            }
        }
        best
    }
}

#[derive(Default)]
pub struct GridBuilder<'a> {
    rho: Option<&'a PointSet>,
    u: Option<&'a PointSet>,
    v: Option<&'a PointSet>,
    psi: Option<&'a PointSet>,
    h: Option<&'a Array2<f64>>,
    angle: Option<&'a Array2<f64>>,
    pm: Option<&'a Array2<f64>>,
    pn: Option<&'a Array2<f64>>,
}

impl<'a> GridBuilder<'a> {
    pub fn build(&self) -> Result<Grid, GridBuilderError> {
        let rho = self
            .rho
            .ok_or_else(|| GridBuilderError::UninitializedFieldError("rho".to_string()))?;
        let (eta, xi) = rho.shape();
        if eta < 2 || xi < 2 {
            return Err(GridBuilderError::GridTooSmall { eta, xi });
        }
        let u = self
            .u
            .ok_or_else(|| GridBuilderError::UninitializedFieldError("u".to_string()))?;
        Self::validate_class_shape("u", u.shape(), (eta, xi - 1))?;
        let v = self
            .v
            .ok_or_else(|| GridBuilderError::UninitializedFieldError("v".to_string()))?;
        Self::validate_class_shape("v", v.shape(), (eta - 1, xi))?;
        let psi = self
            .psi
            .ok_or_else(|| GridBuilderError::UninitializedFieldError("psi".to_string()))?;
        Self::validate_class_shape("psi", psi.shape(), (eta - 1, xi - 1))?;
        let h = self
            .h
            .ok_or_else(|| GridBuilderError::UninitializedFieldError("h".to_string()))?;
        Self::validate_class_shape("h", h.dim(), (eta, xi))?;
        let angle = self
            .angle
            .ok_or_else(|| GridBuilderError::UninitializedFieldError("angle".to_string()))?;
        Self::validate_class_shape("angle", angle.dim(), (eta, xi))?;
        if let Some(pm) = self.pm {
            Self::validate_class_shape("pm", pm.dim(), (eta, xi))?;
        }
        if let Some(pn) = self.pn {
            Self::validate_class_shape("pn", pn.dim(), (eta, xi))?;
        }
        Ok(Grid {
            rho: rho.clone(),
            u: u.clone(),
            v: v.clone(),
            psi: psi.clone(),
            h: h.clone(),
            angle: angle.clone(),
            pm: self.pm.cloned(),
            pn: self.pn.cloned(),
        })
    }

    fn validate_class_shape(
        name: &'static str,
        got: (usize, usize),
        expected: (usize, usize),
    ) -> Result<(), GridBuilderError> {
        if got != expected {
            return Err(GridBuilderError::ClassShapeMismatch {
                name,
                expected,
                got,
            });
        }
        Ok(())
    }

    pub fn rho(&mut self, rho: &'a PointSet) -> &mut Self {
        self.rho = Some(rho);
        self
    }

    pub fn u(&mut self, u: &'a PointSet) -> &mut Self {
        self.u = Some(u);
        self
    }

    pub fn v(&mut self, v: &'a PointSet) -> &mut Self {
        self.v = Some(v);
        self
    }

    pub fn psi(&mut self, psi: &'a PointSet) -> &mut Self {
        self.psi = Some(psi);
        self
    }

    pub fn h(&mut self, h: &'a Array2<f64>) -> &mut Self {
        self.h = Some(h);
        self
    }

    pub fn angle(&mut self, angle: &'a Array2<f64>) -> &mut Self {
        self.angle = Some(angle);
        self
    }

    pub fn pm(&mut self, pm: &'a Array2<f64>) -> &mut Self {
        self.pm = Some(pm);
        self
    }

    pub fn pn(&mut self, pn: &'a Array2<f64>) -> &mut Self {
        self.pn = Some(pn);
        self
    }
}

#[derive(Error, Debug)]
pub enum GridBuilderError {
    #[error("Unitialized field on GridBuilder: {0}")]
    UninitializedFieldError(String),
    #[error("lon, lat and mask of a point set must share one shape, but got lon {lon:?}, lat {lat:?}, mask {mask:?}")]
    PointSetShapeMismatch {
        lon: (usize, usize),
        lat: (usize, usize),
        mask: (usize, usize),
    },
    #[error("{name} arrays must have shape {expected:?}, but got {got:?}")]
    ClassShapeMismatch {
        name: &'static str,
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("rho grid must be at least 2x2, but got {eta}x{xi}")]
    GridTooSmall { eta: usize, xi: usize },
}

#[derive(Error, Debug)]
pub enum ActiveSetError {
    #[error("lon, lat and mask must share one shape, but got lon {lon:?}, lat {lat:?}, mask {mask:?}")]
    ShapeMismatch {
        lon: (usize, usize),
        lat: (usize, usize),
        mask: (usize, usize),
    },
    #[error("the mask selects no active points")]
    NoActivePoints,
    #[error("field shape {got:?} does not match the mask shape {expected:?}")]
    FieldShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("an interior point class needs at least a 3x3 rho grid, but got {eta}x{xi}")]
    GridTooSmall { eta: usize, xi: usize },
}
