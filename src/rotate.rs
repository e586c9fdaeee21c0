// romsrs-regrid/src/rotate.rs
//
// Staggered-grid velocity handling: averaging the u/v components onto the
// common interior rho points, and rotating grid-relative vectors to
// earth-relative east/north components. Rotation happens before any
// horizontal interpolation of vector fields; scalar fields never pass
// through this stage.

use ndarray::{s, Array2, Array3};
use thiserror::Error;

/// Rotate one grid-relative vector to earth-relative components.
#[inline]
pub fn rotate_components(u: f64, v: f64, angle: f64) -> (f64, f64) {
    let (sin, cos) = angle.sin_cos();
    (u * cos - v * sin, u * sin + v * cos)
}

/// Rotate layered velocity components by a per-point angle (radians,
/// grid-relative to earth-relative). Both components and the angle must
/// share their horizontal shape.
pub fn rotate_uv(
    u: &Array3<f64>,
    v: &Array3<f64>,
    angle: &Array2<f64>,
) -> Result<(Array3<f64>, Array3<f64>), RotationError> {
    if u.dim() != v.dim() {
        return Err(RotationError::ComponentShapeMismatch {
            u: u.dim(),
            v: v.dim(),
        });
    }
    let (nz, eta, xi) = u.dim();
    if angle.dim() != (eta, xi) {
        return Err(RotationError::AngleShapeMismatch {
            expected: (eta, xi),
            got: angle.dim(),
        });
    }

    let cos = angle.mapv(f64::cos);
    let sin = angle.mapv(f64::sin);
    let mut u_east = Array3::<f64>::zeros((nz, eta, xi));
    let mut v_north = Array3::<f64>::zeros((nz, eta, xi));
    for k in 0..nz {
        let uk = u.slice(s![k, .., ..]);
        let vk = v.slice(s![k, .., ..]);
        let mut uek = u_east.slice_mut(s![k, .., ..]);
        let mut vnk = v_north.slice_mut(s![k, .., ..]);
        for j in 0..eta {
            for i in 0..xi {
                uek[[j, i]] = uk[[j, i]] * cos[[j, i]] - vk[[j, i]] * sin[[j, i]];
                vnk[[j, i]] = uk[[j, i]] * sin[[j, i]] + vk[[j, i]] * cos[[j, i]];
            }
        }
    }
    Ok((u_east, v_north))
}

/// Average the staggered u (`[nz, eta, xi-1]`) and v (`[nz, eta-1, xi]`)
/// components onto the interior rho points, yielding a pair of
/// `[nz, eta-2, xi-2]` arrays co-located with `Grid::interior_active_set`.
pub fn average_uv_to_interior(
    u: &Array3<f64>,
    v: &Array3<f64>,
) -> Result<(Array3<f64>, Array3<f64>), RotationError> {
    let (nz_u, eta, xi_u) = u.dim();
    let (nz_v, eta_v, xi) = v.dim();
    if nz_u != nz_v || xi_u + 1 != xi || eta_v + 1 != eta {
        return Err(RotationError::StaggerMismatch {
            u: u.dim(),
            v: v.dim(),
        });
    }
    if eta < 3 || xi < 3 {
        return Err(RotationError::GridTooSmall { eta, xi });
    }

    // u at rho (j, i) is the mean of the u points flanking it in xi;
    // keep interior rows only.
    let u_interior = 0.5
        * (&u.slice(s![.., 1..eta - 1, ..xi_u - 1]) + &u.slice(s![.., 1..eta - 1, 1..]));
    // v at rho (j, i) is the mean of the v points flanking it in eta;
    // keep interior columns only.
    let v_interior = 0.5
        * (&v.slice(s![.., ..eta_v - 1, 1..xi - 1]) + &v.slice(s![.., 1.., 1..xi - 1]));

    Ok((u_interior, v_interior))
}

#[derive(Error, Debug)]
pub enum RotationError {
    #[error("velocity components must share one shape, but got u {u:?} and v {v:?}")]
    ComponentShapeMismatch {
        u: (usize, usize, usize),
        v: (usize, usize, usize),
    },
    #[error("angle shape {got:?} does not match the component horizontal shape {expected:?}")]
    AngleShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("u {u:?} and v {v:?} are not a consistent staggered pair")]
    StaggerMismatch {
        u: (usize, usize, usize),
        v: (usize, usize, usize),
    },
    #[error("staggered averaging needs at least a 3x3 rho grid, but got {eta}x{xi}")]
    GridTooSmall { eta: usize, xi: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    const TOL: f64 = 1e-12;

    #[test]
    fn zero_angle_is_identity() {
        let u = Array3::from_shape_fn((2, 3, 4), |(k, j, i)| (k + j + i) as f64);
        let v = Array3::from_shape_fn((2, 3, 4), |(k, j, i)| (k * j + i) as f64);
        let angle = Array2::zeros((3, 4));
        let (ue, vn) = rotate_uv(&u, &v, &angle).unwrap();
        for (a, b) in ue.iter().zip(u.iter()) {
            assert!((a - b).abs() < TOL);
        }
        for (a, b) in vn.iter().zip(v.iter()) {
            assert!((a - b).abs() < TOL);
        }
    }

    #[test]
    fn rotation_round_trips() {
        let u = Array3::from_shape_fn((1, 2, 2), |(_, j, i)| 1.0 + (j * 2 + i) as f64);
        let v = Array3::from_shape_fn((1, 2, 2), |(_, j, i)| -0.5 * (j + i) as f64);
        for theta in [-2.4, -0.3, 0.17, 1.2, 3.0] {
            let angle = Array2::from_elem((2, 2), theta);
            let back_angle = Array2::from_elem((2, 2), -theta);
            let (ue, vn) = rotate_uv(&u, &v, &angle).unwrap();
            let (ub, vb) = rotate_uv(&ue, &vn, &back_angle).unwrap();
            for (a, b) in ub.iter().zip(u.iter()) {
                assert!((a - b).abs() < 1e-10, "theta {}: {} != {}", theta, a, b);
            }
            for (a, b) in vb.iter().zip(v.iter()) {
                assert!((a - b).abs() < 1e-10, "theta {}: {} != {}", theta, a, b);
            }
        }
    }

    #[test]
    fn quarter_turn_swaps_components() {
        let (ue, vn) = rotate_components(1.0, 0.0, std::f64::consts::FRAC_PI_2);
        assert!(ue.abs() < TOL);
        assert!((vn - 1.0).abs() < TOL);
    }

    #[test]
    fn averaging_produces_interior_shape() {
        // rho grid 4x5: u is (4, 4), v is (3, 5)
        let u = Array3::from_shape_fn((2, 4, 4), |(_, _, i)| i as f64);
        let v = Array3::from_shape_fn((2, 3, 5), |(_, j, _)| j as f64);
        let (ui, vi) = average_uv_to_interior(&u, &v).unwrap();
        assert_eq!(ui.dim(), (2, 2, 3));
        assert_eq!(vi.dim(), (2, 2, 3));
        // u varies linearly in xi, so the mean of flanking points lands on
        // the rho column index
        assert!((ui[[0, 0, 0]] - 0.5).abs() < TOL);
        assert!((ui[[0, 0, 1]] - 1.5).abs() < TOL);
        // v varies linearly in eta
        assert!((vi[[0, 0, 0]] - 0.5).abs() < TOL);
        assert!((vi[[0, 1, 0]] - 1.5).abs() < TOL);
    }

    #[test]
    fn averaging_rejects_inconsistent_stagger() {
        let u = Array3::zeros((2, 4, 4));
        let v = Array3::zeros((2, 4, 5));
        assert!(matches!(
            average_uv_to_interior(&u, &v),
            Err(RotationError::StaggerMismatch { .. })
        ));
    }

    #[test]
    fn rotate_rejects_mismatched_angle() {
        let u = Array3::zeros((1, 2, 2));
        let v = Array3::zeros((1, 2, 2));
        let angle = Array2::zeros((3, 3));
        assert!(matches!(
            rotate_uv(&u, &v, &angle),
            Err(RotationError::AngleShapeMismatch { .. })
        ));
    }
}
