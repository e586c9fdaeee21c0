// romsrs-regrid/tests/regrid_pipeline_test.rs
//
// End-to-end pipeline runs on small synthetic grids where every stage has a
// closed-form expected value.

use ndarray::{array, Array1, Array2, Array3};
use romsrs_regrid::pipeline::{PipelineError, StepSourceError};
use romsrs_regrid::{
    Grid, GridBuilder, InterpMethod, OutOfRangePolicy, PointSet, RegridPipelineBuilder,
    SigmaCoordinate, SigmaCoordinateBuilder, StepRecord, StepSource, TargetSampling,
    VecStepSource, VerticalTransform,
};

const TOL: f64 = 1e-9;

const SIGMA_C: [f64; 3] = [-0.83, -0.5, -0.17];
const HC: f64 = 5.0;
const H: f64 = 10.0;

fn axis_points(eta: usize, xi: usize, offset: f64) -> PointSet {
    let mut lon = Array2::zeros((eta, xi));
    let mut lat = Array2::zeros((eta, xi));
    for j in 0..eta {
        for i in 0..xi {
            lon[[j, i]] = i as f64 + offset;
            lat[[j, i]] = j as f64 + offset;
        }
    }
    PointSet::new(lon, lat, Array2::from_elem((eta, xi), true)).unwrap()
}

/// All-active square grid with rho points on integer coordinates, constant
/// bathymetry and a constant rotation angle.
fn square_grid(n: usize, angle: f64) -> Grid {
    let rho = axis_points(n, n, 0.0);
    let u = axis_points(n, n - 1, 0.5);
    let v = axis_points(n - 1, n, 0.5);
    let psi = axis_points(n - 1, n - 1, 0.5);
    let h = Array2::from_elem((n, n), H);
    let ang = Array2::from_elem((n, n), angle);
    GridBuilder::default()
        .rho(&rho)
        .u(&u)
        .v(&v)
        .psi(&psi)
        .h(&h)
        .angle(&ang)
        .build()
        .unwrap()
}

fn sigma() -> SigmaCoordinate {
    let s = Array1::from(SIGMA_C.to_vec());
    let c = s.clone();
    let transform = VerticalTransform::Transform1;
    SigmaCoordinateBuilder::default()
        .s(&s)
        .c(&c)
        .hc(&HC)
        .transform(&transform)
        .build()
        .unwrap()
}

/// Native depth of sigma level `k` for constant `h` and a spatially uniform
/// free surface. With `s == c`, `z0` reduces to `c * h` under transform 1.
fn level_depth(k: usize, zeta: f64) -> f64 {
    let z0 = SIGMA_C[k] * H;
    z0 + zeta * (1.0 + z0 / H)
}

/// Step where every tracer layer holds a constant: temp is the negated
/// depth of its own layer (so temp is linear in z), salt is 35.
fn uniform_step(seconds: f64, zeta: f64, n: usize, velocities: bool) -> StepRecord {
    let nz = SIGMA_C.len();
    let temp = Array3::from_shape_fn((nz, n, n), |(k, _, _)| -level_depth(k, zeta));
    let salt = Array3::from_elem((nz, n, n), 35.0);
    let (u, v) = if velocities {
        (
            Some(Array3::from_elem((nz, n, n - 1), 1.0)),
            Some(Array3::from_elem((nz, n - 1, n), 0.0)),
        )
    } else {
        (None, None)
    };
    StepRecord {
        seconds,
        zeta: Array2::from_elem((n, n), zeta),
        temp,
        salt,
        u,
        v,
    }
}

#[test]
fn two_step_scalar_regrid_hits_closed_form_values() {
    let grid = square_grid(2, 0.0);
    let sigma = sigma();
    // One point in the middle of the cell, one depth between the native
    // levels, one instant halfway between the two steps.
    let target = TargetSampling::new(array![0.5], array![0.5], array![-5.0], array![1800.0])
        .unwrap();
    let velocities = false;
    let mut pipeline = RegridPipelineBuilder::default()
        .grid(&grid)
        .sigma(&sigma)
        .target(&target)
        .velocities(&velocities)
        .build()
        .unwrap();

    let mut source = VecStepSource::new(vec![
        uniform_step(0.0, 0.0, 2, false),
        uniform_step(3600.0, 1.0, 2, false),
    ]);
    let out = pipeline.run(&mut source).unwrap();

    // temp is -z at both steps, so sampling at z = -5 gives exactly 5 in
    // each, and the temporal midpoint is their mean.
    assert!((out.temp[[0, 0, 0]] - 5.0).abs() < TOL);
    assert!((out.salt[[0, 0, 0]] - 35.0).abs() < TOL);
    // zeta goes 0 -> 1, midpoint 0.5
    assert!((out.zeta[[0, 0]] - 0.5).abs() < TOL);
    assert!(out.u.is_none());
    assert!(out.v.is_none());
    assert_eq!(out.report.filled_horizontal, 0);
    assert_eq!(out.report.held_depth_targets, 0);
    assert_eq!(out.report.clamped_time_targets, 0);
}

#[test]
fn velocities_are_averaged_rotated_and_regridded() {
    // Constant eastward-in-grid flow on a grid rotated a quarter turn:
    // the earth-relative result must point north.
    let grid = square_grid(4, std::f64::consts::FRAC_PI_2);
    let sigma = sigma();
    let target = TargetSampling::new(array![1.5], array![1.5], array![-5.0], array![0.0])
        .unwrap();
    let mut pipeline = RegridPipelineBuilder::default()
        .grid(&grid)
        .sigma(&sigma)
        .target(&target)
        .build()
        .unwrap();

    let mut source = VecStepSource::new(vec![uniform_step(0.0, 0.0, 4, true)]);
    let out = pipeline.run(&mut source).unwrap();

    let u = out.u.unwrap();
    let v = out.v.unwrap();
    assert!(u[[0, 0, 0]].abs() < TOL, "u_east {} != 0", u[[0, 0, 0]]);
    assert!((v[[0, 0, 0]] - 1.0).abs() < TOL, "v_north {} != 1", v[[0, 0, 0]]);
    assert!((out.temp[[0, 0, 0]] - 5.0).abs() < TOL);
}

#[test]
fn sentinel_values_are_filled_and_counted() {
    let grid = square_grid(2, 0.0);
    let sigma = sigma();
    // -3 sits between the middle and top native levels, so the top layer
    // (where the sentinel lives) participates in the vertical blend
    let target =
        TargetSampling::new(array![0.5], array![0.5], array![-3.0], array![0.0]).unwrap();
    let velocities = false;
    let method = InterpMethod::Nearest { neighbors: 4 };
    let mut pipeline = RegridPipelineBuilder::default()
        .grid(&grid)
        .sigma(&sigma)
        .target(&target)
        .method(&method)
        .velocities(&velocities)
        .build()
        .unwrap();

    let mut step = uniform_step(0.0, 0.0, 2, false);
    // one masked-point sentinel in the top salt layer
    step.salt[[2, 0, 0]] = 1.0e37;
    let mut source = VecStepSource::new(vec![step]);
    let out = pipeline.run(&mut source).unwrap();

    assert_eq!(out.report.filled_horizontal, 1);
    // the sentinel became 0.0, so the 4-point mean of the top layer is 3/4
    // of the uniform salinity; blend that with the clean middle layer
    let diluted = 35.0 * 3.0 / 4.0;
    let w = (-3.0 - level_depth(1, 0.0)) / (level_depth(2, 0.0) - level_depth(1, 0.0));
    let expected = 35.0 + w * (diluted - 35.0);
    assert!((out.salt[[0, 0, 0]] - expected).abs() < TOL);
    // temp is -z, untouched by the sentinel
    assert!((out.temp[[0, 0, 0]] - 3.0).abs() < TOL);
}

#[test]
fn out_of_span_depth_targets_are_held_and_counted() {
    let grid = square_grid(2, 0.0);
    let sigma = sigma();
    // -50 is below the deepest native level, +3 above the shallowest
    let target = TargetSampling::new(
        array![0.5],
        array![0.5],
        array![-50.0, 3.0],
        array![0.0],
    )
    .unwrap();
    let velocities = false;
    let mut pipeline = RegridPipelineBuilder::default()
        .grid(&grid)
        .sigma(&sigma)
        .target(&target)
        .velocities(&velocities)
        .build()
        .unwrap();

    let mut source = VecStepSource::new(vec![uniform_step(0.0, 0.0, 2, false)]);
    let out = pipeline.run(&mut source).unwrap();

    assert!((out.temp[[0, 0, 0]] - 8.3).abs() < TOL, "bottom value held");
    assert!((out.temp[[0, 1, 0]] - 1.7).abs() < TOL, "surface value held");
    // two held targets for each of temp and salt
    assert_eq!(out.report.held_depth_targets, 4);
}

#[test]
fn target_instants_outside_the_record_fail_closed() {
    let grid = square_grid(2, 0.0);
    let sigma = sigma();
    let target =
        TargetSampling::new(array![0.5], array![0.5], array![-5.0], array![7200.0]).unwrap();
    let velocities = false;
    let mut pipeline = RegridPipelineBuilder::default()
        .grid(&grid)
        .sigma(&sigma)
        .target(&target)
        .velocities(&velocities)
        .build()
        .unwrap();

    let mut source = VecStepSource::new(vec![
        uniform_step(0.0, 0.0, 2, false),
        uniform_step(3600.0, 1.0, 2, false),
    ]);
    assert!(matches!(
        pipeline.run(&mut source),
        Err(PipelineError::TimeResamplerError(_))
    ));
}

#[test]
fn clamp_policy_holds_the_record_ends() {
    let grid = square_grid(2, 0.0);
    let sigma = sigma();
    let target =
        TargetSampling::new(array![0.5], array![0.5], array![-5.0], array![7200.0]).unwrap();
    let velocities = false;
    let policy = OutOfRangePolicy::Clamp;
    let mut pipeline = RegridPipelineBuilder::default()
        .grid(&grid)
        .sigma(&sigma)
        .target(&target)
        .time_policy(&policy)
        .velocities(&velocities)
        .build()
        .unwrap();

    let mut source = VecStepSource::new(vec![
        uniform_step(0.0, 0.0, 2, false),
        uniform_step(3600.0, 1.0, 2, false),
    ]);
    let out = pipeline.run(&mut source).unwrap();
    assert!((out.zeta[[0, 0]] - 1.0).abs() < TOL);
    assert_eq!(out.report.clamped_time_targets, 1);
}

#[test]
fn a_pipeline_runs_exactly_once() {
    let grid = square_grid(2, 0.0);
    let sigma = sigma();
    let target =
        TargetSampling::new(array![0.5], array![0.5], array![-5.0], array![0.0]).unwrap();
    let velocities = false;
    let mut pipeline = RegridPipelineBuilder::default()
        .grid(&grid)
        .sigma(&sigma)
        .target(&target)
        .velocities(&velocities)
        .build()
        .unwrap();

    let mut source = VecStepSource::new(vec![uniform_step(0.0, 0.0, 2, false)]);
    pipeline.run(&mut source).unwrap();
    let mut again = VecStepSource::new(vec![uniform_step(0.0, 0.0, 2, false)]);
    assert!(matches!(
        pipeline.run(&mut again),
        Err(PipelineError::AlreadyFinalized)
    ));
}

#[test]
fn empty_sources_and_load_failures_abort_the_run() {
    let grid = square_grid(2, 0.0);
    let sigma = sigma();
    let target =
        TargetSampling::new(array![0.5], array![0.5], array![-5.0], array![0.0]).unwrap();
    let velocities = false;

    let mut pipeline = RegridPipelineBuilder::default()
        .grid(&grid)
        .sigma(&sigma)
        .target(&target)
        .velocities(&velocities)
        .build()
        .unwrap();
    let mut empty = VecStepSource::new(vec![]);
    assert!(matches!(
        pipeline.run(&mut empty),
        Err(PipelineError::NoNativeSteps)
    ));

    struct FailingSource;
    impl StepSource for FailingSource {
        fn num_steps(&self) -> usize {
            1
        }
        fn load_step(&mut self, index: usize) -> Result<StepRecord, StepSourceError> {
            Err(StepSourceError::MissingField {
                step: index,
                name: "zeta",
            })
        }
    }
    let mut pipeline = RegridPipelineBuilder::default()
        .grid(&grid)
        .sigma(&sigma)
        .target(&target)
        .velocities(&velocities)
        .build()
        .unwrap();
    assert!(matches!(
        pipeline.run(&mut FailingSource),
        Err(PipelineError::StepSourceError(StepSourceError::MissingField { .. }))
    ));
}

#[test]
fn velocity_runs_require_velocity_fields() {
    let grid = square_grid(4, 0.0);
    let sigma = sigma();
    let target =
        TargetSampling::new(array![1.5], array![1.5], array![-5.0], array![0.0]).unwrap();
    let mut pipeline = RegridPipelineBuilder::default()
        .grid(&grid)
        .sigma(&sigma)
        .target(&target)
        .build()
        .unwrap();

    let mut source = VecStepSource::new(vec![uniform_step(0.0, 0.0, 4, false)]);
    assert!(matches!(
        pipeline.run(&mut source),
        Err(PipelineError::MissingVelocities { step: 0 })
    ));
}

#[test]
fn malformed_steps_are_rejected_with_the_field_name() {
    let grid = square_grid(2, 0.0);
    let sigma = sigma();
    let target =
        TargetSampling::new(array![0.5], array![0.5], array![-5.0], array![0.0]).unwrap();
    let velocities = false;
    let mut pipeline = RegridPipelineBuilder::default()
        .grid(&grid)
        .sigma(&sigma)
        .target(&target)
        .velocities(&velocities)
        .build()
        .unwrap();

    let mut step = uniform_step(0.0, 0.0, 2, false);
    step.temp = Array3::zeros((2, 2, 2));
    let mut source = VecStepSource::new(vec![step]);
    assert!(matches!(
        pipeline.run(&mut source),
        Err(PipelineError::FieldShape { name: "temp", .. })
    ));
}
