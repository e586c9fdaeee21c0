// romsrs-regrid/src/transforms/mod.rs

pub use sigma::SigmaCoordinate;
pub use sigma::SigmaCoordinateBuilder;
pub use sigma::SigmaCoordinateError;
pub use sigma::VerticalTransform;

pub mod sigma;
