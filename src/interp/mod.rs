// romsrs-regrid/src/interp/mod.rs

pub mod horizontal;
pub mod temporal;
pub mod vertical;

pub use horizontal::{HorizontalInterpolant, HorizontalInterpolantError, InterpMethod, VariogramModel};
pub use temporal::{OutOfRangePolicy, TimeResampler, TimeResamplerError};
pub use vertical::{DepthResampler, DepthResamplerError};
