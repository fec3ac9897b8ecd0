//! Mathematical utilities

pub mod bounds;

pub use bounds::{BoundingVolume, BOUNDS_STRIDE};
