//! Meshstream - incremental streaming mesh loader and renderer

pub mod core;
pub mod math;
pub mod geometry;
pub mod render;
pub mod streaming;
pub mod session;
