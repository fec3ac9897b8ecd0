//! CPU-side geometry: vertex layouts, growable buffers, normals, display lists

pub mod vertex_format;
pub mod buffers;
pub mod normals;
pub mod display_list;

pub use vertex_format::{VertexAttribute, VertexFormat};
pub use buffers::{GeometryBuffers, GpuBuffers, MAX_VERTICES};
pub use normals::{compute_normals, NormalAccumulator};
pub use display_list::DisplayList;
