//! Incremental mesh streaming: manifest, chunks, materials and the loader

pub mod manifest;
pub mod chunk;
pub mod material;
pub mod loader;

pub use manifest::{DecodeParams, Manifest, MeshEntry, StreamRange, DECODE_COMPONENTS};
pub use chunk::DecodedChunk;
pub use material::{Material, MaterialTable, TextureSource};
pub use loader::{
    ChunkOutcome, LoadReport, LoadSink, LoadState, LoaderOptions, MeshUpdate,
    StreamingMeshLoader,
};
