//! Decoded chunks as delivered by the transport layer

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{EntryKey, MeshError};
use crate::core::types::Result;
use crate::streaming::manifest::{DecodeParams, StreamRange};

fn default_normalize() -> bool {
    true
}

/// A contiguous, independently decoded piece of one sub-mesh.
///
/// Indices are absolute within the sub-mesh, so a chunk may reference
/// vertices delivered by earlier chunks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecodedChunk {
    /// Model (stream) name in the manifest
    pub model: String,
    /// Entry index within the model
    pub entry: usize,
    /// Stream span the attributes were decoded from
    pub attrib_range: StreamRange,
    /// Stream span the indices were decoded from
    pub index_range: StreamRange,
    /// Interleaved vertex components
    pub attribs: Vec<f32>,
    pub indices: Vec<u16>,
    /// Packed bounding volumes for the groups this chunk covers
    #[serde(default)]
    pub bboxen: Vec<f32>,
    /// Rescale computed normals to unit length
    #[serde(default = "default_normalize")]
    pub normalize: bool,
}

impl DecodedChunk {
    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.model.clone(), self.entry)
    }

    /// Build a chunk from quantized attribute codes
    #[allow(clippy::too_many_arguments)]
    pub fn from_quantized(
        model: impl Into<String>,
        entry: usize,
        attrib_range: StreamRange,
        index_range: StreamRange,
        codes: &[u16],
        indices: Vec<u16>,
        bboxen: Vec<f32>,
        params: &DecodeParams,
    ) -> std::result::Result<Self, MeshError> {
        Ok(Self {
            model: model.into(),
            entry,
            attrib_range,
            index_range,
            attribs: params.dequantize(codes)?,
            indices,
            bboxen,
            normalize: true,
        })
    }

    /// Load a recorded chunk sequence (a JSON array) from disk
    pub fn load_log(path: &Path) -> Result<Vec<DecodedChunk>> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
