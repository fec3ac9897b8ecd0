//! Model manifest: which sub-meshes a stream holds and where
//!
//! The manifest is produced by the external compressor alongside the
//! compressed model. Ranges are offsets into that stream; their unit is
//! whatever the transport uses and only has to be consistent between the
//! manifest and the delivered chunks.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{EntryKey, MeshError};
use crate::core::types::Result;

/// Number of interleaved components the decode parameters describe
pub const DECODE_COMPONENTS: usize = 8;

/// `[offset, length]` span of the stream
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "[u64; 2]", into = "[u64; 2]")]
pub struct StreamRange {
    pub offset: u64,
    pub length: u64,
}

impl StreamRange {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// One past the last offset, saturating at `u64::MAX`
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    /// One past the last offset, `None` if the range runs past `u64::MAX`
    pub fn checked_end(&self) -> Option<u64> {
        self.offset.checked_add(self.length)
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Whether `other` lies entirely inside this range. A range that
    /// overflows is never contained, nor contains anything.
    pub fn contains(&self, other: &StreamRange) -> bool {
        match (self.checked_end(), other.checked_end()) {
            (Some(end), Some(other_end)) => other.offset >= self.offset && other_end <= end,
            _ => false,
        }
    }
}

impl From<[u64; 2]> for StreamRange {
    fn from([offset, length]: [u64; 2]) -> Self {
        Self { offset, length }
    }
}

impl From<StreamRange> for [u64; 2] {
    fn from(range: StreamRange) -> Self {
        [range.offset, range.length]
    }
}

/// One sub-mesh: a material and the stream ranges carrying its attributes
/// and indices.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshEntry {
    #[serde(default)]
    pub material: String,
    pub attrib_range: StreamRange,
    pub index_range: StreamRange,
    /// Stream offset of the packed bounding volumes, when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bboxes: Option<u64>,
    /// Group names, one per entry of `lengths`
    #[serde(default)]
    pub names: Vec<String>,
    /// Group sizes in indices; prefix sums give group starts
    #[serde(default)]
    pub lengths: Vec<u32>,
}

/// Per-component dequantization: `value = (code + offset) * scale`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodeParams {
    pub decode_offsets: [f32; DECODE_COMPONENTS],
    pub decode_scales: [f32; DECODE_COMPONENTS],
}

impl DecodeParams {
    /// Turn interleaved integer codes back into floats. `codes.len()` must
    /// be a multiple of eight.
    pub fn dequantize(&self, codes: &[u16]) -> std::result::Result<Vec<f32>, MeshError> {
        if codes.len() % DECODE_COMPONENTS != 0 {
            return Err(MeshError::Format(format!(
                "{} quantized components is not a multiple of {}",
                codes.len(),
                DECODE_COMPONENTS
            )));
        }
        Ok(codes
            .iter()
            .enumerate()
            .map(|(i, &code)| {
                let c = i % DECODE_COMPONENTS;
                (code as f32 + self.decode_offsets[c]) * self.decode_scales[c]
            })
            .collect())
    }
}

impl Default for DecodeParams {
    /// Identity decode
    fn default() -> Self {
        Self {
            decode_offsets: [0.0; DECODE_COMPONENTS],
            decode_scales: [1.0; DECODE_COMPONENTS],
        }
    }
}

/// Models in a stream, each a list of sub-mesh entries
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub decode: DecodeParams,
    pub models: BTreeMap<String, Vec<MeshEntry>>,
}

impl Manifest {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file (sync)
    pub fn load_sync(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn entry(&self, key: &EntryKey) -> Option<&MeshEntry> {
        self.models.get(&key.model)?.get(key.index)
    }

    /// Every entry with its key, models in name order
    pub fn entries(&self) -> impl Iterator<Item = (EntryKey, &MeshEntry)> + '_ {
        self.models.iter().flat_map(|(model, entries)| {
            entries
                .iter()
                .enumerate()
                .map(move |(index, entry)| (EntryKey::new(model.clone(), index), entry))
        })
    }

    pub fn entry_count(&self) -> usize {
        self.models.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALT: &str = r#"{
        "decode": {
            "decodeOffsets": [-6000, -4095, -6000, 0, 0, -511, -511, -511],
            "decodeScales": [0.5, 0.5, 0.5, 1, 1, 0.25, 0.25, 0.25]
        },
        "models": {
            "walt.utf8": [
                { "material": "skin", "attribRange": [0, 55294], "indexRange": [442352, 108806],
                  "names": ["head", "torso"], "lengths": [600, 300] },
                { "material": "", "attribRange": [768770, 27187], "indexRange": [986266, 52810], "bboxes": 1039076 }
            ]
        }
    }"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::from_json(WALT).unwrap();
        assert_eq!(manifest.entry_count(), 2);

        let first = manifest.entry(&EntryKey::new("walt.utf8", 0)).unwrap();
        assert_eq!(first.attrib_range, StreamRange::new(0, 55294));
        assert_eq!(first.index_range.end(), 442352 + 108806);
        assert_eq!(first.names, vec!["head", "torso"]);
        assert_eq!(first.bboxes, None);

        let second = manifest.entry(&EntryKey::new("walt.utf8", 1)).unwrap();
        assert_eq!(second.bboxes, Some(1039076));
        assert!(second.lengths.is_empty());
        assert!(manifest.entry(&EntryKey::new("walt.utf8", 2)).is_none());

        let keys: Vec<String> = manifest.entries().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["walt.utf8#0", "walt.utf8#1"]);
    }

    #[test]
    fn test_range_roundtrips_as_pair() {
        let json = serde_json::to_string(&StreamRange::new(4, 10)).unwrap();
        assert_eq!(json, "[4,10]");
    }

    #[test]
    fn test_range_containment() {
        let outer = StreamRange::new(100, 50);
        assert!(outer.contains(&StreamRange::new(100, 50)));
        assert!(outer.contains(&StreamRange::new(120, 0)));
        assert!(!outer.contains(&StreamRange::new(140, 20)));
        assert!(!outer.contains(&StreamRange::new(90, 5)));
    }

    #[test]
    fn test_overflowing_range() {
        let wild = StreamRange::new(u64::MAX, 24);
        assert_eq!(wild.checked_end(), None);
        assert_eq!(wild.end(), u64::MAX);
        assert!(!StreamRange::new(0, u64::MAX).contains(&wild));
        assert!(!wild.contains(&StreamRange::new(u64::MAX, 0)));
    }

    #[test]
    fn test_dequantize() {
        let manifest = Manifest::from_json(WALT).unwrap();
        let codes = [6000, 4095, 6002, 7, 9, 511, 1022, 0];
        let values = manifest.decode.dequantize(&codes).unwrap();
        assert_eq!(values, vec![0.0, 0.0, 1.0, 7.0, 9.0, 0.0, 127.75, -127.75]);
        assert!(manifest.decode.dequantize(&codes[..5]).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, WALT).unwrap();
        assert_eq!(Manifest::load_sync(&path).unwrap(), Manifest::from_json(WALT).unwrap());
        assert!(Manifest::load_sync(&dir.path().join("missing.json")).is_err());
    }
}
