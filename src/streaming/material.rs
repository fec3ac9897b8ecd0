//! Material library

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::types::Result;
use crate::render::device::TextureImage;

/// Diffuse properties of one material, as named in the MTL file
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    /// Diffuse color
    #[serde(rename = "Kd", default, skip_serializing_if = "Option::is_none")]
    pub diffuse: Option<[u8; 3]>,
    /// Transparency, 0 (opaque) to 255; alpha is `255 - d`
    #[serde(rename = "d", default, skip_serializing_if = "Option::is_none")]
    pub transparency: Option<u8>,
    /// Diffuse texture URL
    #[serde(rename = "map_Kd", default, skip_serializing_if = "Option::is_none")]
    pub diffuse_map: Option<String>,
}

static EMPTY_MATERIAL: Material = Material {
    diffuse: None,
    transparency: None,
    diffuse_map: None,
};

/// How a material's texture is obtained
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextureSource {
    /// Known immediately
    Solid(TextureImage),
    /// Must be fetched from a URL
    Fetch(String),
}

impl Material {
    /// A non-empty `map_Kd` wins; otherwise a 1x1 texture of `Kd` (white
    /// when absent), with alpha only when the material is transparent.
    pub fn texture_source(&self) -> TextureSource {
        match self.diffuse_map.as_deref() {
            Some(url) if !url.is_empty() => TextureSource::Fetch(url.to_string()),
            _ => {
                let alpha = 255 - self.transparency.unwrap_or(0);
                let color = self.diffuse.unwrap_or([255, 255, 255]);
                TextureSource::Solid(TextureImage::solid(color, (alpha < 255).then_some(alpha)))
            }
        }
    }
}

/// Read-only table of materials keyed by name
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialTable {
    materials: HashMap<String, Material>,
}

impl MaterialTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file (sync)
    pub fn load_sync(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn insert(&mut self, name: impl Into<String>, material: Material) {
        self.materials.insert(name.into(), material);
    }

    /// Look up a material; unknown names get the empty (white) material
    pub fn get(&self, name: &str) -> &Material {
        self.materials.get(name).unwrap_or(&EMPTY_MATERIAL)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}
