//! Viewer configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::types::Result;

/// Tunables for the loader, camera and viewport.
///
/// Every field has a default, so a config file only needs to name the
/// values it overrides.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Largest backing-store width in pixels
    pub max_width: u32,
    /// Largest backing-store height in pixels
    pub max_height: u32,
    /// Backing-store scale relative to the client size, per axis
    pub render_scale: [f32; 2],
    /// Near plane distance before the frustum fudge factor is applied
    pub z_near: f32,
    /// Far plane distance
    pub z_far: f32,
    /// Half-height of the frustum at the near plane
    pub frustum_fudge: f32,
    /// Initial translation of the view matrix
    pub initial_view: [f32; 3],
    /// Radians of model rotation per client width dragged
    pub drag_rotate: f32,
    /// Model units of vertical pan per client height dragged
    pub drag_pan: f32,
    /// Wheel delta to view translation factor
    pub wheel_scale: f32,
    /// Whether decoded chunks already carry vertex normals
    pub source_has_normals: bool,
    /// Rescale computed normals to unit length
    pub normalize_normals: bool,
    /// Default log filter when RUST_LOG is unset
    pub log_filter: String,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            max_width: 20480,
            max_height: 20480,
            render_scale: [1.0, 1.0],
            z_near: 3.0_f32.sqrt(),
            z_far: 100.0,
            frustum_fudge: 0.01,
            initial_view: [0.0, -0.5, -3.0],
            drag_rotate: 10.0,
            drag_pan: 2.0,
            wheel_scale: 1.0 / 200.0,
            source_has_normals: false,
            normalize_normals: true,
            log_filter: "info".to_string(),
        }
    }
}

impl ViewerConfig {
    /// Parse from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from a JSON file (sync)
    pub fn load_sync(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Save to a JSON file (sync)
    pub fn save_sync(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ViewerConfig::from_json(r#"{ "max_width": 1024, "normalize_normals": false }"#).unwrap();
        assert_eq!(config.max_width, 1024);
        assert!(!config.normalize_normals);
        assert_eq!(config.max_height, 20480);
        assert!((config.z_near - 1.7320508).abs() < 1e-6);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("viewer.json");

        let mut config = ViewerConfig::default();
        config.render_scale = [0.5, 0.5];
        config.save_sync(&path).unwrap();

        let loaded = ViewerConfig::load_sync(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_bad_json_is_reported() {
        let err = ViewerConfig::from_json("{ max_width: ").unwrap_err();
        assert!(matches!(err, crate::core::error::Error::Json(_)));
    }
}
