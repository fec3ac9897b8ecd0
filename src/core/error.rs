//! Error types for the mesh streaming pipeline

use std::fmt;
use thiserror::Error;

/// Identifies one MeshEntry: the model it belongs to and its position in
/// that model's entry list.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
    pub model: String,
    pub index: usize,
}

impl EntryKey {
    pub fn new(model: impl Into<String>, index: usize) -> Self {
        Self { model: model.into(), index }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.model, self.index)
    }
}

/// Errors that are fatal to a single mesh but never to the whole stream
#[derive(Clone, Debug, Error, PartialEq)]
pub enum MeshError {
    /// Malformed or misaligned chunk data
    #[error("format error: {0}")]
    Format(String),

    /// An index references a vertex outside the current buffer
    #[error("index {index} out of range for {vertex_count} vertices")]
    Range { index: u32, vertex_count: u32 },

    /// A chunk does not match any declared MeshEntry range
    #[error("unknown range: {0}")]
    UnknownRange(String),

    /// Ranges delivered out of order
    #[error("order error: {0}")]
    Order(String),
}

/// Main error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("mesh {key}: {source}")]
    Mesh {
        key: EntryKey,
        #[source]
        source: MeshError,
    },

    /// Graphics device resource creation, compile or link failure
    #[error("GPU resource error: {0}")]
    Resource(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("texture error: {0}")]
    Texture(#[from] image::ImageError),
}

impl Error {
    /// Whether this error ends the whole render session rather than one mesh
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Mesh { .. })
    }

    /// The mesh this error is isolated to, if any
    pub fn mesh_key(&self) -> Option<&EntryKey> {
        match self {
            Error::Mesh { key, .. } => Some(key),
            _ => None,
        }
    }
}

impl MeshError {
    /// Attach the owning entry to this error
    pub fn for_entry(self, key: &EntryKey) -> Error {
        Error::Mesh { key: key.clone(), source: self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_errors_are_not_fatal() {
        let err = MeshError::Order("late chunk".into()).for_entry(&EntryKey::new("walt.utf8", 1));
        assert!(!err.is_fatal());
        assert_eq!(err.mesh_key(), Some(&EntryKey::new("walt.utf8", 1)));
        assert_eq!(err.to_string(), "mesh walt.utf8#1: order error: late chunk");
    }

    #[test]
    fn test_resource_errors_are_fatal() {
        let err = Error::Resource("link failed".into());
        assert!(err.is_fatal());
        assert!(err.mesh_key().is_none());
    }
}
