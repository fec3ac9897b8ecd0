//! Interleaved vertex layouts

use crate::core::error::MeshError;

pub const POSITION: &str = "a_position";
pub const TEXCOORD: &str = "a_texcoord";
pub const NORMAL: &str = "a_normal";
pub const RADIUS: &str = "a_radius";

/// One attribute inside an interleaved buffer. All measures are in `f32`
/// components, not bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: String,
    pub size: usize,
    pub stride: usize,
    pub offset: usize,
}

impl VertexAttribute {
    pub fn new(name: impl Into<String>, size: usize, stride: usize, offset: usize) -> Self {
        Self { name: name.into(), size, stride, offset }
    }
}

/// Ordered attribute layout shared by every vertex in a buffer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexFormat {
    attributes: Vec<VertexAttribute>,
    stride: usize,
}

impl VertexFormat {
    /// Build a format, checking that every attribute uses the same stride and
    /// fits inside it.
    pub fn new(attributes: Vec<VertexAttribute>) -> Result<Self, MeshError> {
        let stride = attributes
            .first()
            .map(|a| a.stride)
            .ok_or_else(|| MeshError::Format("vertex format has no attributes".into()))?;
        if stride == 0 {
            return Err(MeshError::Format("vertex stride is zero".into()));
        }
        for attr in &attributes {
            if attr.stride != stride {
                return Err(MeshError::Format(format!(
                    "attribute {} has stride {}, expected {}",
                    attr.name, attr.stride, stride
                )));
            }
            if attr.size == 0 || attr.offset + attr.size > stride {
                return Err(MeshError::Format(format!(
                    "attribute {} ({} @ {}) does not fit stride {}",
                    attr.name, attr.size, attr.offset, stride
                )));
            }
        }
        Ok(Self { attributes, stride })
    }

    /// Position, texcoord and normal; the layout the compressor emits
    pub fn standard() -> Self {
        Self {
            attributes: vec![
                VertexAttribute::new(POSITION, 3, 8, 0),
                VertexAttribute::new(TEXCOORD, 2, 8, 3),
                VertexAttribute::new(NORMAL, 3, 8, 5),
            ],
            stride: 8,
        }
    }

    /// Standard stride with the texcoord slot left unused
    pub fn no_texcoord() -> Self {
        Self {
            attributes: vec![
                VertexAttribute::new(POSITION, 3, 8, 0),
                VertexAttribute::new(NORMAL, 3, 8, 5),
            ],
            stride: 8,
        }
    }

    /// Packed bounding volumes: center then radius
    pub fn bounds() -> Self {
        Self {
            attributes: vec![
                VertexAttribute::new(POSITION, 3, 6, 0),
                VertexAttribute::new(RADIUS, 3, 6, 3),
            ],
            stride: 6,
        }
    }

    /// Components per vertex
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&VertexAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Position attribute; required for anything geometric
    pub fn position(&self) -> Result<&VertexAttribute, MeshError> {
        self.require(POSITION, 3)
    }

    /// Normal attribute; required for normal computation
    pub fn normal(&self) -> Result<&VertexAttribute, MeshError> {
        self.require(NORMAL, 3)
    }

    fn require(&self, name: &str, size: usize) -> Result<&VertexAttribute, MeshError> {
        match self.attribute(name) {
            Some(attr) if attr.size >= size => Ok(attr),
            Some(attr) => Err(MeshError::Format(format!(
                "{} has {} components, need {}",
                name, attr.size, size
            ))),
            None => Err(MeshError::Format(format!("vertex format has no {}", name))),
        }
    }
}

impl Default for VertexFormat {
    fn default() -> Self {
        Self::standard()
    }
}
