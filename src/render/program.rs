//! Linked shader program and its attribute/uniform tables

use std::collections::HashMap;

use crate::core::error::Error;
use crate::core::types::Result;
use crate::geometry::vertex_format::VertexFormat;
use crate::render::device::{AttribPointer, GraphicsDevice, ProgramHandle, ShaderStage, UniformLocation};

/// Bytes per vertex component; every attribute is `f32`
const COMPONENT_BYTES: u32 = 4;

/// Vertex and fragment sources for one program. The text is opaque here.
#[derive(Clone, Debug)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self {
            vertex: include_str!("../../shaders/simple.vert").to_string(),
            fragment: include_str!("../../shaders/simple.frag").to_string(),
        }
    }
}

/// A compiled and linked program with name lookups for the attributes and
/// uniforms it actually uses.
#[derive(Clone, Debug)]
pub struct Program {
    handle: ProgramHandle,
    attributes: HashMap<String, u32>,
    uniforms: HashMap<String, UniformLocation>,
}

impl Program {
    /// Compile both stages and link them
    pub fn build<D: GraphicsDevice + ?Sized>(device: &mut D, sources: &ShaderSources) -> Result<Self> {
        let vs = device.compile_shader(ShaderStage::Vertex, &sources.vertex)?;
        let fs = device.compile_shader(ShaderStage::Fragment, &sources.fragment)?;
        let linked = device.link_program(&[vs, fs])?;
        log::debug!(
            "Linked program {:?}: {} attributes, {} uniforms",
            linked.handle,
            linked.attributes.len(),
            linked.uniforms.len()
        );
        Ok(Self {
            handle: linked.handle,
            attributes: linked.attributes.into_iter().map(|a| (a.name, a.location)).collect(),
            uniforms: linked.uniforms.into_iter().map(|u| (u.name, u.location)).collect(),
        })
    }

    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    pub fn use_program<D: GraphicsDevice + ?Sized>(&self, device: &mut D) {
        device.use_program(self.handle);
    }

    pub fn attribute(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied()
    }

    pub fn uniform(&self, name: &str) -> Option<UniformLocation> {
        self.uniforms.get(name).copied()
    }

    /// Like [`Program::uniform`], but a missing uniform is a resource error
    pub fn require_uniform(&self, name: &str) -> Result<UniformLocation> {
        self.uniform(name)
            .ok_or_else(|| Error::Resource(format!("program has no active uniform {}", name)))
    }

    /// Enable the locations of every attribute in `format` the program reads
    pub fn enable_attributes<D: GraphicsDevice + ?Sized>(&self, device: &mut D, format: &VertexFormat) {
        let locations: Vec<u32> = format
            .attributes()
            .iter()
            .filter_map(|a| self.attribute(&a.name))
            .collect();
        device.enable_attributes(&locations);
    }

    /// Byte layout of `format` for the attributes this program reads;
    /// attributes the program ignores are skipped.
    pub fn attrib_pointers(&self, format: &VertexFormat) -> Vec<AttribPointer> {
        format
            .attributes()
            .iter()
            .filter_map(|a| {
                self.attribute(&a.name).map(|location| AttribPointer {
                    location,
                    size: a.size as u32,
                    stride: COMPONENT_BYTES * a.stride as u32,
                    offset: COMPONENT_BYTES * a.offset as u32,
                })
            })
            .collect()
    }
}
