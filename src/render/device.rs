//! Capability interface over the graphics device
//!
//! The renderer only ever talks to the GPU through [`GraphicsDevice`]. A
//! backend maps these calls onto a real API; [`RecordingDevice`] keeps them
//! in memory.
//!
//! [`RecordingDevice`]: crate::render::recording::RecordingDevice

use crate::core::types::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UniformLocation(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Interleaved `f32` vertex attributes
    Vertex,
    /// `u16` triangle indices
    Index,
}

/// An attribute the linked program actually reads
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveAttribute {
    pub name: String,
    pub location: u32,
}

/// A uniform the linked program actually reads
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveUniform {
    pub name: String,
    pub location: UniformLocation,
}

/// Result of a successful link, including the program's reflected interface
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkedProgram {
    pub handle: ProgramHandle,
    pub attributes: Vec<ActiveAttribute>,
    pub uniforms: Vec<ActiveUniform>,
}

/// Where one attribute lives in the bound vertex buffer, in bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttribPointer {
    pub location: u32,
    pub size: u32,
    pub stride: u32,
    pub offset: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb8,
    Rgba8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
        }
    }
}

/// CPU-side texture contents ready for upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub pixels: Vec<u8>,
    /// Generate a mip chain after upload
    pub mipmaps: bool,
}

impl TextureImage {
    /// 1x1 texture of a single color; RGBA only when `alpha` is given
    pub fn solid(rgb: [u8; 3], alpha: Option<u8>) -> Self {
        let (format, pixels) = match alpha {
            Some(a) => (PixelFormat::Rgba8, vec![rgb[0], rgb[1], rgb[2], a]),
            None => (PixelFormat::Rgb8, rgb.to_vec()),
        };
        Self { width: 1, height: 1, format, pixels, mipmaps: false }
    }

    /// Opaque white, the placeholder used until a real texture arrives
    pub fn white() -> Self {
        Self::solid([255, 255, 255], None)
    }

    pub fn has_alpha(&self) -> bool {
        self.format == PixelFormat::Rgba8
    }
}

/// Everything the renderer needs from a GPU.
///
/// Creation, compile and link calls return [`Error::Resource`] on failure;
/// those errors end the render session.
///
/// [`Error::Resource`]: crate::core::error::Error::Resource
pub trait GraphicsDevice {
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderHandle>;
    fn link_program(&mut self, shaders: &[ShaderHandle]) -> Result<LinkedProgram>;
    fn use_program(&mut self, program: ProgramHandle);
    fn enable_attributes(&mut self, locations: &[u32]);

    fn create_buffer(&mut self, kind: BufferKind) -> Result<BufferHandle>;
    /// Replace the whole contents of `buffer`
    fn upload_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> Result<()>;
    fn delete_buffer(&mut self, buffer: BufferHandle);

    fn create_texture(&mut self) -> Result<TextureHandle>;
    fn upload_texture(&mut self, texture: TextureHandle, image: &TextureImage) -> Result<()>;
    fn delete_texture(&mut self, texture: TextureHandle);

    fn set_viewport(&mut self, width: u32, height: u32);
    /// Clear color, depth and stencil
    fn clear(&mut self);

    /// Column-major matrix uniform; `columns.len()` is 9 or 16
    fn set_uniform_matrix(&mut self, location: UniformLocation, columns: &[f32]);
    fn set_uniform_sampler(&mut self, location: UniformLocation, unit: u32);

    fn bind_texture(&mut self, texture: TextureHandle);
    fn bind_buffers(&mut self, vertex: BufferHandle, index: BufferHandle, pointers: &[AttribPointer]);
    /// Draw `count` indices as triangles starting at index `first`
    fn draw_indexed(&mut self, first: u32, count: u32);
}
