//! Rendering system and GPU interfaces

pub mod device;
pub mod recording;
pub mod program;
pub mod uniforms;
pub mod viewport;
pub mod redraw;
pub mod texture;
pub mod mesh;
pub mod renderer;

pub use device::{
    AttribPointer, BufferHandle, BufferKind, GraphicsDevice, PixelFormat, TextureHandle,
    TextureImage,
};
pub use recording::{Command, RecordingDevice};
pub use program::{Program, ShaderSources};
pub use uniforms::SceneUniforms;
pub use viewport::Viewport;
pub use redraw::RedrawScheduler;
pub use texture::{decode_texture, FileTextureFetcher, NoTextures, TextureFetcher};
pub use mesh::{Group, Mesh};
pub use renderer::Renderer;
