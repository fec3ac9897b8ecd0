//! In-memory graphics device
//!
//! Records every call and keeps buffer and texture contents so the replay
//! tool and tests can inspect exactly what would have reached the GPU.

use std::collections::HashMap;

use crate::core::error::Error;
use crate::core::types::Result;
use crate::render::device::{
    ActiveAttribute, ActiveUniform, AttribPointer, BufferHandle, BufferKind, GraphicsDevice,
    LinkedProgram, ProgramHandle, ShaderHandle, ShaderStage, TextureHandle, TextureImage,
    UniformLocation,
};

/// One recorded device call
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CompileShader(ShaderHandle, ShaderStage),
    LinkProgram(ProgramHandle),
    UseProgram(ProgramHandle),
    EnableAttributes(Vec<u32>),
    CreateBuffer(BufferHandle, BufferKind),
    UploadBuffer { buffer: BufferHandle, bytes: usize },
    DeleteBuffer(BufferHandle),
    CreateTexture(TextureHandle),
    UploadTexture { texture: TextureHandle, width: u32, height: u32 },
    DeleteTexture(TextureHandle),
    SetViewport { width: u32, height: u32 },
    Clear,
    SetUniform { location: UniformLocation, values: Vec<f32> },
    SetSampler { location: UniformLocation, unit: u32 },
    BindTexture(TextureHandle),
    BindBuffers { vertex: BufferHandle, index: BufferHandle, pointers: Vec<AttribPointer> },
    DrawIndexed { first: u32, count: u32 },
}

/// Graphics device that records instead of rendering
pub struct RecordingDevice {
    next_id: u32,
    commands: Vec<Command>,
    buffers: HashMap<BufferHandle, Vec<u8>>,
    textures: HashMap<TextureHandle, Option<TextureImage>>,
    attributes: Vec<String>,
    uniforms: Vec<String>,
    compile_failure: Option<String>,
    upload_failure: Option<String>,
}

impl RecordingDevice {
    /// Device whose programs expose the standard viewer interface
    pub fn new() -> Self {
        Self::with_interface(
            &["a_position", "a_texcoord", "a_normal"],
            &["u_mvp", "u_model", "u_diffuse_sampler"],
        )
    }

    /// Device whose linked programs report the given active attributes and
    /// uniforms, in location order.
    pub fn with_interface(attributes: &[&str], uniforms: &[&str]) -> Self {
        Self {
            next_id: 1,
            commands: Vec::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            attributes: attributes.iter().map(|s| s.to_string()).collect(),
            uniforms: uniforms.iter().map(|s| s.to_string()).collect(),
            compile_failure: None,
            upload_failure: None,
        }
    }

    /// Make every following shader compile fail with `log`
    pub fn fail_compiles(&mut self, log: impl Into<String>) {
        self.compile_failure = Some(log.into());
    }

    /// Make every following texture upload fail with `reason`
    pub fn fail_texture_uploads(&mut self, reason: impl Into<String>) {
        self.upload_failure = Some(reason.into());
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// `(first, count)` of every indexed draw, in order
    pub fn draw_calls(&self) -> Vec<(u32, u32)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                Command::DrawIndexed { first, count } => Some((*first, *count)),
                _ => None,
            })
            .collect()
    }

    /// Number of frames started (clears issued)
    pub fn frames(&self) -> usize {
        self.commands.iter().filter(|c| matches!(c, Command::Clear)).count()
    }

    pub fn buffer_data(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer).map(Vec::as_slice)
    }

    /// Last image uploaded to `texture`
    pub fn texture(&self, texture: TextureHandle) -> Option<&TextureImage> {
        self.textures.get(&texture).and_then(Option::as_ref)
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Last value written to a uniform
    pub fn uniform(&self, location: UniformLocation) -> Option<&[f32]> {
        self.commands.iter().rev().find_map(|c| match c {
            Command::SetUniform { location: l, values } if *l == location => Some(values.as_slice()),
            _ => None,
        })
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsDevice for RecordingDevice {
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<ShaderHandle> {
        if let Some(log) = &self.compile_failure {
            return Err(Error::Resource(format!("{:?} shader failed to compile: {}", stage, log)));
        }
        if source.trim().is_empty() {
            return Err(Error::Resource(format!("{:?} shader source is empty", stage)));
        }
        let handle = ShaderHandle(self.next_id());
        self.commands.push(Command::CompileShader(handle, stage));
        Ok(handle)
    }

    fn link_program(&mut self, shaders: &[ShaderHandle]) -> Result<LinkedProgram> {
        if shaders.is_empty() {
            return Err(Error::Resource("program has no shaders to link".into()));
        }
        let handle = ProgramHandle(self.next_id());
        self.commands.push(Command::LinkProgram(handle));
        Ok(LinkedProgram {
            handle,
            attributes: self
                .attributes
                .iter()
                .enumerate()
                .map(|(i, name)| ActiveAttribute { name: name.clone(), location: i as u32 })
                .collect(),
            uniforms: self
                .uniforms
                .iter()
                .enumerate()
                .map(|(i, name)| ActiveUniform { name: name.clone(), location: UniformLocation(i as u32) })
                .collect(),
        })
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.commands.push(Command::UseProgram(program));
    }

    fn enable_attributes(&mut self, locations: &[u32]) {
        self.commands.push(Command::EnableAttributes(locations.to_vec()));
    }

    fn create_buffer(&mut self, kind: BufferKind) -> Result<BufferHandle> {
        let handle = BufferHandle(self.next_id());
        self.buffers.insert(handle, Vec::new());
        self.commands.push(Command::CreateBuffer(handle, kind));
        Ok(handle)
    }

    fn upload_buffer(&mut self, buffer: BufferHandle, data: &[u8]) -> Result<()> {
        let contents = self
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| Error::Resource(format!("upload to unknown buffer {:?}", buffer)))?;
        contents.clear();
        contents.extend_from_slice(data);
        self.commands.push(Command::UploadBuffer { buffer, bytes: data.len() });
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
        self.commands.push(Command::DeleteBuffer(buffer));
    }

    fn create_texture(&mut self) -> Result<TextureHandle> {
        let handle = TextureHandle(self.next_id());
        self.textures.insert(handle, None);
        self.commands.push(Command::CreateTexture(handle));
        Ok(handle)
    }

    fn upload_texture(&mut self, texture: TextureHandle, image: &TextureImage) -> Result<()> {
        if let Some(reason) = &self.upload_failure {
            return Err(Error::Resource(format!("texture upload failed: {}", reason)));
        }
        let slot = self
            .textures
            .get_mut(&texture)
            .ok_or_else(|| Error::Resource(format!("upload to unknown texture {:?}", texture)))?;
        *slot = Some(image.clone());
        self.commands.push(Command::UploadTexture { texture, width: image.width, height: image.height });
        Ok(())
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
        self.commands.push(Command::DeleteTexture(texture));
    }

    fn set_viewport(&mut self, width: u32, height: u32) {
        self.commands.push(Command::SetViewport { width, height });
    }

    fn clear(&mut self) {
        self.commands.push(Command::Clear);
    }

    fn set_uniform_matrix(&mut self, location: UniformLocation, columns: &[f32]) {
        self.commands.push(Command::SetUniform { location, values: columns.to_vec() });
    }

    fn set_uniform_sampler(&mut self, location: UniformLocation, unit: u32) {
        self.commands.push(Command::SetSampler { location, unit });
    }

    fn bind_texture(&mut self, texture: TextureHandle) {
        self.commands.push(Command::BindTexture(texture));
    }

    fn bind_buffers(&mut self, vertex: BufferHandle, index: BufferHandle, pointers: &[AttribPointer]) {
        self.commands.push(Command::BindBuffers { vertex, index, pointers: pointers.to_vec() });
    }

    fn draw_indexed(&mut self, first: u32, count: u32) {
        self.commands.push(Command::DrawIndexed { first, count });
    }
}
