//! Per-frame transform uniforms

use bytemuck::{Pod, Zeroable};

use crate::core::camera::OrbitCamera;
use crate::core::types::Result;
use crate::render::device::GraphicsDevice;
use crate::render::program::Program;

pub const MVP_UNIFORM: &str = "u_mvp";
pub const NORMAL_UNIFORM: &str = "u_model";
pub const SAMPLER_UNIFORM: &str = "u_diffuse_sampler";

/// Matrices uploaded once per frame, column-major
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SceneUniforms {
    /// Projection * view * model (64 bytes, offset 0)
    pub mvp: [f32; 16],
    /// Upper 3x3 of the model matrix, for normals (36 bytes, offset 64)
    pub normal: [f32; 9],
}

impl SceneUniforms {
    pub fn from_camera(camera: &OrbitCamera) -> Self {
        Self {
            mvp: camera.model_view_projection().to_cols_array(),
            normal: camera.normal_matrix().to_cols_array(),
        }
    }

    /// Write both matrices to the program's uniforms
    pub fn upload<D: GraphicsDevice + ?Sized>(&self, device: &mut D, program: &Program) -> Result<()> {
        device.set_uniform_matrix(program.require_uniform(MVP_UNIFORM)?, &self.mvp);
        if let Some(location) = program.uniform(NORMAL_UNIFORM) {
            device.set_uniform_matrix(location, &self.normal);
        }
        Ok(())
    }
}

impl Default for SceneUniforms {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Mat4;

    #[test]
    fn test_uniform_size() {
        let size = std::mem::size_of::<SceneUniforms>();
        assert_eq!(size, 100, "SceneUniforms must be exactly 100 bytes, got {} bytes", size);
        assert_eq!(bytemuck::bytes_of(&SceneUniforms::default()).len(), 100);
    }

    #[test]
    fn test_from_camera() {
        let mut camera = OrbitCamera::default();
        camera.update_projection(640.0, 480.0);
        let uniforms = SceneUniforms::from_camera(&camera);

        let expected = camera.projection * camera.view;
        assert_eq!(uniforms.mvp, expected.to_cols_array());
        assert_eq!(uniforms.normal, [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

        camera.model = Mat4::from_scale(crate::core::types::Vec3::splat(2.0));
        let scaled = SceneUniforms::from_camera(&camera);
        assert_eq!(scaled.normal[0], 2.0);
        assert_eq!(scaled.normal[4], 2.0);
    }
}
