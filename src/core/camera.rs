//! Orbit camera for the mesh viewer

use crate::core::types::{Mat3, Mat4, Vec3, Vec4};

/// Camera made of separate model, view and projection transforms.
///
/// User input mutates `model` (rotate/pan the object) and `view` (zoom/pan
/// the eye). The projection is rebuilt every frame from the viewport aspect.
pub struct OrbitCamera {
    /// Object transform
    pub model: Mat4,
    /// Eye transform
    pub view: Mat4,
    /// Projection from the last `update_projection`
    pub projection: Mat4,
    /// Near plane distance before `fudge` scaling
    pub z_near: f32,
    /// Far clip plane
    pub z_far: f32,
    /// Half-height of the frustum at the near plane
    pub fudge: f32,
}

impl OrbitCamera {
    /// Create a camera whose view is translated by `view_translation`
    pub fn new(view_translation: Vec3, z_near: f32, z_far: f32, fudge: f32) -> Self {
        Self {
            model: Mat4::IDENTITY,
            view: Mat4::from_translation(view_translation),
            projection: Mat4::IDENTITY,
            z_near,
            z_far,
            fudge,
        }
    }

    /// Rebuild the projection for a client area of `width` x `height`
    pub fn update_projection(&mut self, width: f32, height: f32) {
        let aspect = self.fudge * width / height.max(1.0);
        self.projection = frustum(
            -aspect,
            aspect,
            -self.fudge,
            self.fudge,
            self.fudge * self.z_near,
            self.z_far,
        );
    }

    /// Combined projection * view * model
    pub fn model_view_projection(&self) -> Mat4 {
        self.projection * self.view * self.model
    }

    /// Transform applied to normals (upper 3x3 of the model matrix)
    pub fn normal_matrix(&self) -> Mat3 {
        Mat3::from_mat4(self.model)
    }

    /// Rotate the model about `axis` (in model space)
    pub fn rotate_model(&mut self, angle: f32, axis: Vec3) {
        self.model *= Mat4::from_axis_angle(axis.normalize(), angle);
    }

    /// Translate the model (in model space)
    pub fn translate_model(&mut self, offset: Vec3) {
        self.model *= Mat4::from_translation(offset);
    }

    /// Translate the view (in view space)
    pub fn translate_view(&mut self, offset: Vec3) {
        self.view *= Mat4::from_translation(offset);
    }

    /// Unproject a normalized device coordinate on the near plane into eye
    /// space. No perspective divide; callers use the result as a direction.
    pub fn eye_from_ndc(&self, ndc_x: f32, ndc_y: f32) -> Vec3 {
        let eye = self.projection.inverse() * Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
        eye.truncate()
    }
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, -0.5, -3.0), 3.0_f32.sqrt(), 100.0, 0.01)
    }
}

/// OpenGL-style perspective frustum (right-handed, clip z in [-1, 1])
pub fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let rl = right - left;
    let tb = top - bottom;
    let fn_ = far - near;
    Mat4::from_cols(
        Vec4::new(2.0 * near / rl, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * near / tb, 0.0, 0.0),
        Vec4::new((right + left) / rl, (top + bottom) / tb, -(far + near) / fn_, -1.0),
        Vec4::new(0.0, 0.0, -2.0 * far * near / fn_, 0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frustum_maps_near_and_far_planes() {
        let proj = frustum(-1.0, 1.0, -1.0, 1.0, 1.0, 10.0);

        let near = proj.project_point3(Vec3::new(0.0, 0.0, -1.0));
        assert!((near.z - (-1.0)).abs() < 1e-5);

        let far = proj.project_point3(Vec3::new(0.0, 0.0, -10.0));
        assert!((far.z - 1.0).abs() < 1e-5);

        let corner = proj.project_point3(Vec3::new(1.0, 1.0, -1.0));
        assert!((corner.x - 1.0).abs() < 1e-5);
        assert!((corner.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_default_view_translation() {
        let camera = OrbitCamera::default();
        let origin_in_eye = camera.view.transform_point3(Vec3::ZERO);
        assert!((origin_in_eye - Vec3::new(0.0, -0.5, -3.0)).length() < 1e-6);
    }

    #[test]
    fn test_projection_uses_aspect() {
        let mut camera = OrbitCamera::default();
        camera.update_projection(200.0, 100.0);
        // x scale is half the y scale for a 2:1 viewport
        let sx = camera.projection.x_axis.x;
        let sy = camera.projection.y_axis.y;
        assert!((sy / sx - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_model_rotation_feeds_normal_matrix() {
        let mut camera = OrbitCamera::default();
        camera.rotate_model(std::f32::consts::FRAC_PI_2, Vec3::Y);
        let n = camera.normal_matrix() * Vec3::X;
        assert!((n - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn test_eye_from_ndc_center_points_forward() {
        let mut camera = OrbitCamera::default();
        camera.update_projection(100.0, 100.0);
        let eye = camera.eye_from_ndc(0.0, 0.0);
        assert!(eye.x.abs() < 1e-6);
        assert!(eye.y.abs() < 1e-6);
        assert!(eye.z != 0.0);
    }
}
