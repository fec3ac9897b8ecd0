//! Drag and wheel input mapped onto the orbit camera

use crate::core::camera::OrbitCamera;
use crate::core::config::ViewerConfig;
use crate::core::types::Vec3;

/// Turns pointer deltas (in client pixels) into camera mutations
pub struct OrbitController {
    /// Radians of model rotation per client width dragged
    pub rotate_sensitivity: f32,
    /// Model units of vertical pan per client height dragged
    pub pan_sensitivity: f32,
    /// Wheel delta to view translation factor
    pub wheel_scale: f32,
}

impl OrbitController {
    /// Create new controller
    pub fn new(rotate_sensitivity: f32, pan_sensitivity: f32, wheel_scale: f32) -> Self {
        Self {
            rotate_sensitivity,
            pan_sensitivity,
            wheel_scale,
        }
    }

    pub fn from_config(config: &ViewerConfig) -> Self {
        Self::new(config.drag_rotate, config.drag_pan, config.wheel_scale)
    }

    /// Horizontal drag spins the model about +Y, vertical drag pans it
    pub fn on_drag(&self, camera: &mut OrbitCamera, dx: f32, dy: f32, client: (f32, f32)) {
        let (width, height) = (client.0.max(1.0), client.1.max(1.0));
        camera.rotate_model(self.rotate_sensitivity * dx / width, Vec3::Y);
        camera.translate_model(Vec3::new(0.0, -self.pan_sensitivity * dy / height, 0.0));
    }

    /// Vertical wheel moves the eye toward the point under the cursor,
    /// horizontal wheel strafes.
    pub fn on_wheel(
        &self,
        camera: &mut OrbitCamera,
        dx: f32,
        dy: f32,
        cursor: (f32, f32),
        client: (f32, f32),
    ) {
        let (ndc_x, ndc_y) = ndc_from_client(cursor, client);
        let toward = camera.eye_from_ndc(ndc_x, ndc_y) * (-self.wheel_scale * dy);
        camera.translate_view(toward);
        camera.translate_view(Vec3::new(self.wheel_scale * dx, 0.0, 0.0));
    }
}

impl Default for OrbitController {
    fn default() -> Self {
        Self::from_config(&ViewerConfig::default())
    }
}

/// Client pixel position to normalized device coordinates (y up)
pub fn ndc_from_client(cursor: (f32, f32), client: (f32, f32)) -> (f32, f32) {
    let (width, height) = (client.0.max(1.0), client.1.max(1.0));
    (2.0 * cursor.0 / width - 1.0, 1.0 - 2.0 * cursor.1 / height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ndc_corners() {
        assert_eq!(ndc_from_client((0.0, 0.0), (200.0, 100.0)), (-1.0, 1.0));
        assert_eq!(ndc_from_client((200.0, 100.0), (200.0, 100.0)), (1.0, -1.0));
        assert_eq!(ndc_from_client((100.0, 50.0), (200.0, 100.0)), (0.0, 0.0));
    }

    #[test]
    fn test_vertical_drag_pans_model() {
        let controller = OrbitController::default();
        let mut camera = OrbitCamera::default();
        controller.on_drag(&mut camera, 0.0, 50.0, (100.0, 100.0));
        let moved = camera.model.transform_point3(Vec3::ZERO);
        assert!((moved.y - (-1.0)).abs() < 1e-6);
        assert!(moved.x.abs() < 1e-6);
    }

    #[test]
    fn test_horizontal_drag_rotates_model() {
        let controller = OrbitController::default();
        let mut camera = OrbitCamera::default();
        // 10 * dx / width = pi/2
        let dx = std::f32::consts::FRAC_PI_2 * 100.0 / 10.0;
        controller.on_drag(&mut camera, dx, 0.0, (100.0, 100.0));
        let x = camera.model.transform_vector3(Vec3::X);
        assert!((x - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn test_wheel_strafes_and_zooms() {
        let controller = OrbitController::default();
        let mut camera = OrbitCamera::default();
        camera.update_projection(100.0, 100.0);
        let before = camera.view.transform_point3(Vec3::ZERO);

        controller.on_wheel(&mut camera, 200.0, 0.0, (50.0, 50.0), (100.0, 100.0));
        let strafed = camera.view.transform_point3(Vec3::ZERO);
        assert!((strafed.x - before.x - 1.0).abs() < 1e-5);

        controller.on_wheel(&mut camera, 0.0, -100.0, (50.0, 50.0), (100.0, 100.0));
        let zoomed = camera.view.transform_point3(Vec3::ZERO);
        assert!((zoomed.z - strafed.z).abs() > 1e-6);
        assert!((zoomed.x - strafed.x).abs() < 1e-5);
    }
}
