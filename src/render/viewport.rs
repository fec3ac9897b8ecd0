//! Backing-store sizing

use crate::core::config::ViewerConfig;
use crate::render::device::GraphicsDevice;

/// Client (CSS-pixel) size of the drawing surface and the clamped backing
/// resolution the device renders at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub client_width: f32,
    pub client_height: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub max_width: u32,
    pub max_height: u32,
    width: u32,
    height: u32,
}

impl Viewport {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            client_width: 1.0,
            client_height: 1.0,
            scale_x: config.render_scale[0],
            scale_y: config.render_scale[1],
            max_width: config.max_width.max(1),
            max_height: config.max_height.max(1),
            width: 0,
            height: 0,
        }
    }

    /// Record a new client size; takes effect on the next [`Viewport::apply`]
    pub fn resize(&mut self, client_width: f32, client_height: f32) {
        self.client_width = client_width;
        self.client_height = client_height;
    }

    /// Backing size the current client size maps to
    pub fn target_size(&self) -> (u32, u32) {
        let clamp = |client: f32, scale: f32, max: u32| -> u32 {
            let scaled = (scale * client).round();
            if scaled.is_nan() || scaled < 1.0 {
                1
            } else {
                (scaled.min(max as f32) as u32).clamp(1, max)
            }
        };
        (
            clamp(self.client_width, self.scale_x, self.max_width),
            clamp(self.client_height, self.scale_y, self.max_height),
        )
    }

    /// Reconfigure the device if the backing size changed. Returns whether
    /// it did.
    pub fn apply<D: GraphicsDevice + ?Sized>(&mut self, device: &mut D) -> bool {
        let (width, height) = self.target_size();
        if (width, height) == (self.width, self.height) {
            return false;
        }
        self.width = width;
        self.height = height;
        device.set_viewport(width, height);
        log::debug!("Viewport resized to {}x{}", width, height);
        true
    }

    /// Backing size last applied
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn client_size(&self) -> (f32, f32) {
        (self.client_width, self.client_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::recording::{Command, RecordingDevice};

    #[test]
    fn test_clamps_to_maximum() {
        let config = ViewerConfig { max_width: 1024, max_height: 512, ..Default::default() };
        let mut viewport = Viewport::new(&config);
        viewport.resize(4000.0, 300.0);
        assert_eq!(viewport.target_size(), (1024, 300));

        viewport.resize(0.0, 0.0);
        assert_eq!(viewport.target_size(), (1, 1));
    }

    #[test]
    fn test_scale_rounds() {
        let config = ViewerConfig { render_scale: [0.5, 0.5], ..Default::default() };
        let mut viewport = Viewport::new(&config);
        viewport.resize(101.0, 99.0);
        assert_eq!(viewport.target_size(), (51, 50));
    }

    #[test]
    fn test_apply_only_on_change() {
        let mut device = RecordingDevice::new();
        let mut viewport = Viewport::new(&ViewerConfig::default());
        viewport.resize(640.0, 480.0);

        assert!(viewport.apply(&mut device));
        assert!(!viewport.apply(&mut device));
        assert_eq!(device.commands(), &[Command::SetViewport { width: 640, height: 480 }]);
        assert_eq!(viewport.size(), (640, 480));
    }
}
