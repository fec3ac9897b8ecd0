//! Viewer session: the one context object that ties loader, renderer and
//! input together.
//!
//! Hosts queue [`ViewerEvent`]s and hand them to [`Session::handle`] one at
//! a time; each runs to completion before the next.

use std::sync::Arc;

use crate::core::camera_controller::OrbitController;
use crate::core::config::ViewerConfig;
use crate::core::types::Result;
use crate::geometry::vertex_format::VertexFormat;
use crate::render::device::GraphicsDevice;
use crate::render::program::ShaderSources;
use crate::render::renderer::Renderer;
use crate::render::texture::TextureFetcher;
use crate::streaming::chunk::DecodedChunk;
use crate::streaming::loader::{ChunkOutcome, LoadReport, LoaderOptions, StreamingMeshLoader};
use crate::streaming::manifest::Manifest;
use crate::streaming::material::MaterialTable;

/// Everything a host can feed the viewer
#[derive(Clone, Debug, PartialEq)]
pub enum ViewerEvent {
    /// A decoded chunk arrived
    Chunk(DecodedChunk),
    /// Pointer drag by client pixels
    Drag { dx: f32, dy: f32 },
    /// Wheel deltas with the cursor position in client pixels
    Wheel { dx: f32, dy: f32, x: f32, y: f32 },
    /// Drawing surface resized (client pixels)
    Resize { width: f32, height: f32 },
    /// Display refresh callback
    Refresh,
    /// Check for completed texture fetches
    PollTextures,
    /// Drop a model and its GPU resources
    DiscardModel(String),
}

/// What handling one event did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Handled {
    /// A redraw became pending; the host should schedule a refresh
    pub request_frame: bool,
    /// A frame was drawn
    pub drew: bool,
}

pub struct Session<D: GraphicsDevice> {
    loader: StreamingMeshLoader,
    renderer: Renderer<D>,
    controller: OrbitController,
}

impl<D: GraphicsDevice> Session<D> {
    pub fn new(
        device: D,
        manifest: &Manifest,
        materials: Arc<MaterialTable>,
        fetcher: Box<dyn TextureFetcher>,
        config: &ViewerConfig,
        sources: &ShaderSources,
    ) -> Result<Self> {
        let format = Arc::new(VertexFormat::standard());
        let loader = StreamingMeshLoader::new(manifest, format.clone(), LoaderOptions::from_config(config));
        let renderer = Renderer::new(device, sources, format, materials, fetcher, config)?;
        Ok(Self {
            loader,
            renderer,
            controller: OrbitController::from_config(config),
        })
    }

    /// Dispatch one event. Per-mesh failures are recorded in the loader and
    /// never returned; any error that is returned is fatal and has already
    /// torn down the GPU resources.
    pub fn handle(&mut self, event: ViewerEvent) -> Result<Handled> {
        let was_pending = self.renderer.needs_redraw();
        let drew = match self.dispatch(event) {
            Ok(drew) => drew,
            Err(err) => {
                log::error!("Session aborted: {}", err);
                self.abort();
                return Err(err);
            }
        };
        Ok(Handled {
            request_frame: !was_pending && self.renderer.needs_redraw(),
            drew,
        })
    }

    fn dispatch(&mut self, event: ViewerEvent) -> Result<bool> {
        match event {
            ViewerEvent::Chunk(chunk) => {
                if let ChunkOutcome::Rejected(err) = self.loader.deliver(&chunk, &mut self.renderer)? {
                    log::debug!("Chunk for {} rejected: {}", chunk.key(), err);
                }
            }
            ViewerEvent::Drag { dx, dy } => {
                let client = self.renderer.viewport().client_size();
                self.controller.on_drag(self.renderer.camera_mut(), dx, dy, client);
                self.renderer.post_redisplay();
            }
            ViewerEvent::Wheel { dx, dy, x, y } => {
                let client = self.renderer.viewport().client_size();
                self.controller.on_wheel(self.renderer.camera_mut(), dx, dy, (x, y), client);
                self.renderer.post_redisplay();
            }
            ViewerEvent::Resize { width, height } => self.renderer.resize(width, height),
            ViewerEvent::Refresh => return self.renderer.on_refresh(),
            ViewerEvent::PollTextures => {
                self.renderer.poll_textures()?;
            }
            ViewerEvent::DiscardModel(model) => {
                self.loader.discard_model(&model);
                self.renderer.discard_model(&model);
            }
        }
        Ok(false)
    }

    /// Handle events in order, refreshing whenever a frame is requested.
    /// Stops at the first fatal error.
    pub fn run(&mut self, events: impl IntoIterator<Item = ViewerEvent>) -> Result<()> {
        for event in events {
            if self.handle(event)?.request_frame {
                self.handle(ViewerEvent::Refresh)?;
            }
        }
        Ok(())
    }

    /// Release every GPU resource. The session stays usable but empty.
    pub fn abort(&mut self) {
        self.renderer.teardown();
    }

    pub fn loader(&self) -> &StreamingMeshLoader {
        &self.loader
    }

    pub fn renderer(&self) -> &Renderer<D> {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut Renderer<D> {
        &mut self.renderer
    }

    pub fn controller_mut(&mut self) -> &mut OrbitController {
        &mut self.controller
    }

    pub fn report(&self) -> LoadReport {
        self.loader.report()
    }
}
