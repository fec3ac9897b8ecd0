//! Incremental renderer
//!
//! Owns the device, the program, the camera and every mesh created so far.
//! Geometry arrives through [`LoadSink`]; redraws are coalesced so that any
//! number of updates between two display refreshes produce one frame.

use std::collections::HashSet;
use std::sync::Arc;

use crate::core::camera::OrbitCamera;
use crate::core::config::ViewerConfig;
use crate::core::error::EntryKey;
use crate::core::types::{Result, Vec3};
use crate::geometry::vertex_format::VertexFormat;
use crate::render::device::{AttribPointer, GraphicsDevice, TextureHandle, TextureImage};
use crate::render::mesh::Mesh;
use crate::render::program::{Program, ShaderSources};
use crate::render::redraw::RedrawScheduler;
use crate::render::texture::{decode_texture, PendingTextures, TextureFetcher};
use crate::render::uniforms::{SceneUniforms, SAMPLER_UNIFORM};
use crate::render::viewport::Viewport;
use crate::streaming::loader::{LoadSink, MeshUpdate};
use crate::streaming::material::{MaterialTable, TextureSource};

/// Texture unit the diffuse sampler reads
const DIFFUSE_UNIT: u32 = 0;

pub struct Renderer<D: GraphicsDevice> {
    device: D,
    program: Program,
    pointers: Vec<AttribPointer>,
    camera: OrbitCamera,
    viewport: Viewport,
    redraw: RedrawScheduler,
    /// Append-only except for discards
    meshes: Vec<Mesh>,
    /// Models whose meshes were released; their updates are dropped
    discarded: HashSet<String>,
    materials: Arc<MaterialTable>,
    fetcher: Box<dyn TextureFetcher>,
    textures: PendingTextures,
}

impl<D: GraphicsDevice> Renderer<D> {
    /// Build the program and prepare the device. Compile or link failures
    /// are returned as resource errors.
    pub fn new(
        mut device: D,
        sources: &ShaderSources,
        format: Arc<VertexFormat>,
        materials: Arc<MaterialTable>,
        fetcher: Box<dyn TextureFetcher>,
        config: &ViewerConfig,
    ) -> Result<Self> {
        let program = Program::build(&mut device, sources)?;
        program.use_program(&mut device);
        program.enable_attributes(&mut device, &format);
        if let Some(sampler) = program.uniform(SAMPLER_UNIFORM) {
            device.set_uniform_sampler(sampler, DIFFUSE_UNIT);
        }
        let pointers = program.attrib_pointers(&format);

        let [x, y, z] = config.initial_view;
        let camera = OrbitCamera::new(Vec3::new(x, y, z), config.z_near, config.z_far, config.frustum_fudge);

        log::info!("Renderer ready: {} vertex attributes bound", pointers.len());
        Ok(Self {
            device,
            program,
            pointers,
            camera,
            viewport: Viewport::new(config),
            redraw: RedrawScheduler::new(),
            meshes: Vec::new(),
            discarded: HashSet::new(),
            materials,
            fetcher,
            textures: PendingTextures::new(),
        })
    }

    /// Ask for a frame. Returns `true` when the host must schedule a
    /// refresh callback (no frame was pending yet).
    pub fn post_redisplay(&mut self) -> bool {
        self.redraw.post()
    }

    pub fn needs_redraw(&self) -> bool {
        self.redraw.is_pending()
    }

    /// Display refresh tick. Draws if a frame is pending; returns whether
    /// it drew.
    pub fn on_refresh(&mut self) -> Result<bool> {
        let Some(waited) = self.redraw.take() else {
            return Ok(false);
        };
        self.viewport.apply(&mut self.device);
        self.draw()?;
        log::trace!("Frame {} drawn {:?} after request", self.redraw.frames(), waited);
        Ok(true)
    }

    /// Draw every mesh. Normally called through [`Renderer::on_refresh`].
    pub fn draw(&mut self) -> Result<()> {
        self.device.clear();
        let (width, height) = self.viewport.client_size();
        self.camera.update_projection(width, height);
        SceneUniforms::from_camera(&self.camera).upload(&mut self.device, &self.program)?;
        for mesh in &self.meshes {
            mesh.draw(&mut self.device, &self.pointers);
        }
        Ok(())
    }

    /// New client size; the backing store follows on the next frame
    pub fn resize(&mut self, client_width: f32, client_height: f32) {
        self.viewport.resize(client_width, client_height);
        self.post_redisplay();
    }

    /// Upload textures whose fetch completed. Failed fetches keep the
    /// placeholder. Returns how many textures were uploaded.
    pub fn poll_textures(&mut self) -> Result<usize> {
        let mut uploaded = 0;
        for arrival in self.textures.poll() {
            let image = match arrival.result {
                Ok(bytes) => decode_texture(&bytes),
                Err(msg) => {
                    log::warn!("Texture {} for {} unavailable: {}", arrival.url, arrival.key, msg);
                    continue;
                }
            };
            match image {
                Ok(image) => {
                    self.device.upload_texture(arrival.texture, &image)?;
                    log::debug!("Texture {} loaded ({}x{})", arrival.url, image.width, image.height);
                    uploaded += 1;
                }
                Err(err) => log::warn!("Texture {} for {} failed to decode: {}", arrival.url, arrival.key, err),
            }
        }
        if uploaded > 0 {
            self.post_redisplay();
        }
        Ok(uploaded)
    }

    /// Release the GPU resources of every mesh of `model` and cancel its
    /// texture fetches. Later updates for the model create nothing.
    /// Returns the number of meshes released.
    pub fn discard_model(&mut self, model: &str) -> usize {
        self.discarded.insert(model.to_string());
        let cancelled = self.textures.cancel_model(model);
        let (gone, kept): (Vec<Mesh>, Vec<Mesh>) =
            std::mem::take(&mut self.meshes).into_iter().partition(|m| m.key().model == model);
        self.meshes = kept;
        let count = gone.len();
        for mesh in gone {
            mesh.release(&mut self.device);
        }
        if count > 0 {
            log::info!("Discarded {} meshes of {} ({} texture fetches cancelled)", count, model, cancelled);
            self.post_redisplay();
        }
        count
    }

    /// Release everything. Also runs on drop.
    pub fn teardown(&mut self) {
        self.textures.cancel_all();
        for mesh in self.meshes.drain(..) {
            mesh.release(&mut self.device);
        }
    }

    fn resolve_material(&mut self, key: &EntryKey, material: &str, texture: TextureHandle) -> Result<()> {
        match self.materials.get(material).texture_source() {
            TextureSource::Solid(image) => self.device.upload_texture(texture, &image),
            TextureSource::Fetch(url) => {
                self.device.upload_texture(texture, &TextureImage::white())?;
                let rx = self.fetcher.fetch(&url);
                log::debug!("Fetching texture {} for {}", url, key);
                self.textures.register(key.clone(), url, texture, rx);
                Ok(())
            }
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        &mut self.camera
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn mesh(&self, key: &EntryKey) -> Option<&Mesh> {
        self.meshes.iter().find(|m| m.key() == key)
    }

    pub fn pending_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn frames(&self) -> u64 {
        self.redraw.frames()
    }
}

impl<D: GraphicsDevice> LoadSink for Renderer<D> {
    fn on_load(&mut self, update: MeshUpdate<'_>) -> Result<()> {
        if self.discarded.contains(&update.key.model) {
            log::debug!("Skipping update for discarded mesh {}", update.key);
            return Ok(());
        }
        let index = match self.meshes.iter().position(|m| m.key() == update.key) {
            Some(index) => index,
            None if update.first => {
                let mesh = Mesh::create(&mut self.device, update.key.clone(), update.entry)?;
                if let Err(err) = self.resolve_material(update.key, &update.entry.material, mesh.texture()) {
                    mesh.release(&mut self.device);
                    return Err(err);
                }
                log::debug!("Created mesh {} (material {:?})", update.key, update.entry.material);
                self.meshes.push(mesh);
                self.meshes.len() - 1
            }
            None => {
                log::debug!("Skipping update for unknown mesh {}", update.key);
                return Ok(());
            }
        };
        self.meshes[index].update(&mut self.device, update.geometry, update.new_indices)?;
        self.post_redisplay();
        Ok(())
    }
}

impl<D: GraphicsDevice> Drop for Renderer<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::io::Cursor;
    use std::rc::Rc;

    use tokio::sync::oneshot;

    use super::*;
    use crate::core::error::{Error, MeshError};
    use crate::geometry::buffers::GeometryBuffers;
    use crate::render::device::PixelFormat;
    use crate::render::recording::{Command, RecordingDevice};
    use crate::render::texture::{FetchResult, NoTextures};
    use crate::streaming::manifest::{MeshEntry, StreamRange};

    /// Fetcher whose requests the test completes by hand
    #[derive(Clone, Default)]
    struct ManualFetcher {
        requests: Rc<RefCell<Vec<(String, oneshot::Sender<FetchResult>)>>>,
    }

    impl TextureFetcher for ManualFetcher {
        fn fetch(&mut self, url: &str) -> oneshot::Receiver<FetchResult> {
            let (tx, rx) = oneshot::channel();
            self.requests.borrow_mut().push((url.to_string(), tx));
            rx
        }
    }

    fn materials() -> Arc<MaterialTable> {
        Arc::new(
            MaterialTable::from_json(
                r#"{ "red": { "Kd": [255, 0, 0] }, "shirt": { "map_Kd": "shirt.png" } }"#,
            )
            .unwrap(),
        )
    }

    fn renderer(fetcher: Box<dyn TextureFetcher>) -> Renderer<RecordingDevice> {
        let config = ViewerConfig::default();
        let mut renderer = Renderer::new(
            RecordingDevice::new(),
            &ShaderSources::default(),
            Arc::new(VertexFormat::standard()),
            materials(),
            fetcher,
            &config,
        )
        .unwrap();
        renderer.resize(640.0, 480.0);
        renderer
    }

    fn entry(material: &str) -> MeshEntry {
        MeshEntry {
            material: material.into(),
            attrib_range: StreamRange::new(0, 10),
            index_range: StreamRange::new(10, 10),
            ..Default::default()
        }
    }

    fn quad() -> GeometryBuffers {
        let mut geometry = GeometryBuffers::new(Arc::new(VertexFormat::standard()));
        geometry.append_vertices(&[0.0; 32]).unwrap();
        geometry.append_indices(&[0, 1, 2, 0, 2, 3]).unwrap();
        geometry
    }

    fn load(renderer: &mut Renderer<RecordingDevice>, key: &EntryKey, entry: &MeshEntry, geometry: &GeometryBuffers, range: std::ops::Range<u32>, first: bool) -> Result<()> {
        renderer.on_load(MeshUpdate { key, entry, geometry, new_indices: range, first })
    }

    fn png(rgb: [u8; 3]) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb(rgb));
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_posts_coalesce_into_one_draw() {
        let mut renderer = renderer(Box::new(NoTextures));
        renderer.on_refresh().unwrap();
        renderer.device_mut().clear_commands();

        for _ in 0..5 {
            renderer.post_redisplay();
        }
        assert!(renderer.on_refresh().unwrap());
        assert!(!renderer.on_refresh().unwrap());
        assert_eq!(renderer.device().frames(), 1);
    }

    #[test]
    fn test_draw_calls_follow_display_list() {
        let mut renderer = renderer(Box::new(NoTextures));
        let key = EntryKey::new("m", 0);
        let entry = entry("red");
        let geometry = quad();

        load(&mut renderer, &key, &entry, &geometry, 0..3, true).unwrap();
        load(&mut renderer, &key, &entry, &geometry, 3..6, false).unwrap();
        renderer.device_mut().clear_commands();
        renderer.on_refresh().unwrap();

        assert_eq!(renderer.device().draw_calls(), vec![(0, 6)]);
        let mesh = renderer.mesh(&key).unwrap();
        let texture = renderer.device().texture(mesh.texture()).unwrap();
        assert_eq!(texture.pixels, vec![255, 0, 0]);

        let commands = renderer.device().commands();
        assert_eq!(commands[0], Command::SetViewport { width: 640, height: 480 });
        assert_eq!(commands[1], Command::Clear);
    }

    #[test]
    fn test_mvp_uniform_uploaded() {
        let mut renderer = renderer(Box::new(NoTextures));
        renderer.on_refresh().unwrap();
        let mvp = renderer.program().uniform(crate::render::uniforms::MVP_UNIFORM).unwrap();
        let expected = renderer.camera().model_view_projection().to_cols_array();
        assert_eq!(renderer.device().uniform(mvp), Some(&expected[..]));
    }

    #[test]
    fn test_texture_placeholder_then_image() {
        let fetcher = ManualFetcher::default();
        let requests = fetcher.requests.clone();
        let mut renderer = renderer(Box::new(fetcher));
        let key = EntryKey::new("m", 0);
        load(&mut renderer, &key, &entry("shirt"), &quad(), 0..6, true).unwrap();

        let texture = renderer.mesh(&key).unwrap().texture();
        assert_eq!(renderer.device().texture(texture), Some(&TextureImage::white()));
        assert_eq!(renderer.pending_textures(), 1);
        assert_eq!(renderer.poll_textures().unwrap(), 0);

        let (url, tx) = requests.borrow_mut().pop().unwrap();
        assert_eq!(url, "shirt.png");
        tx.send(Ok(png([0, 255, 0]))).unwrap();

        renderer.on_refresh().unwrap();
        assert_eq!(renderer.poll_textures().unwrap(), 1);
        assert!(renderer.needs_redraw());
        let image = renderer.device().texture(texture).unwrap();
        assert_eq!(image.format, PixelFormat::Rgba8);
        assert_eq!((image.width, image.height), (2, 2));
        assert_eq!(&image.pixels[..4], &[0, 255, 0, 255]);
    }

    #[test]
    fn test_failed_fetch_keeps_placeholder() {
        let mut renderer = renderer(Box::new(NoTextures));
        let key = EntryKey::new("m", 0);
        load(&mut renderer, &key, &entry("shirt"), &quad(), 0..6, true).unwrap();
        assert_eq!(renderer.poll_textures().unwrap(), 0);
        let texture = renderer.mesh(&key).unwrap().texture();
        assert_eq!(renderer.device().texture(texture), Some(&TextureImage::white()));
        assert_eq!(renderer.pending_textures(), 0);
    }

    #[test]
    fn test_discard_releases_resources() {
        let mut renderer = renderer(Box::new(ManualFetcher::default()));
        let geometry = quad();
        load(&mut renderer, &EntryKey::new("a", 0), &entry("shirt"), &geometry, 0..6, true).unwrap();
        load(&mut renderer, &EntryKey::new("b", 0), &entry("red"), &geometry, 0..6, true).unwrap();
        assert_eq!(renderer.device().live_textures(), 2);

        assert_eq!(renderer.discard_model("a"), 1);
        assert_eq!(renderer.pending_textures(), 0);
        assert_eq!(renderer.device().live_buffers(), 2);
        assert_eq!(renderer.device().live_textures(), 1);

        // Late chunks for the discarded model are skipped, even a first one
        load(&mut renderer, &EntryKey::new("a", 0), &entry("shirt"), &geometry, 0..6, false).unwrap();
        load(&mut renderer, &EntryKey::new("a", 1), &entry("shirt"), &geometry, 0..6, true).unwrap();
        assert_eq!(renderer.meshes().len(), 1);
        assert_eq!(renderer.device().live_buffers(), 2);
        assert_eq!(renderer.pending_textures(), 0);

        renderer.teardown();
        assert_eq!(renderer.device().live_buffers(), 0);
        assert_eq!(renderer.device().live_textures(), 0);
    }

    #[test]
    fn test_material_failure_releases_new_mesh() {
        let mut device = RecordingDevice::new();
        device.fail_texture_uploads("device lost");
        let mut renderer = Renderer::new(
            device,
            &ShaderSources::default(),
            Arc::new(VertexFormat::standard()),
            materials(),
            Box::new(NoTextures),
            &ViewerConfig::default(),
        )
        .unwrap();

        let err = load(&mut renderer, &EntryKey::new("m", 0), &entry("red"), &quad(), 0..6, true).unwrap_err();
        assert!(err.is_fatal());
        assert!(renderer.meshes().is_empty());
        assert_eq!(renderer.device().live_buffers(), 0);
        assert_eq!(renderer.device().live_textures(), 0);
    }

    #[test]
    fn test_backwards_range_is_mesh_error() {
        let mut renderer = renderer(Box::new(NoTextures));
        let key = EntryKey::new("m", 0);
        let geometry = quad();
        load(&mut renderer, &key, &entry("red"), &geometry, 3..6, true).unwrap();
        let err = load(&mut renderer, &key, &entry("red"), &geometry, 0..3, false).unwrap_err();
        assert!(matches!(err, Error::Mesh { source: MeshError::Order(_), .. }));
    }

    #[test]
    fn test_compile_failure_is_fatal() {
        let mut device = RecordingDevice::new();
        device.fail_compiles("syntax error");
        let result = Renderer::new(
            device,
            &ShaderSources::default(),
            Arc::new(VertexFormat::standard()),
            materials(),
            Box::new(NoTextures),
            &ViewerConfig::default(),
        );
        match result {
            Err(err) => assert!(err.is_fatal()),
            Ok(_) => panic!("expected compile failure"),
        }
    }
}
