//! Asynchronous diffuse textures
//!
//! A fetch runs on a tokio runtime and reports back through a oneshot
//! channel that the event thread polls. Dropping the receiver cancels it.

use std::path::PathBuf;

use tokio::runtime::{Handle, Runtime};
use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::core::error::EntryKey;
use crate::core::types::Result;
use crate::render::device::{PixelFormat, TextureHandle, TextureImage};

/// Raw encoded image bytes, or a description of why the fetch failed
pub type FetchResult = std::result::Result<Vec<u8>, String>;

/// Source of texture bytes by URL
pub trait TextureFetcher {
    fn fetch(&mut self, url: &str) -> oneshot::Receiver<FetchResult>;
}

/// Reads texture URLs as paths below a root directory
pub struct FileTextureFetcher {
    root: PathBuf,
    handle: Handle,
    /// Owned runtime when not borrowing the caller's
    #[allow(dead_code)]
    runtime: Option<Runtime>,
}

impl FileTextureFetcher {
    /// Fetcher with its own single-worker runtime
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("texture-fetch")
            .enable_all()
            .build()?;
        Ok(Self {
            root: root.into(),
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    /// Fetcher that spawns onto an existing runtime
    pub fn with_handle(root: impl Into<PathBuf>, handle: Handle) -> Self {
        Self {
            root: root.into(),
            handle,
            runtime: None,
        }
    }

    fn resolve(&self, url: &str) -> PathBuf {
        self.root.join(url.trim_start_matches('/'))
    }
}

impl TextureFetcher for FileTextureFetcher {
    fn fetch(&mut self, url: &str) -> oneshot::Receiver<FetchResult> {
        let (tx, rx) = oneshot::channel();
        let path = self.resolve(url);
        self.handle.spawn(async move {
            if tx.is_closed() {
                return;
            }
            let result = tokio::fs::read(&path)
                .await
                .map_err(|e| format!("{}: {}", path.display(), e));
            let _ = tx.send(result);
        });
        rx
    }
}

/// Fetcher for hosts without texture access; every fetch fails at once
#[derive(Debug, Default)]
pub struct NoTextures;

impl TextureFetcher for NoTextures {
    fn fetch(&mut self, url: &str) -> oneshot::Receiver<FetchResult> {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(format!("texture fetching disabled ({})", url)));
        rx
    }
}

/// Decode an encoded image into bottom-up RGBA rows with mipmaps
pub fn decode_texture(bytes: &[u8]) -> Result<TextureImage> {
    let rgba = image::load_from_memory(bytes)?.flipv().to_rgba8();
    Ok(TextureImage {
        width: rgba.width(),
        height: rgba.height(),
        format: PixelFormat::Rgba8,
        pixels: rgba.into_raw(),
        mipmaps: true,
    })
}

struct PendingTexture {
    key: EntryKey,
    url: String,
    texture: TextureHandle,
    rx: oneshot::Receiver<FetchResult>,
}

/// A fetch that finished, successfully or not
#[derive(Debug)]
pub struct TextureArrival {
    pub key: EntryKey,
    pub url: String,
    pub texture: TextureHandle,
    pub result: FetchResult,
}

/// Outstanding fetches, each bound to the mesh texture it will fill
#[derive(Default)]
pub struct PendingTextures {
    pending: Vec<PendingTexture>,
}

impl PendingTextures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: EntryKey, url: String, texture: TextureHandle, rx: oneshot::Receiver<FetchResult>) {
        self.pending.push(PendingTexture { key, url, texture, rx });
    }

    /// Drop every fetch for meshes of `model`. Returns how many.
    pub fn cancel_model(&mut self, model: &str) -> usize {
        let before = self.pending.len();
        self.pending.retain(|p| p.key.model != model);
        before - self.pending.len()
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// Collect the fetches that have completed since the last poll
    pub fn poll(&mut self) -> Vec<TextureArrival> {
        let mut arrived = Vec::new();
        let mut waiting = Vec::with_capacity(self.pending.len());
        for mut p in self.pending.drain(..) {
            let result = match p.rx.try_recv() {
                Ok(result) => result,
                Err(TryRecvError::Empty) => {
                    waiting.push(p);
                    continue;
                }
                Err(TryRecvError::Closed) => Err("fetch abandoned".to_string()),
            };
            arrived.push(TextureArrival {
                key: p.key,
                url: p.url,
                texture: p.texture,
                result,
            });
        }
        self.pending = waiting;
        arrived
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
