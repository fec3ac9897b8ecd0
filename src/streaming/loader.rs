//! Incremental mesh loading
//!
//! Chunks arrive in any sizes, per entry in stream order. The loader keeps
//! one slot per manifest entry, grows its geometry, computes normals over
//! exactly the new triangles and hands each update to a [`LoadSink`].
//! A bad chunk fails its own entry; every other entry keeps loading.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::core::config::ViewerConfig;
use crate::core::error::{EntryKey, Error, MeshError};
use crate::core::types::Result;
use crate::geometry::buffers::GeometryBuffers;
use crate::geometry::vertex_format::VertexFormat;
use crate::streaming::chunk::DecodedChunk;
use crate::streaming::manifest::{DecodeParams, Manifest, MeshEntry, StreamRange};

/// Load state of one manifest entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// No chunk received yet
    Pending,
    /// Some chunks received
    Loading,
    /// Both declared ranges fully received
    Ready,
    /// A chunk was rejected; later chunks are dropped
    Failed,
    /// The model was discarded; its geometry is gone and later chunks are dropped
    Discarded,
}

impl LoadState {
    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::Ready | LoadState::Failed | LoadState::Discarded)
    }
}

/// What the sink receives after a chunk has been applied
#[derive(Clone, Debug)]
pub struct MeshUpdate<'a> {
    pub key: &'a EntryKey,
    pub entry: &'a MeshEntry,
    pub geometry: &'a GeometryBuffers,
    /// Positions in the index buffer added by this chunk
    pub new_indices: Range<u32>,
    /// First chunk of this entry
    pub first: bool,
}

/// Receiver of mesh updates, normally the renderer.
///
/// Returning [`Error::Mesh`] fails that entry only; any other error is
/// passed back to the caller of [`StreamingMeshLoader::deliver`].
pub trait LoadSink {
    fn on_load(&mut self, update: MeshUpdate<'_>) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Sources carry no normals; derive them from triangles
    pub compute_normals: bool,
    /// Rescale computed normals to unit length
    pub normalize: bool,
}

impl LoaderOptions {
    pub fn from_config(config: &ViewerConfig) -> Self {
        Self {
            compute_normals: !config.source_has_normals,
            normalize: config.normalize_normals,
        }
    }
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self::from_config(&ViewerConfig::default())
    }
}

/// Result of delivering one chunk
#[derive(Clone, Debug, PartialEq)]
pub enum ChunkOutcome {
    /// Applied; the entry is now in the given state
    Accepted(LoadState),
    /// Rejected; the entry (if known) is now failed
    Rejected(MeshError),
    /// Dropped because the entry already reached a terminal state
    Ignored(LoadState),
}

struct EntrySlot {
    entry: MeshEntry,
    geometry: GeometryBuffers,
    state: LoadState,
    /// Next expected stream offsets
    attrib_cursor: u64,
    index_cursor: u64,
    chunks: usize,
}

impl EntrySlot {
    fn new(entry: MeshEntry, format: Arc<VertexFormat>) -> Self {
        let state = if entry.attrib_range.is_empty() && entry.index_range.is_empty() {
            LoadState::Ready
        } else {
            LoadState::Pending
        };
        Self {
            attrib_cursor: entry.attrib_range.offset,
            index_cursor: entry.index_range.offset,
            entry,
            geometry: GeometryBuffers::new(format),
            state,
            chunks: 0,
        }
    }

    fn check_range(declared: &StreamRange, cursor: u64, got: &StreamRange, what: &str) -> std::result::Result<(), MeshError> {
        if !declared.contains(got) {
            return Err(MeshError::UnknownRange(format!(
                "{} range [{}, {}) outside declared [{}, {})",
                what,
                got.offset,
                got.end(),
                declared.offset,
                declared.end()
            )));
        }
        if got.offset != cursor {
            return Err(MeshError::Order(format!(
                "{} range starts at {}, expected {}",
                what, got.offset, cursor
            )));
        }
        Ok(())
    }

    /// A non-empty range must carry data and an empty one must not
    fn check_payload(range: &StreamRange, values: usize, what: &str) -> std::result::Result<(), MeshError> {
        if range.is_empty() != (values == 0) {
            return Err(MeshError::Format(format!(
                "{} range of length {} carries {} values",
                what, range.length, values
            )));
        }
        Ok(())
    }

    /// Validate and append one chunk. Returns the new index range.
    fn apply(&mut self, chunk: &DecodedChunk, options: LoaderOptions) -> std::result::Result<Range<u32>, MeshError> {
        Self::check_range(&self.entry.attrib_range, self.attrib_cursor, &chunk.attrib_range, "attribute")?;
        Self::check_range(&self.entry.index_range, self.index_cursor, &chunk.index_range, "index")?;
        Self::check_payload(&chunk.attrib_range, chunk.attribs.len(), "attribute")?;
        Self::check_payload(&chunk.index_range, chunk.indices.len(), "index")?;

        self.geometry.append_vertices(&chunk.attribs)?;
        let new_indices = self.geometry.append_indices(&chunk.indices)?;
        self.geometry.append_bounds(&chunk.bboxen)?;
        if options.compute_normals {
            self.geometry
                .compute_normals(new_indices.clone(), options.normalize && chunk.normalize)?;
        }

        self.attrib_cursor = chunk.attrib_range.end();
        self.index_cursor = chunk.index_range.end();
        self.chunks += 1;
        self.state = if self.attrib_cursor == self.entry.attrib_range.end()
            && self.index_cursor == self.entry.index_range.end()
        {
            LoadState::Ready
        } else {
            LoadState::Loading
        };
        Ok(new_indices)
    }
}

/// Per-entry state machines for every mesh in a manifest
pub struct StreamingMeshLoader {
    format: Arc<VertexFormat>,
    decode: DecodeParams,
    slots: BTreeMap<EntryKey, EntrySlot>,
    failures: Vec<(EntryKey, MeshError)>,
    options: LoaderOptions,
}

impl StreamingMeshLoader {
    pub fn new(manifest: &Manifest, format: Arc<VertexFormat>, options: LoaderOptions) -> Self {
        let slots = manifest
            .entries()
            .map(|(key, entry)| (key, EntrySlot::new(entry.clone(), format.clone())))
            .collect::<BTreeMap<_, _>>();
        log::info!(
            "Streaming {} meshes from {} models",
            slots.len(),
            manifest.models.len()
        );
        Self {
            format,
            decode: manifest.decode.clone(),
            slots,
            failures: Vec::new(),
            options,
        }
    }

    pub fn format(&self) -> &Arc<VertexFormat> {
        &self.format
    }

    /// Decode parameters of the manifest, for quantized transports
    pub fn decode_params(&self) -> &DecodeParams {
        &self.decode
    }

    pub fn options(&self) -> LoaderOptions {
        self.options
    }

    /// Apply one chunk and notify `sink`.
    ///
    /// Per-mesh problems come back as [`ChunkOutcome::Rejected`] and are
    /// recorded in [`StreamingMeshLoader::failures`]. Only errors the sink
    /// raises outside a single mesh are returned as `Err`.
    pub fn deliver<S: LoadSink + ?Sized>(&mut self, chunk: &DecodedChunk, sink: &mut S) -> Result<ChunkOutcome> {
        let key = chunk.key();
        let options = self.options;

        let Some(slot) = self.slots.get_mut(&key) else {
            let err = MeshError::UnknownRange(format!("no manifest entry {}", key));
            log::warn!("Dropping chunk: {}", err);
            self.failures.push((key, err.clone()));
            return Ok(ChunkOutcome::Rejected(err));
        };

        if slot.state == LoadState::Discarded {
            log::debug!("Dropping chunk for discarded entry {}", key);
            return Ok(ChunkOutcome::Ignored(slot.state));
        }
        if slot.state.is_terminal() {
            log::warn!("Dropping chunk for {:?} entry {}", slot.state, key);
            return Ok(ChunkOutcome::Ignored(slot.state));
        }

        let first = slot.chunks == 0;
        let new_indices = match slot.apply(chunk, options) {
            Ok(range) => range,
            Err(err) => {
                slot.state = LoadState::Failed;
                log::warn!("Mesh {} failed: {}", key, err);
                self.failures.push((key, err.clone()));
                return Ok(ChunkOutcome::Rejected(err));
            }
        };
        log::debug!(
            "Chunk {} of {}: {} vertices, indices [{}, {}), {:?}",
            slot.chunks,
            key,
            slot.geometry.vertex_count(),
            new_indices.start,
            new_indices.end,
            slot.state
        );

        let update = MeshUpdate {
            key: &key,
            entry: &slot.entry,
            geometry: &slot.geometry,
            new_indices,
            first,
        };
        match sink.on_load(update) {
            Ok(()) => {}
            Err(Error::Mesh { source, .. }) => {
                slot.state = LoadState::Failed;
                log::warn!("Mesh {} failed: {}", key, source);
                self.failures.push((key, source.clone()));
                return Ok(ChunkOutcome::Rejected(source));
            }
            Err(err) => return Err(err),
        }

        if slot.state == LoadState::Ready {
            log::info!(
                "Mesh {} ready: {} vertices, {} triangles in {} chunks",
                key,
                slot.geometry.vertex_count(),
                slot.geometry.index_count() / 3,
                slot.chunks
            );
        }
        Ok(ChunkOutcome::Accepted(slot.state))
    }

    /// Stop loading every entry of `model` and free its geometry. Returns
    /// the number of entries discarded.
    pub fn discard_model(&mut self, model: &str) -> usize {
        let mut count = 0;
        for (key, slot) in self.slots.iter_mut() {
            if key.model != model || slot.state == LoadState::Discarded {
                continue;
            }
            slot.state = LoadState::Discarded;
            slot.geometry = GeometryBuffers::new(self.format.clone());
            count += 1;
        }
        if count > 0 {
            log::info!("Discarded {} entries of {}", count, model);
        }
        count
    }

    /// State of an entry, `None` if the manifest has no such entry
    pub fn state(&self, key: &EntryKey) -> Option<LoadState> {
        self.slots.get(key).map(|slot| slot.state)
    }

    pub fn geometry(&self, key: &EntryKey) -> Option<&GeometryBuffers> {
        self.slots.get(key).map(|slot| &slot.geometry)
    }

    /// Every rejected chunk so far, in arrival order
    pub fn failures(&self) -> &[(EntryKey, MeshError)] {
        &self.failures
    }

    /// No entry is still waiting for data
    pub fn is_complete(&self) -> bool {
        self.slots.values().all(|slot| slot.state.is_terminal())
    }

    pub fn report(&self) -> LoadReport {
        let mut report = LoadReport::default();
        for slot in self.slots.values() {
            match slot.state {
                LoadState::Pending => report.pending += 1,
                LoadState::Loading => report.loading += 1,
                LoadState::Ready => report.ready += 1,
                LoadState::Failed => report.failed += 1,
                LoadState::Discarded => report.discarded += 1,
            }
            report.vertices += slot.geometry.vertex_count();
            report.triangles += slot.geometry.index_count() / 3;
        }
        report.failures = self.failures.clone();
        report
    }
}

/// Summary of the loader's entries
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LoadReport {
    pub pending: usize,
    pub loading: usize,
    pub ready: usize,
    pub failed: usize,
    pub discarded: usize,
    pub vertices: usize,
    pub triangles: usize,
    pub failures: Vec<(EntryKey, MeshError)>,
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} ready, {} loading, {} pending, {} failed, {} discarded ({} vertices, {} triangles)",
            self.ready, self.loading, self.pending, self.failed, self.discarded, self.vertices, self.triangles
        )?;
        for (key, err) in &self.failures {
            writeln!(f, "  {}: {}", key, err)?;
        }
        Ok(())
    }
}
