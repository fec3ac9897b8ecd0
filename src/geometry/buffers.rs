//! Growable CPU-side geometry for one mesh

use std::ops::Range;
use std::sync::Arc;

use crate::core::error::MeshError;
use crate::core::types::{Result, Vec3};
use crate::geometry::normals::NormalAccumulator;
use crate::geometry::vertex_format::VertexFormat;
use crate::math::bounds::{BoundingVolume, BOUNDS_STRIDE};
use crate::render::device::{BufferHandle, GraphicsDevice};

/// Largest vertex count addressable by 16-bit indices
pub const MAX_VERTICES: usize = u16::MAX as usize + 1;

/// Interleaved vertices, triangle indices and per-chunk bounding volumes.
///
/// Every append validates first and mutates only on success, so a rejected
/// chunk leaves the buffers exactly as they were.
#[derive(Clone, Debug)]
pub struct GeometryBuffers {
    format: Arc<VertexFormat>,
    vertices: Vec<f32>,
    indices: Vec<u16>,
    bounds: Vec<f32>,
    normals: NormalAccumulator,
}

/// GPU buffers a [`GeometryBuffers`] uploads into
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuBuffers {
    pub vertex: BufferHandle,
    pub index: BufferHandle,
    pub bounds: Option<BufferHandle>,
}

impl GeometryBuffers {
    pub fn new(format: Arc<VertexFormat>) -> Self {
        Self {
            format,
            vertices: Vec::new(),
            indices: Vec::new(),
            bounds: Vec::new(),
            normals: NormalAccumulator::new(),
        }
    }

    pub fn format(&self) -> &Arc<VertexFormat> {
        &self.format
    }

    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u16] {
        &self.indices
    }

    /// Packed bounding volumes (center xyz, radius xyz)
    pub fn packed_bounds(&self) -> &[f32] {
        &self.bounds
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / self.format.stride()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    /// Append whole vertices. Returns the range of new vertex numbers.
    pub fn append_vertices(&mut self, components: &[f32]) -> std::result::Result<Range<usize>, MeshError> {
        let stride = self.format.stride();
        if components.len() % stride != 0 {
            return Err(MeshError::Format(format!(
                "{} components is not a multiple of stride {}",
                components.len(),
                stride
            )));
        }
        let first = self.vertex_count();
        let last = first + components.len() / stride;
        if last > MAX_VERTICES {
            return Err(MeshError::Format(format!(
                "{} vertices exceed the 16-bit index space",
                last
            )));
        }
        self.vertices.extend_from_slice(components);
        Ok(first..last)
    }

    /// Append whole triangles. Every index must name an existing vertex.
    /// Returns the range of new positions in the index buffer.
    pub fn append_indices(&mut self, indices: &[u16]) -> std::result::Result<Range<u32>, MeshError> {
        if indices.len() % 3 != 0 {
            return Err(MeshError::Format(format!(
                "{} indices do not form whole triangles",
                indices.len()
            )));
        }
        let vertex_count = self.vertex_count();
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(MeshError::Range {
                index: index as u32,
                vertex_count: vertex_count as u32,
            });
        }
        let first = self.indices.len() as u32;
        self.indices.extend_from_slice(indices);
        Ok(first..self.indices.len() as u32)
    }

    /// Append packed bounding volumes
    pub fn append_bounds(&mut self, packed: &[f32]) -> std::result::Result<usize, MeshError> {
        if packed.len() % BOUNDS_STRIDE != 0 {
            return Err(MeshError::Format(format!(
                "{} bound components is not a multiple of {}",
                packed.len(),
                BOUNDS_STRIDE
            )));
        }
        self.bounds.extend_from_slice(packed);
        Ok(packed.len() / BOUNDS_STRIDE)
    }

    /// Compute normals for the triangles in `range` of the index buffer,
    /// typically the range just appended.
    pub fn compute_normals(&mut self, range: Range<u32>, normalize: bool) -> std::result::Result<usize, MeshError> {
        let indices = self
            .indices
            .get(range.start as usize..range.end as usize)
            .ok_or_else(|| {
                MeshError::Order(format!(
                    "normal range [{}, {}) outside {} indices",
                    range.start,
                    range.end,
                    self.indices.len()
                ))
            })?;
        self.normals.accumulate(&mut self.vertices, indices, &self.format, normalize)
    }

    pub fn bounding_volumes(&self) -> impl Iterator<Item = BoundingVolume> + '_ {
        self.bounds.chunks_exact(BOUNDS_STRIDE).filter_map(BoundingVolume::from_packed)
    }

    /// Union of all appended bounding volumes
    pub fn bounds(&self) -> Option<BoundingVolume> {
        self.bounding_volumes().reduce(|a, b| a.merged(&b))
    }

    /// Bound of the vertex positions themselves
    pub fn position_bounds(&self) -> Option<BoundingVolume> {
        let stride = self.format.stride();
        let offset = self.format.position().ok()?.offset;
        BoundingVolume::from_points(
            self.vertices
                .chunks_exact(stride)
                .map(|v| Vec3::from_slice(&v[offset..offset + 3])),
        )
    }

    /// Upload the full current contents. Safe to repeat as data grows.
    pub fn to_gpu_buffers<D: GraphicsDevice + ?Sized>(&self, device: &mut D, targets: &GpuBuffers) -> Result<()> {
        device.upload_buffer(targets.vertex, bytemuck::cast_slice(&self.vertices))?;
        device.upload_buffer(targets.index, bytemuck::cast_slice(&self.indices))?;
        if let Some(bounds) = targets.bounds {
            device.upload_buffer(bounds, bytemuck::cast_slice(&self.bounds))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::device::BufferKind;
    use crate::render::recording::RecordingDevice;

    fn triangle() -> Vec<f32> {
        vec![
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, //
            1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0,
        ]
    }

    fn buffers() -> GeometryBuffers {
        GeometryBuffers::new(Arc::new(VertexFormat::standard()))
    }

    #[test]
    fn test_append_ranges() {
        let mut geom = buffers();
        assert_eq!(geom.append_vertices(&triangle()).unwrap(), 0..3);
        assert_eq!(geom.append_vertices(&triangle()).unwrap(), 3..6);
        assert_eq!(geom.append_indices(&[0, 1, 2]).unwrap(), 0..3);
        assert_eq!(geom.append_indices(&[3, 4, 5]).unwrap(), 3..6);
        assert_eq!(geom.vertex_count(), 6);
        assert_eq!(geom.index_count(), 6);
    }

    #[test]
    fn test_misaligned_vertices_rejected() {
        let mut geom = buffers();
        let err = geom.append_vertices(&[0.0; 7]).unwrap_err();
        assert!(matches!(err, MeshError::Format(_)));
        assert_eq!(geom.vertex_count(), 0);
    }

    #[test]
    fn test_out_of_range_index_does_not_mutate() {
        let mut geom = buffers();
        geom.append_vertices(&triangle()).unwrap();
        geom.append_indices(&[0, 1, 2]).unwrap();

        let err = geom.append_indices(&[0, 1, 3]).unwrap_err();
        assert_eq!(err, MeshError::Range { index: 3, vertex_count: 3 });
        assert_eq!(geom.indices(), &[0, 1, 2]);
    }

    #[test]
    fn test_vertex_limit() {
        let mut geom = GeometryBuffers::new(Arc::new(VertexFormat::bounds()));
        geom.append_vertices(&vec![0.0; 6 * MAX_VERTICES]).unwrap();
        assert!(geom.append_vertices(&[0.0; 6]).is_err());
    }

    #[test]
    fn test_normals_over_appended_range() {
        let mut geom = buffers();
        geom.append_vertices(&triangle()).unwrap();
        let range = geom.append_indices(&[0, 1, 2]).unwrap();
        assert_eq!(geom.compute_normals(range, true).unwrap(), 3);
        for v in geom.vertices().chunks_exact(8) {
            assert_eq!(&v[5..8], &[0.0, 0.0, 1.0]);
        }
        assert!(geom.compute_normals(3..9, true).is_err());
    }

    #[test]
    fn test_bounds() {
        let mut geom = buffers();
        assert!(geom.bounds().is_none());
        assert_eq!(geom.append_bounds(&[0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 2.0, 0.0, 0.0, 1.0, 1.0, 1.0]).unwrap(), 2);
        assert!(geom.append_bounds(&[0.0; 5]).is_err());
        let all = geom.bounds().unwrap();
        assert_eq!(all.min(), Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(all.max(), Vec3::new(3.0, 1.0, 1.0));

        geom.append_vertices(&triangle()).unwrap();
        let pb = geom.position_bounds().unwrap();
        assert_eq!(pb.max(), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_upload_is_repeatable() {
        let mut device = RecordingDevice::new();
        let targets = GpuBuffers {
            vertex: device.create_buffer(BufferKind::Vertex).unwrap(),
            index: device.create_buffer(BufferKind::Index).unwrap(),
            bounds: None,
        };

        let mut geom = buffers();
        geom.append_vertices(&triangle()).unwrap();
        geom.append_indices(&[0, 1, 2]).unwrap();
        geom.to_gpu_buffers(&mut device, &targets).unwrap();
        geom.to_gpu_buffers(&mut device, &targets).unwrap();

        assert_eq!(device.buffer_data(targets.vertex).unwrap().len(), 24 * 4);
        assert_eq!(device.buffer_data(targets.index).unwrap(), bytemuck::cast_slice::<u16, u8>(&[0, 1, 2]));
    }
}
