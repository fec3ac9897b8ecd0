//! GPU-side mesh: buffers, texture, display list and named groups

use std::ops::Range;

use crate::core::error::EntryKey;
use crate::core::types::Result;
use crate::geometry::buffers::{GeometryBuffers, GpuBuffers};
use crate::geometry::display_list::DisplayList;
use crate::render::device::{AttribPointer, BufferKind, GraphicsDevice, TextureHandle};
use crate::streaming::manifest::MeshEntry;

/// Named span of the index buffer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub start: u32,
    pub length: u32,
}

/// Group boundaries from the entry's names and lengths
pub fn groups_from_entry(entry: &MeshEntry) -> Vec<Group> {
    let mut start = 0;
    entry
        .lengths
        .iter()
        .enumerate()
        .map(|(i, &length)| {
            let group = Group {
                name: entry.names.get(i).cloned().unwrap_or_default(),
                start,
                length,
            };
            start += length;
            group
        })
        .collect()
}

/// One drawable mesh. Owns its GPU resources until [`Mesh::release`].
#[derive(Debug)]
pub struct Mesh {
    key: EntryKey,
    material: String,
    gpu: GpuBuffers,
    texture: TextureHandle,
    display_list: DisplayList,
    groups: Vec<Group>,
}

impl Mesh {
    /// Allocate buffers and a texture for a newly seen entry
    pub fn create<D: GraphicsDevice + ?Sized>(device: &mut D, key: EntryKey, entry: &MeshEntry) -> Result<Self> {
        let gpu = GpuBuffers {
            vertex: device.create_buffer(BufferKind::Vertex)?,
            index: device.create_buffer(BufferKind::Index)?,
            bounds: match entry.bboxes {
                Some(_) => Some(device.create_buffer(BufferKind::Vertex)?),
                None => None,
            },
        };
        let texture = device.create_texture()?;
        Ok(Self {
            key,
            material: entry.material.clone(),
            gpu,
            texture,
            display_list: DisplayList::new(),
            groups: groups_from_entry(entry),
        })
    }

    /// Make `new_indices` drawable and re-upload the grown geometry
    pub fn update<D: GraphicsDevice + ?Sized>(
        &mut self,
        device: &mut D,
        geometry: &GeometryBuffers,
        new_indices: Range<u32>,
    ) -> Result<()> {
        self.display_list
            .insert_range(new_indices.start, new_indices.end)
            .map_err(|e| e.for_entry(&self.key))?;
        geometry.to_gpu_buffers(device, &self.gpu)
    }

    /// Bind and issue one draw per display-list range
    pub fn draw<D: GraphicsDevice + ?Sized>(&self, device: &mut D, pointers: &[AttribPointer]) {
        if self.display_list.is_empty() {
            return;
        }
        device.bind_texture(self.texture);
        device.bind_buffers(self.gpu.vertex, self.gpu.index, pointers);
        for range in self.display_list.ranges() {
            device.draw_indexed(range.start, range.end - range.start);
        }
    }

    pub fn release<D: GraphicsDevice + ?Sized>(self, device: &mut D) {
        device.delete_buffer(self.gpu.vertex);
        device.delete_buffer(self.gpu.index);
        if let Some(bounds) = self.gpu.bounds {
            device.delete_buffer(bounds);
        }
        device.delete_texture(self.texture);
    }

    pub fn key(&self) -> &EntryKey {
        &self.key
    }

    pub fn material(&self) -> &str {
        &self.material
    }

    pub fn gpu_buffers(&self) -> &GpuBuffers {
        &self.gpu
    }

    pub fn texture(&self) -> TextureHandle {
        self.texture
    }

    pub fn display_list(&self) -> &DisplayList {
        &self.display_list
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::core::error::{Error, MeshError};
    use crate::geometry::vertex_format::VertexFormat;
    use crate::render::recording::RecordingDevice;
    use crate::streaming::manifest::StreamRange;

    fn entry() -> MeshEntry {
        MeshEntry {
            material: "skin".into(),
            attrib_range: StreamRange::new(0, 100),
            index_range: StreamRange::new(100, 100),
            bboxes: Some(200),
            names: vec!["head".into(), "torso".into()],
            lengths: vec![6, 3],
        }
    }

    fn two_triangles() -> GeometryBuffers {
        let mut geometry = GeometryBuffers::new(Arc::new(VertexFormat::standard()));
        geometry.append_vertices(&[0.0; 32]).unwrap();
        geometry.append_indices(&[0, 1, 2, 1, 2, 3]).unwrap();
        geometry
    }

    #[test]
    fn test_groups_prefix_sums() {
        let groups = groups_from_entry(&entry());
        assert_eq!(
            groups,
            vec![
                Group { name: "head".into(), start: 0, length: 6 },
                Group { name: "torso".into(), start: 6, length: 3 },
            ]
        );
    }

    #[test]
    fn test_draw_per_range_and_release() {
        let mut device = RecordingDevice::new();
        let mut mesh = Mesh::create(&mut device, EntryKey::new("m", 0), &entry()).unwrap();
        assert!(mesh.gpu_buffers().bounds.is_some());
        assert_eq!(device.live_buffers(), 3);

        let geometry = two_triangles();
        mesh.update(&mut device, &geometry, 0..3).unwrap();
        mesh.update(&mut device, &geometry, 3..6).unwrap();
        assert_eq!(mesh.display_list().len(), 1);

        mesh.draw(&mut device, &[]);
        assert_eq!(device.draw_calls(), vec![(0, 6)]);

        mesh.release(&mut device);
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn test_backwards_range_is_mesh_error() {
        let mut device = RecordingDevice::new();
        let mut mesh = Mesh::create(&mut device, EntryKey::new("m", 3), &MeshEntry::default()).unwrap();
        let geometry = two_triangles();
        mesh.update(&mut device, &geometry, 3..6).unwrap();

        let err = mesh.update(&mut device, &geometry, 0..3).unwrap_err();
        assert!(matches!(err, Error::Mesh { source: MeshError::Order(_), .. }));
        assert_eq!(err.mesh_key(), Some(&EntryKey::new("m", 3)));
    }
}
