//! Vertex normals derived from triangle connectivity
//!
//! Each triangle's unnormalized face normal `(p1 - p0) x (p2 - p0)` is added
//! to all three of its vertices, which weights faces by area. A vertex whose
//! accumulated normal has zero length keeps the zero vector.

use crate::core::error::MeshError;
use crate::core::types::Vec3;
use crate::geometry::vertex_format::VertexFormat;

/// Accumulate face normals of `indices` into the normal slots of
/// `vertices`, in place. With `normalize`, every vertex normal in the buffer
/// is then rescaled to unit length.
///
/// Validates the whole input before writing anything.
pub fn compute_normals(
    vertices: &mut [f32],
    indices: &[u16],
    format: &VertexFormat,
    normalize: bool,
) -> Result<(), MeshError> {
    let layout = Layout::new(format)?;
    let vertex_count = layout.vertex_count(vertices)?;
    validate_triangles(indices, vertex_count)?;

    for tri in indices.chunks_exact(3) {
        let n = layout.face_normal(vertices, tri);
        for &v in tri {
            let sum = layout.normal(vertices, v as usize) + n;
            layout.set_normal(vertices, v as usize, sum);
        }
    }

    if normalize {
        for v in 0..vertex_count {
            let n = layout.normal(vertices, v);
            layout.set_normal(vertices, v, n.normalize_or_zero());
        }
    }
    Ok(())
}

/// Incremental normal computation for a growing vertex buffer.
///
/// Keeps the raw per-vertex sums on the side so that normals of vertices
/// shared between chunks stay correct after they were normalized once.
#[derive(Clone, Debug, Default)]
pub struct NormalAccumulator {
    sums: Vec<Vec3>,
}

impl NormalAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the faces of `indices` (a newly appended range) and rewrite the
    /// normal slot of every vertex they touch. Returns the number of vertices
    /// rewritten.
    pub fn accumulate(
        &mut self,
        vertices: &mut [f32],
        indices: &[u16],
        format: &VertexFormat,
        normalize: bool,
    ) -> Result<usize, MeshError> {
        let layout = Layout::new(format)?;
        let vertex_count = layout.vertex_count(vertices)?;
        validate_triangles(indices, vertex_count)?;

        if self.sums.len() < vertex_count {
            self.sums.resize(vertex_count, Vec3::ZERO);
        }

        let mut touched: Vec<usize> = Vec::with_capacity(indices.len());
        for tri in indices.chunks_exact(3) {
            let n = layout.face_normal(vertices, tri);
            for &v in tri {
                self.sums[v as usize] += n;
                touched.push(v as usize);
            }
        }
        touched.sort_unstable();
        touched.dedup();

        for &v in &touched {
            let sum = self.sums[v];
            let n = if normalize { sum.normalize_or_zero() } else { sum };
            layout.set_normal(vertices, v, n);
        }
        Ok(touched.len())
    }

    /// Raw accumulated normal of vertex `v`
    pub fn sum(&self, v: usize) -> Option<Vec3> {
        self.sums.get(v).copied()
    }
}

fn validate_triangles(indices: &[u16], vertex_count: usize) -> Result<(), MeshError> {
    if indices.len() % 3 != 0 {
        return Err(MeshError::Format(format!(
            "{} indices do not form whole triangles",
            indices.len()
        )));
    }
    match indices.iter().find(|&&i| i as usize >= vertex_count) {
        Some(&index) => Err(MeshError::Range {
            index: index as u32,
            vertex_count: vertex_count as u32,
        }),
        None => Ok(()),
    }
}

/// Resolved position/normal offsets for one format
struct Layout {
    stride: usize,
    position: usize,
    normal: usize,
}

impl Layout {
    fn new(format: &VertexFormat) -> Result<Self, MeshError> {
        Ok(Self {
            stride: format.stride(),
            position: format.position()?.offset,
            normal: format.normal()?.offset,
        })
    }

    fn vertex_count(&self, vertices: &[f32]) -> Result<usize, MeshError> {
        if vertices.len() % self.stride != 0 {
            return Err(MeshError::Format(format!(
                "{} components is not a multiple of stride {}",
                vertices.len(),
                self.stride
            )));
        }
        Ok(vertices.len() / self.stride)
    }

    fn read(&self, vertices: &[f32], v: usize, offset: usize) -> Vec3 {
        let base = self.stride * v + offset;
        Vec3::from_slice(&vertices[base..base + 3])
    }

    fn position(&self, vertices: &[f32], v: usize) -> Vec3 {
        self.read(vertices, v, self.position)
    }

    fn normal(&self, vertices: &[f32], v: usize) -> Vec3 {
        self.read(vertices, v, self.normal)
    }

    fn set_normal(&self, vertices: &mut [f32], v: usize, n: Vec3) {
        let base = self.stride * v + self.normal;
        n.write_to_slice(&mut vertices[base..base + 3]);
    }

    fn face_normal(&self, vertices: &[f32], tri: &[u16]) -> Vec3 {
        let p0 = self.position(vertices, tri[0] as usize);
        let p1 = self.position(vertices, tri[1] as usize);
        let p2 = self.position(vertices, tri[2] as usize);
        (p1 - p0).cross(p2 - p0)
    }
}
