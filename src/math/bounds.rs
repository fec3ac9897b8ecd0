//! Per-chunk bounding volumes

use crate::core::types::Vec3;

/// Number of floats in one packed bounding volume (center xyz, radius xyz)
pub const BOUNDS_STRIDE: usize = 6;

/// Axis-aligned bound stored as a center and per-axis radius, the layout
/// the compressor emits alongside each chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingVolume {
    pub center: Vec3,
    pub radius: Vec3,
}

impl BoundingVolume {
    pub fn new(center: Vec3, radius: Vec3) -> Self {
        Self { center, radius }
    }

    /// Create from min and max corners
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            center: (min + max) * 0.5,
            radius: (max - min) * 0.5,
        }
    }

    /// Read one packed record. `packed` must hold at least six floats.
    pub fn from_packed(packed: &[f32]) -> Option<Self> {
        let p = packed.get(..BOUNDS_STRIDE)?;
        Some(Self {
            center: Vec3::new(p[0], p[1], p[2]),
            radius: Vec3::new(p[3], p[4], p[5]),
        })
    }

    /// Smallest volume containing every point, or `None` for no points
    pub fn from_points(mut points: impl Iterator<Item = Vec3>) -> Option<Self> {
        let first = points.next()?;
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self::from_min_max(min, max))
    }

    pub fn min(&self) -> Vec3 {
        self.center - self.radius
    }

    pub fn max(&self) -> Vec3 {
        self.center + self.radius
    }

    /// Full extent (max - min)
    pub fn size(&self) -> Vec3 {
        self.radius * 2.0
    }

    /// Check if point is inside
    pub fn contains_point(&self, p: Vec3) -> bool {
        let d = (p - self.center).abs();
        d.x <= self.radius.x && d.y <= self.radius.y && d.z <= self.radius.z
    }

    /// Check if two volumes overlap
    pub fn intersects(&self, other: &BoundingVolume) -> bool {
        let d = (self.center - other.center).abs();
        let r = self.radius + other.radius;
        d.x <= r.x && d.y <= r.y && d.z <= r.z
    }

    /// Return merged volume containing both
    pub fn merged(&self, other: &BoundingVolume) -> BoundingVolume {
        Self::from_min_max(self.min().min(other.min()), self.max().max(other.max()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_layout() {
        let bv = BoundingVolume::from_packed(&[1.0, 2.0, 3.0, 0.5, 0.5, 1.0]).unwrap();
        assert_eq!(bv.min(), Vec3::new(0.5, 1.5, 2.0));
        assert_eq!(bv.max(), Vec3::new(1.5, 2.5, 4.0));
        assert!(BoundingVolume::from_packed(&[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_contains_and_intersects() {
        let a = BoundingVolume::from_min_max(Vec3::ZERO, Vec3::ONE);
        let b = BoundingVolume::from_min_max(Vec3::splat(0.5), Vec3::splat(1.5));
        let c = BoundingVolume::from_min_max(Vec3::splat(2.0), Vec3::splat(3.0));
        assert!(a.contains_point(Vec3::splat(0.5)));
        assert!(!a.contains_point(Vec3::splat(2.0)));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn test_merge_and_from_points() {
        let a = BoundingVolume::from_min_max(Vec3::ZERO, Vec3::ONE);
        let c = BoundingVolume::from_min_max(Vec3::splat(2.0), Vec3::splat(3.0));
        let m = a.merged(&c);
        assert_eq!(m.min(), Vec3::ZERO);
        assert_eq!(m.max(), Vec3::splat(3.0));

        let pts = [Vec3::new(1.0, -1.0, 0.0), Vec3::new(-1.0, 1.0, 2.0)];
        let bv = BoundingVolume::from_points(pts.into_iter()).unwrap();
        assert_eq!(bv.min(), Vec3::new(-1.0, -1.0, 0.0));
        assert_eq!(bv.max(), Vec3::new(1.0, 1.0, 2.0));
        assert!(BoundingVolume::from_points(std::iter::empty()).is_none());
    }
}
