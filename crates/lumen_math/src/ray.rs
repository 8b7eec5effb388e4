use crate::Vec3;

/// A ray in 3D space.
///
/// `direction` is expected to be unit length; callers construct rays by
/// normalizing the pixel or bounce direction once, so the intersection
/// kernels never re-normalize.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Point along the ray at parameter t: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}
