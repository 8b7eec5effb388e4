use crate::{Interval, Ray, Vec3, EPS};

/// Axis-aligned bounding box for spatial acceleration structures.
///
/// The empty box has `min = +inf` and `max = -inf`, which makes `grow`
/// a proper monoid: growing the empty box by any point yields the
/// degenerate box at that point, and the order of grows never matters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// The empty box. Identity element of `grow`/`grow_aabb`.
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Expand the box to contain `point`.
    pub fn grow(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Expand the box to contain another box.
    pub fn grow_aabb(&mut self, other: &Aabb) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Index (0=X, 1=Y, 2=Z) of the widest extent.
    pub fn longest_axis(&self) -> usize {
        let size = self.size();
        if size.x > size.y.max(size.z) {
            0
        } else if size.y > size.z {
            1
        } else {
            2
        }
    }

    /// Slab test. Returns the entry parameter on hit.
    ///
    /// Axes with near-zero direction components are handled separately:
    /// the ray runs parallel to that slab, so the origin must lie inside
    /// it or the box is missed outright.
    pub fn hit(&self, ray: &Ray, t: Interval) -> Option<f32> {
        let mut t_min = t.min;
        let mut t_max = t.max;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let dir = ray.direction[axis];

            if dir.abs() < EPS {
                if origin < self.min[axis] || origin > self.max[axis] {
                    return None;
                }
                continue;
            }

            let inv_d = 1.0 / dir;
            let mut t0 = (self.min[axis] - origin) * inv_d;
            let mut t1 = (self.max[axis] - origin) * inv_d;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }

            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_max < t_min {
                return None;
            }
        }

        Some(t_min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0))
    }

    #[test]
    fn test_grow_from_empty() {
        let mut b = Aabb::EMPTY;
        b.grow(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.min, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.max, Vec3::new(1.0, 2.0, 3.0));
        b.grow(Vec3::new(-1.0, 0.0, 5.0));
        assert_eq!(b.min, Vec3::new(-1.0, 0.0, 3.0));
        assert_eq!(b.max, Vec3::new(1.0, 2.0, 5.0));
        // min <= max holds on every axis after any sequence of grows
        for i in 0..3 {
            assert!(b.min[i] <= b.max[i]);
        }
    }

    #[test]
    fn test_grow_is_commutative_and_associative() {
        let points = [
            Vec3::new(3.0, -1.0, 0.5),
            Vec3::new(-2.0, 4.0, 1.0),
            Vec3::new(0.0, 0.0, -7.0),
        ];

        let mut forward = Aabb::EMPTY;
        for p in points {
            forward.grow(p);
        }
        let mut backward = Aabb::EMPTY;
        for p in points.iter().rev() {
            backward.grow(*p);
        }
        assert_eq!(forward, backward);

        // Folding via sub-boxes gives the same result as folding points.
        let mut left = Aabb::EMPTY;
        left.grow(points[0]);
        let mut right = Aabb::EMPTY;
        right.grow(points[1]);
        right.grow(points[2]);
        let mut merged = left;
        merged.grow_aabb(&right);
        assert_eq!(merged, forward);
    }

    #[test]
    fn test_hit_from_inside_returns_t_min() {
        let b = unit_box();
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let t = b.hit(&ray, Interval::new(0.001, 100.0));
        assert_eq!(t, Some(0.001));
    }

    #[test]
    fn test_hit_entry_distance() {
        let b = unit_box();
        let ray = Ray::new(Vec3::new(0.0, 0.0, -5.0), Vec3::Z);
        let t = b.hit(&ray, Interval::new(0.001, 100.0)).unwrap();
        assert!((t - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_parallel_ray_outside_slab_misses() {
        let b = unit_box();
        // Parallel to the X faces, offset above the box.
        let ray = Ray::new(Vec3::new(-5.0, 2.0, 0.0), Vec3::X);
        assert!(b.hit(&ray, Interval::new(0.001, 100.0)).is_none());
        // Parallel but inside the slab still hits.
        let ray = Ray::new(Vec3::new(-5.0, 0.5, 0.0), Vec3::X);
        assert!(b.hit(&ray, Interval::new(0.001, 100.0)).is_some());
    }

    #[test]
    fn test_hit_symmetric_under_reversal_for_contained_origin() {
        let b = unit_box();
        let origin = Vec3::new(0.2, -0.3, 0.1);
        let dir = Vec3::new(0.6, 0.64, 0.48).normalize();
        let fwd = b.hit(&Ray::new(origin, dir), Interval::new(0.0, 100.0));
        let rev = b.hit(&Ray::new(origin, -dir), Interval::new(0.0, 100.0));
        assert!(fwd.is_some() && rev.is_some());
    }

    #[test]
    fn test_longest_axis() {
        let b = Aabb::new(Vec3::ZERO, Vec3::new(1.0, 5.0, 2.0));
        assert_eq!(b.longest_axis(), 1);
        let b = Aabb::new(Vec3::ZERO, Vec3::new(9.0, 5.0, 2.0));
        assert_eq!(b.longest_axis(), 0);
    }
}
