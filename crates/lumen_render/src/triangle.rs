//! Triangle primitive and ray intersection kernels.
//!
//! Intersection works in two stages: solve for the plane parameter, then
//! run three signed-area edge checks to confirm the hit point is inside.

use lumen_math::{Aabb, Interval, Ray, Vec3, EPS};

/// A triangle with optional smooth-shading normals.
///
/// Vertices are stored in world space. `mat_index` is carried per
/// primitive by scene loaders; at shading time the owning node's
/// material assignment takes precedence.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
    pub na: Vec3,
    pub nb: Vec3,
    pub nc: Vec3,
    pub mat_index: usize,
}

impl Triangle {
    /// Flat-shaded triangle: all three vertex normals take the face normal.
    pub fn new(a: Vec3, b: Vec3, c: Vec3, mat_index: usize) -> Self {
        let normal = (b - a).cross(c - a).normalize();
        Self {
            a,
            b,
            c,
            na: normal,
            nb: normal,
            nc: normal,
            mat_index,
        }
    }

    /// Triangle with per-vertex normals for smooth shading.
    pub fn with_normals(
        a: Vec3,
        b: Vec3,
        c: Vec3,
        na: Vec3,
        nb: Vec3,
        nc: Vec3,
        mat_index: usize,
    ) -> Self {
        Self {
            a,
            b,
            c,
            na,
            nb,
            nc,
            mat_index,
        }
    }

    pub fn centroid(&self) -> Vec3 {
        (self.a + self.b + self.c) / 3.0
    }

    pub fn bounds(&self) -> Aabb {
        let mut bbox = Aabb::EMPTY;
        bbox.grow(self.a);
        bbox.grow(self.b);
        bbox.grow(self.c);
        bbox
    }

    /// Geometric (face) normal.
    pub fn face_normal(&self) -> Vec3 {
        (self.b - self.a).cross(self.c - self.a).normalize()
    }

    /// Ray/triangle test. Returns the plane parameter on hit, `None` on miss.
    pub fn intersect(&self, ray: &Ray, t: Interval) -> Option<f32> {
        let normal = self.face_normal();
        let d = normal.dot(self.a);
        let t_hit = intersect_plane(ray, normal, d, t)?;

        // Signed-area tests against all three edges. A point on an edge
        // (area exactly zero) counts as inside.
        let p = ray.at(t_hit);
        if (self.b - self.a).cross(p - self.a).dot(normal) < 0.0 {
            return None;
        }
        if (self.c - self.b).cross(p - self.b).dot(normal) < 0.0 {
            return None;
        }
        if (self.a - self.c).cross(p - self.c).dot(normal) < 0.0 {
            return None;
        }
        Some(t_hit)
    }

    /// Shading normal at `p`, a point on the triangle's plane.
    ///
    /// Interpolates vertex normals barycentrically; a near-singular
    /// system (colinear vertices) falls back to the face normal.
    pub fn shading_normal(&self, p: Vec3) -> Vec3 {
        let v0 = self.b - self.a;
        let v1 = self.c - self.a;
        let v2 = p - self.a;

        let d00 = v0.dot(v0);
        let d01 = v0.dot(v1);
        let d11 = v1.dot(v1);
        let d20 = v2.dot(v0);
        let d21 = v2.dot(v1);

        let denom = d00 * d11 - d01 * d01;
        if denom.abs() < EPS {
            return v0.cross(v1).normalize();
        }

        let v = (d11 * d20 - d01 * d21) / denom;
        let w = (d00 * d21 - d01 * d20) / denom;
        let u = 1.0 - v - w;
        (u * self.na + v * self.nb + w * self.nc).normalize()
    }
}

/// Ray/plane parameter solve for the plane `dot(normal, x) = d`.
///
/// A ray lying in the plane reports a hit at t = 0 only when the window
/// starts at zero; any other parallel ray misses.
fn intersect_plane(ray: &Ray, normal: Vec3, d: f32, t: Interval) -> Option<f32> {
    let dist = normal.dot(ray.origin) - d;
    let dot_nd = ray.direction.dot(normal);
    if dot_nd == 0.0 {
        if dist == 0.0 && t.min == 0.0 {
            return Some(0.0);
        }
        return None;
    }
    let t_hit = dist / -dot_nd;
    if !t.contains(t_hit) {
        return None;
    }
    Some(t_hit)
}
