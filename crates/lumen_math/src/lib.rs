// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod interval;
mod ray;
mod transform;

pub use aabb::Aabb;
pub use interval::Interval;
pub use ray::Ray;
pub use transform::Transform;

/// Archimedes' constant, single precision.
pub const PI: f32 = std::f32::consts::PI;

/// Reciprocal of PI, precomputed for the shading hot path.
pub const INV_PI: f32 = 1.0 / PI;

/// Tolerance used by the intersection and shading kernels.
pub const EPS: f32 = 1e-8;
