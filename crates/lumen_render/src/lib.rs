//! lumen_render - CPU Monte Carlo path tracing
//!
//! An unbiased path tracer for triangle-meshed scenes: flat-array BVH
//! acceleration, a GGX microfacet BRDF with Burley diffuse, Russian
//! roulette termination, and a cancellable row-parallel scheduler
//! driving a progressive accumulation buffer.

mod brdf;
mod bvh;
mod controller;
mod frame;
mod integrator;
mod output;
mod pool;
mod sampler;
mod scene;
mod triangle;

pub use bvh::Bvh;
pub use controller::{RenderSettings, Renderer};
pub use frame::Frame;
pub use integrator::{trace, T_MAX, T_MIN};
pub use output::{srgb, to_rgba8, tonemap_uncharted, write_ppm, OutputError};
pub use pool::WorkerPool;
pub use scene::{Camera, Material, Scene, SceneError, SceneHit, SceneNode};
pub use triangle::Triangle;

pub use brdf::evaluate as evaluate_brdf;
pub use sampler::{gen_f32, sample_sphere, stratified_offset};

/// Re-export common math types from lumen_math
pub use lumen_math::{Aabb, Interval, Ray, Transform, Vec3};
