//! Random direction and pixel-jitter sampling.

use lumen_math::{Vec2, Vec3, PI};
use rand::RngCore;

/// Uniform `f32` in `[0, 1)` from a `dyn RngCore`.
///
/// Same mapping as rand's `Standard` distribution for f32; spelled out
/// because `dyn RngCore` cannot use `Rng::gen()` directly.
#[inline]
pub fn gen_f32(rng: &mut dyn RngCore) -> f32 {
    let bits = rng.next_u32();
    (bits >> 8) as f32 * (1.0 / (1u32 << 24) as f32)
}

/// Uniform direction on the unit sphere.
///
/// `cos(theta) = 2u - 1`, `phi = 2*pi*v`, mapped with y as the polar
/// axis. Callers flip the result into the hemisphere of their surface
/// normal, which makes the effective density `1 / (2*pi)` there.
pub fn sample_sphere(rng: &mut dyn RngCore) -> Vec3 {
    let phi = gen_f32(rng) * 2.0 * PI;
    let cos_theta = gen_f32(rng) * 2.0 - 1.0;
    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
    Vec3::new(phi.cos() * sin_theta, cos_theta, phi.sin() * sin_theta)
}

/// Jittered offset for stratified sample `index` of a `side_count`²
/// grid over the unit square.
pub fn stratified_offset(index: u32, side_count: u32, rng: &mut dyn RngCore) -> Vec2 {
    let x_idx = (index % side_count) as f32;
    let y_idx = (index / side_count) as f32;
    let dist = 1.0 / side_count as f32;

    let jitter_x = gen_f32(rng);
    let jitter_y = gen_f32(rng);

    Vec2::new((x_idx + jitter_x) * dist, (y_idx + jitter_y) * dist)
}
