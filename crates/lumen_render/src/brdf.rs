//! Microfacet BRDF: GGX distribution, Smith visibility, Schlick Fresnel,
//! and a Burley-style diffuse lobe.
//!
//! [Walter et al. 2007, "Microfacet models for refraction through rough surfaces"]
//! [Heitz 2014, "Understanding the Masking-Shadowing Function in Microfacet-Based BRDFs"]
//! [Schlick 1994, "An Inexpensive BRDF Model for Physically-Based Rendering"]
//!
//! `evaluate` returns reflectance per steradian only; the integrator
//! applies the cosine factor and the sampling PDF itself.

use lumen_math::{Vec2, Vec3, EPS, INV_PI};

#[inline]
fn saturate(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

#[inline]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn diffuse_energy_factor(roughness: f32) -> f32 {
    lerp(1.0, 1.0 / 1.51, roughness)
}

/// `(1 - x)^5` for a pair of cosines at once.
fn fresnel_pair(ldoth: Vec2) -> Vec2 {
    Vec2::new((1.0 - ldoth.x).powi(5), (1.0 - ldoth.y).powi(5))
}

fn fresnel_weight(ldoth: f32) -> f32 {
    (1.0 - ldoth).powi(5)
}

/// Burley diffuse with a roughness-driven energy bias at grazing angles.
fn diffuse_burley(albedo: Vec3, roughness: f32, ndotv: f32, ndotl: f32, ldoth: f32) -> Vec3 {
    let energy_bias = lerp(0.0, 0.5, roughness);
    let energy_factor = diffuse_energy_factor(roughness);

    let fd90 = energy_bias + 2.0 * ldoth * ldoth * roughness;
    let fd_vl = Vec2::ONE + (fd90 - 1.0) * fresnel_pair(Vec2::new(ndotv, ndotl));

    albedo * (fd_vl.x * fd_vl.y) * energy_factor * INV_PI
}

/// GGX / Trowbridge-Reitz normal distribution.
fn ndf(ndoth: f32, ggx_alpha: f32) -> f32 {
    let denominator = (ggx_alpha * ggx_alpha - 1.0) * ndoth * ndoth + 1.0;
    let d = ggx_alpha / EPS.max(denominator);
    d * d * INV_PI
}

/// Approximation of the joint Smith term for GGX (height-correlated).
///
/// The EPS floor prevents sparkles from zero division and specular
/// infinities at grazing angles.
fn visibility(ndotl: f32, ndotv: f32, ggx_alpha: f32) -> f32 {
    let inv_alpha = 1.0 - ggx_alpha;
    let lambda_v = ndotl * (ndotv * inv_alpha + ggx_alpha);
    let lambda_l = ndotv * (ndotl * inv_alpha + ggx_alpha);
    0.5 / EPS.max(lambda_v + lambda_l)
}

/// Schlick Fresnel. Specular values below 0.02 are treated as specular
/// occlusion rather than physically meaningful reflectance.
fn fresnel_schlick(spec_color: Vec3, ldoth: f32) -> Vec3 {
    spec_color
        + (Vec3::splat(saturate(50.0 * spec_color.y)) - spec_color) * fresnel_weight(ldoth)
}

/// Evaluate the full BRDF for unit vectors L (light), H (half), N
/// (shading normal), V (view).
pub fn evaluate(
    input_albedo: Vec3,
    metallic: f32,
    roughness: f32,
    l: Vec3,
    h: Vec3,
    n: Vec3,
    v: Vec3,
) -> Vec3 {
    let spec_color = Vec3::splat(0.04).lerp(input_albedo, metallic);
    let albedo = input_albedo.lerp(Vec3::ZERO, metallic);
    let ndotl = saturate(n.dot(l));

    let roughness = roughness.max(0.005);

    // Guard against division by zero in the GGX terms when NdotV == 0.
    let ndotv = saturate(n.dot(v).abs() + 1e-5);
    let ndoth = saturate(n.dot(h));
    let ldoth = saturate(l.dot(h));

    let ggx_alpha = roughness * roughness;

    let diffuse = diffuse_burley(albedo, roughness, ndotv, ndotl, ldoth);
    let specular =
        ndf(ndoth, ggx_alpha) * visibility(ndotl, ndotv, ggx_alpha) * fresnel_schlick(spec_color, ldoth);

    diffuse + specular
}
