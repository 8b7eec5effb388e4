//! Image output: filmic tone mapping, sRGB encoding, PPM writing, and
//! an RGBA8 preview conversion.
//!
//! The accumulation buffer stays linear HDR; everything here works on a
//! snapshot of it.

use std::io::Write;

use lumen_math::Vec3;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to write image: {0}")]
    Io(#[from] std::io::Error),

    #[error("pixel buffer has {got} entries, expected {expected}")]
    SizeMismatch { got: usize, expected: usize },
}

/// Uncharted 2 filmic curve (Hable's operator), normalized against the
/// white point.
pub fn tonemap_uncharted(color: Vec3) -> Vec3 {
    const A: f32 = 0.15;
    const B: f32 = 0.50;
    const C: f32 = 0.10;
    const D: f32 = 0.20;
    const E: f32 = 0.02;
    const F: f32 = 0.30;
    const WHITE_POINT: Vec3 = Vec3::new(11.2, 11.3, 11.2);

    fn curve(c: Vec3) -> Vec3 {
        ((c * (A * c + Vec3::splat(C * B)) + Vec3::splat(D * E))
            / (c * (A * c + Vec3::splat(B)) + Vec3::splat(D * F)))
            - Vec3::splat(E / F)
    }

    curve(color) * (Vec3::ONE / curve(WHITE_POINT))
}

/// Linear to sRGB, gamma 2.2.
pub fn srgb(x: f32) -> f32 {
    x.powf(1.0 / 2.2)
}

fn encode_channel(x: f32) -> u8 {
    (srgb(x) * 255.0).clamp(0.0, 255.0) as u8
}

/// Write linear radiance as a plain-text PPM (P3), tone mapped and
/// gamma encoded.
pub fn write_ppm<W: Write>(
    out: &mut W,
    width: u32,
    height: u32,
    pixels: &[Vec3],
) -> Result<(), OutputError> {
    let expected = (width as usize) * (height as usize);
    if pixels.len() != expected {
        return Err(OutputError::SizeMismatch {
            got: pixels.len(),
            expected,
        });
    }

    writeln!(out, "P3\n{width} {height}\n255")?;
    for y in 0..height as usize {
        for x in 0..width as usize {
            let color = tonemap_uncharted(pixels[y * width as usize + x]);
            let r = encode_channel(color.x);
            let g = encode_channel(color.y);
            let b = encode_channel(color.z);
            write!(out, "{r} {g} {b} ")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Display conversion to RGBA8. Non-finite pixels show up magenta so
/// integrator bugs are visible instead of silently clamped; the
/// accumulation buffer itself keeps the raw values.
pub fn to_rgba8(pixels: &[Vec3]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(pixels.len() * 4);
    for &pixel in pixels {
        let pixel = if pixel.is_finite() {
            pixel
        } else {
            Vec3::new(1.0, 0.0, 1.0)
        };
        let color = tonemap_uncharted(pixel);
        bytes.push(encode_channel(color.x));
        bytes.push(encode_channel(color.y));
        bytes.push(encode_channel(color.z));
        bytes.push(0xFF);
    }
    bytes
}
