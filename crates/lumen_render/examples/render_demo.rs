//! Render a small built-in scene to `output.ppm`.
//!
//! Run with:
//! ```sh
//! RUST_LOG=debug cargo run --release --example render_demo
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::time::Duration;

use anyhow::Result;
use lumen_math::{Quat, PI};
use lumen_render::{
    write_ppm, Camera, Material, Renderer, Scene, SceneNode, Transform, Triangle, Vec3,
};

const WIDTH: u32 = 600;
const HEIGHT: u32 = 400;
const SAMPLES_PER_AXIS: u32 = 4;

/// Axis-aligned unit cube around the origin, placed by `transform`.
fn cube(transform: Transform, mat_index: usize) -> Vec<Triangle> {
    let m = transform.to_matrix();
    let corner = |x: f32, y: f32, z: f32| m.transform_point3(Vec3::new(x, y, z) * 0.5);

    // Eight corners, then two triangles per face.
    let p = [
        corner(-1.0, -1.0, -1.0),
        corner(1.0, -1.0, -1.0),
        corner(1.0, 1.0, -1.0),
        corner(-1.0, 1.0, -1.0),
        corner(-1.0, -1.0, 1.0),
        corner(1.0, -1.0, 1.0),
        corner(1.0, 1.0, 1.0),
        corner(-1.0, 1.0, 1.0),
    ];
    let faces: [[usize; 4]; 6] = [
        [0, 1, 2, 3], // back
        [5, 4, 7, 6], // front
        [4, 0, 3, 7], // left
        [1, 5, 6, 2], // right
        [3, 2, 6, 7], // top
        [4, 5, 1, 0], // bottom
    ];

    let mut tris = Vec::with_capacity(12);
    for [a, b, c, d] in faces {
        tris.push(Triangle::new(p[a], p[b], p[c], mat_index));
        tris.push(Triangle::new(p[a], p[c], p[d], mat_index));
    }
    tris
}

fn quad(a: Vec3, b: Vec3, c: Vec3, d: Vec3, mat_index: usize) -> Vec<Triangle> {
    vec![
        Triangle::new(a, b, c, mat_index),
        Triangle::new(a, c, d, mat_index),
    ]
}

fn build_scene() -> Result<Scene> {
    let materials = vec![
        Material::diffuse("floor", Vec3::splat(0.75)),
        Material {
            name: "rough-metal".into(),
            albedo: Vec3::new(0.9, 0.6, 0.2),
            emission: Vec3::ZERO,
            metallic: 1.0,
            roughness: 0.35,
        },
        Material {
            name: "red-plastic".into(),
            albedo: Vec3::new(0.8, 0.1, 0.1),
            emission: Vec3::ZERO,
            metallic: 0.0,
            roughness: 0.6,
        },
        Material::emissive("ceiling-light", Vec3::splat(12.0)),
    ];

    let floor = quad(
        Vec3::new(-8.0, 0.0, -12.0),
        Vec3::new(8.0, 0.0, -12.0),
        Vec3::new(8.0, 0.0, 4.0),
        Vec3::new(-8.0, 0.0, 4.0),
        0,
    );
    let light = quad(
        Vec3::new(-1.5, 4.0, -6.5),
        Vec3::new(1.5, 4.0, -6.5),
        Vec3::new(1.5, 4.0, -3.5),
        Vec3::new(-1.5, 4.0, -3.5),
        3,
    );
    let metal_cube = cube(
        Transform {
            translation: Vec3::new(-1.2, 0.75, -5.5),
            rotation: Quat::from_rotation_y(0.5),
            scale: Vec3::splat(1.5),
        },
        1,
    );
    let plastic_cube = cube(
        Transform {
            translation: Vec3::new(1.3, 0.5, -4.5),
            rotation: Quat::from_rotation_y(-0.3),
            scale: Vec3::splat(1.0),
        },
        2,
    );

    let camera = Camera {
        pos: Vec3::new(0.0, 2.2, 1.5),
        target: Vec3::new(0.0, 0.8, -5.0),
        up: Vec3::Y,
        fov: 50.0 * PI / 180.0,
        aspect_ratio: WIDTH as f32 / HEIGHT as f32,
    };

    let scene = Scene::new(
        camera,
        materials,
        vec![
            SceneNode::new("floor", 0, floor),
            SceneNode::new("light", 3, light),
            SceneNode::new("metal-cube", 1, metal_cube),
            SceneNode::new("plastic-cube", 2, plastic_cube),
        ],
    )?;
    Ok(scene)
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let renderer = Renderer::new(build_scene()?);
    renderer.start_render(WIDTH, HEIGHT, SAMPLES_PER_AXIS);

    loop {
        let (done, total) = renderer.progress();
        log::info!("progress: {done}/{total}");
        if renderer.is_complete() {
            break;
        }
        std::thread::sleep(Duration::from_millis(500));
    }

    let pixels = renderer.frame().snapshot();
    let file = File::create("output.ppm")?;
    let mut out = BufWriter::new(file);
    write_ppm(&mut out, WIDTH, HEIGHT, &pixels)?;
    log::info!("image saved to output.ppm");

    renderer.stop();
    Ok(())
}
