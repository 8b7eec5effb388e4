//! Render controller: camera ray setup, job submission, progress, and
//! scene mutation with generation-based cancellation.
//!
//! The scene lives behind an `Arc` snapshot. A render pass captures the
//! snapshot once; mutations copy-on-write a new scene, bump the
//! generation, and restart, so workers never observe a half-edited
//! scene. Jobs from a superseded generation notice the bump and exit
//! before tracing anything.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lumen_math::{Ray, Vec2, Vec3};
use parking_lot::{Mutex, RwLock};
use rand::RngCore;

use crate::integrator::trace;
use crate::sampler::stratified_offset;
use crate::{Camera, Frame, Material, Scene, SceneError, WorkerPool};

/// Snapshot of the settings a pass was started with, kept for restarts.
#[derive(Debug, Clone, Copy)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub samples_per_axis: u32,
}

/// Precomputed camera frame and image-plane geometry for one pass.
///
/// The image plane sits at unit distance along the view direction; its
/// left-top corner in view space is `(-aspect * vh/2, vh/2, 1)` with
/// `vh = 2 * tan(fov / 2)`.
#[derive(Debug, Clone, Copy)]
struct CameraBasis {
    pos: Vec3,
    right: Vec3,
    up: Vec3,
    forward: Vec3,
    left_top: Vec3,
    viewport_height: f32,
    aspect: f32,
    pix_size: f32,
}

impl CameraBasis {
    fn new(camera: &Camera, image_height: u32) -> Self {
        let forward = (camera.target - camera.pos).normalize();
        let right = forward.cross(camera.up).normalize();
        let up = right.cross(forward);

        let viewport_height = 2.0 * (camera.fov * 0.5).tan();
        let aspect = camera.aspect_ratio;
        let left_top = Vec3::new(-aspect * viewport_height / 2.0, viewport_height / 2.0, 1.0);

        Self {
            pos: camera.pos,
            right,
            up,
            forward,
            left_top,
            viewport_height,
            aspect,
            pix_size: 1.0 / image_height as f32,
        }
    }

    /// World-space ray through normalized pixel coords `(u, v)` with a
    /// sub-pixel jitter offset.
    fn primary_ray(&self, u: f32, v: f32, offset: Vec2) -> Ray {
        let vh = self.viewport_height;
        let pix_vs = self.left_top
            + Vec3::new(
                (self.pix_size * offset.x + u * self.aspect) * vh,
                (-self.pix_size * offset.y - v) * vh,
                0.0,
            );
        let pix_world =
            self.pos + pix_vs.x * self.right + pix_vs.y * self.up + pix_vs.z * self.forward;
        Ray::new(self.pos, (pix_world - self.pos).normalize())
    }
}

/// Trace every pixel of one row. `samples_per_axis`² stratified samples
/// per pixel, averaged.
fn render_row(
    scene: &Scene,
    basis: &CameraBasis,
    settings: &RenderSettings,
    y: u32,
    rng: &mut dyn RngCore,
) -> Vec<Vec3> {
    let side = settings.samples_per_axis.max(1);
    let sample_count = side * side;

    let mut row = Vec::with_capacity(settings.width as usize);
    for x in 0..settings.width {
        let u = x as f32 / settings.width as f32;
        let v = y as f32 / settings.height as f32;

        let mut color = Vec3::ZERO;
        for s in 0..sample_count {
            let offset = stratified_offset(s, side, rng);
            let ray = basis.primary_ray(u, v, offset);
            color += trace(scene, ray, rng);
        }
        row.push(color / sample_count as f32);
    }
    row
}

/// Drives render passes over a mutable scene.
pub struct Renderer {
    scene: RwLock<Arc<Scene>>,
    pool: Arc<WorkerPool>,
    frame: RwLock<Arc<Frame>>,
    generation: Arc<AtomicU64>,
    settings: Mutex<Option<RenderSettings>>,
}

impl Renderer {
    pub fn new(scene: Scene) -> Self {
        Self::with_pool(
            scene,
            WorkerPool::DEFAULT_WORKERS,
            WorkerPool::DEFAULT_CAPACITY,
        )
    }

    pub fn with_pool(scene: Scene, workers: usize, queue_capacity: usize) -> Self {
        Self {
            scene: RwLock::new(Arc::new(scene)),
            pool: Arc::new(WorkerPool::new(workers, queue_capacity)),
            frame: RwLock::new(Arc::new(Frame::empty())),
            generation: Arc::new(AtomicU64::new(0)),
            settings: Mutex::new(None),
        }
    }

    /// Begin a new render generation.
    ///
    /// Allocates a fresh accumulation buffer, then submits one job per
    /// row from a dedicated producer thread so the caller never blocks
    /// on queue back-pressure.
    pub fn start_render(&self, width: u32, height: u32, samples_per_axis: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let settings = RenderSettings {
            width,
            height,
            samples_per_axis,
        };
        *self.settings.lock() = Some(settings);

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let frame = Arc::new(Frame::new(width, height, generation));
        *self.frame.write() = Arc::clone(&frame);

        let scene = Arc::clone(&self.scene.read());
        let basis = CameraBasis::new(scene.camera(), height);
        let pool = Arc::clone(&self.pool);
        let generation_counter = Arc::clone(&self.generation);

        log::info!(
            "render start: {width}x{height}, {} samples/pixel, generation {generation}",
            samples_per_axis.max(1).pow(2)
        );

        std::thread::spawn(move || {
            for y in 0..height {
                loop {
                    // A newer generation (or shutdown) obsoletes this pass.
                    if generation_counter.load(Ordering::Relaxed) != generation
                        || pool.is_stopped()
                    {
                        return;
                    }

                    let scene = Arc::clone(&scene);
                    let frame = Arc::clone(&frame);
                    let generation_counter = Arc::clone(&generation_counter);
                    let submitted = pool.submit(generation, y, move |row, rng| {
                        if generation_counter.load(Ordering::Relaxed) != generation {
                            return;
                        }
                        let pixels = render_row(&scene, &basis, &settings, row, rng);
                        frame.write_row(row, &pixels);
                        if row % 50 == 0 {
                            log::debug!("finished row {row}");
                        }
                    });
                    if submitted {
                        break;
                    }
                    pool.wait_not_full(Duration::from_millis(1));
                }
            }
        });
    }

    /// Abandon the current generation. In-flight rows notice the bump
    /// and exit; the partial frame is kept until the next start.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::Relaxed);
    }

    /// `(done, total)` pixels of the current generation.
    pub fn progress(&self) -> (usize, usize) {
        self.frame.read().progress()
    }

    pub fn is_complete(&self) -> bool {
        self.frame.read().is_complete()
    }

    /// The current accumulation buffer.
    pub fn frame(&self) -> Arc<Frame> {
        Arc::clone(&self.frame.read())
    }

    /// Read access to the current scene snapshot.
    pub fn scene(&self) -> Arc<Scene> {
        Arc::clone(&self.scene.read())
    }

    /// Shift a node's geometry. Rebuilds its BVH and invalidates any
    /// render in flight.
    pub fn translate_node(&self, node_idx: usize, delta: Vec3) {
        {
            let mut scene = self.scene.write();
            Arc::make_mut(&mut scene).translate_node(node_idx, delta);
        }
        self.invalidate_and_restart();
    }

    /// Reassign a node's material slot.
    pub fn set_node_material(&self, node_idx: usize, mat_index: usize) -> Result<(), SceneError> {
        {
            let mut scene = self.scene.write();
            Arc::make_mut(&mut scene).set_node_material(node_idx, mat_index)?;
        }
        self.invalidate_and_restart();
        Ok(())
    }

    /// Replace a material definition.
    pub fn set_material(&self, mat_index: usize, material: Material) {
        {
            let mut scene = self.scene.write();
            Arc::make_mut(&mut scene).set_material(mat_index, material);
        }
        self.invalidate_and_restart();
    }

    /// Tear down the worker pool. The renderer is inert afterwards.
    pub fn stop(&self) {
        self.pool.stop();
    }

    /// Scene changed: kill the current generation, and if a pass was
    /// still running, start over with the same settings.
    fn invalidate_and_restart(&self) {
        let was_rendering = !self.is_complete();
        self.generation.fetch_add(1, Ordering::Relaxed);
        // Copy the settings out before restarting; start_render takes
        // the same lock.
        let settings = *self.settings.lock();
        if was_rendering {
            if let Some(s) = settings {
                self.start_render(s.width, s.height, s.samples_per_axis);
            }
        }
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.stop();
    }
}
