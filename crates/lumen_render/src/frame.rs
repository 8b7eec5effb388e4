//! Accumulation buffer for one render generation.

use std::sync::atomic::{AtomicUsize, Ordering};

use lumen_math::Vec3;
use parking_lot::Mutex;

/// Linear-radiance accumulation target, row-major `width * height`.
///
/// One `Frame` exists per render generation; a restart allocates a
/// fresh one, which is what resets the buffer and the progress counter.
/// During a pass each row is written by exactly one worker, so the
/// per-row locks are uncontended; they exist so a preview reader can
/// snapshot rows that are mid-write without tearing.
pub struct Frame {
    width: u32,
    height: u32,
    generation: u64,
    rows: Vec<Mutex<Vec<Vec3>>>,
    completed_pixels: AtomicUsize,
}

impl Frame {
    pub fn new(width: u32, height: u32, generation: u64) -> Self {
        let rows = (0..height)
            .map(|_| Mutex::new(vec![Vec3::ZERO; width as usize]))
            .collect();
        Self {
            width,
            height,
            generation,
            rows,
            completed_pixels: AtomicUsize::new(0),
        }
    }

    /// Empty placeholder used before the first render starts.
    pub fn empty() -> Self {
        Self::new(0, 0, 0)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Generation this buffer was allocated for.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Store one finished row and bump the progress counter.
    pub fn write_row(&self, y: u32, pixels: &[Vec3]) {
        debug_assert_eq!(pixels.len(), self.width as usize);
        self.rows[y as usize].lock().copy_from_slice(pixels);
        self.completed_pixels
            .fetch_add(self.width as usize, Ordering::Relaxed);
    }

    /// `(done, total)` in pixels. `done` is monotonic within a frame.
    pub fn progress(&self) -> (usize, usize) {
        (
            self.completed_pixels.load(Ordering::Relaxed),
            (self.width as usize) * (self.height as usize),
        )
    }

    pub fn is_complete(&self) -> bool {
        let (done, total) = self.progress();
        done >= total
    }

    /// Copy of the buffer contents, row-major. Rows still being
    /// rendered read as their initial black.
    pub fn snapshot(&self) -> Vec<Vec3> {
        let mut out = Vec::with_capacity((self.width as usize) * (self.height as usize));
        for row in &self.rows {
            out.extend_from_slice(&row.lock());
        }
        out
    }
}
