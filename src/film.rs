//! The accumulation buffer the viewport writes into (§4.6): a primary
//! per-pixel sum written by the owning tile worker, and a secondary sum
//! written by splats from the light tracer, which can land on any pixel from
//! any worker thread. Grounded on the teacher's `film.rs` (`FilmPixel`,
//! atomic-splat pattern), generalized to the two-buffer scheme the adaptive
//! error estimator needs (§4.7) that the teacher's single-buffer film
//! doesn't have.

use crate::spectrum::Color;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// One RGB channel, atomically accumulable from any thread via a
/// compare-exchange loop over the bit pattern (no `unsafe`, no transmute).
#[derive(Default)]
struct AtomicColor {
    r: AtomicU32,
    g: AtomicU32,
    b: AtomicU32,
}

fn atomic_add_f32(slot: &AtomicU32, delta: f32) {
    let mut current = slot.load(Ordering::Relaxed);
    loop {
        let next = f32::from_bits(current) + delta;
        match slot.compare_exchange_weak(
            current,
            next.to_bits(),
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => return,
            Err(observed) => current = observed,
        }
    }
}

impl AtomicColor {
    fn add(&self, c: Color) {
        atomic_add_f32(&self.r, c.r);
        atomic_add_f32(&self.g, c.g);
        atomic_add_f32(&self.b, c.b);
    }

    fn load(&self) -> Color {
        Color {
            r: f32::from_bits(self.r.load(Ordering::Relaxed)),
            g: f32::from_bits(self.g.load(Ordering::Relaxed)),
            b: f32::from_bits(self.b.load(Ordering::Relaxed)),
        }
    }

    fn clear(&self) {
        self.r.store(0, Ordering::Relaxed);
        self.g.store(0, Ordering::Relaxed);
        self.b.store(0, Ordering::Relaxed);
    }
}

/// Two accumulation buffers over the same resolution (§4.6). `sum` is the
/// real film: every camera-path contribution (`accumulate`) and every
/// light-tracer splat lands there, every pass, and `resolve` reads only this
/// buffer. `secondary_sum` is a shadow copy that mirrors `sum`'s writes on
/// even-indexed passes only (`secondary_active`, set once per pass by the
/// viewport); the adaptive block-error estimator (§4.7) compares the two as a
/// pair of noisy estimates of the same quantity, one built from roughly half
/// the passes of the other. `sample_count` tracks completed passes per pixel
/// for normalization.
pub struct Film {
    width: u32,
    height: u32,
    sum: Vec<AtomicColor>,
    secondary_sum: Vec<AtomicColor>,
    sample_count: Vec<AtomicU64>,
    secondary_active: AtomicBool,
}

impl Film {
    pub fn new(width: u32, height: u32) -> Self {
        let n = (width as usize) * (height as usize);
        Film {
            width,
            height,
            sum: (0..n).map(|_| AtomicColor::default()).collect(),
            secondary_sum: (0..n).map(|_| AtomicColor::default()).collect(),
            sample_count: (0..n).map(|_| AtomicU64::new(0)).collect(),
            secondary_active: AtomicBool::new(false),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Set once per pass by the viewport (§4.6), gating whether this pass's
    /// writes also mirror into `secondary_sum`.
    pub fn set_secondary_active(&self, active: bool) {
        self.secondary_active.store(active, Ordering::Relaxed);
    }

    fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        (y as usize) * (self.width as usize) + (x as usize)
    }

    /// Adds a camera-path sample to the film.
    pub fn accumulate(&self, x: u32, y: u32, color: Color) {
        let i = self.index(x, y);
        self.sum[i].add(color);
        if self.secondary_active.load(Ordering::Relaxed) {
            self.secondary_sum[i].add(color);
        }
        self.sample_count[i].fetch_add(1, Ordering::Relaxed);
    }

    /// Adds a light-tracer splat to the film (§4.5.3): may be called from any
    /// worker thread for any pixel.
    pub fn splat(&self, x: u32, y: u32, color: Color) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = self.index(x, y);
        self.sum[i].add(color);
        if self.secondary_active.load(Ordering::Relaxed) {
            self.secondary_sum[i].add(color);
        }
    }

    pub fn primary_estimate(&self, x: u32, y: u32, passes: u32) -> Color {
        let i = self.index(x, y);
        self.sum[i].load().scale(1.0 / passes.max(1) as f32)
    }

    pub fn secondary_estimate(&self, x: u32, y: u32, passes: u32) -> Color {
        let i = self.index(x, y);
        self.secondary_sum[i].load().scale(1.0 / passes.max(1) as f32)
    }

    /// Final per-pixel radiance (§4.6): `sum` already holds every
    /// contribution made so far, so this is just its running average.
    pub fn resolve(&self, x: u32, y: u32, passes: u32) -> Color {
        self.primary_estimate(x, y, passes)
    }

    pub fn clear(&self) {
        for c in &self.sum {
            c.clear();
        }
        for c in &self.secondary_sum {
            c.clear();
        }
        for s in &self.sample_count {
            s.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_then_resolve_averages_by_pass_count() {
        let film = Film::new(4, 4);
        film.accumulate(1, 1, Color { r: 1.0, g: 0.0, b: 0.0 });
        film.accumulate(1, 1, Color { r: 1.0, g: 0.0, b: 0.0 });
        let resolved = film.resolve(1, 1, 2);
        assert!((resolved.r - 1.0).abs() < 1e-6);
    }

    #[test]
    fn secondary_sum_only_mirrors_while_active() {
        let film = Film::new(4, 4);
        film.accumulate(0, 0, Color { r: 1.0, g: 0.0, b: 0.0 });
        assert!(film.secondary_estimate(0, 0, 1).is_black());

        film.set_secondary_active(true);
        film.accumulate(0, 0, Color { r: 1.0, g: 0.0, b: 0.0 });
        let mirrored = film.secondary_estimate(0, 0, 1);
        assert!((mirrored.r - 1.0).abs() < 1e-6);

        film.set_secondary_active(false);
        film.accumulate(0, 0, Color { r: 1.0, g: 0.0, b: 0.0 });
        let unchanged = film.secondary_estimate(0, 0, 1);
        assert!((unchanged.r - 1.0).abs() < 1e-6);

        let total = film.primary_estimate(0, 0, 1);
        assert!((total.r - 3.0).abs() < 1e-6);
    }

    #[test]
    fn splat_outside_bounds_is_ignored() {
        let film = Film::new(4, 4);
        film.splat(100, 100, Color::white());
        // No panic, and no pixel was touched.
        assert!(film.resolve(0, 0, 1).is_black());
    }

    #[test]
    fn concurrent_splats_accumulate_exactly() {
        use std::sync::Arc;
        use std::thread;

        let film = Arc::new(Film::new(2, 2));
        film.set_secondary_active(true);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let film = Arc::clone(&film);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    film.splat(0, 0, Color { r: 1.0, g: 1.0, b: 1.0 });
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let total = film.primary_estimate(0, 0, 1);
        assert!((total.r - 8000.0).abs() < 1e-2);
        let shadow = film.secondary_estimate(0, 0, 1);
        assert!((shadow.r - 8000.0).abs() < 1e-2);
    }

    #[test]
    fn clear_resets_all_buffers() {
        let film = Film::new(2, 2);
        film.accumulate(0, 0, Color::white());
        film.clear();
        assert!(film.resolve(0, 0, 1).is_black());
    }
}
