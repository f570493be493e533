//! Per-pixel sample sequence: a low-discrepancy Halton sequence with
//! Cranley-Patterson rotation for the first 32 dimensions, falling back to a
//! PRNG beyond that table (§4.3). Grounded on the teacher's `sampler.rs`
//! module shape (`ResetFrame`/`ResetPixel`/`Get1D`/`Get2D`) though the
//! underlying sequence (progressive multi-jittered) differs — see the
//! dependency-drop note on `pmj` in `DESIGN.md`.

pub mod halton;

use rand::{RngCore, SeedableRng};
use rand_xorshift::XorShiftRng;

use halton::{halton_base, NUM_HALTON_DIMS};

/// Derives a deterministic 64-bit salt from a pixel coordinate and frame
/// seed, used both to seed the Cranley-Patterson rotation and the PRNG
/// fallback (§4.3).
fn pixel_salt(x: u32, y: u32, frame_seed: u64) -> u64 {
    let mut rng = XorShiftRng::seed_from_u64(
        frame_seed
            ^ ((x as u64) << 32)
            ^ (y as u64)
            ^ 0x9E37_79B9_7F4A_7C15,
    );
    rng.next_u64()
}

/// Per-pixel Halton sampler. One instance is created per render worker and
/// reset for each pixel/frame it visits (§4.3).
pub struct Sampler {
    frame_seed: u64,
    pixel_x: u32,
    pixel_y: u32,
    /// Cranley-Patterson rotation offset per Halton dimension, re-derived on
    /// every `reset_pixel`.
    rotation: [f32; NUM_HALTON_DIMS],
    /// Sample index within the current pixel, advanced by one per `Get1D`
    /// call that consumes the next Halton dimension.
    index: u64,
    dim: usize,
    fallback_rng: XorShiftRng,
}

impl Sampler {
    pub fn new(frame_seed: u64) -> Self {
        Sampler {
            frame_seed,
            pixel_x: 0,
            pixel_y: 0,
            rotation: [0.0; NUM_HALTON_DIMS],
            index: 0,
            dim: 0,
            fallback_rng: XorShiftRng::seed_from_u64(frame_seed),
        }
    }

    pub fn reset_frame(&mut self, frame_seed: u64) {
        self.frame_seed = frame_seed;
    }

    /// Re-seeds the rotation and resets the sample index/dimension cursor
    /// for a new pixel (§4.3).
    pub fn reset_pixel(&mut self, x: u32, y: u32) {
        self.pixel_x = x;
        self.pixel_y = y;
        self.index = 0;
        self.dim = 0;

        let salt = pixel_salt(x, y, self.frame_seed);
        let mut rng = XorShiftRng::seed_from_u64(salt);
        for slot in self.rotation.iter_mut() {
            *slot = (rng.next_u32() as f32) / (u32::MAX as f32 + 1.0);
        }
        self.fallback_rng = XorShiftRng::seed_from_u64(salt ^ 0xD1B5_4A32_D192_ED03);
    }

    /// Advances to the next sample of the same pixel (§4.3's per-sample
    /// stratification within a pixel).
    pub fn next_sample(&mut self) {
        self.index += 1;
        self.dim = 0;
    }

    pub fn get_1d(&mut self) -> f32 {
        let dim = self.dim;
        self.dim += 1;
        self.draw_dim(dim)
    }

    pub fn get_2d(&mut self) -> (f32, f32) {
        (self.get_1d(), self.get_1d())
    }

    pub fn get_3d(&mut self) -> (f32, f32, f32) {
        (self.get_1d(), self.get_1d(), self.get_1d())
    }

    fn draw_dim(&mut self, dim: usize) -> f32 {
        if dim < NUM_HALTON_DIMS {
            let base = halton_base(dim);
            let value = halton::radical_inverse(base, self.index) + self.rotation[dim];
            value.fract()
        } else {
            (self.fallback_rng.next_u32() as f32) / (u32::MAX as f32 + 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_pixel_and_frame_reproduces_sequence() {
        let mut a = Sampler::new(42);
        a.reset_pixel(3, 5);
        let seq_a: Vec<f32> = (0..10).map(|_| a.get_1d()).collect();

        let mut b = Sampler::new(42);
        b.reset_pixel(3, 5);
        let seq_b: Vec<f32> = (0..10).map(|_| b.get_1d()).collect();

        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn different_pixels_diverge() {
        let mut a = Sampler::new(42);
        a.reset_pixel(3, 5);
        let mut b = Sampler::new(42);
        b.reset_pixel(4, 5);
        assert_ne!(a.get_1d(), b.get_1d());
    }

    #[test]
    fn samples_stay_in_unit_range() {
        let mut s = Sampler::new(1);
        s.reset_pixel(0, 0);
        for _ in 0..64 {
            let v = s.get_1d();
            assert!(v >= 0.0 && v < 1.0);
            s.next_sample();
        }
    }

    #[test]
    fn next_sample_advances_sequence() {
        let mut s = Sampler::new(1);
        s.reset_pixel(0, 0);
        let first = s.get_1d();
        s.next_sample();
        let second = s.get_1d();
        assert_ne!(first, second);
    }
}
