//! The tunables the core consumes (§6's CLI/config surface, plus the
//! ambient logging/VCM-schedule fields `SPEC_FULL.md` adds). Generalizes the
//! teacher's flat `RenderParam` struct in `threading.rs` with validation.

use crate::error::{RenderError, RenderResult};
use crate::math::vector::Vec2u;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraversalMode {
    Single,
    Packet,
}

#[derive(Clone, Debug)]
pub struct AdaptiveConfig {
    pub enable: bool,
    pub max_block_size: u32,
    pub min_block_size: u32,
    pub num_initial_passes: u32,
    pub convergence_threshold: f32,
    pub subdivision_threshold: f32,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        AdaptiveConfig {
            enable: true,
            max_block_size: 64,
            min_block_size: 8,
            num_initial_passes: 4,
            convergence_threshold: 0.01,
            subdivision_threshold: 0.05,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub resolution: Vec2u,
    pub samples_per_pixel: u32,
    pub max_ray_depth: u32,
    pub motion_blur_strength: f32,
    pub anti_aliasing_spread: f32,
    pub traversal_mode: TraversalMode,
    pub num_threads: u32,
    pub tile_size: u32,
    pub adaptive: AdaptiveConfig,

    pub log_level: log::LevelFilter,

    /// Initial vertex-connection radius.
    pub r0: f32,
    /// Per-pass radius decay, in `(0, 1]`.
    pub alpha: f32,
    /// Floor for the radius schedule.
    pub r_min: f32,
    pub use_vertex_connection: bool,
    pub use_vertex_merging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            resolution: Vec2u { x: 512, y: 512 },
            samples_per_pixel: 16,
            max_ray_depth: 10,
            motion_blur_strength: 0.0,
            anti_aliasing_spread: 1.0,
            traversal_mode: TraversalMode::Single,
            num_threads: 1,
            tile_size: 16,
            adaptive: AdaptiveConfig::default(),
            log_level: log::LevelFilter::Info,
            r0: 0.1,
            alpha: 0.75,
            r_min: 1e-4,
            use_vertex_connection: true,
            use_vertex_merging: true,
        }
    }
}

impl Config {
    pub fn validate(&self) -> RenderResult<()> {
        if self.resolution.x == 0 || self.resolution.y == 0 {
            return Err(RenderError::Configuration(format!(
                "resolution must be nonzero, got {}x{}",
                self.resolution.x, self.resolution.y
            )));
        }
        if self.samples_per_pixel < 1 {
            return Err(RenderError::Configuration(
                "samplesPerPixel must be >= 1".to_string(),
            ));
        }
        if self.max_ray_depth < 1 || self.max_ray_depth > 254 {
            return Err(RenderError::Configuration(format!(
                "maxRayDepth must be in [1, 254], got {}",
                self.max_ray_depth
            )));
        }
        if !(0.0..=1.0).contains(&self.motion_blur_strength) {
            return Err(RenderError::Configuration(
                "motionBlurStrength must be in [0, 1]".to_string(),
            ));
        }
        if self.anti_aliasing_spread < 0.0 {
            return Err(RenderError::Configuration(
                "antiAliasingSpread must be >= 0".to_string(),
            ));
        }
        if self.num_threads < 1 {
            return Err(RenderError::Configuration(
                "numThreads must be >= 1".to_string(),
            ));
        }
        if self.tile_size < 1 {
            return Err(RenderError::Configuration(
                "tileSize must be >= 1".to_string(),
            ));
        }
        if self.adaptive.min_block_size == 0
            || self.adaptive.min_block_size > self.adaptive.max_block_size
        {
            return Err(RenderError::Configuration(
                "adaptive.minBlockSize must be nonzero and <= maxBlockSize".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(RenderError::Configuration(
                "alpha must be in (0, 1]".to_string(),
            ));
        }
        Ok(())
    }

    /// Light sub-paths traced per pass (§4.5.1): one per pixel per sample,
    /// since `render_tile` traces a light path for every sample.
    pub fn light_paths(&self) -> u64 {
        self.resolution.x as u64 * self.resolution.y as u64 * self.samples_per_pixel as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_threads_rejected() {
        let mut c = Config::default();
        c.num_threads = 0;
        match c.validate() {
            Err(RenderError::Configuration(_)) => {}
            other => panic!("expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn zero_samples_per_pixel_rejected() {
        let mut c = Config::default();
        c.samples_per_pixel = 0;
        assert!(c.validate().is_err());
    }

    #[test]
    fn ray_depth_out_of_range_rejected() {
        let mut c = Config::default();
        c.max_ray_depth = 255;
        assert!(c.validate().is_err());
    }
}
