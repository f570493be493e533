//! The per-pass orchestrator (§4.7): seeds the sampler sequence, dispatches
//! tile jobs through the work-stealing pool, merges per-tile photon buffers
//! and rebuilds the spatial index at the barrier, and (every other pass)
//! recomputes block error and subdivides or retires blocks. Grounded on
//! `Viewport.cpp`'s pass loop for the overall shape and the teacher's
//! `threadpool.rs`/`thread.rs` for the worker-thread lifecycle, with
//! `crossbeam_deque` (`pool.rs`) replacing the teacher's ad hoc dispatch.

pub mod block;
pub mod pool;

use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::error::RenderResult;
use crate::film::Film;
use crate::interfaces::{Camera, Scene};
use crate::math::vector::{Vec2f, Vec2u};
use crate::photon::{HashGrid, Photon};
use crate::sampler::Sampler;
use crate::vcm::{trace_camera_path, trace_light_path, MisParams};

use block::{block_error, build_initial_blocks, update_blocks, Block, BlockState};
use pool::ThreadPool;

pub struct Viewport<S: Scene, C: Camera> {
    config: Config,
    scene: Arc<S>,
    camera: Arc<C>,
    film: Arc<Film>,
    pool: ThreadPool,
    blocks: Vec<Block>,
    pass: u32,
    frame_seed: u64,
    photon_buffer: Arc<Mutex<Vec<Photon>>>,
    prev_photons: Arc<Vec<Photon>>,
    prev_hash_grid: Option<Arc<HashGrid>>,
}

impl<S, C> Viewport<S, C>
where
    S: Scene + Send + Sync + 'static,
    S::Bsdf: Clone + Send,
    S::Light: Sync,
    C: Camera + Send + Sync + 'static,
{
    pub fn new(config: Config, scene: S, camera: C) -> RenderResult<Self> {
        config.validate()?;
        let film = Arc::new(Film::new(config.resolution.x, config.resolution.y));
        let pool = ThreadPool::new(config.num_threads as usize)?;
        let blocks = build_initial_blocks(config.resolution, &config.adaptive);

        Ok(Viewport {
            scene: Arc::new(scene),
            camera: Arc::new(camera),
            film,
            pool,
            blocks,
            pass: 0,
            frame_seed: 0,
            photon_buffer: Arc::new(Mutex::new(Vec::new())),
            prev_photons: Arc::new(Vec::new()),
            prev_hash_grid: None,
            config,
        })
    }

    pub fn film(&self) -> &Film {
        &self.film
    }

    pub fn pass(&self) -> u32 {
        self.pass
    }

    pub fn resolution(&self) -> Vec2u {
        self.config.resolution
    }

    /// Runs one full render pass (§4.7's five numbered steps).
    pub fn render_pass(&mut self) {
        self.frame_seed = self.frame_seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
        self.film.set_secondary_active(self.pass % 2 == 0);
        let mis = MisParams::for_pass(
            self.pass,
            self.config.light_paths() as f32,
            self.config.r0,
            self.config.alpha,
            self.config.r_min,
            self.config.use_vertex_connection,
            self.config.use_vertex_merging,
        );

        for tile in self.generate_tiles() {
            let scene = Arc::clone(&self.scene);
            let camera = Arc::clone(&self.camera);
            let film = Arc::clone(&self.film);
            let photon_out = Arc::clone(&self.photon_buffer);
            let prev_photons = Arc::clone(&self.prev_photons);
            let prev_grid = self.prev_hash_grid.clone();
            let config = self.config.clone();
            let frame_seed = self.frame_seed;

            self.pool.dispatch(move || {
                render_tile(
                    scene.as_ref(),
                    camera.as_ref(),
                    &film,
                    tile,
                    frame_seed,
                    &mis,
                    &config,
                    &prev_photons,
                    prev_grid.as_deref(),
                    &photon_out,
                );
            });
        }
        self.pool.barrier();

        let collected = std::mem::take(&mut *self.photon_buffer.lock().unwrap());
        let grid = HashGrid::build(&collected, mis.r_vc);
        self.prev_photons = Arc::new(collected);
        self.prev_hash_grid = Some(Arc::new(grid));

        if self.pass % 2 == 1 {
            self.update_adaptive_blocks();
        }

        self.pass += 1;
    }

    fn generate_tiles(&self) -> Vec<Block> {
        let mut tiles = Vec::new();
        for block in &self.blocks {
            if block.state == BlockState::Retired {
                continue;
            }
            let mut y = block.min.y;
            while y < block.max.y {
                let y1 = (y + self.config.tile_size).min(block.max.y);
                let mut x = block.min.x;
                while x < block.max.x {
                    let x1 = (x + self.config.tile_size).min(block.max.x);
                    tiles.push(Block {
                        min: Vec2u { x, y },
                        max: Vec2u { x: x1, y: y1 },
                        state: BlockState::Active,
                    });
                    x = x1;
                }
                y = y1;
            }
        }
        tiles
    }

    fn update_adaptive_blocks(&mut self) {
        if !self.config.adaptive.enable {
            return;
        }
        let total_area = (self.config.resolution.x * self.config.resolution.y) as f32;
        let passes = self.pass + 1;
        let errors: Vec<f32> = self
            .blocks
            .iter()
            .map(|b| {
                if b.state == BlockState::Retired {
                    0.0
                } else {
                    block_error(b, &self.film, passes, total_area)
                }
            })
            .collect();
        self.blocks = update_blocks(std::mem::take(&mut self.blocks), &errors, &self.config.adaptive);
    }
}

#[allow(clippy::too_many_arguments)]
fn render_tile<S, C>(
    scene: &S,
    camera: &C,
    film: &Film,
    tile: Block,
    frame_seed: u64,
    mis: &MisParams,
    config: &Config,
    prev_photons: &[Photon],
    prev_grid: Option<&HashGrid>,
    photon_out: &Mutex<Vec<Photon>>,
) where
    S: Scene,
    S::Bsdf: Clone,
    C: Camera,
{
    let mut sampler = Sampler::new(frame_seed);
    let mut local_photons = Vec::new();

    for y in tile.min.y..tile.max.y {
        for x in tile.min.x..tile.max.x {
            sampler.reset_pixel(x, y);
            for _ in 0..config.samples_per_pixel {
                let light_ctx = trace_light_path(scene, camera, &mut sampler, mis, config, film);
                let jitter = sampler.get_2d();
                let film_coords = Vec2f { x: x as f32 + jitter.0, y: y as f32 + jitter.1 };
                let color = trace_camera_path(
                    scene,
                    camera,
                    film_coords,
                    &mut sampler,
                    mis,
                    config,
                    &light_ctx.light_vertices,
                    prev_photons,
                    prev_grid,
                );
                film.accumulate(x, y, color);
                local_photons.extend(light_ctx.photons);
                sampler.next_sample();
            }
        }
    }

    photon_out.lock().expect("photon buffer mutex poisoned").extend(local_photons);
}
