//! Exercises the BVH, VCM integrator, and viewport orchestrator together
//! through the minimal scene in `demos/` (§8's worked scenarios).

#[path = "../demos/mod.rs"]
mod demos;

use demos::{DemoScene, PinholeCamera, PointLight, Sphere};
use vcmcore::config::Config;
use vcmcore::math::vector::{Vec2u, Vec3f};
use vcmcore::spectrum::Color;
use vcmcore::viewport::Viewport;

fn floor_and_light_scene() -> (DemoScene, PinholeCamera) {
    let spheres = vec![Sphere { center: Vec3f { x: 0.0, y: -1000.0, z: 0.0 }, radius: 1000.0 }];
    let lights = vec![PointLight {
        position: Vec3f { x: 0.0, y: 5.0, z: 0.0 },
        intensity: Color { r: 40.0, g: 40.0, b: 40.0 },
    }];
    let scene = DemoScene::new(spheres, Color { r: 0.8, g: 0.8, b: 0.8 }, lights).expect("valid demo scene");
    let camera = PinholeCamera {
        origin: Vec3f { x: 0.0, y: 2.0, z: 6.0 },
        forward: Vec3f { x: 0.0, y: -0.2, z: -1.0 }.normalize(),
        right: Vec3f { x: 1.0, y: 0.0, z: 0.0 },
        up: Vec3f { x: 0.0, y: 1.0, z: -0.2 }.normalize(),
        tan_half_fov: 0.5,
        resolution: Vec2u { x: 16, y: 16 },
    };
    (scene, camera)
}

fn small_config() -> Config {
    Config {
        resolution: Vec2u { x: 16, y: 16 },
        samples_per_pixel: 2,
        max_ray_depth: 4,
        num_threads: 2,
        tile_size: 8,
        ..Config::default()
    }
}

#[test]
fn lambertian_floor_under_point_light_produces_finite_nonnegative_radiance() {
    let (scene, camera) = floor_and_light_scene();
    let config = small_config();
    let mut viewport = Viewport::new(config, scene, camera).expect("valid config");

    viewport.render_pass();
    viewport.render_pass();

    let film = viewport.film();
    let mut any_nonzero = false;
    for y in 0..film.height() {
        for x in 0..film.width() {
            let c = film.resolve(x, y, viewport.pass());
            assert!(!c.has_nan(), "nan at ({x}, {y})");
            assert!(c.r >= 0.0 && c.g >= 0.0 && c.b >= 0.0, "negative radiance at ({x}, {y})");
            if !c.is_black() {
                any_nonzero = true;
            }
        }
    }
    assert!(any_nonzero, "expected at least one lit pixel looking at a lit floor");
}

#[test]
fn empty_scene_with_no_lights_yields_black_film() {
    let scene = DemoScene::new(Vec::new(), Color::white(), Vec::new()).expect("valid demo scene");
    let camera = PinholeCamera {
        origin: Vec3f { x: 0.0, y: 0.0, z: 5.0 },
        forward: Vec3f { x: 0.0, y: 0.0, z: -1.0 },
        right: Vec3f { x: 1.0, y: 0.0, z: 0.0 },
        up: Vec3f { x: 0.0, y: 1.0, z: 0.0 },
        tan_half_fov: 0.5,
        resolution: Vec2u { x: 8, y: 8 },
    };
    let config = Config { resolution: Vec2u { x: 8, y: 8 }, samples_per_pixel: 1, num_threads: 1, tile_size: 8, ..Config::default() };
    let mut viewport = Viewport::new(config, scene, camera).expect("valid config");

    viewport.render_pass();

    let film = viewport.film();
    for y in 0..film.height() {
        for x in 0..film.width() {
            assert!(film.resolve(x, y, 1).is_black());
        }
    }
}

#[test]
fn repeated_passes_monotonically_increase_sample_count_without_panicking() {
    let (scene, camera) = floor_and_light_scene();
    let config = small_config();
    let mut viewport = Viewport::new(config, scene, camera).expect("valid config");

    for expected_pass in 0..4 {
        assert_eq!(viewport.pass(), expected_pass);
        viewport.render_pass();
    }
    assert_eq!(viewport.pass(), 4);
}

#[test]
fn adaptive_blocks_disabled_still_renders_every_pixel() {
    let (scene, camera) = floor_and_light_scene();
    let mut config = small_config();
    config.adaptive.enable = false;
    let mut viewport = Viewport::new(config, scene, camera).expect("valid config");

    viewport.render_pass();

    let film = viewport.film();
    let mut touched = 0;
    for y in 0..film.height() {
        for x in 0..film.width() {
            let _ = film.resolve(x, y, viewport.pass());
            touched += 1;
        }
    }
    assert_eq!(touched, 16 * 16);
}

#[test]
fn rejecting_zero_threads_surfaces_a_configuration_error() {
    let (scene, camera) = floor_and_light_scene();
    let mut config = small_config();
    config.num_threads = 0;
    assert!(Viewport::new(config, scene, camera).is_err());
}
