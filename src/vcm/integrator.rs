//! Light and camera sub-path tracing (§4.5.1-4.5.7): the per-pixel VCM
//! estimator built from next-event estimation, vertex connection, vertex
//! merging, and light-tracer splatting, combined by the balance-heuristic
//! MIS weights derived in `super::MisParams`.

use arrayvec::ArrayVec;

use crate::config::Config;
use crate::interfaces::{Bsdf, Camera, Light, Scene};
use crate::math::ray::Ray;
use crate::math::vector::{Vec2f, Vec3f};
use crate::photon::{HashGrid, Photon};
use crate::sampler::Sampler;
use crate::spectrum::Color;

use super::path::LightVertex;
use super::{mis_weight, pdf_w_to_a, MisParams, EPSILON_DISTANCE, MAX_LIGHT_VERTICES, SHADOW_EPSILON_SCALE};

/// Everything one light sub-path leaves behind for the rest of the pass to
/// consume: the bounded vertex stack for connections, and the photons
/// appended to the (eventually merged) per-pass photon array.
pub struct PassContext<B> {
    pub light_vertices: ArrayVec<[LightVertex<B>; MAX_LIGHT_VERTICES]>,
    pub photons: Vec<Photon>,
}

impl<B> Default for PassContext<B> {
    fn default() -> Self {
        PassContext {
            light_vertices: ArrayVec::new(),
            photons: Vec::new(),
        }
    }
}

fn offset_ray(p: Vec3f, dir: Vec3f) -> Vec3f {
    p + dir.scale(EPSILON_DISTANCE)
}

/// Traces one light sub-path (§4.5 step 1), recording vertices/photons and
/// splatting the light-tracer contribution (§4.5.7) directly into `film`.
pub fn trace_light_path<S, C>(
    scene: &S,
    camera: &C,
    sampler: &mut Sampler,
    mis: &MisParams,
    config: &Config,
    film: &crate::film::Film,
) -> PassContext<S::Bsdf>
where
    S: Scene,
    C: Camera,
    S::Bsdf: Clone,
{
    let mut ctx = PassContext::default();

    let lights = scene.lights();
    if lights.is_empty() {
        return ctx;
    }
    let light_pick_prob = 1.0 / lights.len() as f32;
    let light_index = ((sampler.get_1d() * lights.len() as f32) as usize).min(lights.len() - 1);
    let light = &lights[light_index];

    let emit = light.emit(sampler.get_2d(), sampler.get_2d());
    if emit.emission_pdf_w <= 0.0 || emit.color.is_black() {
        return ctx;
    }

    let mut throughput = emit.color.scale(1.0 / (emit.emission_pdf_w * light_pick_prob));
    let mut d_vcm = emit.direct_pdf_a / emit.emission_pdf_w;
    let mut d_vc = if light.is_delta() { 0.0 } else { emit.cos_at_light / emit.emission_pdf_w };
    let eta_vc = super::eta_vcm(mis.r_vc, mis.light_paths);
    let mut d_vm = d_vc * eta_vc;

    let mut ray = Ray::new(emit.pos, emit.dir);
    let mut path_length = 1u32;

    loop {
        let hit = match scene.traverse(ray) {
            Some(h) => h,
            None => break,
        };
        let shading = scene.evaluate_intersection(ray, &hit);

        let dist2 = hit.distance * hit.distance;
        let cos_theta = shading.wo.dot(shading.n).abs().max(1e-8);
        d_vcm *= dist2;
        d_vcm /= cos_theta;
        d_vc /= cos_theta;
        d_vm /= cos_theta;

        if !shading.bsdf.is_delta() {
            if path_length + 1 <= config.max_ray_depth && ctx.light_vertices.len() < MAX_LIGHT_VERTICES {
                ctx.light_vertices.push(LightVertex {
                    pos: shading.p,
                    wo: shading.wo,
                    normal: shading.n,
                    bsdf: shading.bsdf.clone(),
                    throughput,
                    d_vcm,
                    d_vc,
                    d_vm,
                    path_length,
                });
            }

            ctx.photons.push(Photon::new(shading.p, shading.wo, throughput, d_vcm, d_vm));

            splat_to_camera(
                scene,
                camera,
                film,
                shading.p,
                shading.n,
                shading.wo,
                &shading.bsdf,
                throughput,
                d_vcm,
                d_vc,
                mis,
                config,
            );
        }

        if path_length >= config.max_ray_depth {
            break;
        }

        let sample = match shading.bsdf.sample(shading.wo, sampler.get_3d()) {
            Some(s) if s.pdf_w > 0.0 && !s.color.is_black() => s,
            _ => break,
        };
        debug_assert!(!sample.pdf_w.is_nan(), "light path: sampled pdf_w is NaN");

        throughput = throughput * sample.color;
        debug_assert!(
            throughput.r >= 0.0 && throughput.g >= 0.0 && throughput.b >= 0.0,
            "light path: throughput went negative"
        );
        let cos_out = sample.wi.dot(shading.n).abs();

        if sample.event.is_specular() {
            d_vc *= cos_out;
            d_vm *= cos_out;
            d_vcm = 0.0;
        } else {
            let rev_pdf = shading.bsdf.pdf(sample.wi, shading.wo);
            let new_d_vc = (cos_out / sample.pdf_w) * (d_vc * rev_pdf + d_vcm + mis.mis_vm_factor_vc);
            let new_d_vm = (cos_out / sample.pdf_w) * (d_vm * rev_pdf + d_vcm * mis.mis_vc_factor_vc + 1.0);
            d_vcm = 1.0 / sample.pdf_w;
            d_vc = new_d_vc;
            d_vm = new_d_vm;
        }

        ray = Ray::new(offset_ray(shading.p, sample.wi), sample.wi);
        path_length += 1;
    }

    ctx
}

/// Projects a light-tracer vertex onto the film and splats its contribution
/// (§4.5.7). The camera's lens point and outgoing-direction PDF are derived
/// from `generate_ray`/`pdf_w` rather than a dedicated position accessor,
/// since `Camera` doesn't expose one (§6).
fn splat_to_camera<S, C>(
    scene: &S,
    camera: &C,
    film: &crate::film::Film,
    pos: Vec3f,
    normal: Vec3f,
    wo: Vec3f,
    bsdf: &S::Bsdf,
    throughput: Color,
    d_vcm: f32,
    d_vc: f32,
    mis: &MisParams,
    _config: &Config,
) where
    S: Scene,
    C: Camera,
{
    let film_pos = match camera.world_to_film(pos) {
        Some(p) => p,
        None => return,
    };
    let cam_ray = camera.generate_ray(film_pos);
    let to_camera = cam_ray.org - pos;
    let dist2 = to_camera.length2();
    if dist2 < 1e-12 {
        return;
    }
    let dist = dist2.sqrt();
    let dir_to_camera = to_camera.scale(1.0 / dist);

    let cos_to_camera = dir_to_camera.dot(normal);
    if cos_to_camera <= 1e-6 {
        return;
    }

    let eval = bsdf.evaluate(wo, dir_to_camera);
    if eval.color.is_black() {
        return;
    }

    let camera_pdf_w = camera.pdf_w(-dir_to_camera);
    if camera_pdf_w <= 0.0 {
        return;
    }
    let camera_pdf_a = camera_pdf_w * cos_to_camera / dist2;

    let shadow_len = dist * SHADOW_EPSILON_SCALE;
    let shadow_ray = Ray::new_bounded(offset_ray(pos, dir_to_camera), dir_to_camera, shadow_len);
    if scene.traverse_shadow(shadow_ray, shadow_len) {
        return;
    }

    let mis_w = mis_weight(1.0 + camera_pdf_a * (mis.mis_vm_factor_vc + d_vcm + d_vc * eval.rev_pdf_w));
    let contrib = (throughput * eval.color).scale(camera_pdf_a * mis_w / cos_to_camera);

    let px = film_pos.x.floor();
    let py = film_pos.y.floor();
    if px >= 0.0 && py >= 0.0 && (px as u32) < film.width() && (py as u32) < film.height() {
        film.splat(px as u32, py as u32, contrib);
    }
}

/// Traces one camera sub-path for a single pixel (§4.5 step 2) and returns
/// its radiance estimate, combining direct-hit MIS, NEE, vertex connection,
/// and (when `hash_grid` is `Some`) vertex merging.
#[allow(clippy::too_many_arguments)]
pub fn trace_camera_path<S, C>(
    scene: &S,
    camera: &C,
    film_coords: Vec2f,
    sampler: &mut Sampler,
    mis: &MisParams,
    config: &Config,
    light_vertices: &[LightVertex<S::Bsdf>],
    photons: &[Photon],
    hash_grid: Option<&HashGrid>,
) -> Color
where
    S: Scene,
    C: Camera,
{
    let mut ray = camera.generate_ray(film_coords);
    let mut throughput = Color::white();
    let mut d_vcm = 1.0 / camera.pdf_w(ray.dir).max(1e-12);
    let mut d_vc = 0.0f32;
    let mut d_vm = 0.0f32;
    let mut last_specular = true;
    let mut radiance = Color::black();
    let mut path_length = 1u32;

    let lights = scene.lights();

    loop {
        let hit = match scene.traverse(ray) {
            Some(h) => h,
            None => {
                for light in scene.global_lights() {
                    let emitted = light.radiance(ray.dir, ray.point_at(1.0e6));
                    radiance += throughput * emitted.color;
                }
                break;
            }
        };
        let shading = scene.evaluate_intersection(ray, &hit);

        let dist2 = hit.distance * hit.distance;
        let cos_theta = shading.wo.dot(shading.n).abs().max(1e-8);
        d_vcm *= dist2;
        d_vcm /= cos_theta;
        d_vc /= cos_theta;
        d_vm /= cos_theta;

        if let Some(light) = scene.light_at_hit(&hit) {
            let emitted = light.radiance(ray.dir, shading.p);
            let skip_pure_photon_mapping =
                config.use_vertex_merging && !config.use_vertex_connection && !last_specular;
            if !skip_pure_photon_mapping {
                let w_camera = emitted.direct_pdf_a * d_vcm + emitted.emission_pdf_w * d_vc;
                let w = mis_weight(1.0 + w_camera);
                radiance += throughput * emitted.color.scale(w);
            }
        }

        if !shading.bsdf.is_delta() {
            if !lights.is_empty() {
                radiance += next_event_estimation(scene, &shading, &ray, lights, sampler, mis, d_vcm, d_vc);
            }

            if config.use_vertex_connection {
                radiance += connect_to_light_vertices(
                    scene,
                    &shading,
                    light_vertices,
                    mis,
                    config,
                    path_length,
                    d_vcm,
                    d_vc,
                    throughput,
                );
            }

            if config.use_vertex_merging {
                if let Some(grid) = hash_grid {
                    radiance += merge_photons::<S>(&shading, grid, photons, mis, d_vcm, d_vm, throughput);
                }
            }
        }

        if path_length >= config.max_ray_depth {
            break;
        }

        let sample = match shading.bsdf.sample(shading.wo, sampler.get_3d()) {
            Some(s) if s.pdf_w > 0.0 && !s.color.is_black() => s,
            _ => break,
        };
        debug_assert!(!sample.pdf_w.is_nan(), "camera path: sampled pdf_w is NaN");

        throughput = throughput * sample.color;
        debug_assert!(
            throughput.r >= 0.0 && throughput.g >= 0.0 && throughput.b >= 0.0,
            "camera path: throughput went negative"
        );
        let cos_out = sample.wi.dot(shading.n).abs();

        if sample.event.is_specular() {
            d_vc *= cos_out;
            d_vm *= cos_out;
            d_vcm = 0.0;
            last_specular = true;
        } else {
            let rev_pdf = shading.bsdf.pdf(sample.wi, shading.wo);
            let new_d_vc = (cos_out / sample.pdf_w) * (d_vc * rev_pdf + d_vcm + mis.mis_vm_factor_vc);
            let new_d_vm = (cos_out / sample.pdf_w) * (d_vm * rev_pdf + d_vcm * mis.mis_vc_factor_vc + 1.0);
            d_vcm = 1.0 / sample.pdf_w;
            d_vc = new_d_vc;
            d_vm = new_d_vm;
            last_specular = false;
        }

        ray = Ray::new(offset_ray(shading.p, sample.wi), sample.wi);
        path_length += 1;
    }

    radiance
}

fn next_event_estimation<S: Scene>(
    scene: &S,
    shading: &crate::interfaces::ShadingPoint<S::Bsdf>,
    _ray: &Ray,
    lights: &[S::Light],
    sampler: &mut Sampler,
    mis: &MisParams,
    d_vcm: f32,
    d_vc: f32,
) -> Color {
    let light_pick_prob = 1.0 / lights.len() as f32;
    let light_index = ((sampler.get_1d() * lights.len() as f32) as usize).min(lights.len() - 1);
    let light = &lights[light_index];

    let illum = light.illuminate(shading.p, sampler.get_2d());
    if illum.direct_pdf_w <= 0.0 || illum.color.is_black() {
        return Color::black();
    }

    let wi = illum.dir_to_light;
    let eval = shading.bsdf.evaluate(shading.wo, wi);
    if eval.color.is_black() {
        return Color::black();
    }

    let shadow_len = illum.distance * SHADOW_EPSILON_SCALE;
    let shadow_ray = Ray::new_bounded(offset_ray(shading.p, wi), wi, shadow_len);
    if scene.traverse_shadow(shadow_ray, shadow_len) {
        return Color::black();
    }

    let cos_surf = wi.dot(shading.n).abs();
    let bsdf_pdf_w_for_w_light = if light.is_delta() { 0.0 } else { eval.pdf_w };
    let w_light = bsdf_pdf_w_for_w_light / (light_pick_prob * illum.direct_pdf_w);
    let w_camera = (illum.emission_pdf_w * cos_surf) / (illum.direct_pdf_w * illum.cos_at_light.abs().max(1e-8))
        * (mis.mis_vm_factor_vc + d_vcm + d_vc * eval.rev_pdf_w);
    let mis_w = mis_weight(w_light + 1.0 + w_camera);

    (illum.color * eval.color).scale(mis_w / (light_pick_prob * illum.direct_pdf_w))
}

#[allow(clippy::too_many_arguments)]
fn connect_to_light_vertices<S: Scene>(
    scene: &S,
    shading: &crate::interfaces::ShadingPoint<S::Bsdf>,
    light_vertices: &[LightVertex<S::Bsdf>],
    mis: &MisParams,
    config: &Config,
    camera_path_length: u32,
    d_vcm: f32,
    d_vc: f32,
    throughput: Color,
) -> Color {
    let mut total = Color::black();

    for lv in light_vertices {
        if lv.path_length + camera_path_length + 1 > config.max_ray_depth {
            continue;
        }

        let delta = lv.pos - shading.p;
        let dist2 = delta.length2();
        if dist2 < 1e-12 {
            continue;
        }
        let dist = dist2.sqrt();
        let dir = delta.scale(1.0 / dist);

        let cam_eval = shading.bsdf.evaluate(shading.wo, dir);
        if cam_eval.pdf_w <= 0.0 || cam_eval.color.is_black() {
            continue;
        }
        let light_eval = lv.bsdf.evaluate(lv.wo, dir.scale(-1.0));
        if light_eval.pdf_w <= 0.0 || light_eval.color.is_black() {
            continue;
        }

        let cos_at_camera = dir.dot(shading.n).abs();
        let cos_at_light = dir.dot(lv.normal).abs();

        let shadow_len = dist * SHADOW_EPSILON_SCALE;
        let shadow_ray = Ray::new_bounded(offset_ray(shading.p, dir), dir, shadow_len);
        if scene.traverse_shadow(shadow_ray, shadow_len) {
            continue;
        }

        let camera_bsdf_pdf_a = pdf_w_to_a(cam_eval.pdf_w, dist2, cos_at_light);
        let light_bsdf_pdf_a = pdf_w_to_a(light_eval.pdf_w, dist2, cos_at_camera);

        let w_light = camera_bsdf_pdf_a * (mis.mis_vm_factor_vc + lv.d_vcm + lv.d_vc * light_eval.rev_pdf_w);
        let w_camera = light_bsdf_pdf_a * (mis.mis_vm_factor_vc + d_vcm + d_vc * cam_eval.rev_pdf_w);
        let mis_w = mis_weight(w_light + 1.0 + w_camera);

        let geometry = 1.0 / dist2;
        total += (throughput * lv.throughput * cam_eval.color * light_eval.color).scale(geometry * mis_w);
    }

    total
}

fn merge_photons<S: Scene>(
    shading: &crate::interfaces::ShadingPoint<S::Bsdf>,
    grid: &HashGrid,
    photons: &[Photon],
    mis: &MisParams,
    d_vcm: f32,
    d_vm: f32,
    throughput: Color,
) -> Color {
    let mut accum = Color::black();
    let r_vm2 = mis.r_vm * mis.r_vm;

    grid.query(photons, shading.p, |photon, _idx| {
        let photon_dir = photon.direction();
        let cos_at_surface = photon_dir.dot(shading.n);
        if cos_at_surface <= 0.0 {
            return;
        }
        let dist2 = (photon.position - shading.p).length2();
        if dist2 > r_vm2 {
            return;
        }

        let eval = shading.bsdf.evaluate(shading.wo, photon_dir.scale(-1.0));
        if eval.pdf_w <= 0.0 || eval.color.is_black() {
            return;
        }

        let w_light = photon.d_vcm * mis.mis_vc_factor_vm + photon.d_vm * eval.pdf_w;
        let w_camera = d_vcm * mis.mis_vc_factor_vm + d_vm * eval.rev_pdf_w;
        let mis_w = mis_weight(w_light + 1.0 + w_camera);

        accum += (eval.color * photon.throughput_color()).scale(mis_w / cos_at_surface.max(1e-6));
    });

    // §4.5: vertex-merging contributions are scaled by 1 / (π r_VM² lightPaths)
    // once, after summing over the query radius.
    accum.scale(1.0 / (std::f32::consts::PI * r_vm2 * mis.light_paths).max(1e-12))
}
