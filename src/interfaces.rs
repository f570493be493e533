//! The narrow contracts the core consumes from its collaborators (§6): the
//! scene/primitive library, material BSDFs, lights, and the camera. None of
//! these are implemented here — the geometric primitive library,
//! material/BSDF evaluation, light sampling, and camera projection are all
//! out of scope (§1). `demos/` supplies a minimal implementation of each
//! trait so the integrator and viewport can be exercised end to end.
//!
//! Tagged dispatch over these traits (monomorphized generics, not `dyn`)
//! matches the "prefer a sum type to a virtual hierarchy" guidance for hot
//! paths (§9) while still letting a downstream crate plug in its own scene.

use crate::math::vector::{Vec2f, Vec3f};
use crate::math::ray::Ray;
use crate::spectrum::Color;

use bitflags::bitflags;

/// Result of a closest-hit BVH traversal (§4.2).
#[derive(Clone, Copy, Debug)]
pub struct HitRecord {
    pub distance: f32,
    pub object_id: u32,
    pub sub_object_id: u32,
    pub uv: Vec2f,
}

bitflags! {
    pub struct BsdfEvent: u32 {
        const NULL = 0;
        const DIFFUSE = 1 << 0;
        const GLOSSY = 1 << 1;
        const SPECULAR = 1 << 2;
    }
}

impl BsdfEvent {
    pub fn is_specular(self) -> bool {
        self.contains(BsdfEvent::SPECULAR)
    }
}

pub struct BsdfSample {
    pub wi: Vec3f,
    pub color: Color,
    pub pdf_w: f32,
    pub event: BsdfEvent,
}

pub struct BsdfEval {
    pub color: Color,
    pub pdf_w: f32,
    pub rev_pdf_w: f32,
}

/// Material/BSDF interface (consumed), §6.
pub trait Bsdf {
    /// `Sample(wavelength, shadingData, u3) -> (incomingDir, rayColor, pdfW, eventType)`.
    fn sample(&self, wo: Vec3f, u: (f32, f32, f32)) -> Option<BsdfSample>;

    /// `Evaluate(wavelength, shadingData, incomingDir) -> (rayColor, pdfW, revPdfW)`.
    fn evaluate(&self, wo: Vec3f, wi: Vec3f) -> BsdfEval;

    /// `Pdf(evalCtx, direction)`.
    fn pdf(&self, wo: Vec3f, wi: Vec3f) -> f32;

    fn is_delta(&self) -> bool;
}

/// A surface vertex as returned by `Scene::evaluate_intersection`: shading
/// frame, material, and outgoing direction back toward the incoming ray.
pub struct ShadingPoint<B> {
    pub p: Vec3f,
    /// Geometric normal.
    pub n: Vec3f,
    /// Shading-space tangent/bitangent; `n` doubles as the shading normal.
    pub s: Vec3f,
    pub t: Vec3f,
    pub wo: Vec3f,
    pub bsdf: B,
}

impl<B> ShadingPoint<B> {
    pub fn world_to_shading(&self, v: Vec3f) -> Vec3f {
        Vec3f {
            x: v.dot(self.s),
            y: v.dot(self.t),
            z: v.dot(self.n),
        }
    }
}

bitflags! {
    pub struct LightFlags: u32 {
        const FINITE = 1 << 0;
        const DELTA = 1 << 1;
    }
}

pub struct EmitSample {
    pub color: Color,
    pub pos: Vec3f,
    pub dir: Vec3f,
    pub emission_pdf_w: f32,
    pub direct_pdf_a: f32,
    pub cos_at_light: f32,
}

pub struct IlluminateSample {
    pub color: Color,
    pub dir_to_light: Vec3f,
    pub distance: f32,
    pub direct_pdf_w: f32,
    pub emission_pdf_w: f32,
    pub cos_at_light: f32,
}

pub struct RadianceSample {
    pub color: Color,
    pub direct_pdf_a: f32,
    pub emission_pdf_w: f32,
}

/// Light interface (consumed), §6.
pub trait Light {
    fn emit(&self, u_pos: (f32, f32), u_dir: (f32, f32)) -> EmitSample;

    fn illuminate(&self, reference_point: Vec3f, u: (f32, f32)) -> IlluminateSample;

    /// Evaluated when a camera sub-path directly hits a surface carrying
    /// this light (§4.5.2).
    fn radiance(&self, ray_dir: Vec3f, hit_point: Vec3f) -> RadianceSample;

    fn flags(&self) -> LightFlags;

    fn is_delta(&self) -> bool {
        self.flags().contains(LightFlags::DELTA)
    }
}

/// Camera interface (consumed), §6.
pub trait Camera {
    fn generate_ray(&self, film_coords: Vec2f) -> Ray;

    /// `None` if the point doesn't project onto the film (behind the
    /// camera, or outside its frustum).
    fn world_to_film(&self, p: Vec3f) -> Option<Vec2f>;

    fn pdf_w(&self, dir: Vec3f) -> f32;
}

/// Scene-primitive interface (consumed), §6. An implementor typically wraps
/// `crate::bvh::Bvh` for `traverse`/`traverse_shadow` and narrows leaf hits
/// to shading data and light membership itself; the core never interprets
/// primitive geometry directly.
pub trait Scene {
    type Bsdf: Bsdf;
    type Light: Light;

    fn traverse(&self, ray: Ray) -> Option<HitRecord>;

    fn traverse_shadow(&self, ray: Ray, max_dist: f32) -> bool;

    fn evaluate_intersection(&self, ray: Ray, hit: &HitRecord) -> ShadingPoint<Self::Bsdf>;

    /// The light carried by the hit surface, if any (§4.5.2's "surface is
    /// itself a light" case).
    fn light_at_hit(&self, hit: &HitRecord) -> Option<&Self::Light>;

    fn lights(&self) -> &[Self::Light];

    fn global_lights(&self) -> &[Self::Light];
}
