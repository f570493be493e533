//! Minimal trait implementations satisfying `interfaces.rs`, used only to
//! exercise the BVH/VCM/viewport core end to end (§1: not part of the
//! crate's public contract — the geometric primitive library, material
//! evaluation, light sampling, and camera projection this demo hand-rolls
//! are all out of scope for the core itself).

use vcmcore::bvh::traversal::LeafIntersector;
use vcmcore::bvh::{self, Bvh};
use vcmcore::error::RenderResult;
use vcmcore::interfaces::{
    BsdfEval, BsdfEvent, BsdfSample, Camera, EmitSample, HitRecord, IlluminateSample, Light,
    LightFlags, RadianceSample, Scene, ShadingPoint,
};
use vcmcore::math::bbox::BBox3f;
use vcmcore::math::ray::Ray;
use vcmcore::math::vector::{Vec2f, Vec2u, Vec3f};
use vcmcore::spectrum::Color;

const PI: f32 = std::f32::consts::PI;
const INV_PI: f32 = std::f32::consts::FRAC_1_PI;

#[derive(Clone, Copy)]
pub struct Sphere {
    pub center: Vec3f,
    pub radius: f32,
}

impl Sphere {
    fn bound(&self) -> BBox3f {
        let r = Vec3f { x: self.radius, y: self.radius, z: self.radius };
        BBox3f::from_pnts(self.center - r, self.center + r)
    }

    /// Returns the nearest positive hit parameter, if any.
    fn intersect(&self, ray: &Ray, max_t: f32) -> Option<f32> {
        let oc = ray.org - self.center;
        let a = ray.dir.length2();
        let b = 2.0 * oc.dot(ray.dir);
        let c = oc.length2() - self.radius * self.radius;
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        let t0 = (-b - sqrt_disc) / (2.0 * a);
        let t1 = (-b + sqrt_disc) / (2.0 * a);
        for t in [t0, t1] {
            if t > 1e-4 && t < max_t {
                return Some(t);
            }
        }
        None
    }
}

/// A Lambertian BSDF baked with the local shading frame at one intersection
/// (`Scene::evaluate_intersection` constructs one per hit).
#[derive(Clone)]
pub struct LambertBsdf {
    pub albedo: Color,
    pub n: Vec3f,
    pub s: Vec3f,
    pub t: Vec3f,
}

impl vcmcore::interfaces::Bsdf for LambertBsdf {
    fn sample(&self, _wo: Vec3f, u: (f32, f32, f32)) -> Option<BsdfSample> {
        let r = u.0.sqrt();
        let phi = 2.0 * PI * u.1;
        let z = (1.0 - u.0).max(0.0).sqrt();
        let local = Vec3f { x: r * phi.cos(), y: r * phi.sin(), z };
        let wi = (self.s.scale(local.x) + self.t.scale(local.y) + self.n.scale(local.z)).normalize();
        if z <= 1e-6 {
            return None;
        }
        Some(BsdfSample {
            wi,
            color: self.albedo,
            pdf_w: z * INV_PI,
            event: BsdfEvent::DIFFUSE,
        })
    }

    fn evaluate(&self, wo: Vec3f, wi: Vec3f) -> BsdfEval {
        let cos_wi = wi.dot(self.n).max(0.0);
        let cos_wo = wo.dot(self.n).max(0.0);
        if cos_wi <= 0.0 {
            return BsdfEval { color: Color::black(), pdf_w: 0.0, rev_pdf_w: 0.0 };
        }
        BsdfEval {
            color: self.albedo.scale(INV_PI),
            pdf_w: cos_wi * INV_PI,
            rev_pdf_w: cos_wo * INV_PI,
        }
    }

    fn pdf(&self, _wo: Vec3f, wi: Vec3f) -> f32 {
        wi.dot(self.n).max(0.0) * INV_PI
    }

    fn is_delta(&self) -> bool {
        false
    }
}

pub struct PointLight {
    pub position: Vec3f,
    pub intensity: Color,
}

impl Light for PointLight {
    fn emit(&self, u_pos: (f32, f32), _u_dir: (f32, f32)) -> EmitSample {
        let z = 1.0 - 2.0 * u_pos.0;
        let r = (1.0 - z * z).max(0.0).sqrt();
        let phi = 2.0 * PI * u_pos.1;
        let dir = Vec3f { x: r * phi.cos(), y: r * phi.sin(), z };
        EmitSample {
            color: self.intensity,
            pos: self.position,
            dir,
            emission_pdf_w: 1.0 / (4.0 * PI),
            direct_pdf_a: 1.0,
            cos_at_light: 1.0,
        }
    }

    fn illuminate(&self, reference_point: Vec3f, _u: (f32, f32)) -> IlluminateSample {
        let delta = self.position - reference_point;
        let dist2 = delta.length2().max(1e-12);
        let dist = dist2.sqrt();
        IlluminateSample {
            color: self.intensity.scale(1.0 / dist2),
            dir_to_light: delta.scale(1.0 / dist),
            distance: dist,
            direct_pdf_w: 1.0,
            emission_pdf_w: 1.0 / (4.0 * PI),
            cos_at_light: 1.0,
        }
    }

    fn radiance(&self, _ray_dir: Vec3f, _hit_point: Vec3f) -> RadianceSample {
        // A point light has no surface to hit directly.
        RadianceSample { color: Color::black(), direct_pdf_a: 0.0, emission_pdf_w: 0.0 }
    }

    fn flags(&self) -> LightFlags {
        LightFlags::DELTA | LightFlags::FINITE
    }
}

pub struct PinholeCamera {
    pub origin: Vec3f,
    pub forward: Vec3f,
    pub right: Vec3f,
    pub up: Vec3f,
    pub tan_half_fov: f32,
    pub resolution: Vec2u,
}

impl PinholeCamera {
    fn aspect(&self) -> f32 {
        self.resolution.x as f32 / self.resolution.y as f32
    }
}

impl Camera for PinholeCamera {
    fn generate_ray(&self, film_coords: Vec2f) -> Ray {
        let ndc_x = (film_coords.x + 0.5) / self.resolution.x as f32 * 2.0 - 1.0;
        let ndc_y = 1.0 - (film_coords.y + 0.5) / self.resolution.y as f32 * 2.0;
        let dir = (self.forward
            + self.right.scale(ndc_x * self.aspect() * self.tan_half_fov)
            + self.up.scale(ndc_y * self.tan_half_fov))
        .normalize();
        Ray::new(self.origin, dir)
    }

    fn world_to_film(&self, p: Vec3f) -> Option<Vec2f> {
        let local = p - self.origin;
        let z = local.dot(self.forward);
        if z <= 1e-6 {
            return None;
        }
        let x = local.dot(self.right) / z;
        let y = local.dot(self.up) / z;
        let ndc_x = x / (self.tan_half_fov * self.aspect());
        let ndc_y = y / self.tan_half_fov;
        let px = (ndc_x + 1.0) / 2.0 * self.resolution.x as f32 - 0.5;
        let py = (1.0 - ndc_y) / 2.0 * self.resolution.y as f32 - 0.5;
        if px < 0.0 || py < 0.0 || px >= self.resolution.x as f32 || py >= self.resolution.y as f32 {
            return None;
        }
        Some(Vec2f { x: px, y: py })
    }

    fn pdf_w(&self, dir: Vec3f) -> f32 {
        let cos_theta = dir.normalize().dot(self.forward);
        if cos_theta <= 0.0 {
            return 0.0;
        }
        let width = 2.0 * self.tan_half_fov * self.aspect();
        let height = 2.0 * self.tan_half_fov;
        1.0 / (width * height * cos_theta.powi(3))
    }
}

struct SphereIntersector<'a> {
    spheres: &'a [Sphere],
    hit: Option<(f32, u32)>,
}

impl<'a> LeafIntersector for SphereIntersector<'a> {
    fn intersect_leaf(&mut self, ray: &mut Ray, leaf_indices: &[u32]) -> bool {
        let mut found = false;
        for &i in leaf_indices {
            if let Some(t) = self.spheres[i as usize].intersect(ray, ray.max_t) {
                ray.max_t = t;
                self.hit = Some((t, i));
                found = true;
            }
        }
        found
    }

    fn intersect_leaf_shadow(&mut self, ray: &Ray, max_t: f32, leaf_indices: &[u32]) -> bool {
        leaf_indices
            .iter()
            .any(|&i| self.spheres[i as usize].intersect(ray, max_t).is_some())
    }
}

/// A scene of diffuse spheres (one of which may carry a light) plus point
/// lights, backed by `vcmcore::bvh::Bvh` for traversal.
pub struct DemoScene {
    pub spheres: Vec<Sphere>,
    pub albedo: Color,
    pub lights: Vec<PointLight>,
    bvh: Bvh,
}

impl DemoScene {
    pub fn new(spheres: Vec<Sphere>, albedo: Color, lights: Vec<PointLight>) -> RenderResult<Self> {
        let bounds: Vec<BBox3f> = spheres.iter().map(Sphere::bound).collect();
        let bvh = bvh::builder::build(&bounds, &bvh::BuildParams::default())?;
        Ok(DemoScene { spheres, albedo, lights, bvh })
    }
}

impl Scene for DemoScene {
    type Bsdf = LambertBsdf;
    type Light = PointLight;

    fn traverse(&self, ray: Ray) -> Option<HitRecord> {
        let mut intersector = SphereIntersector { spheres: &self.spheres, hit: None };
        self.bvh.closest_hit(ray, &mut intersector);
        intersector.hit.map(|(t, i)| HitRecord {
            distance: t,
            object_id: i,
            sub_object_id: 0,
            uv: Vec2f::zero(),
        })
    }

    fn traverse_shadow(&self, ray: Ray, max_dist: f32) -> bool {
        let mut intersector = SphereIntersector { spheres: &self.spheres, hit: None };
        self.bvh.any_hit(&ray, max_dist, &mut intersector)
    }

    fn evaluate_intersection(&self, ray: Ray, hit: &HitRecord) -> ShadingPoint<LambertBsdf> {
        let sphere = &self.spheres[hit.object_id as usize];
        let p = ray.point_at(hit.distance);
        let n = (p - sphere.center).scale(1.0 / sphere.radius);
        let (s, t) = vcmcore::math::util::coord_system(n);
        ShadingPoint {
            p,
            n,
            s,
            t,
            wo: (-ray.dir).normalize(),
            bsdf: LambertBsdf { albedo: self.albedo, n, s, t },
        }
    }

    fn light_at_hit(&self, hit: &HitRecord) -> Option<&PointLight> {
        let _ = hit;
        None
    }

    fn lights(&self) -> &[PointLight] {
        &self.lights
    }

    fn global_lights(&self) -> &[PointLight] {
        &[]
    }
}
