//! Light sub-path vertex storage (§3, §4.5): recorded for later connection
//! to a camera vertex (§4.5.5) and for photon merging (§4.5.6).

use crate::math::vector::Vec3f;
use crate::spectrum::Color;

/// A non-specular vertex on a light sub-path, kept around for the duration
/// of one pass so camera sub-paths can connect to it.
#[derive(Clone)]
pub struct LightVertex<B> {
    pub pos: Vec3f,
    /// Direction back toward the previous sub-path vertex (the `wo` a BSDF
    /// evaluation at this vertex needs).
    pub wo: Vec3f,
    pub normal: Vec3f,
    pub bsdf: B,
    pub throughput: Color,
    pub d_vcm: f32,
    pub d_vc: f32,
    pub d_vm: f32,
    /// Sub-path length up to and including this vertex (the light origin is
    /// length 0).
    pub path_length: u32,
}
