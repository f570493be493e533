use crate::math::ray::Ray;
use crate::math::vector::Vec3;
use crate::math::wide::{Vec8f, Vec8i};

use num_traits::{Bounded, Float};

use std::ops::{Index, Sub};

/// Axis-aligned bounding box. Either `pmin <= pmax` componentwise, or it is
/// the empty sentinel (`pmin = +inf`, `pmax = -inf`) so that unioning the
/// empty box with anything yields that thing unchanged.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BBox3<T: PartialOrd + Bounded + Copy> {
    pub pmin: Vec3<T>,
    pub pmax: Vec3<T>,
}

pub type BBox3f = BBox3<f32>;

impl<T: PartialOrd + Bounded + Copy> BBox3<T> {
    pub fn empty() -> Self {
        BBox3 {
            pmin: Vec3 {
                x: T::max_value(),
                y: T::max_value(),
                z: T::max_value(),
            },
            pmax: Vec3 {
                x: T::min_value(),
                y: T::min_value(),
                z: T::min_value(),
            },
        }
    }

    pub fn from_pnts(pnt0: Vec3<T>, pnt1: Vec3<T>) -> Self {
        BBox3 {
            pmin: pnt0.min(pnt1),
            pmax: pnt0.max(pnt1),
        }
    }

    pub fn from_pnt(pnt: Vec3<T>) -> Self {
        BBox3 {
            pmin: pnt,
            pmax: pnt,
        }
    }

    pub fn combine_pnt(self, pnt: Vec3<T>) -> Self {
        BBox3 {
            pmin: self.pmin.min(pnt),
            pmax: self.pmax.max(pnt),
        }
    }

    pub fn combine_bnd(self, bnd: BBox3<T>) -> Self {
        BBox3 {
            pmin: self.pmin.min(bnd.pmin),
            pmax: self.pmax.max(bnd.pmax),
        }
    }

    pub fn is_empty(self) -> bool
    where
        T: PartialOrd,
    {
        self.pmin.x > self.pmax.x || self.pmin.y > self.pmax.y || self.pmin.z > self.pmax.z
    }
}

impl<T: Sub<Output = T> + PartialOrd + Bounded + Copy> BBox3<T> {
    pub fn diagonal(self) -> Vec3<T> {
        self.pmax - self.pmin
    }

    pub fn max_dim(self) -> usize {
        self.diagonal().max_dim()
    }
}

impl<T: Float + Bounded> BBox3<T> {
    pub fn surface_area(self) -> T {
        if self.is_empty() {
            return T::zero();
        }
        let d = self.diagonal();
        (T::one() + T::one()) * (d.x * d.y + d.x * d.z + d.y * d.z)
    }

    pub fn volume(self) -> T {
        if self.is_empty() {
            return T::zero();
        }
        let d = self.diagonal();
        d.x * d.y * d.z
    }

    pub fn centroid(self) -> Vec3<T> {
        let half = T::one() / (T::one() + T::one());
        (self.pmin + self.pmax).scale(half)
    }
}

impl<T: PartialOrd + Bounded + Copy> Index<usize> for BBox3<T> {
    type Output = Vec3<T>;

    fn index(&self, i: usize) -> &Vec3<T> {
        match i {
            0 => &self.pmin,
            1 => &self.pmax,
            _ => panic!("index out of range for BBox3"),
        }
    }
}

// Only f32 precision is needed for the ray-box intersection used by traversal.
impl BBox3<f32> {
    pub fn intersect(&self, ray: &Ray, max_t: f32) -> Option<(f32, f32)> {
        let mut t0 = 0.0f32;
        let mut t1 = max_t;

        for i in 0..3 {
            let inv_dir = 1.0 / ray.dir[i];
            let mut t_near = (self.pmin[i] - ray.org[i]) * inv_dir;
            let mut t_far = (self.pmax[i] - ray.org[i]) * inv_dir;
            if t_near > t_far {
                std::mem::swap(&mut t_near, &mut t_far);
            }

            t0 = if t_near > t0 { t_near } else { t0 };
            t1 = if t_far < t1 { t_far } else { t1 };

            if t0 > t1 {
                return None;
            }
        }

        Some((t0, t1))
    }

    pub fn intersect_test(&self, ray: &Ray, max_t: f32, inv_dir: Vec3<f32>, dir_is_neg: [bool; 3]) -> bool {
        let i_dir_neg = [
            dir_is_neg[0] as usize,
            dir_is_neg[1] as usize,
            dir_is_neg[2] as usize,
        ];

        let t_min = (self[i_dir_neg[0]].x - ray.org.x) * inv_dir.x;
        let t_max = (self[1 - i_dir_neg[0]].x - ray.org.x) * inv_dir.x;
        let ty_min = (self[i_dir_neg[1]].y - ray.org.y) * inv_dir.y;
        let ty_max = (self[1 - i_dir_neg[1]].y - ray.org.y) * inv_dir.y;

        if t_min > ty_max || ty_min > t_max {
            return false;
        }

        let t_min = if ty_min > t_min { ty_min } else { t_min };
        let t_max = if ty_max < t_max { ty_max } else { t_max };

        let tz_min = (self[i_dir_neg[2]].z - ray.org.z) * inv_dir.z;
        let tz_max = (self[1 - i_dir_neg[2]].z - ray.org.z) * inv_dir.z;

        if t_min > tz_max || tz_min > t_max {
            return false;
        }

        let t_min = if tz_min > t_min { tz_min } else { t_min };
        let t_max = if tz_max < t_max { tz_max } else { t_max };

        t_min < max_t && t_max > 0.0
    }

    /// Packet-wide slab test (§4.2 Packet mode, Component A): the same
    /// min/max slab walk as [`BBox3::intersect`], but run across all 8 rays'
    /// lanes at once via the wide types instead of once per ray. Returns a
    /// lane mask of which rays hit this node.
    pub fn intersect_packet8(&self, org: [Vec8f; 3], inv_dir: [Vec8f; 3], max_t: Vec8f) -> Vec8i {
        let mut t0 = Vec8f::splat(0.0);
        let mut t1 = max_t;

        for axis in 0..3 {
            let pmin = Vec8f::splat(self.pmin[axis]);
            let pmax = Vec8f::splat(self.pmax[axis]);
            let t_near = (pmin - org[axis]) * inv_dir[axis];
            let t_far = (pmax - org[axis]) * inv_dir[axis];
            let swapped = t_near.gt(t_far);
            let near = swapped.select(t_far, t_near);
            let far = swapped.select(t_near, t_far);

            t0 = t0.max(near);
            t1 = t1.min(far);
        }

        t0.le(t1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_union_yields_other() {
        let e = BBox3f::empty();
        let b = BBox3f::from_pnts(
            Vec3 { x: 0.0, y: 0.0, z: 0.0 },
            Vec3 { x: 1.0, y: 1.0, z: 1.0 },
        );
        assert_eq!(e.combine_bnd(b), b);
    }

    #[test]
    fn surface_area_of_unit_cube() {
        let b = BBox3f::from_pnts(
            Vec3 { x: 0.0, y: 0.0, z: 0.0 },
            Vec3 { x: 1.0, y: 1.0, z: 1.0 },
        );
        assert!((b.surface_area() - 6.0).abs() < 1e-6);
    }
}
