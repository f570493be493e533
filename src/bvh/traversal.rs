use crate::bvh::Bvh;
use crate::math::ray::Ray;
use crate::math::wide::Vec8f;
use arrayvec::ArrayVec;

use super::MAX_BVH_DEPTH;

fn vec8f_from_lanes(mut f: impl FnMut(usize) -> f32) -> Vec8f {
    Vec8f::from_array([f(0), f(1), f(2), f(3), f(4), f(5), f(6), f(7)])
}

/// Primitive-level intersection, supplied by the caller so the BVH never
/// interprets geometry itself (§1, §6): `leaf_indices` are original
/// primitive indices (already resolved through the permutation array).
pub trait LeafIntersector {
    /// Tests the leaf's primitives against `ray`, narrowing `ray.max_t` and
    /// returning the closest hit distance found, if any.
    fn intersect_leaf(&mut self, ray: &mut Ray, leaf_indices: &[u32]) -> bool;

    /// Early-terminating shadow test: `true` as soon as any primitive in the
    /// leaf blocks within `max_t`.
    fn intersect_leaf_shadow(&mut self, ray: &Ray, max_t: f32, leaf_indices: &[u32]) -> bool;
}

impl Bvh {
    /// Ordered depth-first closest-hit traversal (§4.2): at each inner node,
    /// the near child (by `split_axis` + ray-direction sign) is visited
    /// first and the far child is pushed only if its box can still beat the
    /// ray's current `max_t`.
    pub fn closest_hit<I: LeafIntersector>(&self, mut ray: Ray, intersector: &mut I) -> bool {
        if self.is_empty() {
            return false;
        }

        let dir_is_neg = ray.dir_is_neg();
        let mut stack: ArrayVec<[u32; MAX_BVH_DEPTH]> = ArrayVec::new();
        let mut hit_anything = false;
        let mut node_index = 0u32;

        loop {
            let node = self.nodes[node_index as usize];
            if node.bound.intersect(&ray, ray.max_t).is_some() {
                if node.is_leaf() {
                    let start = node.child_index as usize;
                    let leaves = &self.permutation[start..start + node.num_leaves as usize];
                    if intersector.intersect_leaf(&mut ray, leaves) {
                        hit_anything = true;
                    }
                } else {
                    let (near, far) = if dir_is_neg[node.split_axis as usize] {
                        (node.child_index, node_index + 1)
                    } else {
                        (node_index + 1, node.child_index)
                    };
                    stack.push(far);
                    node_index = near;
                    continue;
                }
            }

            match stack.pop() {
                Some(next) => node_index = next,
                None => break,
            }
        }

        hit_anything
    }

    /// Any-hit / shadow traversal (§4.2): returns as soon as any leaf blocks
    /// within `max_dist`, without ordering near/far children.
    pub fn any_hit<I: LeafIntersector>(&self, ray: &Ray, max_dist: f32, intersector: &mut I) -> bool {
        if self.is_empty() {
            return false;
        }

        let mut stack: ArrayVec<[u32; MAX_BVH_DEPTH]> = ArrayVec::new();
        stack.push(0);

        while let Some(node_index) = stack.pop() {
            let node = self.nodes[node_index as usize];
            if node.bound.intersect(ray, max_dist).is_none() {
                continue;
            }
            if node.is_leaf() {
                let start = node.child_index as usize;
                let leaves = &self.permutation[start..start + node.num_leaves as usize];
                if intersector.intersect_leaf_shadow(ray, max_dist, leaves) {
                    return true;
                }
            } else {
                stack.push(node_index + 1);
                stack.push(node.child_index);
            }
        }

        false
    }

    /// Packet traversal over up to 8 coherent rays (§4.2, Component A): a
    /// single shared tree walk where each node's box is tested against all 8
    /// rays at once with the wide vector types, instead of 8 independent
    /// scalar walks. Nodes whose box misses every ray in the packet are
    /// skipped for the whole packet in one test. Children aren't reordered
    /// by per-ray near/far, since a packet's rays can disagree on direction
    /// sign per axis; leaf intersection is necessarily per-ray, since
    /// `LeafIntersector` is a scalar, caller-supplied contract (§1, §6).
    pub fn closest_hit_packet<I: LeafIntersector>(&self, rays: &mut [Ray; 8], intersector: &mut I) -> [bool; 8] {
        let mut hits = [false; 8];
        if self.is_empty() {
            return hits;
        }

        let mut org = [Vec8f::splat(0.0); 3];
        let mut inv_dir = [Vec8f::splat(0.0); 3];
        for axis in 0..3 {
            org[axis] = vec8f_from_lanes(|lane| rays[lane].org[axis]);
            inv_dir[axis] = vec8f_from_lanes(|lane| 1.0 / rays[lane].dir[axis]);
        }

        let mut stack: ArrayVec<[u32; MAX_BVH_DEPTH]> = ArrayVec::new();
        stack.push(0);

        while let Some(node_index) = stack.pop() {
            let node = self.nodes[node_index as usize];
            let max_t = vec8f_from_lanes(|lane| rays[lane].max_t);
            let mask = node.bound.intersect_packet8(org, inv_dir, max_t);
            if !mask.any_true() {
                continue;
            }

            if node.is_leaf() {
                let start = node.child_index as usize;
                let leaves = &self.permutation[start..start + node.num_leaves as usize];
                for lane in 0..8 {
                    if mask.lane_true(lane) && intersector.intersect_leaf(&mut rays[lane], leaves) {
                        hits[lane] = true;
                    }
                }
            } else {
                stack.push(node_index + 1);
                stack.push(node.child_index);
            }
        }

        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bvh::builder::build;
    use crate::bvh::BuildParams;
    use crate::math::bbox::BBox3f;
    use crate::math::vector::Vec3f;

    struct BruteForce<'a> {
        bounds: &'a [BBox3f],
        hit_index: Option<u32>,
    }

    impl<'a> LeafIntersector for BruteForce<'a> {
        fn intersect_leaf(&mut self, ray: &mut Ray, leaf_indices: &[u32]) -> bool {
            let mut found = false;
            for &i in leaf_indices {
                if let Some((t0, _)) = self.bounds[i as usize].intersect(ray, ray.max_t) {
                    if t0 < ray.max_t {
                        ray.max_t = t0;
                        self.hit_index = Some(i);
                        found = true;
                    }
                }
            }
            found
        }

        fn intersect_leaf_shadow(&mut self, ray: &Ray, max_t: f32, leaf_indices: &[u32]) -> bool {
            leaf_indices
                .iter()
                .any(|&i| self.bounds[i as usize].intersect(ray, max_t).is_some())
        }
    }

    fn cube(cx: f32, cy: f32, cz: f32) -> BBox3f {
        let c = Vec3f { x: cx, y: cy, z: cz };
        let h = Vec3f { x: 0.1, y: 0.1, z: 0.1 };
        BBox3f::from_pnts(c - h, c + h)
    }

    #[test]
    fn closest_hit_finds_nearest_cube() {
        let bounds = vec![cube(0.0, 0.0, 5.0), cube(0.0, 0.0, 10.0), cube(0.0, 0.0, 15.0)];
        let bvh = build(&bounds, &BuildParams { max_leaf_size: 1, heuristic: crate::bvh::Heuristic::SurfaceArea }).unwrap();

        let ray = Ray::new(Vec3f { x: 0.0, y: 0.0, z: 0.0 }, Vec3f { x: 0.0, y: 0.0, z: 1.0 });
        let mut intersector = BruteForce { bounds: &bounds, hit_index: None };
        let hit = bvh.closest_hit(ray, &mut intersector);
        assert!(hit);
        assert_eq!(intersector.hit_index, Some(0));
    }

    #[test]
    fn any_hit_misses_when_ray_points_away() {
        let bounds = vec![cube(0.0, 0.0, 5.0)];
        let bvh = build(&bounds, &BuildParams::default()).unwrap();
        let ray = Ray::new(Vec3f { x: 0.0, y: 0.0, z: 0.0 }, Vec3f { x: 0.0, y: 0.0, z: -1.0 });
        let mut intersector = BruteForce { bounds: &bounds, hit_index: None };
        assert!(!bvh.any_hit(&ray, f32::INFINITY, &mut intersector));
    }

    #[test]
    fn large_random_set_matches_brute_force() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand_pcg::Pcg32::seed_from_u64(7);
        let bounds: Vec<BBox3f> = (0..2000)
            .map(|_| {
                cube(
                    rng.gen_range(-50.0..50.0),
                    rng.gen_range(-50.0..50.0),
                    rng.gen_range(-50.0..50.0),
                )
            })
            .collect();
        let bvh = build(&bounds, &BuildParams::default()).unwrap();

        for _ in 0..20 {
            let org = Vec3f {
                x: rng.gen_range(-60.0..60.0),
                y: rng.gen_range(-60.0..60.0),
                z: -100.0,
            };
            let ray = Ray::new(org, Vec3f { x: 0.0, y: 0.0, z: 1.0 });

            let mut brute_best: Option<(f32, u32)> = None;
            for (i, b) in bounds.iter().enumerate() {
                if let Some((t0, _)) = b.intersect(&ray, f32::INFINITY) {
                    if brute_best.map_or(true, |(bt, _)| t0 < bt) {
                        brute_best = Some((t0, i as u32));
                    }
                }
            }

            let mut intersector = BruteForce { bounds: &bounds, hit_index: None };
            let hit = bvh.closest_hit(ray, &mut intersector);
            assert_eq!(hit, brute_best.is_some());
            if let Some((_, expected)) = brute_best {
                assert_eq!(intersector.hit_index, Some(expected));
            }
        }
    }

    #[test]
    fn closest_hit_packet_matches_per_ray_closest_hit() {
        let bounds = vec![cube(0.0, 0.0, 5.0), cube(0.0, 0.0, 10.0), cube(3.0, 3.0, 5.0)];
        let bvh = build(&bounds, &BuildParams { max_leaf_size: 1, heuristic: crate::bvh::Heuristic::SurfaceArea }).unwrap();

        let mut rays = [Ray::new(Vec3f { x: 0.0, y: 0.0, z: 0.0 }, Vec3f { x: 0.0, y: 0.0, z: 1.0 }); 8];
        rays[1] = Ray::new(Vec3f { x: 3.0, y: 3.0, z: 0.0 }, Vec3f { x: 0.0, y: 0.0, z: 1.0 });
        rays[2] = Ray::new(Vec3f { x: 50.0, y: 50.0, z: 0.0 }, Vec3f { x: 0.0, y: 0.0, z: 1.0 });

        let mut expected = [false; 8];
        for (lane, ray) in rays.iter().enumerate() {
            let mut intersector = BruteForce { bounds: &bounds, hit_index: None };
            expected[lane] = bvh.closest_hit(*ray, &mut intersector);
        }

        let mut intersector = BruteForce { bounds: &bounds, hit_index: None };
        let hits = bvh.closest_hit_packet(&mut rays, &mut intersector);
        assert_eq!(hits, expected);
    }
}
