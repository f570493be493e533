//! The light sub-path's photon record and its spatial index (§3, §4.4).
//! Grounded on `VertexConnectionAndMerging.cpp`'s `BuildHashGrid`/range-query
//! functor dispatch for the algorithm shape; no teacher module covers this
//! (the teacher binds to Embree for all spatial queries), so the packed
//! array idiom is carried over from `bvh.rs`'s `LinearNode` layout instead.

use crate::math::vector::Vec3f;
use half::f16;

/// Oct-encodes a unit direction into two signed-normalized `u16`s (§3's
/// 32-byte photon budget — a plain `Vec3f` direction alone would already
/// spend 12 of those bytes).
fn signum_nonzero(v: f32) -> f32 {
    if v >= 0.0 {
        1.0
    } else {
        -1.0
    }
}

pub fn oct_encode(n: Vec3f) -> [u16; 2] {
    let inv_l1 = 1.0 / (n.x.abs() + n.y.abs() + n.z.abs());
    let (mut x, mut y) = (n.x * inv_l1, n.y * inv_l1);
    if n.z < 0.0 {
        let (ox, oy) = (x, y);
        x = (1.0 - oy.abs()) * signum_nonzero(ox);
        y = (1.0 - ox.abs()) * signum_nonzero(oy);
    }
    [snorm_encode(x), snorm_encode(y)]
}

pub fn oct_decode(e: [u16; 2]) -> Vec3f {
    let x = snorm_decode(e[0]);
    let y = snorm_decode(e[1]);
    let z = 1.0 - x.abs() - y.abs();
    let (mut x, mut y) = (x, y);
    if z < 0.0 {
        let (ox, oy) = (x, y);
        x = (1.0 - oy.abs()) * signum_nonzero(ox);
        y = (1.0 - ox.abs()) * signum_nonzero(oy);
    }
    Vec3f { x, y, z }.normalize()
}

fn snorm_encode(v: f32) -> u16 {
    let clamped = v.max(-1.0).min(1.0);
    ((clamped * 0.5 + 0.5) * u16::MAX as f32).round() as u16
}

fn snorm_decode(v: u16) -> f32 {
    (v as f32 / u16::MAX as f32) * 2.0 - 1.0
}

/// A light sub-path vertex recorded for merging (§3): position, oct-encoded
/// incoming direction, half-float throughput, and the two MIS accumulators
/// needed by the merge-time weight (§4.5.6).
#[derive(Clone, Copy, Debug)]
pub struct Photon {
    pub position: Vec3f,
    pub dir_oct: [u16; 2],
    pub throughput: [f16; 3],
    pub d_vcm: f32,
    pub d_vm: f32,
}

impl Photon {
    pub fn new(position: Vec3f, dir: Vec3f, throughput: crate::spectrum::Color, d_vcm: f32, d_vm: f32) -> Self {
        Photon {
            position,
            dir_oct: oct_encode(dir),
            throughput: [
                f16::from_f32(throughput.r),
                f16::from_f32(throughput.g),
                f16::from_f32(throughput.b),
            ],
            d_vcm,
            d_vm,
        }
    }

    pub fn direction(&self) -> Vec3f {
        oct_decode(self.dir_oct)
    }

    pub fn throughput_color(&self) -> crate::spectrum::Color {
        crate::spectrum::Color {
            r: self.throughput[0].to_f32(),
            g: self.throughput[1].to_f32(),
            b: self.throughput[2].to_f32(),
        }
    }
}

fn cell_coord(p: Vec3f, cell_size: f32) -> (i32, i32, i32) {
    (
        (p.x / cell_size).floor() as i32,
        (p.y / cell_size).floor() as i32,
        (p.z / cell_size).floor() as i32,
    )
}

fn hash_cell(c: (i32, i32, i32), num_cells: usize) -> usize {
    // Large odd primes, as used for spatial hashing of photon maps.
    let h = (c.0 as i64).wrapping_mul(73_856_093)
        ^ (c.1 as i64).wrapping_mul(19_349_663)
        ^ (c.2 as i64).wrapping_mul(83_492_791);
    (h.rem_euclid(num_cells as i64)) as usize
}

/// Uniform hash grid over a frozen array of photons (§4.4): built once per
/// pass with cell size `2r`, queried with the standard 27-neighboring-cell
/// pattern.
pub struct HashGrid {
    cell_size: f32,
    num_cells: usize,
    /// Prefix-sum bucket starts, length `num_cells + 1` (counting-sort
    /// build, avoiding a `Vec<Vec<u32>>` of per-cell buckets).
    cell_starts: Vec<u32>,
    /// Photon indices, grouped by cell in `cell_starts` order.
    indices: Vec<u32>,
}

impl HashGrid {
    /// Builds the grid over `photons` with cell size `2 * radius` (§4.4).
    pub fn build(photons: &[Photon], radius: f32) -> Self {
        let cell_size = 2.0 * radius.max(1e-8);
        let num_cells = (photons.len().max(1) * 2).next_power_of_two();

        let mut counts = vec![0u32; num_cells + 1];
        let cells: Vec<usize> = photons
            .iter()
            .map(|p| hash_cell(cell_coord(p.position, cell_size), num_cells))
            .collect();
        for &c in &cells {
            counts[c + 1] += 1;
        }
        for i in 0..num_cells {
            counts[i + 1] += counts[i];
        }

        let mut cursor = counts.clone();
        let mut indices = vec![0u32; photons.len()];
        for (i, &c) in cells.iter().enumerate() {
            indices[cursor[c] as usize] = i as u32;
            cursor[c] += 1;
        }

        HashGrid {
            cell_size,
            num_cells,
            cell_starts: counts,
            indices,
        }
    }

    fn cell_indices(&self, cell: (i32, i32, i32)) -> &[u32] {
        let h = hash_cell(cell, self.num_cells);
        let start = self.cell_starts[h] as usize;
        let end = self.cell_starts[h + 1] as usize;
        &self.indices[start..end]
    }

    /// Invokes `visit` for every photon in the 27 cells surrounding
    /// `position` (§4.4); callers filter by the actual merge radius
    /// themselves since the cell grid only bounds candidates coarsely.
    pub fn query<'a>(&self, photons: &'a [Photon], position: Vec3f, mut visit: impl FnMut(&'a Photon, u32)) {
        let center = cell_coord(position, self.cell_size);
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let cell = (center.0 + dx, center.1 + dy, center.2 + dz);
                    for &idx in self.cell_indices(cell) {
                        visit(&photons[idx as usize], idx);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectrum::Color;

    #[test]
    fn oct_encode_decode_round_trips_axis_aligned() {
        for d in [
            Vec3f { x: 1.0, y: 0.0, z: 0.0 },
            Vec3f { x: 0.0, y: 1.0, z: 0.0 },
            Vec3f { x: 0.0, y: 0.0, z: 1.0 },
            Vec3f { x: 0.0, y: 0.0, z: -1.0 },
        ] {
            let decoded = oct_decode(oct_encode(d));
            assert!((decoded.dot(d) - 1.0).abs() < 0.01, "{:?} -> {:?}", d, decoded);
        }
    }

    #[test]
    fn query_finds_nearby_photon_and_skips_far_one() {
        let photons = vec![
            Photon::new(Vec3f { x: 0.0, y: 0.0, z: 0.0 }, Vec3f { x: 0.0, y: 1.0, z: 0.0 }, Color::white(), 0.0, 0.0),
            Photon::new(Vec3f { x: 50.0, y: 50.0, z: 50.0 }, Vec3f { x: 0.0, y: 1.0, z: 0.0 }, Color::white(), 0.0, 0.0),
        ];
        let grid = HashGrid::build(&photons, 0.5);

        let mut found = Vec::new();
        grid.query(&photons, Vec3f { x: 0.05, y: 0.0, z: 0.0 }, |_p, idx| found.push(idx));
        assert!(found.contains(&0));
        assert!(!found.contains(&1));
    }

    #[test]
    fn empty_photon_set_builds_and_queries_cleanly() {
        let photons: Vec<Photon> = Vec::new();
        let grid = HashGrid::build(&photons, 0.1);
        let mut count = 0;
        grid.query(&photons, Vec3f::zero(), |_p, _i| count += 1);
        assert_eq!(count, 0);
    }
}
