use crate::bvh::{BuildParams, Bvh, Heuristic, Node, MAX_BVH_DEPTH};
use crate::error::{RenderError, RenderResult};
use crate::math::bbox::BBox3f;
use crate::math::vector::Vec3f;

fn cost_metric(b: BBox3f, heuristic: Heuristic) -> f32 {
    match heuristic {
        Heuristic::SurfaceArea => b.surface_area(),
        Heuristic::Volume => b.volume(),
    }
}

struct BuildCtx<'a> {
    leaf_bounds: &'a [BBox3f],
    params: &'a BuildParams,
    nodes: Vec<Node>,
    permutation: Vec<u32>,
    left_scratch: Vec<BBox3f>,
    right_scratch: Vec<BBox3f>,
}

/// Builds a BVH from an immutable array of leaf AABBs (§4.1). `n == 0`
/// returns an empty tree, reported as success. Returns
/// [`RenderError::InvariantViolation`] if the built tree's leaf count doesn't
/// match `n` (§7) — unreachable absent a bug in this function, but surfaced
/// rather than silently trusted.
pub fn build(leaf_bounds: &[BBox3f], params: &BuildParams) -> RenderResult<Bvh> {
    let n = leaf_bounds.len();
    if n == 0 {
        return Ok(Bvh {
            nodes: Vec::new(),
            permutation: Vec::new(),
            bound: BBox3f::empty(),
        });
    }

    let centroids: Vec<Vec3f> = leaf_bounds.iter().map(|b| b.centroid()).collect();

    let mut ctx = BuildCtx {
        leaf_bounds,
        params,
        nodes: Vec::with_capacity(2 * n),
        permutation: Vec::with_capacity(n),
        left_scratch: vec![BBox3f::empty(); n],
        right_scratch: vec![BBox3f::empty(); n],
    };

    let all_indices: Vec<u32> = (0..n as u32).collect();
    let orderings = [
        sort_by_axis(&all_indices, &centroids, 0),
        sort_by_axis(&all_indices, &centroids, 1),
        sort_by_axis(&all_indices, &centroids, 2),
    ];

    let (_, bound) = build_node(&mut ctx, orderings, 0);
    ctx.nodes.shrink_to_fit();

    if ctx.permutation.len() != n {
        return Err(RenderError::InvariantViolation(format!(
            "bvh builder produced {} leaf references for {} input primitives",
            ctx.permutation.len(),
            n
        )));
    }

    Ok(Bvh {
        nodes: ctx.nodes,
        permutation: ctx.permutation,
        bound,
    })
}

fn sort_by_axis(indices: &[u32], centroids: &[Vec3f], axis: usize) -> Vec<u32> {
    let mut sorted = indices.to_vec();
    sorted.sort_by(|&a, &b| {
        centroids[a as usize][axis]
            .partial_cmp(&centroids[b as usize][axis])
            .unwrap()
    });
    sorted
}

/// Emits one node (leaf or interior), returning its index in the packed
/// array and the AABB enclosing it. `orderings` holds the current work
/// set's leaf indices pre-sorted along each of the three axes (§3's
/// "Work set").
fn build_node(ctx: &mut BuildCtx, orderings: [Vec<u32>; 3], depth: u32) -> (usize, BBox3f) {
    let m = orderings[0].len();
    let all_bound = orderings[0]
        .iter()
        .fold(BBox3f::empty(), |b, &i| b.combine_bnd(ctx.leaf_bounds[i as usize]));

    if m <= ctx.params.max_leaf_size || depth as usize >= MAX_BVH_DEPTH {
        return emit_leaf(ctx, &orderings[0], all_bound);
    }

    // SAH sweep (§4.1 step 3): two-pass prefix/suffix AABB accumulation per
    // axis into the shared scratch arrays, reused across the recursion.
    let mut best_axis = 0usize;
    let mut best_k = 0usize;
    let mut best_cost = f32::INFINITY;

    for axis in 0..3 {
        let order = &orderings[axis];

        let mut running = BBox3f::empty();
        for (i, &leaf) in order.iter().enumerate() {
            running = running.combine_bnd(ctx.leaf_bounds[leaf as usize]);
            ctx.left_scratch[i] = running;
        }
        let mut running = BBox3f::empty();
        for (i, &leaf) in order.iter().enumerate().rev() {
            running = running.combine_bnd(ctx.leaf_bounds[leaf as usize]);
            ctx.right_scratch[i] = running;
        }

        for k in 0..(m - 1) {
            let c_left = cost_metric(ctx.left_scratch[k], ctx.params.heuristic);
            let c_right = cost_metric(ctx.right_scratch[k + 1], ctx.params.heuristic);
            let cost = c_left * (k + 1) as f32 + c_right * (m - k - 1) as f32;
            // Ties break by lexicographic (axis, k) order; since axis 0 is
            // swept first, a strict `<` naturally keeps the earliest axis.
            if cost < best_cost {
                best_cost = cost;
                best_axis = axis;
                best_k = k;
            }
        }
    }

    // Left/right membership, derived from the chosen axis's own sorted
    // order (a plain slice). The other two axes are re-derived with a
    // stable filter rather than a fresh sort, preserving their sortedness
    // for the children without paying for another O(m log m) pass (§4.1
    // step 2's "amortizes sorting cost across recursion").
    let split_order = orderings[best_axis].clone();
    let left_count = best_k + 1;
    let mut is_left = vec![false; ctx.leaf_bounds.len()];
    for &leaf in &split_order[..left_count] {
        is_left[leaf as usize] = true;
    }

    let mut left_orderings: [Vec<u32>; 3] = Default::default();
    let mut right_orderings: [Vec<u32>; 3] = Default::default();
    for axis in 0..3 {
        let order = &orderings[axis];
        let (l, r): (Vec<u32>, Vec<u32>) = order.iter().partition(|&&leaf| is_left[leaf as usize]);
        left_orderings[axis] = l;
        right_orderings[axis] = r;
    }

    let curr_index = ctx.nodes.len();
    ctx.nodes.push(Node {
        bound: all_bound,
        child_index: 0,
        num_leaves: 0,
        split_axis: best_axis as u8,
    });

    let (left_index, _) = build_node(ctx, left_orderings, depth + 1);
    debug_assert_eq!(left_index, curr_index + 1);
    let (right_index, _) = build_node(ctx, right_orderings, depth + 1);

    ctx.nodes[curr_index].child_index = right_index as u32;

    (curr_index, all_bound)
}

fn emit_leaf(ctx: &mut BuildCtx, order: &[u32], bound: BBox3f) -> (usize, BBox3f) {
    let start = ctx.permutation.len() as u32;
    ctx.permutation.extend_from_slice(order);
    let index = ctx.nodes.len();
    ctx.nodes.push(Node {
        bound,
        child_index: start,
        num_leaves: order.len() as u8,
        split_axis: 0,
    });
    (index, bound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::vector::Vec3f;

    fn cube(cx: f32, cy: f32, cz: f32) -> BBox3f {
        let c = Vec3f { x: cx, y: cy, z: cz };
        BBox3f::from_pnts(c - Vec3f { x: 0.1, y: 0.1, z: 0.1 }, c + Vec3f { x: 0.1, y: 0.1, z: 0.1 })
    }

    #[test]
    fn empty_input_yields_empty_tree() {
        let bvh = build(&[], &BuildParams::default()).unwrap();
        assert_eq!(bvh.num_nodes(), 0);
        assert!(bvh.permutation().is_empty());
    }

    #[test]
    fn leaf_count_and_permutation_are_consistent() {
        let bounds: Vec<BBox3f> = (0..17)
            .map(|i| cube(i as f32 * 0.5, 0.0, 0.0))
            .collect();
        let bvh = build(&bounds, &BuildParams { max_leaf_size: 2, heuristic: Heuristic::SurfaceArea }).unwrap();

        let mut seen = vec![false; bounds.len()];
        let mut total_leaves = 0usize;
        for node in bvh.nodes() {
            if node.is_leaf() {
                total_leaves += node.num_leaves as usize;
                let start = node.child_index as usize;
                for &p in &bvh.permutation()[start..start + node.num_leaves as usize] {
                    assert!(!seen[p as usize], "duplicate leaf reference");
                    seen[p as usize] = true;
                }
            }
        }
        assert_eq!(total_leaves, bounds.len());
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn root_split_on_two_well_separated_clusters() {
        // Two clusters of two, well separated along X (§8's SAH split test case).
        let bounds = vec![cube(0.0, 0.0, 0.0), cube(0.1, 0.0, 0.0), cube(100.0, 0.0, 0.0), cube(100.1, 0.0, 0.0)];
        let bvh = build(&bounds, &BuildParams { max_leaf_size: 1, heuristic: Heuristic::SurfaceArea }).unwrap();
        let root = bvh.nodes()[0];
        assert!(!root.is_leaf());
        assert_eq!(root.split_axis, 0);
    }

    #[test]
    fn inner_node_bound_encloses_children() {
        let bounds: Vec<BBox3f> = (0..9).map(|i| cube(i as f32, (i % 3) as f32, 0.0)).collect();
        let bvh = build(&bounds, &BuildParams { max_leaf_size: 1, heuristic: Heuristic::SurfaceArea }).unwrap();
        for i in 0..bvh.nodes().len() {
            let node = bvh.nodes()[i];
            if !node.is_leaf() {
                let left = bvh.nodes()[i + 1];
                let right = bvh.nodes()[node.child_index as usize];
                let union = left.bound.combine_bnd(right.bound);
                assert!(node.bound.pmin.x <= union.pmin.x + 1e-5);
                assert!(node.bound.pmax.x >= union.pmax.x - 1e-5);
            }
        }
    }
}
