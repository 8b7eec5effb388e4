//! Bounding volume hierarchy over triangles.
//!
//! Flat-array layout: every node lives in one contiguous `Vec`, children
//! of an interior node are adjacent, and traversal runs on an explicit
//! stack. The BVH owns a private, reordered copy of its primitives, so
//! rebuilding never invalidates anything outside the structure.

use lumen_math::{Aabb, Interval, Ray};

use crate::Triangle;

/// Maximum split recursion. Past this the node stays a leaf.
const MAX_DEPTH: u32 = 20;

/// Nodes with this many primitives or fewer are not split further.
const LEAF_MAX_SIZE: u32 = 2;

/// Traversal stack capacity. Twice the build depth plus slack; the build
/// never produces a tree that needs more.
const STACK_SIZE: usize = 64;

/// One node of the flat tree.
///
/// `count > 0` marks a leaf over primitives `[first_or_child,
/// first_or_child + count)` of the owned array. `count == 0` marks an
/// interior node whose children sit at `first_or_child` and
/// `first_or_child + 1`.
#[derive(Debug, Clone, Copy)]
struct BvhNode {
    bounds: Aabb,
    first_or_child: u32,
    count: u32,
}

// Two nodes per cache line; traversal throughput depends on it.
const _: () = assert!(std::mem::size_of::<BvhNode>() == 32);

impl BvhNode {
    #[inline]
    fn is_leaf(&self) -> bool {
        self.count > 0
    }
}

/// Binary BVH built by spatial-midpoint splits.
#[derive(Debug, Clone)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    primitives: Vec<Triangle>,
}

impl Bvh {
    /// Build over a copy of `primitives`. The copy is reordered in place
    /// during partitioning; leaf nodes index into it by range.
    pub fn build(primitives: &[Triangle]) -> Self {
        let mut bvh = Bvh {
            nodes: Vec::new(),
            primitives: primitives.to_vec(),
        };
        if bvh.primitives.is_empty() {
            return bvh;
        }

        let mut root_bounds = Aabb::EMPTY;
        for tri in &bvh.primitives {
            root_bounds.grow_aabb(&tri.bounds());
        }
        bvh.nodes.push(BvhNode {
            bounds: root_bounds,
            first_or_child: 0,
            count: bvh.primitives.len() as u32,
        });
        let max_depth = bvh.subdivide(0, 0);

        log::debug!(
            "bvh built: {} triangles, {} nodes, {} leaves, max depth {}",
            bvh.primitives.len(),
            bvh.nodes.len(),
            bvh.nodes.iter().filter(|n| n.is_leaf()).count(),
            max_depth
        );
        bvh
    }

    /// Bounds of the whole structure. Empty box for an empty BVH.
    pub fn bounds(&self) -> Aabb {
        self.nodes.first().map(|n| n.bounds).unwrap_or(Aabb::EMPTY)
    }

    /// The owned primitive array, in traversal order.
    pub fn primitives(&self) -> &[Triangle] {
        &self.primitives
    }

    /// Mutable access for in-place edits (node translation). The caller
    /// must follow up with [`Bvh::build`] on the edited set; node bounds
    /// are not adjusted here.
    pub fn primitives_mut(&mut self) -> &mut [Triangle] {
        &mut self.primitives
    }

    /// Split the node if it qualifies. Returns the deepest level
    /// reached beneath it.
    fn subdivide(&mut self, node_idx: usize, depth: u32) -> u32 {
        let node = self.nodes[node_idx];
        if depth > MAX_DEPTH || node.count <= LEAF_MAX_SIZE {
            return depth;
        }

        // Widest axis, split at the spatial midpoint.
        let extent = node.bounds.size();
        let axis = node.bounds.longest_axis();
        let split_pos = node.bounds.min[axis] + extent[axis] * 0.5;

        let first = node.first_or_child as usize;
        let count = node.count as usize;
        let left_count = partition_by_centroid(
            &mut self.primitives[first..first + count],
            axis,
            split_pos,
        );

        // One-sided split: keep the node as a leaf.
        if left_count == 0 || left_count == count {
            return depth;
        }

        let left_node = self.make_node(first, left_count);
        let right_node = self.make_node(first + left_count, count - left_count);
        let left_idx = self.nodes.len();
        self.nodes.push(left_node);
        self.nodes.push(right_node);

        let parent = &mut self.nodes[node_idx];
        parent.first_or_child = left_idx as u32;
        parent.count = 0;

        let left_depth = self.subdivide(left_idx, depth + 1);
        let right_depth = self.subdivide(left_idx + 1, depth + 1);
        left_depth.max(right_depth)
    }

    /// Leaf node over `[first, first + count)` with recomputed bounds.
    fn make_node(&self, first: usize, count: usize) -> BvhNode {
        let mut bounds = Aabb::EMPTY;
        for tri in &self.primitives[first..first + count] {
            bounds.grow_aabb(&tri.bounds());
        }
        BvhNode {
            bounds,
            first_or_child: first as u32,
            count: count as u32,
        }
    }

    /// Closest hit within the window, or `None`.
    ///
    /// Interior nodes push both children; the AABB test against the
    /// shrinking upper bound prunes subtrees that cannot beat the best
    /// hit found so far.
    pub fn intersect(&self, ray: &Ray, t: Interval) -> Option<(f32, &Triangle)> {
        if self.nodes.is_empty() {
            return None;
        }

        let mut closest = t.max;
        let mut hit: Option<&Triangle> = None;

        let mut stack = [0u32; STACK_SIZE];
        let mut top = 0usize;
        stack[top] = 0;
        top += 1;

        while top > 0 {
            top -= 1;
            let node = &self.nodes[stack[top] as usize];

            if node.bounds.hit(ray, Interval::new(t.min, closest)).is_none() {
                continue;
            }

            if node.is_leaf() {
                let first = node.first_or_child as usize;
                for tri in &self.primitives[first..first + node.count as usize] {
                    if let Some(t_hit) = tri.intersect(ray, Interval::new(t.min, closest)) {
                        if t_hit < closest {
                            closest = t_hit;
                            hit = Some(tri);
                        }
                    }
                }
            } else {
                stack[top] = node.first_or_child;
                stack[top + 1] = node.first_or_child + 1;
                top += 2;
            }
        }

        hit.map(|tri| (closest, tri))
    }
}

/// In-place partition by `centroid[axis] < split_pos`. Returns the size
/// of the left side.
fn partition_by_centroid(primitives: &mut [Triangle], axis: usize, split_pos: f32) -> usize {
    let mut left = 0usize;
    for i in 0..primitives.len() {
        if primitives[i].centroid()[axis] < split_pos {
            primitives.swap(i, left);
            left += 1;
        }
    }
    left
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_math::Vec3;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Brute force reference: test every triangle.
    fn brute_force(tris: &[Triangle], ray: &Ray, t: Interval) -> Option<f32> {
        let mut closest = t.max;
        let mut any = false;
        for tri in tris {
            if let Some(t_hit) = tri.intersect(ray, Interval::new(t.min, closest)) {
                if t_hit < closest {
                    closest = t_hit;
                    any = true;
                }
            }
        }
        any.then_some(closest)
    }

    fn random_triangles(rng: &mut StdRng, n: usize) -> Vec<Triangle> {
        (0..n)
            .map(|_| {
                let base = Vec3::new(
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                    rng.gen_range(-10.0..10.0),
                );
                let e1 = Vec3::new(rng.gen(), rng.gen(), rng.gen()) * 2.0 - Vec3::ONE;
                let e2 = Vec3::new(rng.gen(), rng.gen(), rng.gen()) * 2.0 - Vec3::ONE;
                Triangle::new(base, base + e1, base + e2, 0)
            })
            .collect()
    }

    #[test]
    fn test_empty_bvh_misses() {
        let bvh = Bvh::build(&[]);
        let ray = Ray::new(Vec3::ZERO, Vec3::Z);
        assert!(bvh.intersect(&ray, Interval::new(0.0, 1e4)).is_none());
    }

    #[test]
    fn test_single_triangle() {
        let tri = Triangle::new(
            Vec3::new(-1.0, -1.0, -3.0),
            Vec3::new(1.0, -1.0, -3.0),
            Vec3::new(0.0, 1.0, -3.0),
            0,
        );
        let bvh = Bvh::build(&[tri]);
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        let (t, _) = bvh.intersect(&ray, Interval::new(0.001, 1e4)).unwrap();
        assert!((t - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_leaf_bounds_enclose_primitives() {
        let mut rng = StdRng::seed_from_u64(7);
        let bvh = Bvh::build(&random_triangles(&mut rng, 500));

        for node in &bvh.nodes {
            if !node.is_leaf() {
                continue;
            }
            let first = node.first_or_child as usize;
            for tri in &bvh.primitives[first..first + node.count as usize] {
                for v in [tri.a, tri.b, tri.c] {
                    for i in 0..3 {
                        assert!(node.bounds.min[i] <= v[i] + 1e-5);
                        assert!(v[i] <= node.bounds.max[i] + 1e-5);
                    }
                }
            }
        }
    }

    #[test]
    fn test_matches_brute_force_on_random_scene() {
        let mut rng = StdRng::seed_from_u64(42);
        let tris = random_triangles(&mut rng, 1000);
        let bvh = Bvh::build(&tris);

        let window = Interval::new(0.001, 1e4);
        for _ in 0..10_000 {
            let origin = Vec3::new(
                rng.gen_range(-15.0..15.0),
                rng.gen_range(-15.0..15.0),
                rng.gen_range(-15.0..15.0),
            );
            let dir = loop {
                let d = Vec3::new(rng.gen(), rng.gen(), rng.gen()) * 2.0 - Vec3::ONE;
                if d.length_squared() > 1e-6 {
                    break d.normalize();
                }
            };
            let ray = Ray::new(origin, dir);

            let expected = brute_force(&tris, &ray, window);
            let got = bvh.intersect(&ray, window).map(|(t, _)| t);
            match (expected, got) {
                (None, None) => {}
                (Some(a), Some(b)) => assert!((a - b).abs() < 1e-4, "t mismatch: {a} vs {b}"),
                other => panic!("hit/miss disagreement: {other:?}"),
            }
        }
    }

    fn unit_cube(center: Vec3) -> Vec<Triangle> {
        let p = |x: f32, y: f32, z: f32| center + Vec3::new(x, y, z) * 0.5;
        let corners = [
            p(-1.0, -1.0, -1.0),
            p(1.0, -1.0, -1.0),
            p(1.0, 1.0, -1.0),
            p(-1.0, 1.0, -1.0),
            p(-1.0, -1.0, 1.0),
            p(1.0, -1.0, 1.0),
            p(1.0, 1.0, 1.0),
            p(-1.0, 1.0, 1.0),
        ];
        let faces: [[usize; 4]; 6] = [
            [0, 1, 2, 3],
            [5, 4, 7, 6],
            [4, 0, 3, 7],
            [1, 5, 6, 2],
            [3, 2, 6, 7],
            [4, 5, 1, 0],
        ];
        faces
            .iter()
            .flat_map(|&[a, b, c, d]| {
                [
                    Triangle::new(corners[a], corners[b], corners[c], 0),
                    Triangle::new(corners[a], corners[c], corners[d], 0),
                ]
            })
            .collect()
    }

    #[test]
    fn test_two_cubes_match_brute_force() {
        let mut tris = unit_cube(Vec3::ZERO);
        tris.extend(unit_cube(Vec3::new(1.0, 0.0, 0.0)));
        let bvh = Bvh::build(&tris);

        let mut rng = StdRng::seed_from_u64(9);
        let window = Interval::new(0.001, 1e4);
        for _ in 0..10_000 {
            let origin = Vec3::new(
                rng.gen_range(-3.0..4.0),
                rng.gen_range(-3.0..3.0),
                rng.gen_range(-3.0..3.0),
            );
            let dir = loop {
                let d = Vec3::new(rng.gen(), rng.gen(), rng.gen()) * 2.0 - Vec3::ONE;
                if d.length_squared() > 1e-6 {
                    break d.normalize();
                }
            };
            let ray = Ray::new(origin, dir);
            let expected = brute_force(&tris, &ray, window);
            let got = bvh.intersect(&ray, window).map(|(t, _)| t);
            match (expected, got) {
                (None, None) => {}
                (Some(a), Some(b)) => assert!((a - b).abs() < 1e-4),
                other => panic!("hit/miss disagreement: {other:?}"),
            }
        }
    }

    #[test]
    fn test_all_misses_report_none() {
        let mut rng = StdRng::seed_from_u64(3);
        let tris = random_triangles(&mut rng, 100);
        let bvh = Bvh::build(&tris);

        // Rays far outside the scene bounds pointing away.
        for i in 0..100 {
            let ray = Ray::new(Vec3::new(100.0 + i as f32, 100.0, 100.0), Vec3::Y);
            assert!(bvh.intersect(&ray, Interval::new(0.001, 1e4)).is_none());
        }
    }

    #[test]
    fn test_rebuild_after_translation() {
        let tri = Triangle::new(
            Vec3::new(-1.0, -1.0, -3.0),
            Vec3::new(1.0, -1.0, -3.0),
            Vec3::new(0.0, 1.0, -3.0),
            0,
        );
        let mut bvh = Bvh::build(&[tri]);
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0));
        assert!(bvh.intersect(&ray, Interval::new(0.001, 1e4)).is_some());

        let delta = Vec3::new(10.0, 0.0, 0.0);
        for tri in bvh.primitives_mut() {
            tri.a += delta;
            tri.b += delta;
            tri.c += delta;
        }
        let bvh = Bvh::build(bvh.primitives());

        assert!(bvh.intersect(&ray, Interval::new(0.001, 1e4)).is_none());
        let shifted = Ray::new(Vec3::new(10.0, 0.0, 0.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(bvh.intersect(&shifted, Interval::new(0.001, 1e4)).is_some());
    }
}
