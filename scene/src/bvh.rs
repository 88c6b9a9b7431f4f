//! Binned-SAH bounding volume hierarchy over one object's triangle range.
//!
//! Each object gets its own subtree appended to a shared flat node array.
//! Children are allocated in pairs after their parent, so the right child of
//! an internal node is always `left + 1`.
use glam::Vec3;

use crate::bounds::BoundingBox;
use crate::geometry::GeometryPool;
use crate::structs::BvhNode;

/// Number of bins per axis in the split search.
pub const BINS: usize = 20;
/// Recursion depth at which a node is forced to be a leaf.
pub const MAX_DEPTH: u32 = 64;
/// Nodes with this many triangles or fewer are never split.
pub const LEAF_SIZE: u32 = 2;

/// Shape of a finished subtree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BvhStats {
    pub node_count: u32,
    pub leaf_count: u32,
    pub min_depth: u32,
    pub max_depth: u32,
    pub max_leaf_triangles: u32,
}

impl Default for BvhStats {
    fn default() -> Self {
        Self {
            node_count: 0,
            leaf_count: 0,
            min_depth: u32::MAX,
            max_depth: 0,
            max_leaf_triangles: 0,
        }
    }
}

impl BvhStats {
    fn record_leaf(&mut self, depth: u32, tri_count: u32) {
        self.leaf_count += 1;
        self.min_depth = self.min_depth.min(depth);
        self.max_depth = self.max_depth.max(depth);
        self.max_leaf_triangles = self.max_leaf_triangles.max(tri_count);
    }
}

/// Result of [`build_bvh`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BvhBuild {
    pub root: u32,
    pub stats: BvhStats,
}

#[derive(Clone, Copy)]
struct Bin {
    bounds: BoundingBox,
    tri_count: u32,
}

impl Default for Bin {
    fn default() -> Self {
        Self {
            bounds: BoundingBox::EMPTY,
            tri_count: 0,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Split {
    axis: usize,
    position: f32,
    cost: f32,
}

/// Split cost of a child box. Plain surface area.
#[inline]
fn node_cost(bounds: &BoundingBox) -> f32 {
    bounds.surface_area()
}

/// Builds a subtree over `[tri_index, tri_index + size)` and returns its root.
///
/// Triangles (and their centroids) inside the range are reordered in place.
/// The node array is grown by the worst case `2 * size - 1` up front and
/// trimmed back to the slots used once the subtree is complete. Returns `None`
/// for an empty range, which has no valid leaf encoding.
pub fn build_bvh(
    geometry: &mut GeometryPool,
    nodes: &mut Vec<BvhNode>,
    tri_index: usize,
    size: usize,
) -> Option<BvhBuild> {
    if size == 0 {
        return None;
    }
    debug_assert!(tri_index + size <= geometry.triangle_count());

    let root = nodes.len();
    nodes.resize(root + 2 * size - 1, BvhNode::default());

    let mut builder = Builder {
        geometry: &mut *geometry,
        nodes: &mut *nodes,
        nodes_used: root + 1,
        stats: BvhStats::default(),
    };
    builder.nodes[root] = BvhNode::leaf(tri_index as u32, size as u32);
    builder.update_bounds(root);
    builder.subdivide(root, 0);

    let nodes_used = builder.nodes_used;
    let mut stats = builder.stats;
    stats.node_count = (nodes_used - root) as u32;
    nodes.truncate(nodes_used);

    Some(BvhBuild {
        root: root as u32,
        stats,
    })
}

struct Builder<'a> {
    geometry: &'a mut GeometryPool,
    nodes: &'a mut Vec<BvhNode>,
    nodes_used: usize,
    stats: BvhStats,
}

impl Builder<'_> {
    fn update_bounds(&mut self, node_index: usize) {
        let node = self.nodes[node_index];
        let first = node.index as usize;
        let mut bounds = BoundingBox::EMPTY;
        for triangle in first..first + node.tri_count as usize {
            bounds.grow_box(&self.geometry.triangle_bounds(triangle));
        }
        self.nodes[node_index].set_bounds(&bounds);
    }

    fn subdivide(&mut self, node_index: usize, depth: u32) {
        let node = self.nodes[node_index];
        if node.tri_count <= LEAF_SIZE || depth >= MAX_DEPTH {
            self.stats.record_leaf(depth, node.tri_count);
            return;
        }

        let split = match self.find_split_plane(&node) {
            Some(split) => split,
            None => {
                self.stats.record_leaf(depth, node.tri_count);
                return;
            }
        };
        let no_split_cost = node.tri_count as f32 * node_cost(&node.bounds());
        if split.cost >= no_split_cost {
            self.stats.record_leaf(depth, node.tri_count);
            return;
        }

        let first = node.index as usize;
        let boundary = self.partition(first, node.tri_count as usize, split.axis, split.position);
        let left_count = (boundary - first) as u32;
        if left_count == 0 || left_count == node.tri_count {
            self.stats.record_leaf(depth, node.tri_count);
            return;
        }

        let left = self.nodes_used;
        let right = left + 1;
        self.nodes_used += 2;

        self.nodes[left] = BvhNode::leaf(node.index, left_count);
        self.nodes[right] = BvhNode::leaf(boundary as u32, node.tri_count - left_count);
        self.nodes[node_index].index = left as u32;
        self.nodes[node_index].tri_count = 0;

        self.update_bounds(left);
        self.update_bounds(right);
        self.subdivide(left, depth + 1);
        self.subdivide(right, depth + 1);
    }

    /// Cheapest split over all three axes, or `None` if every axis has a
    /// zero centroid extent.
    fn find_split_plane(&self, node: &BvhNode) -> Option<Split> {
        let first = node.index as usize;
        let range = first..first + node.tri_count as usize;
        let centroids = &self.geometry.centroids()[range.clone()];

        let mut best: Option<Split> = None;
        for axis in 0..3 {
            let (lo, hi) = centroids.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), c| {
                (lo.min(c[axis]), hi.max(c[axis]))
            });
            if lo == hi {
                continue;
            }

            let mut bins = [Bin::default(); BINS];
            let scale = BINS as f32 / (hi - lo);
            for (offset, centroid) in centroids.iter().enumerate() {
                let bin = (((centroid[axis] - lo) * scale) as usize).min(BINS - 1);
                bins[bin].tri_count += 1;
                bins[bin].bounds.grow_box(&self.geometry.triangle_bounds(range.start + offset));
            }

            let mut left_cost = [0.0f32; BINS - 1];
            let mut left_count = [0u32; BINS - 1];
            let mut sweep = BoundingBox::EMPTY;
            let mut count = 0;
            for i in 0..BINS - 1 {
                sweep.grow_box(&bins[i].bounds);
                count += bins[i].tri_count;
                left_count[i] = count;
                left_cost[i] = node_cost(&sweep);
            }

            sweep = BoundingBox::EMPTY;
            count = 0;
            let bin_width = (hi - lo) / BINS as f32;
            for i in (1..BINS).rev() {
                sweep.grow_box(&bins[i].bounds);
                count += bins[i].tri_count;
                if count == 0 || left_count[i - 1] == 0 {
                    continue;
                }
                let cost = left_count[i - 1] as f32 * left_cost[i - 1]
                    + count as f32 * node_cost(&sweep);
                if best.map_or(true, |b| cost < b.cost) {
                    best = Some(Split {
                        axis,
                        position: lo + bin_width * i as f32,
                        cost,
                    });
                }
            }
        }
        best
    }

    /// Two-pointer partition of `[first, first + count)`: triangles whose
    /// centroid is below `position` on `axis` end up on the left. Returns the
    /// index of the first right-hand triangle.
    fn partition(&mut self, first: usize, count: usize, axis: usize, position: f32) -> usize {
        let mut i = first;
        let mut j = first + count;
        while i < j {
            let centroid: Vec3 = self.geometry.centroids()[i];
            if centroid[axis] < position {
                i += 1;
            } else {
                j -= 1;
                self.geometry.swap_triangles(i, j);
            }
        }
        i
    }
}
