use glam::Vec3;

use crate::bounds::BoundingBox;
use crate::structs::{Triangle, TrianglePoint};

/// Vertex and triangle records shared by every object of a load session.
///
/// Append-only while loading. `centroids` runs parallel to `triangles` and is
/// reordered together with it by the BVH builder.
#[derive(Clone, Debug, Default)]
pub struct GeometryPool {
    pub(crate) points: Vec<TrianglePoint>,
    pub(crate) triangles: Vec<Triangle>,
    pub(crate) centroids: Vec<Vec3>,
}

impl GeometryPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[TrianglePoint] {
        &self.points
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn centroids(&self) -> &[Vec3] {
        &self.centroids
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Appends three fresh vertex records and the triangle joining them.
    /// Returns the index of the new triangle.
    pub fn push_triangle(&mut self, corners: [TrianglePoint; 3], front_only: bool) -> usize {
        let base = self.points.len() as u32;
        let (tangent, binormal) = tangent_frame(&corners);
        let centroid = corners.iter().map(|c| c.position()).sum::<Vec3>() / 3.0;

        self.points.extend_from_slice(&corners);
        self.triangles
            .push(Triangle::new([base, base + 1, base + 2], front_only, tangent, binormal));
        self.centroids.push(centroid);
        self.triangles.len() - 1
    }

    pub fn triangle_positions(&self, triangle: usize) -> [Vec3; 3] {
        self.triangles[triangle]
            .vertices
            .map(|v| self.points[v as usize].position())
    }

    pub fn triangle_bounds(&self, triangle: usize) -> BoundingBox {
        let mut bounds = BoundingBox::EMPTY;
        for p in self.triangle_positions(triangle) {
            bounds.grow(p);
        }
        bounds
    }

    /// Drops every triangle from `triangle_count` on, with its vertices.
    pub(crate) fn truncate(&mut self, triangle_count: usize) {
        self.triangles.truncate(triangle_count);
        self.centroids.truncate(triangle_count);
        self.points.truncate(triangle_count * 3);
    }

    /// Swaps two triangles together with their centroids.
    pub(crate) fn swap_triangles(&mut self, a: usize, b: usize) {
        self.triangles.swap(a, b);
        self.centroids.swap(a, b);
    }
}

/// Tangent and binormal from the triangle's UV gradient.
///
/// Corners with coincident or collinear texture coordinates have no defined
/// gradient; both vectors come back as zero then.
fn tangent_frame(corners: &[TrianglePoint; 3]) -> (Vec3, Vec3) {
    let edge1 = corners[1].position() - corners[0].position();
    let edge2 = corners[2].position() - corners[0].position();
    let duv1 = corners[1].uv() - corners[0].uv();
    let duv2 = corners[2].uv() - corners[0].uv();

    let det = duv1.x * duv2.y - duv2.x * duv1.y;
    if det == 0.0 || !det.is_finite() {
        return (Vec3::ZERO, Vec3::ZERO);
    }
    let f = 1.0 / det;
    let tangent = f * (duv2.y * edge1 - duv1.y * edge2);
    let binormal = f * (duv1.x * edge2 - duv2.x * edge1);
    (tangent.normalize_or_zero(), binormal.normalize_or_zero())
}
