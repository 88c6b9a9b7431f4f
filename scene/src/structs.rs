//! Records laid out for direct upload into GPU storage buffers.
//!
//! Every struct here is `#[repr(C)]` and `Pod`, with vec3 members padded to
//! vec4 so the std430 layout on the shader side matches byte for byte.
use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};

use crate::bounds::BoundingBox;

//-----------Vertex-----------------
/// One face corner. The texture coordinate rides in the spare fourth lanes:
/// `u` in `position.w`, `v` in `normal.w`.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, Default, PartialEq)]
pub struct TrianglePoint {
    pub position: [f32; 4],
    pub normal: [f32; 4],
}

impl TrianglePoint {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            position: position.extend(uv.x).into(),
            normal: normal.extend(uv.y).into(),
        }
    }

    pub fn position(&self) -> Vec3 {
        glam::Vec4::from(self.position).xyz()
    }

    pub fn normal(&self) -> Vec3 {
        glam::Vec4::from(self.normal).xyz()
    }

    pub fn uv(&self) -> Vec2 {
        Vec2::new(self.position[3], self.normal[3])
    }
}

//-----------Triangle-----------------
/// Three indices into the vertex record array plus the shading frame used for
/// normal mapping.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, Default, PartialEq)]
pub struct Triangle {
    pub vertices: [u32; 3],
    pub front_only: u32, //used as bool
    pub binormal: [f32; 4],
    pub tangent: [f32; 4],
}

impl Triangle {
    pub fn new(vertices: [u32; 3], front_only: bool, tangent: Vec3, binormal: Vec3) -> Self {
        Self {
            vertices,
            front_only: front_only as u32,
            binormal: binormal.extend(0.0).into(),
            tangent: tangent.extend(0.0).into(),
        }
    }

    pub fn is_front_only(&self) -> bool {
        self.front_only != 0
    }

    pub fn tangent(&self) -> Vec3 {
        glam::Vec4::from(self.tangent).xyz()
    }

    pub fn binormal(&self) -> Vec3 {
        glam::Vec4::from(self.binormal).xyz()
    }
}

//-----------BVH-----------------
/// Flat BVH node.
///
/// `tri_count > 0`: leaf, `index` is the first triangle.
/// `tri_count == 0`: internal, `index` is the left child and the right child
/// sits at `index + 1`.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, Default, PartialEq)]
pub struct BvhNode {
    pub bounds_x: [f32; 2],
    pub bounds_y: [f32; 2],
    pub bounds_z: [f32; 2],
    pub index: u32,
    pub tri_count: u32,
}

/// Decoded view of a [`BvhNode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Leaf { first_triangle: u32, count: u32 },
    Internal { left_child: u32 },
}

impl BvhNode {
    pub fn leaf(first_triangle: u32, count: u32) -> Self {
        Self {
            index: first_triangle,
            tri_count: count,
            ..Default::default()
        }
    }

    pub fn kind(&self) -> NodeKind {
        if self.tri_count > 0 {
            NodeKind::Leaf {
                first_triangle: self.index,
                count: self.tri_count,
            }
        } else {
            NodeKind::Internal {
                left_child: self.index,
            }
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.tri_count > 0
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(
            Vec3::new(self.bounds_x[0], self.bounds_y[0], self.bounds_z[0]),
            Vec3::new(self.bounds_x[1], self.bounds_y[1], self.bounds_z[1]),
        )
    }

    pub fn set_bounds(&mut self, bounds: &BoundingBox) {
        self.bounds_x = [bounds.min.x, bounds.max.x];
        self.bounds_y = [bounds.min.y, bounds.max.y];
        self.bounds_z = [bounds.min.z, bounds.max.z];
    }
}

//-----------Render object-----------------
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq)]
pub struct RenderObject {
    pub transform: [[f32; 4]; 4],
    pub smooth_shade: u32, //used as bool
    pub bvh_index: u32,
    pub material_index: u32,
    pub sampler_index: u32,
}

impl RenderObject {
    pub fn new(
        transform: Mat4,
        bvh_index: u32,
        material_index: u32,
        smooth_shade: bool,
        sampler_index: u32,
    ) -> Self {
        Self {
            transform: transform.to_cols_array_2d(),
            smooth_shade: smooth_shade as u32,
            bvh_index,
            material_index,
            sampler_index,
        }
    }

    pub fn transform(&self) -> Mat4 {
        Mat4::from_cols_array_2d(&self.transform)
    }
}

//-----------Material-----------------
/// GPU form of [`crate::Material`]. Absent values use `-1` on this side only.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq)]
pub struct RayMaterial {
    pub albedo: [f32; 4],
    pub emission: [f32; 4], //[r, g, b, strength]
    pub reflectance: f32,
    pub ior: f32,
    pub albedo_index: i32,
    pub metalness_index: i32,
    pub alpha_index: i32,
    pub bump_index: i32,
    pub __padding: [i32; 2],
}

//-----------Sphere-----------------
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable, Debug, PartialEq)]
pub struct Sphere {
    pub position: [f32; 3],
    pub radius: f32,
    pub material_index: u32,
    pub __padding: [u32; 3],
}

impl Sphere {
    pub fn new(position: Vec3, radius: f32, material_index: u32) -> Self {
        Self {
            position: position.into(),
            radius,
            material_index,
            __padding: [0; 3],
        }
    }
}
