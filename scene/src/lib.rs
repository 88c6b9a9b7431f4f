//! # Scene
//!
//! This crate turns OBJ/MTL files and a scene description into the flat buffers the
//! ray tracing compute shaders read: vertices, triangles, BVH nodes, render objects,
//! materials and a texture list.
//!
//! ## Modules
//!
//! - `bounds`: Axis-aligned `BoundingBox` used by the BVH builder and for object/scene bounds.
//! - `bvh`: Binned SAH BVH builder writing into the shared node array.
//! - `config`: Loads the TOML scene description.
//! - `geometry`: The `GeometryPool` of per-corner vertices, triangles and centroids.
//! - `material`: `Material` and the deduplicating `MaterialTable`.
//! - `mtl` / `obj`: Readers for the supported Wavefront subset.
//! - `object`: Model placement and the instancing cache.
//! - `session`: `LoadSession`, the owner of every table filled during a load.
//! - `structs`: GPU-side records, laid out for direct upload.
//! - `texture`: Bounded texture slot table.
//!
//! ## Usage
//!
//! ```no_run
//! use scene::{LoadSession, Placement};
//!
//! let mut session = LoadSession::new();
//! session.load_model("models/cube.obj", &Placement::default(), 0)?;
//! let buffers = session.buffers();
//! println!("{} triangles", buffers.triangles.len());
//! # Ok::<(), scene::SceneError>(())
//! ```
mod bounds;
mod bvh;
mod config;
mod error;
mod geometry;
mod material;
mod mtl;
mod obj;
mod object;
mod session;
mod structs;
mod texture;

pub use bounds::BoundingBox;
pub use bvh::{build_bvh, BvhBuild, BvhStats, BINS, LEAF_SIZE, MAX_DEPTH};
pub use config::{Config, ModelConfig, SphereConfig};
pub use error::{Result, SceneError};
pub use geometry::GeometryPool;
pub use material::{material_key, Material, MaterialTable};
pub use mtl::read_mtl;
pub use object::{InstanceCache, InstanceEntry, ObjectInfo, Placement};
pub use session::{as_bytes, LoadSession, SceneBuffers, MAX_SPHERES};
pub use structs::{BvhNode, NodeKind, RayMaterial, RenderObject, Sphere, Triangle, TrianglePoint};
pub use texture::{scale_texture, TextureSlot, TextureTable, MAX_TEXTURES};
