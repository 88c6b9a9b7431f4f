use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::Deserialize;

use crate::bounds::BoundingBox;

/// Where and how a model file is put into the scene.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Placement {
    pub position: Vec3,
    /// XYZ Euler angles in degrees.
    pub rotation: Vec3,
    pub scale: Vec3,
    /// Disables back-face hits for every triangle of the model.
    pub front_only: bool,
    pub sampler: u32,
    /// Replaces the material of every object emitted for the model.
    pub material_override: Option<u32>,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
            front_only: false,
            sampler: 0,
            material_override: None,
        }
    }
}

impl Placement {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn transform(&self) -> Mat4 {
        let rotation = Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x.to_radians(),
            self.rotation.y.to_radians(),
            self.rotation.z.to_radians(),
        );
        Mat4::from_scale_rotation_translation(self.scale, rotation, self.position)
    }
}

/// CPU-side description of one render object, parallel to the GPU array.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectInfo {
    /// Material name of the group, or the file stem when there was none.
    pub name: String,
    pub source: PathBuf,
    pub triangles: Range<u32>,
    /// Object-space bounds of the positions declared while the group was open.
    pub bounds: BoundingBox,
    /// `true` when geometry and BVH are shared with an earlier object.
    pub instanced: bool,
}

/// One material group of a parsed model, kept for reuse by later instances.
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceEntry {
    pub name: String,
    pub bvh_root: u32,
    /// Material resolved from the model's libraries. `None` means the group
    /// takes whatever default material the placing call asks for.
    pub material_index: Option<u32>,
    pub smooth_shade: bool,
    pub triangles: Range<u32>,
    pub bounds: BoundingBox,
}

/// Built geometry keyed by source path and the `front_only` flag, which is
/// baked into the triangle records.
#[derive(Clone, Debug, Default)]
pub struct InstanceCache {
    entries: HashMap<(PathBuf, bool), Vec<InstanceEntry>>,
}

impl InstanceCache {
    pub fn get(&self, path: &Path, front_only: bool) -> Option<&[InstanceEntry]> {
        self.entries
            .get(&(path.to_path_buf(), front_only))
            .map(Vec::as_slice)
    }

    pub fn insert(&mut self, path: PathBuf, front_only: bool, groups: Vec<InstanceEntry>) {
        self.entries.insert((path, front_only), groups);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_placement_is_identity() {
        assert!(Placement::default().transform().abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }

    #[test]
    fn test_placement_transform_order() {
        let placement = Placement {
            position: Vec3::new(10.0, 0.0, 0.0),
            rotation: Vec3::new(0.0, 0.0, 90.0),
            scale: Vec3::splat(2.0),
            ..Default::default()
        };
        // Scale, then rotate about Z, then translate
        let moved = placement.transform().transform_point3(Vec3::X);
        assert!((moved - Vec3::new(10.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_placement_from_toml_defaults() {
        let placement: Placement =
            toml::from_str("position = [1.0, 2.0, 3.0]\nfront_only = true").unwrap();
        assert_eq!(placement.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(placement.scale, Vec3::ONE);
        assert!(placement.front_only);
        assert_eq!(placement.material_override, None);
    }

    #[test]
    fn test_cache_separates_front_only() {
        let mut cache = InstanceCache::default();
        cache.insert(PathBuf::from("a.obj"), false, Vec::new());
        assert!(cache.get(Path::new("a.obj"), false).is_some());
        assert!(cache.get(Path::new("a.obj"), true).is_none());
        assert!(cache.get(Path::new("b.obj"), false).is_none());
    }
}
