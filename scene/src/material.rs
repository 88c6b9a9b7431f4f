use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::Deserialize;

use crate::structs::RayMaterial;

/// Surface description shared by every object drawn with it.
///
/// Absent values (no texture, no index of refraction) are `None` here and only
/// become `-1` when packed into a [`RayMaterial`].
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Material {
    pub albedo: Vec3,
    pub emission: Vec3,
    pub emission_strength: f32,
    pub reflectance: f32,
    pub ior: Option<f32>,
    #[serde(skip)]
    pub albedo_texture: Option<u32>,
    #[serde(skip)]
    pub metalness_texture: Option<u32>,
    #[serde(skip)]
    pub alpha_texture: Option<u32>,
    #[serde(skip)]
    pub bump_texture: Option<u32>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            albedo: Vec3::ONE,
            emission: Vec3::ZERO,
            emission_strength: 0.0,
            reflectance: 0.0,
            ior: None,
            albedo_texture: None,
            metalness_texture: None,
            alpha_texture: None,
            bump_texture: None,
        }
    }
}

fn texture_index(slot: Option<u32>) -> i32 {
    slot.map_or(-1, |s| s as i32)
}

impl Material {
    pub fn to_gpu(&self) -> RayMaterial {
        RayMaterial {
            albedo: self.albedo.extend(0.0).into(),
            emission: self.emission.extend(self.emission_strength).into(),
            reflectance: self.reflectance,
            ior: self.ior.unwrap_or(-1.0),
            albedo_index: texture_index(self.albedo_texture),
            metalness_index: texture_index(self.metalness_texture),
            alpha_index: texture_index(self.alpha_texture),
            bump_index: texture_index(self.bump_texture),
            __padding: [0; 2],
        }
    }
}

/// Key under which a named material from a material library is stored.
pub fn material_key(library: &Path, name: &str) -> String {
    format!("{}/{}", library.display(), name)
}

/// Append-only list of materials, deduplicated by `library/name`.
#[derive(Clone, Debug, Default)]
pub struct MaterialTable {
    materials: Vec<Material>,
    by_key: HashMap<String, u32>,
    libraries: HashSet<PathBuf>,
}

impl MaterialTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn get(&self, index: u32) -> Option<&Material> {
        self.materials.get(index as usize)
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Appends an unnamed material and returns its index.
    pub fn push(&mut self, material: Material) -> u32 {
        self.materials.push(material);
        (self.materials.len() - 1) as u32
    }

    /// Stores `material` under `key` unless the key is already taken. Either
    /// way the index registered for `key` is returned.
    pub fn insert(&mut self, key: String, material: Material) -> u32 {
        if let Some(&index) = self.by_key.get(&key) {
            return index;
        }
        let index = self.push(material);
        self.by_key.insert(key, index);
        index
    }

    pub fn lookup(&self, key: &str) -> Option<u32> {
        self.by_key.get(key).copied()
    }

    /// Marks a material library as parsed. Returns `false` if it already was.
    pub(crate) fn mark_library(&mut self, library: &Path) -> bool {
        self.libraries.insert(library.to_path_buf())
    }

    pub fn to_gpu(&self) -> Vec<RayMaterial> {
        self.materials.iter().map(Material::to_gpu).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_values_pack_as_minus_one() {
        let gpu = Material::default().to_gpu();
        assert_eq!(gpu.albedo, [1.0, 1.0, 1.0, 0.0]);
        assert_eq!(gpu.ior, -1.0);
        assert_eq!(
            [gpu.albedo_index, gpu.metalness_index, gpu.alpha_index, gpu.bump_index],
            [-1, -1, -1, -1]
        );
    }

    #[test]
    fn test_present_values_pack() {
        let material = Material {
            emission: Vec3::new(1.0, 0.5, 0.0),
            emission_strength: 4.0,
            ior: Some(1.5),
            bump_texture: Some(3),
            ..Default::default()
        };
        let gpu = material.to_gpu();
        assert_eq!(gpu.emission, [1.0, 0.5, 0.0, 4.0]);
        assert_eq!(gpu.ior, 1.5);
        assert_eq!(gpu.bump_index, 3);
        assert_eq!(gpu.albedo_index, -1);
    }

    #[test]
    fn test_insert_deduplicates_by_key() {
        let mut table = MaterialTable::new();
        let key = material_key(Path::new("models/box.mtl"), "red");
        assert_eq!(key, "models/box.mtl/red");

        let red = Material { albedo: Vec3::X, ..Default::default() };
        let first = table.insert(key.clone(), red);
        let second = table.insert(key.clone(), Material::default());
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(first).map(|m| m.albedo), Some(Vec3::X));
        assert_eq!(table.lookup(&key), Some(first));
        assert_eq!(table.lookup("models/box.mtl/blue"), None);
    }

    #[test]
    fn test_library_marked_once() {
        let mut table = MaterialTable::new();
        assert!(table.mark_library(Path::new("a.mtl")));
        assert!(!table.mark_library(Path::new("a.mtl")));
    }
}
