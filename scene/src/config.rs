use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec3;
use serde::Deserialize;

use crate::error::{Result, SceneError};
use crate::material::Material;
use crate::object::Placement;
use crate::texture::MAX_TEXTURES;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelConfig {
    pub path: PathBuf,
    #[serde(flatten)]
    pub placement: Placement,
    /// Used by groups whose material cannot be resolved.
    #[serde(default)]
    pub material: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SphereConfig {
    pub position: Vec3,
    pub radius: f32,
    #[serde(default)]
    pub material: u32,
}

/// Scene description: default materials, placed models and spheres.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub texture_capacity: usize,
    pub materials: Vec<Material>,
    pub models: Vec<ModelConfig>,
    pub spheres: Vec<SphereConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            texture_capacity: MAX_TEXTURES,
            materials: Vec::new(),
            models: Vec::new(),
            spheres: Vec::new(),
        }
    }
}

impl Config {
    pub fn new(config_path: impl AsRef<Path>) -> Result<Self> {
        let config_path = config_path.as_ref();
        let toml_str = fs::read_to_string(config_path).map_err(|source| SceneError::Io {
            path: config_path.to_path_buf(),
            source,
        })?;
        Self::from_str(&toml_str)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        if config.texture_capacity == 0 {
            return Err(SceneError::InvalidConfig(
                "texture_capacity must be at least 1".to_string(),
            ));
        }
        for sphere in &config.spheres {
            if sphere.radius <= 0.0 {
                return Err(SceneError::InvalidConfig(format!(
                    "sphere radius {} is not positive",
                    sphere.radius
                )));
            }
        }
        if config.materials.is_empty() {
            log::debug!("No materials defined in config, using a white default");
        }
        Ok(config)
    }
}
