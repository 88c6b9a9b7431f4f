use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a scene load.
///
/// Missing model and material files are not part of this list: the loader
/// logs them and carries on with whatever it already has.
#[derive(Error, Debug)]
pub enum SceneError {
    /// A texture referenced by a material could not be opened or decoded
    #[error("Failed to load texture {}: {source}", path.display())]
    TextureLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Every texture slot is already taken
    #[error("Texture slots exhausted (capacity {capacity}) while adding {}", path.display())]
    TextureSlotsExhausted { capacity: usize, path: PathBuf },

    /// The scene description could not be read
    #[error("Could not find/read scene file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scene description is not valid TOML for a `Config`
    #[error("Could not parse TOML: {0}")]
    Config(#[from] toml::de::Error),

    /// The scene description parsed but references things that don't exist
    #[error("Invalid scene config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, SceneError>;
