use std::path::{Path, PathBuf};

use image::DynamicImage;

use crate::error::{Result, SceneError};

/// Layer count of the texture array the renderer binds.
pub const MAX_TEXTURES: usize = 64;

#[derive(Clone, Debug)]
pub struct TextureSlot {
    pub path: PathBuf,
    pub image: Option<DynamicImage>,
}

/// Bounded list of texture slots. Slot indices are what materials reference.
///
/// Slots are handed out by a monotonically increasing counter; images are
/// decoded later in one batch by [`TextureTable::load_pending`].
#[derive(Clone, Debug)]
pub struct TextureTable {
    capacity: usize,
    slots: Vec<TextureSlot>,
}

impl Default for TextureTable {
    fn default() -> Self {
        Self::new(MAX_TEXTURES)
    }
}

impl TextureTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            slots: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[TextureSlot] {
        &self.slots
    }

    /// Reserves the next slot for `path`.
    pub fn allocate(&mut self, path: &Path) -> Result<u32> {
        if self.slots.len() >= self.capacity {
            return Err(SceneError::TextureSlotsExhausted {
                capacity: self.capacity,
                path: path.to_path_buf(),
            });
        }
        self.slots.push(TextureSlot {
            path: path.to_path_buf(),
            image: None,
        });
        Ok((self.slots.len() - 1) as u32)
    }

    /// Decodes every slot that has no image yet. Stops at the first failure
    /// and reports which file it was.
    pub fn load_pending(&mut self) -> Result<usize> {
        let mut loaded = 0;
        for slot in self.slots.iter_mut().filter(|s| s.image.is_none()) {
            let image = image::open(&slot.path).map_err(|source| SceneError::TextureLoad {
                path: slot.path.clone(),
                source,
            })?;
            log::debug!(
                "Loaded texture {} ({}x{})",
                slot.path.display(),
                image.width(),
                image.height()
            );
            slot.image = Some(image);
            loaded += 1;
        }
        Ok(loaded)
    }

    /// Every slot resized to a common extent, ready to be stacked into a
    /// texture array. Slots that were never decoded come out black.
    pub fn layers(&self, width: u32, height: u32) -> Vec<DynamicImage> {
        self.slots
            .iter()
            .map(|slot| match &slot.image {
                Some(image) => scale_texture(image, width, height),
                None => DynamicImage::new_rgba8(width, height),
            })
            .collect()
    }
}

pub fn scale_texture(texture: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    texture.resize_exact(width, height, image::imageops::FilterType::Nearest)
}
