use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use glam::Vec3;

use crate::error::Result;
use crate::material::{material_key, Material, MaterialTable};
use crate::obj::parse_floats;
use crate::texture::TextureTable;

/// Reads a material library into `materials`, reserving texture slots for
/// every map it names. The referenced textures are decoded in one batch once
/// the whole file has been read.
///
/// A library that cannot be opened is logged and skipped. Texture failures
/// abort the load.
pub fn read_mtl(
    path: &Path,
    materials: &mut MaterialTable,
    textures: &mut TextureTable,
) -> Result<()> {
    if !materials.mark_library(path) {
        log::debug!("Material library {} already loaded", path.display());
        return Ok(());
    }
    let file = match File::open(path) {
        Ok(file) => file,
        Err(error) => {
            log::warn!("Could not open material library {}: {}", path.display(), error);
            return Ok(());
        }
    };
    let directory = path.parent().unwrap_or_else(|| Path::new(""));

    let mut current: Option<(String, Material)> = None;
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = match line {
            Ok(line) => line.replace('\t', " "),
            Err(error) => {
                log::warn!("{}:{}: unreadable line: {}", path.display(), number + 1, error);
                continue;
            }
        };
        let mut words = line.split_whitespace();
        let keyword = match words.next() {
            Some(keyword) => keyword,
            None => continue,
        };

        if keyword == "newmtl" {
            if let Some((name, material)) = current.take() {
                materials.insert(material_key(path, &name), material);
            }
            let name = words.collect::<Vec<_>>().join(" ");
            current = Some((name, Material::default()));
            continue;
        }

        let Some((_, material)) = current.as_mut() else {
            log::trace!("{}:{}: '{}' outside of a material", path.display(), number + 1, keyword);
            continue;
        };
        match keyword {
            "Ka" | "Kd" => {
                // Ambient and diffuse both fold into one albedo
                material.albedo *= Vec3::from(parse_floats::<3>(words, path, number));
            }
            "Ke" => {
                material.emission = Vec3::from(parse_floats::<3>(words, path, number));
                material.emission_strength =
                    if material.emission == Vec3::ZERO { 0.0 } else { 1.0 };
            }
            "Ni" | "d" => {
                // Parsed for validation only, not applied
                let [value] = parse_floats::<1>(words, path, number);
                log::trace!("{}:{}: ignoring {} {}", path.display(), number + 1, keyword, value);
            }
            "map_Ka" | "map_Kd" => {
                let slot = allocate_map(textures, directory, words)?;
                material.albedo_texture = slot.or(material.albedo_texture);
            }
            "map_Ks" => {
                let slot = allocate_map(textures, directory, words)?;
                material.metalness_texture = slot.or(material.metalness_texture);
            }
            "map_d" => {
                let slot = allocate_map(textures, directory, words)?;
                material.alpha_texture = slot.or(material.alpha_texture);
            }
            "map_bump" | "map_Bump" | "bump" => {
                let slot = allocate_map(textures, directory, words)?;
                material.bump_texture = slot.or(material.bump_texture);
            }
            _ => {}
        }
    }
    if let Some((name, material)) = current.take() {
        materials.insert(material_key(path, &name), material);
    }

    let loaded = textures.load_pending()?;
    log::info!("Material library {} read, {} textures loaded", path.display(), loaded);
    Ok(())
}

/// Reserves a slot for the texture named by the rest of a `map_*` line.
/// Option flags (`-bm 0.5 ...`) are skipped: the file name is the last word.
fn allocate_map<'a>(
    textures: &mut TextureTable,
    directory: &Path,
    words: impl Iterator<Item = &'a str>,
) -> Result<Option<u32>> {
    let words: Vec<&str> = words.collect();
    let file_name = match words.first() {
        None => return Ok(None),
        Some(first) if first.starts_with('-') => {
            words.last().copied().unwrap_or_default().to_string()
        }
        Some(_) => words.join(" "),
    };
    let texture_path: PathBuf = directory.join(file_name);
    textures.allocate(&texture_path).map(Some)
}
