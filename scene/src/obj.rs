//! Streaming reader for the OBJ subset the ray tracer consumes.
//!
//! Faces are grouped into one object per `usemtl` block. Every face corner
//! becomes its own vertex record, so nothing is shared between triangles.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use glam::{Mat4, Vec2, Vec3};

use crate::bounds::BoundingBox;
use crate::bvh::build_bvh;
use crate::error::Result;
use crate::material::material_key;
use crate::mtl::read_mtl;
use crate::object::{InstanceEntry, ObjectInfo, Placement};
use crate::session::LoadSession;
use crate::structs::{RenderObject, TrianglePoint};

/// Parses up to `N` floats from `words`. Missing or malformed values become 0.
pub(crate) fn parse_floats<'a, const N: usize>(
    mut words: impl Iterator<Item = &'a str>,
    path: &Path,
    line: usize,
) -> [f32; N] {
    let mut values = [0.0; N];
    for value in values.iter_mut() {
        match words.next().map(str::parse::<f32>) {
            Some(Ok(parsed)) => *value = parsed,
            Some(Err(error)) => {
                log::warn!("{}:{}: invalid number: {}", path.display(), line + 1, error)
            }
            None => log::warn!("{}:{}: expected {} values", path.display(), line + 1, N),
        }
    }
    values
}

/// Resolves a 1-based (or negative, relative) OBJ index against `len`.
fn resolve_index(token: &str, len: usize) -> Option<usize> {
    let index: i64 = token.parse().ok()?;
    let resolved = if index > 0 {
        index - 1
    } else if index < 0 {
        len as i64 + index
    } else {
        return None;
    };
    (0..len as i64).contains(&resolved).then_some(resolved as usize)
}

/// One `position[/uv][/normal]` face corner with indices already resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Corner {
    position: usize,
    uv: Option<usize>,
    normal: Option<usize>,
}

struct ObjReader<'s> {
    session: &'s mut LoadSession,
    path: PathBuf,
    directory: PathBuf,
    transform: Mat4,
    inverse: Mat4,
    placement: Placement,
    default_material: u32,

    positions: Vec<Vec3>,
    uvs: Vec<Vec2>,
    normals: Vec<Vec3>,
    libraries: Vec<PathBuf>,

    material_name: Option<String>,
    first_triangle: usize,
    object_bounds: BoundingBox,
    smooth: bool,
    groups: Vec<InstanceEntry>,
}

/// Parses the model at `path` into the session and returns the material
/// groups it produced, or `None` if the file could not be opened.
pub(crate) fn read_obj(
    session: &mut LoadSession,
    path: &Path,
    placement: &Placement,
    default_material: u32,
) -> Result<Option<Vec<InstanceEntry>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(error) => {
            log::warn!("Could not open model {}: {}", path.display(), error);
            return Ok(None);
        }
    };

    let transform = placement.transform();
    let first_triangle = session.geometry.triangle_count();
    let mut reader = ObjReader {
        session,
        path: path.to_path_buf(),
        directory: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        transform,
        inverse: transform.inverse(),
        placement: placement.clone(),
        default_material,
        positions: Vec::new(),
        uvs: Vec::new(),
        normals: Vec::new(),
        libraries: Vec::new(),
        material_name: None,
        first_triangle,
        object_bounds: BoundingBox::EMPTY,
        smooth: false,
        groups: Vec::new(),
    };

    for (number, line) in BufReader::new(file).lines().enumerate() {
        match line {
            Ok(line) => reader.read_line(&line, number)?,
            Err(error) => {
                log::warn!("{}:{}: unreadable line: {}", path.display(), number + 1, error)
            }
        }
    }
    reader.close_object();

    Ok(Some(reader.groups))
}

impl ObjReader<'_> {
    fn read_line(&mut self, line: &str, number: usize) -> Result<()> {
        let mut words = line.split_whitespace();
        match words.next() {
            Some("v") => {
                let position = Vec3::from(parse_floats::<3>(words, &self.path, number));
                let world = self.transform.transform_point3(position);
                self.object_bounds.grow(world);
                self.session.scene_bounds.grow(world);
                self.positions.push(position);
            }
            Some("vt") => {
                self.uvs.push(Vec2::from(parse_floats::<2>(words, &self.path, number)));
            }
            Some("vn") => {
                self.normals.push(Vec3::from(parse_floats::<3>(words, &self.path, number)));
            }
            Some("f") => self.read_face(words, number),
            Some("s") => {
                self.smooth = words.next() == Some("1");
            }
            Some("usemtl") => {
                let name = words.collect::<Vec<_>>().join(" ");
                if self.material_name.is_some() {
                    self.close_object();
                }
                self.material_name = Some(name);
            }
            Some("mtllib") => {
                for name in words {
                    let library = self.directory.join(name);
                    let session = &mut *self.session;
                    read_mtl(&library, &mut session.materials, &mut session.textures)?;
                    self.libraries.push(library);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn read_face<'a>(&mut self, words: impl Iterator<Item = &'a str>, number: usize) {
        let corners: Option<Vec<Corner>> = words.map(|word| self.parse_corner(word)).collect();
        let line = number + 1;
        let corners = match corners {
            Some(corners) if corners.len() >= 3 => corners,
            Some(_) => {
                log::warn!("{}:{}: face needs at least 3 corners", self.path.display(), line);
                return;
            }
            None => {
                log::warn!("{}:{}: face references a missing vertex", self.path.display(), line);
                return;
            }
        };

        // Fan out polygons, three corners per emitted triangle
        for i in 1..corners.len() - 1 {
            let points = [corners[0], corners[i], corners[i + 1]].map(|c| self.vertex(c));
            self.session.geometry.push_triangle(points, self.placement.front_only);
        }
    }

    fn parse_corner(&self, word: &str) -> Option<Corner> {
        let mut slots = word.split('/');
        let position = resolve_index(slots.next()?, self.positions.len())?;
        let mut optional = |len: usize| match slots.next() {
            None | Some("") => Some(None),
            Some(token) => resolve_index(token, len).map(Some),
        };
        let uv = optional(self.uvs.len())?;
        let normal = optional(self.normals.len())?;
        Some(Corner { position, uv, normal })
    }

    fn vertex(&self, corner: Corner) -> TrianglePoint {
        TrianglePoint::new(
            self.positions[corner.position],
            corner.normal.map_or(Vec3::ZERO, |n| self.normals[n]),
            corner.uv.map_or(Vec2::ZERO, |t| self.uvs[t]),
        )
    }

    /// Looks the group's material up in every library named so far, the most
    /// recent one first. `None` leaves the choice to the default material.
    fn resolve_material(&self) -> Option<u32> {
        let name = self.material_name.as_ref()?;
        if self.libraries.is_empty() {
            return None;
        }
        let found = self
            .libraries
            .iter()
            .rev()
            .find_map(|library| self.session.materials.lookup(&material_key(library, name)));
        if found.is_none() {
            log::warn!("{}: material '{}' not found in any library", self.path.display(), name);
        }
        found
    }

    /// Closes the group accumulated since the last close: builds its BVH and
    /// appends a render object. Groups without triangles produce nothing.
    fn close_object(&mut self) {
        let start = self.first_triangle;
        let end = self.session.geometry.triangle_count();
        let name = self.material_name.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        let bounds = self.object_bounds.transformed(&self.inverse);
        let material_index = self.resolve_material();
        let smooth_shade = self.smooth;

        self.first_triangle = end;
        self.object_bounds = BoundingBox::EMPTY;
        self.smooth = false;

        let session = &mut *self.session;
        let build = build_bvh(&mut session.geometry, &mut session.bvh_nodes, start, end - start);
        let build = match build {
            Some(build) => build,
            None => {
                log::debug!("{}: group '{}' has no faces, skipped", self.path.display(), name);
                return;
            }
        };
        log::debug!(
            "{}: group '{}' {} triangles, {} nodes, depth {}..{}, max {} per leaf",
            self.path.display(),
            name,
            end - start,
            build.stats.node_count,
            build.stats.min_depth,
            build.stats.max_depth,
            build.stats.max_leaf_triangles
        );

        let entry = InstanceEntry {
            name,
            bvh_root: build.root,
            material_index,
            smooth_shade,
            triangles: start as u32..end as u32,
            bounds,
        };
        session.push_object(
            RenderObject::new(
                self.transform,
                entry.bvh_root,
                self.placement
                    .material_override
                    .or(material_index)
                    .unwrap_or(self.default_material),
                smooth_shade,
                self.placement.sampler,
            ),
            ObjectInfo {
                name: entry.name.clone(),
                source: self.path.clone(),
                triangles: entry.triangles.clone(),
                bounds,
                instanced: false,
            },
        );
        self.groups.push(entry);
    }
}
