use std::path::Path;

use bytemuck::Pod;
use instant::Instant;

use crate::bounds::BoundingBox;
use crate::config::Config;
use crate::error::{Result, SceneError};
use crate::geometry::GeometryPool;
use crate::material::{Material, MaterialTable};
use crate::obj::read_obj;
use crate::object::{InstanceCache, ObjectInfo, Placement};
use crate::structs::{BvhNode, RayMaterial, RenderObject, Sphere, Triangle, TrianglePoint};
use crate::texture::TextureTable;

/// Maximum number of analytic spheres the renderer accepts.
pub const MAX_SPHERES: usize = 10;

/// Every table a scene load writes into. One session is one scene; nothing is
/// shared between sessions.
#[derive(Debug, Default)]
pub struct LoadSession {
    pub(crate) geometry: GeometryPool,
    pub(crate) bvh_nodes: Vec<BvhNode>,
    pub(crate) objects: Vec<RenderObject>,
    pub(crate) object_infos: Vec<ObjectInfo>,
    pub(crate) materials: MaterialTable,
    pub(crate) textures: TextureTable,
    pub(crate) spheres: Vec<Sphere>,
    pub(crate) scene_bounds: BoundingBox,
    instances: InstanceCache,
}

/// Borrowed views of the finished scene in upload layout.
#[derive(Debug)]
pub struct SceneBuffers<'a> {
    pub points: &'a [TrianglePoint],
    pub triangles: &'a [Triangle],
    pub objects: &'a [RenderObject],
    pub bvh_nodes: &'a [BvhNode],
    pub spheres: &'a [Sphere],
    pub materials: Vec<RayMaterial>,
}

impl SceneBuffers<'_> {
    /// Total size of every buffer in bytes.
    pub fn byte_size(&self) -> usize {
        as_bytes(self.points).len()
            + as_bytes(self.triangles).len()
            + as_bytes(self.objects).len()
            + as_bytes(self.bvh_nodes).len()
            + as_bytes(self.spheres).len()
            + as_bytes(&self.materials).len()
    }
}

/// Table sizes before a model load, to undo a failed one.
#[derive(Clone, Copy)]
struct Mark {
    triangles: usize,
    bvh_nodes: usize,
    objects: usize,
    scene_bounds: BoundingBox,
}

pub fn as_bytes<T: Pod>(records: &[T]) -> &[u8] {
    bytemuck::cast_slice(records)
}

impl LoadSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_texture_capacity(capacity: usize) -> Self {
        Self {
            textures: TextureTable::new(capacity),
            ..Default::default()
        }
    }

    /// Builds a complete scene from a parsed description. Model paths are
    /// resolved against `base_dir`.
    pub fn from_config(config: &Config, base_dir: &Path) -> Result<Self> {
        let mut session = Self::with_texture_capacity(config.texture_capacity);
        for material in &config.materials {
            session.add_material(*material);
        }
        session.ensure_default_material();

        for model in &config.models {
            session.load_model(base_dir.join(&model.path), &model.placement, model.material)?;
        }
        for sphere in &config.spheres {
            let material = session.check_material(sphere.material)?;
            session.add_sphere(Sphere::new(sphere.position, sphere.radius, material));
        }
        Ok(session)
    }

    pub fn add_material(&mut self, material: Material) -> u32 {
        self.materials.push(material)
    }

    /// Returns `false` when the sphere was dropped because the scene is full.
    pub fn add_sphere(&mut self, sphere: Sphere) -> bool {
        if self.spheres.len() >= MAX_SPHERES {
            log::warn!("Sphere limit of {} reached, dropping sphere", MAX_SPHERES);
            return false;
        }
        self.spheres.push(sphere);
        true
    }

    /// Places the model at `path` into the scene. A path that was loaded
    /// before with the same `front_only` flag reuses its triangles and BVH;
    /// only new render objects are added.
    ///
    /// Groups without a resolvable material use `default_material`. If the
    /// load fails, every triangle, node and object it added is removed again.
    /// Materials and texture slots read before the failure stay.
    pub fn load_model(
        &mut self,
        path: impl AsRef<Path>,
        placement: &Placement,
        default_material: u32,
    ) -> Result<()> {
        let path = path.as_ref();
        self.ensure_default_material();
        let default_material = self.check_material(default_material)?;
        if let Some(material) = placement.material_override {
            self.check_material(material)?;
        }

        let transform = placement.transform();
        if let Some(groups) = self.instances.get(path, placement.front_only) {
            let groups = groups.to_vec();
            for group in groups {
                self.scene_bounds.grow_box(&group.bounds.transformed(&transform));
                let material = placement
                    .material_override
                    .or(group.material_index)
                    .unwrap_or(default_material);
                self.push_object(
                    RenderObject::new(
                        transform,
                        group.bvh_root,
                        material,
                        group.smooth_shade,
                        placement.sampler,
                    ),
                    ObjectInfo {
                        name: group.name,
                        source: path.to_path_buf(),
                        triangles: group.triangles,
                        bounds: group.bounds,
                        instanced: true,
                    },
                );
            }
            log::info!("Instanced {}", path.display());
            return Ok(());
        }

        let start = Instant::now();
        let mark = self.mark();
        let groups = match read_obj(self, path, placement, default_material) {
            Ok(Some(groups)) => groups,
            Ok(None) => return Ok(()),
            Err(error) => {
                self.rollback(mark);
                return Err(error);
            }
        };
        log::info!(
            "Loaded {} in {:?}: {} triangles, {} objects, {} BVH nodes",
            path.display(),
            start.elapsed(),
            self.geometry.triangle_count() - mark.triangles,
            groups.len(),
            self.bvh_nodes.len() - mark.bvh_nodes
        );
        self.instances.insert(path.to_path_buf(), placement.front_only, groups);
        Ok(())
    }

    fn mark(&self) -> Mark {
        Mark {
            triangles: self.geometry.triangle_count(),
            bvh_nodes: self.bvh_nodes.len(),
            objects: self.objects.len(),
            scene_bounds: self.scene_bounds,
        }
    }

    fn rollback(&mut self, mark: Mark) {
        self.geometry.truncate(mark.triangles);
        self.bvh_nodes.truncate(mark.bvh_nodes);
        self.objects.truncate(mark.objects);
        self.object_infos.truncate(mark.objects);
        self.scene_bounds = mark.scene_bounds;
    }

    pub(crate) fn push_object(&mut self, object: RenderObject, info: ObjectInfo) {
        self.objects.push(object);
        self.object_infos.push(info);
    }

    fn ensure_default_material(&mut self) {
        if self.materials.is_empty() {
            self.materials.push(Material::default());
        }
    }

    fn check_material(&self, index: u32) -> Result<u32> {
        if (index as usize) < self.materials.len() {
            Ok(index)
        } else {
            Err(SceneError::InvalidConfig(format!(
                "material {} does not exist, {} defined",
                index,
                self.materials.len()
            )))
        }
    }

    pub fn geometry(&self) -> &GeometryPool {
        &self.geometry
    }

    pub fn bvh_nodes(&self) -> &[BvhNode] {
        &self.bvh_nodes
    }

    pub fn objects(&self) -> &[RenderObject] {
        &self.objects
    }

    pub fn object_infos(&self) -> &[ObjectInfo] {
        &self.object_infos
    }

    pub fn materials(&self) -> &MaterialTable {
        &self.materials
    }

    pub fn textures(&self) -> &TextureTable {
        &self.textures
    }

    pub fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }

    /// World-space bounds of every vertex and instance placed so far.
    pub fn scene_bounds(&self) -> BoundingBox {
        self.scene_bounds
    }

    pub fn instanced_models(&self) -> usize {
        self.instances.len()
    }

    pub fn buffers(&self) -> SceneBuffers<'_> {
        SceneBuffers {
            points: self.geometry.points(),
            triangles: self.geometry.triangles(),
            objects: &self.objects,
            bvh_nodes: &self.bvh_nodes,
            spheres: &self.spheres,
            materials: self.materials.to_gpu(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::NodeKind;
    use glam::Vec3;
    use std::path::PathBuf;

    fn test_file(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("src/test_files").join(name)
    }

    /// Every triangle index reachable from `root`, in leaf order.
    fn leaf_triangles(nodes: &[BvhNode], root: u32) -> Vec<u32> {
        let mut stack = vec![root];
        let mut triangles = Vec::new();
        while let Some(node) = stack.pop() {
            match nodes[node as usize].kind() {
                NodeKind::Leaf { first_triangle, count } => {
                    triangles.extend(first_triangle..first_triangle + count)
                }
                NodeKind::Internal { left_child } => {
                    assert!(left_child > node);
                    stack.push(left_child);
                    stack.push(left_child + 1);
                }
            }
        }
        triangles.sort_unstable();
        triangles
    }

    #[test]
    fn test_single_triangle_scene() {
        let mut session = LoadSession::new();
        session.load_model(test_file("triangle.obj"), &Placement::default(), 0).unwrap();

        assert_eq!(session.geometry().points().len(), 3);
        assert_eq!(session.geometry().triangles().len(), 1);
        assert_eq!(session.objects().len(), 1);
        let root = session.objects()[0].bvh_index;
        assert_eq!(session.bvh_nodes()[root as usize].tri_count, 1);
        assert_eq!(session.bvh_nodes().len(), 1);
    }

    #[test]
    fn test_cube_subtree_is_bounded() {
        let mut session = LoadSession::new();
        session.load_model(test_file("cube.obj"), &Placement::default(), 0).unwrap();

        assert!(session.bvh_nodes().len() <= 23);
        let root = session.objects()[0].bvh_index;
        assert_eq!(leaf_triangles(session.bvh_nodes(), root), (0..12).collect::<Vec<_>>());
        for node in session.bvh_nodes().iter().filter(|n| n.is_leaf()) {
            assert!(node.tri_count <= 2);
        }
    }

    #[test]
    fn test_material_groups_partition_triangles() {
        let mut session = LoadSession::new();
        session.load_model(test_file("two_materials.obj"), &Placement::default(), 0).unwrap();

        assert_eq!(session.objects().len(), 2);
        let mut covered = Vec::new();
        for object in session.objects() {
            covered.extend(leaf_triangles(session.bvh_nodes(), object.bvh_index));
        }
        covered.sort_unstable();
        let total = session.geometry().triangle_count() as u32;
        assert_eq!(covered, (0..total).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_path_is_instanced() {
        let mut session = LoadSession::new();
        let path = test_file("cube.obj");
        session.load_model(&path, &Placement::default(), 0).unwrap();
        let points = session.geometry().points().len();
        let nodes = session.bvh_nodes().len();

        session.load_model(&path, &Placement::at(Vec3::new(0.0, 5.0, 0.0)), 0).unwrap();
        assert_eq!(session.geometry().points().len(), points);
        assert_eq!(session.bvh_nodes().len(), nodes);
        assert_eq!(session.objects().len(), 2);
        assert_eq!(session.objects()[0].bvh_index, session.objects()[1].bvh_index);
        assert_ne!(session.objects()[0].transform, session.objects()[1].transform);
        assert!(session.object_infos()[1].instanced);
        assert_eq!(session.instanced_models(), 1);
        // The instance still extends the scene
        assert!((session.scene_bounds().max.y - 6.0).abs() < 1e-5);
    }

    #[test]
    fn test_instance_keeps_groups_and_override() {
        let mut session = LoadSession::new();
        let path = test_file("two_materials.obj");
        session.load_model(&path, &Placement::default(), 0).unwrap();
        let placement = Placement {
            material_override: Some(0),
            ..Default::default()
        };
        session.load_model(&path, &placement, 0).unwrap();

        assert_eq!(session.objects().len(), 4);
        assert_eq!(session.objects()[2].bvh_index, session.objects()[0].bvh_index);
        assert_eq!(session.objects()[3].bvh_index, session.objects()[1].bvh_index);
        assert_eq!(session.objects()[2].material_index, 0);
        assert_eq!(session.objects()[3].material_index, 0);
        assert_eq!(session.objects()[3].smooth_shade, session.objects()[1].smooth_shade);
    }

    #[test]
    fn test_unknown_default_material_is_rejected() {
        let mut session = LoadSession::new();
        let error = session
            .load_model(test_file("triangle.obj"), &Placement::default(), 3)
            .unwrap_err();
        assert!(matches!(error, SceneError::InvalidConfig(_)));
        assert!(session.objects().is_empty());
    }

    #[test]
    fn test_missing_model_leaves_session_untouched() {
        let mut session = LoadSession::new();
        session.load_model("missing.obj", &Placement::default(), 0).unwrap();
        assert!(session.objects().is_empty());
        assert_eq!(session.instanced_models(), 0);
        assert!(session.scene_bounds().is_empty());
    }

    #[test]
    fn test_sphere_limit() {
        let mut session = LoadSession::new();
        for i in 0..MAX_SPHERES {
            assert!(session.add_sphere(Sphere::new(Vec3::new(i as f32, 0.0, 0.0), 1.0, 0)));
        }
        assert!(!session.add_sphere(Sphere::new(Vec3::ZERO, 1.0, 0)));
        assert_eq!(session.spheres().len(), MAX_SPHERES);
    }

    #[test]
    fn test_buffers_byte_views() {
        let mut session = LoadSession::new();
        session.load_model(test_file("triangle.obj"), &Placement::default(), 0).unwrap();
        session.add_sphere(Sphere::new(Vec3::ZERO, 1.0, 0));

        let buffers = session.buffers();
        assert_eq!(as_bytes(buffers.points).len(), 3 * 32);
        assert_eq!(as_bytes(buffers.triangles).len(), 48);
        assert_eq!(as_bytes(buffers.objects).len(), 80);
        assert_eq!(as_bytes(buffers.bvh_nodes).len(), 32);
        assert_eq!(buffers.materials.len(), 1);
        assert_eq!(buffers.byte_size(), 3 * 32 + 48 + 80 + 32 + 32 + 64);
    }

    #[test]
    fn test_from_config() {
        let dir = test_file("");
        let config = Config::from_str(
            r#"
            [[materials]]
            albedo = [0.5, 0.5, 0.5]

            [[models]]
            path = "cube.obj"
            position = [0.0, 0.0, -3.0]

            [[models]]
            path = "cube.obj"
            position = [0.0, 0.0, 3.0]
            material_override = 0

            [[models]]
            path = "two_materials.obj"

            [[spheres]]
            position = [0.0, 2.0, 0.0]
            radius = 0.5
            "#,
        )
        .unwrap();
        let session = LoadSession::from_config(&config, &dir).unwrap();

        assert_eq!(session.objects().len(), 4);
        assert_eq!(session.instanced_models(), 2);
        assert_eq!(session.materials().get(0).unwrap().albedo, Vec3::splat(0.5));
        // Config material plus the two from the library
        assert_eq!(session.materials().len(), 3);
        assert_eq!(session.spheres().len(), 1);
        assert_eq!(session.spheres()[0].material_index, 0);
        assert!((session.scene_bounds().min.z + 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_from_config_adds_default_material() {
        let config =
            Config::from_str("[[spheres]]\nposition = [0.0, 0.0, 0.0]\nradius = 1.0").unwrap();
        let session = LoadSession::from_config(&config, Path::new(".")).unwrap();
        assert_eq!(session.materials().len(), 1);
        assert_eq!(session.materials().get(0).unwrap().albedo, Vec3::ONE);
    }

    #[test]
    fn test_from_config_rejects_unknown_sphere_material() {
        let config = Config::from_str(
            "[[spheres]]\nposition = [0.0, 0.0, 0.0]\nradius = 1.0\nmaterial = 4",
        )
        .unwrap();
        assert!(LoadSession::from_config(&config, Path::new(".")).is_err());
    }

    #[test]
    fn test_instance_uses_its_own_default_material() {
        let mut session = LoadSession::new();
        session.add_material(Material::default());
        session.add_material(Material::default());
        let path = test_file("triangle.obj");
        session.load_model(&path, &Placement::default(), 0).unwrap();
        session.load_model(&path, &Placement::default(), 1).unwrap();

        assert_eq!(session.objects()[0].material_index, 0);
        assert_eq!(session.objects()[1].material_index, 1);
        assert!(session.object_infos()[1].instanced);
    }

    #[test]
    fn test_library_material_survives_instancing() {
        let mut session = LoadSession::new();
        let path = test_file("two_materials.obj");
        session.load_model(&path, &Placement::default(), 0).unwrap();
        let red = session.objects()[0].material_index;
        assert_ne!(red, 0);

        session.load_model(&path, &Placement::default(), 0).unwrap();
        assert_eq!(session.objects()[2].material_index, red);
    }

    #[test]
    fn test_front_only_change_builds_new_geometry() {
        let mut session = LoadSession::new();
        let path = test_file("triangle.obj");
        session.load_model(&path, &Placement::default(), 0).unwrap();
        let front_only = Placement {
            front_only: true,
            ..Default::default()
        };
        session.load_model(&path, &front_only, 0).unwrap();

        assert_eq!(session.geometry().triangle_count(), 2);
        assert_eq!(session.instanced_models(), 2);
        let triangles = session.geometry().triangles();
        for (object, expected) in session.objects().iter().zip([false, true]) {
            let root = session.bvh_nodes()[object.bvh_index as usize];
            let NodeKind::Leaf { first_triangle, .. } = root.kind() else {
                panic!("single triangle should be a leaf");
            };
            assert_eq!(triangles[first_triangle as usize].is_front_only(), expected);
        }

        // The same flag again is a cache hit
        session.load_model(&path, &front_only, 0).unwrap();
        assert_eq!(session.geometry().triangle_count(), 2);
        assert_eq!(session.objects()[2].bvh_index, session.objects()[1].bvh_index);
    }

    #[test]
    fn test_failed_load_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.png"), b"not a png").unwrap();
        let library = "newmtl broken\nmap_Kd broken.png\n";
        std::fs::write(dir.path().join("broken.mtl"), library).unwrap();
        let path = dir.path().join("late_library.obj");
        std::fs::write(
            &path,
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl a\nf 1 2 3\n\
             usemtl b\nf 1 2 3\nmtllib broken.mtl\n",
        )
        .unwrap();

        let mut session = LoadSession::new();
        session.load_model(test_file("triangle.obj"), &Placement::default(), 0).unwrap();
        let bounds = session.scene_bounds();

        let error = session.load_model(&path, &Placement::default(), 0).unwrap_err();
        assert!(matches!(error, SceneError::TextureLoad { .. }));
        assert_eq!(session.geometry().triangle_count(), 1);
        assert_eq!(session.geometry().points().len(), 3);
        assert_eq!(session.bvh_nodes().len(), 1);
        assert_eq!(session.objects().len(), 1);
        assert_eq!(session.object_infos().len(), 1);
        assert_eq!(session.scene_bounds(), bounds);
        assert_eq!(session.instanced_models(), 1);
    }
}
