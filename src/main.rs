use std::path::{Path, PathBuf};

use anyhow::Context;
use instant::Instant;
use scene::{as_bytes, Config, LoadSession};

const DEFAULT_SCENE: &str = "scenes/cornell_box.toml";

/// Entry point for the application.
///
/// Loads the scene description given as the first argument (or the bundled Cornell box),
/// builds every buffer the renderer uploads and logs a summary of the result.
/// Set `RUST_LOG=debug` to see per-object BVH statistics.
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let scene_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SCENE));

    let config = Config::new(&scene_path)
        .with_context(|| format!("Could not load scene {}", scene_path.display()))?;
    let base_dir = scene_path.parent().unwrap_or_else(|| Path::new("."));

    let start = Instant::now();
    let session = LoadSession::from_config(&config, base_dir)
        .with_context(|| format!("Could not build scene {}", scene_path.display()))?;
    log::info!("Scene built in {:?}", start.elapsed());

    for (object, info) in session.objects().iter().zip(session.object_infos()) {
        log::info!(
            "Object '{}' from {}: triangles {:?}, BVH root {}, material {}{}",
            info.name,
            info.source.display(),
            info.triangles,
            object.bvh_index,
            object.material_index,
            if info.instanced { " (instance)" } else { "" }
        );
    }

    let bounds = session.scene_bounds();
    log::info!("Scene bounds {} .. {}", bounds.min, bounds.max);

    let buffers = session.buffers();
    log_buffer("Vertices", buffers.points);
    log_buffer("Triangles", buffers.triangles);
    log_buffer("BVH nodes", buffers.bvh_nodes);
    log_buffer("Objects", buffers.objects);
    log_buffer("Materials", &buffers.materials);
    log_buffer("Spheres", buffers.spheres);
    log::info!(
        "{:<10} {:>8} of {} slots",
        "Textures:",
        session.textures().len(),
        session.textures().capacity()
    );
    log::info!("Total upload size {} bytes", buffers.byte_size());

    Ok(())
}

fn log_buffer<T: bytemuck::Pod>(name: &str, records: &[T]) {
    let label = format!("{name}:");
    log::info!("{:<10} {:>8} ({} bytes)", label, records.len(), as_bytes(records).len());
}
