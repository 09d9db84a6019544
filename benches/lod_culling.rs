use criterion::{criterion_group, criterion_main, Criterion, black_box};

use std::sync::Arc;

use verdant::core::camera::Camera;
use verdant::grass::{ChunkGrid, GrassConfig, GridChunker, LodCuller, LodView, SurfaceGeometrySource};
use verdant::math::Aabb;
use verdant::terrain::{Heightfield, TerrainParams};

use glam::Vec3;

/// `n * n` unit-height chunks of edge `size` on the XZ plane
fn chunk_field(n: u32, size: f32) -> Vec<Aabb> {
    (0..n * n)
        .map(|i| {
            let min = Vec3::new((i % n) as f32 * size, 0.0, (i / n) as f32 * size);
            Aabb::new(min, min + Vec3::new(size, 1.0, size))
        })
        .collect()
}

fn bench_cull(c: &mut Criterion, name: &str, manual_culling: bool) {
    let bounds = chunk_field(64, 4.0);
    let config = GrassConfig {
        manual_culling,
        ..Default::default()
    };
    let camera = Camera::look_at(Vec3::new(128.0, 10.0, 128.0), Vec3::new(160.0, 0.0, 100.0));
    let mut culler = LodCuller::new();

    c.bench_function(name, |b| {
        b.iter(|| {
            let view = LodView::new(black_box(&camera), &config);
            culler.cull(&view, black_box(&bounds)).len()
        });
    });
}

fn bench_cull_4096(c: &mut Criterion) {
    bench_cull(c, "lod_cull_4096", false);
}

fn bench_cull_4096_frustum(c: &mut Criterion) {
    bench_cull(c, "lod_cull_4096_frustum", true);
}

fn bench_chunk_terrain(c: &mut Criterion) {
    let terrain = Heightfield::from_noise(257, 257, Vec3::new(256.0, 20.0, 256.0), &TerrainParams::default())
        .map(Arc::new);
    let Ok(terrain) = terrain else { return };
    let source = SurfaceGeometrySource::Terrain(terrain);
    let config = GrassConfig {
        chunks: ChunkGrid { x: 16, y: 1, z: 16 },
        ..Default::default()
    };
    let chunker = GridChunker::default();

    c.bench_function("chunk_terrain_257", |b| {
        b.iter(|| source.build_chunks(&chunker, black_box(&config), 1.0).len());
    });
}

criterion_group!(benches, bench_cull_4096, bench_cull_4096_frustum, bench_chunk_terrain);
criterion_main!(benches);
