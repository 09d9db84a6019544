//! Chunks: spatial partitions of a grass surface, one instanced draw each.
//!
//! Chunking runs on the CPU (`ChunkGeometryProvider`) and yields plain
//! `ChunkDescriptor`s; `Chunk::upload` turns those into GPU resources.

use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use rayon::prelude::*;

use super::config::{ChunkGrid, GrassConfig};
use super::params::{ChunkUniform, DrawIndirectArgs, GrassVertex, VERTICES_PER_BLADE};
use crate::core::error::Error;
use crate::core::types::Result;
use crate::math::Aabb;
use crate::terrain::{Heightfield, SurfaceMesh};

/// CPU-side chunk produced by a [`ChunkGeometryProvider`]
#[derive(Clone, Debug)]
pub struct ChunkDescriptor {
    /// Position in the chunk grid (x, y, z)
    pub grid_pos: [u32; 3],
    /// Bounds of the geometry, already grown by blade height
    pub local_bounds: Aabb,
    /// Three corners per triangle
    pub triangles: Vec<GrassVertex>,
    pub instance_budget_hint: u32,
}

impl ChunkDescriptor {
    pub fn triangle_count(&self) -> u32 {
        (self.triangles.len() / 3) as u32
    }
}

/// Partitions a surface into chunks.
pub trait ChunkGeometryProvider {
    /// Bucket mesh triangles into an x/y/z grid over the mesh bounds
    fn chunk_mesh(
        &self,
        mesh: &SurfaceMesh,
        grid: ChunkGrid,
        instance_budget_hint: u32,
        blade_height: f32,
    ) -> Vec<ChunkDescriptor>;

    /// Cut a heightfield into `chunks_x * chunks_z` patches, returned in
    /// `z * chunks_x + x` order
    fn chunk_terrain(
        &self,
        terrain: &Heightfield,
        chunks_x: u32,
        chunks_z: u32,
        instance_budget_hint: u32,
        expansion: f32,
        blade_height: f32,
    ) -> Vec<ChunkDescriptor>;
}

/// Default uniform-grid chunker
#[derive(Clone, Copy, Debug)]
pub struct GridChunker {
    /// Upper bound on heightfield cells per terrain chunk edge
    pub max_terrain_cells: u32,
}

impl Default for GridChunker {
    fn default() -> Self {
        Self { max_terrain_cells: 32 }
    }
}

fn grid_cell(value: f32, min: f32, extent: f32, count: u32) -> u32 {
    if extent <= f32::EPSILON {
        return 0;
    }
    let t = (value - min) / extent;
    ((t * count as f32) as u32).min(count - 1)
}

impl ChunkGeometryProvider for GridChunker {
    fn chunk_mesh(
        &self,
        mesh: &SurfaceMesh,
        grid: ChunkGrid,
        instance_budget_hint: u32,
        blade_height: f32,
    ) -> Vec<ChunkDescriptor> {
        let bounds = mesh.bounds();
        let size = bounds.size();
        let (gx, gy, gz) = (grid.x.max(1), grid.y.max(1), grid.z.max(1));

        let cells: Vec<usize> = (0..mesh.triangle_count())
            .into_par_iter()
            .map(|i| {
                let c = mesh.centroid(i);
                let x = grid_cell(c.x, bounds.min.x, size.x, gx);
                let y = grid_cell(c.y, bounds.min.y, size.y, gy);
                let z = grid_cell(c.z, bounds.min.z, size.z, gz);
                ((z * gy + y) * gx + x) as usize
            })
            .collect();

        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); (gx * gy * gz) as usize];
        for (tri, &cell) in cells.iter().enumerate() {
            buckets[cell].push(tri);
        }

        buckets
            .into_par_iter()
            .enumerate()
            .filter(|(_, tris)| !tris.is_empty())
            .map(|(cell, tris)| {
                let cell = cell as u32;
                let grid_pos = [cell % gx, (cell / gx) % gy, cell / (gx * gy)];
                let triangles: Vec<GrassVertex> = tris.iter().flat_map(|&t| mesh.triangle(t)).collect();
                ChunkDescriptor {
                    grid_pos,
                    local_bounds: triangle_bounds(&triangles).inflated(Vec3::splat(blade_height)),
                    triangles,
                    instance_budget_hint,
                }
            })
            .collect()
    }

    fn chunk_terrain(
        &self,
        terrain: &Heightfield,
        chunks_x: u32,
        chunks_z: u32,
        instance_budget_hint: u32,
        expansion: f32,
        blade_height: f32,
    ) -> Vec<ChunkDescriptor> {
        let (cx_count, cz_count) = (chunks_x.max(1), chunks_z.max(1));
        let cells_x = (terrain.width() - 1).div_ceil(cx_count).clamp(1, self.max_terrain_cells.max(1));
        let cells_z = (terrain.depth() - 1).div_ceil(cz_count).clamp(1, self.max_terrain_cells.max(1));
        let grow = Vec2::new(
            expansion / (terrain.width() - 1) as f32,
            expansion / (terrain.depth() - 1) as f32,
        );

        (0..cx_count * cz_count)
            .into_par_iter()
            .map(|i| {
                let (cx, cz) = (i % cx_count, i / cx_count);
                let uv_min = (Vec2::new(cx as f32 / cx_count as f32, cz as f32 / cz_count as f32) - grow)
                    .max(Vec2::ZERO);
                let uv_max = (Vec2::new((cx + 1) as f32 / cx_count as f32, (cz + 1) as f32 / cz_count as f32)
                    + grow)
                    .min(Vec2::ONE);

                let triangles = terrain_patch(terrain, uv_min, uv_max, cells_x, cells_z);
                ChunkDescriptor {
                    grid_pos: [cx, 0, cz],
                    local_bounds: triangle_bounds(&triangles).inflated(Vec3::splat(blade_height)),
                    triangles,
                    instance_budget_hint,
                }
            })
            .collect()
    }
}

fn terrain_patch(terrain: &Heightfield, uv_min: Vec2, uv_max: Vec2, cells_x: u32, cells_z: u32) -> Vec<GrassVertex> {
    let corner = |x: u32, z: u32| {
        let t = Vec2::new(x as f32 / cells_x as f32, z as f32 / cells_z as f32);
        let uv = uv_min + (uv_max - uv_min) * t;
        GrassVertex::new(terrain.point_at_uv(uv), terrain.normal_at_uv(uv), uv)
    };

    let mut triangles = Vec::with_capacity((cells_x * cells_z * 6) as usize);
    for z in 0..cells_z {
        for x in 0..cells_x {
            let (v00, v10, v01, v11) = (corner(x, z), corner(x + 1, z), corner(x, z + 1), corner(x + 1, z + 1));
            triangles.extend_from_slice(&[v00, v01, v10, v10, v01, v11]);
        }
    }
    triangles
}

fn triangle_bounds(triangles: &[GrassVertex]) -> Aabb {
    let mut iter = triangles.iter().map(GrassVertex::position);
    let Some(first) = iter.next() else {
        return Aabb::default();
    };
    iter.fold(Aabb::new(first, first), |mut b, p| {
        b.expand(p);
        b
    })
}

/// What a surface grows on, resolved once at init.
#[derive(Clone, Debug)]
pub enum SurfaceGeometrySource {
    Mesh(Arc<SurfaceMesh>),
    Terrain(Arc<Heightfield>),
}

impl SurfaceGeometrySource {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Mesh(mesh) if mesh.is_empty() => Err(Error::MissingAsset("mesh triangles")),
            _ => Ok(()),
        }
    }

    pub fn build_chunks(
        &self,
        provider: &dyn ChunkGeometryProvider,
        config: &GrassConfig,
        blade_height: f32,
    ) -> Vec<ChunkDescriptor> {
        match self {
            Self::Mesh(mesh) => provider.chunk_mesh(mesh, config.chunks, config.instance_budget, blade_height),
            Self::Terrain(terrain) => provider.chunk_terrain(
                terrain,
                config.chunks.x,
                config.chunks.z,
                config.instance_budget,
                config.terrain_expansion,
                blade_height,
            ),
        }
    }

    /// Matrix blades are placed with. Terrains only follow their transform's translation.
    pub fn object_matrix(&self, transform: &Mat4) -> Mat4 {
        match self {
            Self::Mesh(_) => *transform,
            Self::Terrain(_) => Mat4::from_translation(transform.w_axis.truncate()),
        }
    }

    pub fn world_bounds(&self, local: &Aabb, transform: &Mat4) -> Aabb {
        local.transformed(&self.object_matrix(transform))
    }

    pub fn heightfield(&self) -> Option<&Heightfield> {
        match self {
            Self::Terrain(terrain) => Some(terrain),
            Self::Mesh(_) => None,
        }
    }
}

/// GPU-resident chunk
pub struct Chunk {
    pub grid_pos: [u32; 3],
    pub local_bounds: Aabb,
    pub world_bounds: Aabb,
    pub triangle_count: u32,
    /// Set by the LOD pass every frame
    pub live_instance_count: u32,
    triangle_buffer: wgpu::Buffer,
    params_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    indirect_args: Option<wgpu::Buffer>,
}

impl Chunk {
    /// Upload a descriptor's triangles and per-chunk params
    pub fn upload(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        desc: &ChunkDescriptor,
        seed: u32,
    ) -> Self {
        let triangle_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_chunk_triangles"),
            size: (desc.triangles.len().max(3) * std::mem::size_of::<GrassVertex>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&triangle_buffer, 0, bytemuck::cast_slice(&desc.triangles));

        let params = ChunkUniform::new(desc.grid_pos, seed, desc.triangle_count());
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_chunk_params"),
            size: std::mem::size_of::<ChunkUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&params_buffer, 0, bytemuck::bytes_of(&params));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grass_chunk_bind_group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: triangle_buffer.as_entire_binding(),
                },
            ],
        });

        Self {
            grid_pos: desc.grid_pos,
            local_bounds: desc.local_bounds,
            world_bounds: desc.local_bounds,
            triangle_count: desc.triangle_count(),
            live_instance_count: 0,
            triangle_buffer,
            params_buffer,
            bind_group,
            indirect_args: None,
        }
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    /// Vertices per instance for this chunk's draw
    pub fn vertex_count(&self, blades_per_triangle: u32) -> u32 {
        self.triangle_count * blades_per_triangle.max(1) * VERTICES_PER_BLADE
    }

    pub fn update_world_bounds(&mut self, source: &SurfaceGeometrySource, transform: &Mat4) {
        self.world_bounds = source.world_bounds(&self.local_bounds, transform);
    }

    /// Allocate the indirect-args buffer if missing
    pub fn ensure_indirect_args(&mut self, device: &wgpu::Device) {
        if self.indirect_args.is_none() {
            self.indirect_args = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("grass_chunk_indirect_args"),
                size: std::mem::size_of::<DrawIndirectArgs>() as u64,
                usage: wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
    }

    pub fn release_indirect_args(&mut self) {
        if let Some(buffer) = self.indirect_args.take() {
            buffer.destroy();
        }
    }

    pub fn indirect_args(&self) -> Option<&wgpu::Buffer> {
        self.indirect_args.as_ref()
    }

    /// Free all GPU memory now instead of waiting for drop
    pub fn destroy(mut self) {
        self.release_indirect_args();
        self.triangle_buffer.destroy();
        self.params_buffer.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_chunking_covers_all_triangles() {
        let mesh = SurfaceMesh::plane(Vec2::splat(10.0), 8);
        let grid = ChunkGrid { x: 2, y: 1, z: 2 };
        let chunks = GridChunker::default().chunk_mesh(&mesh, grid, 4, 1.0);
        assert_eq!(chunks.len(), 4);
        let total: u32 = chunks.iter().map(|c| c.triangle_count()).sum();
        assert_eq!(total as usize, mesh.triangle_count());
    }

    #[test]
    fn test_mesh_chunk_bounds_include_blade_height() {
        let mesh = SurfaceMesh::plane(Vec2::splat(4.0), 2);
        let chunks = GridChunker::default().chunk_mesh(&mesh, ChunkGrid { x: 1, y: 1, z: 1 }, 4, 0.5);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].local_bounds.max.y, 0.5);
        assert_eq!(chunks[0].local_bounds.min.y, -0.5);
        assert_eq!(chunks[0].local_bounds.max.x, 2.5);
    }

    #[test]
    fn test_flat_axis_does_not_split() {
        // Plane has no height; chunks.y = 3 still yields one layer
        let mesh = SurfaceMesh::plane(Vec2::splat(4.0), 4);
        let chunks = GridChunker::default().chunk_mesh(&mesh, ChunkGrid { x: 1, y: 3, z: 1 }, 4, 0.1);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].grid_pos, [0, 0, 0]);
    }

    #[test]
    fn test_terrain_chunk_order_and_count() {
        let terrain = Heightfield::flat(17, 17, Vec3::new(16.0, 1.0, 16.0)).unwrap();
        let chunks = GridChunker::default().chunk_terrain(&terrain, 4, 4, 4, 0.0, 1.0);
        assert_eq!(chunks.len(), 16);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.grid_pos, [i as u32 % 4, 0, i as u32 / 4]);
            // 4x4 cells per chunk, two triangles each
            assert_eq!(chunk.triangle_count(), 32);
        }
        let last = &chunks[15].local_bounds;
        assert!((last.min.x - 11.0).abs() < 1e-4 && (last.max.x - 17.0).abs() < 1e-4);
    }

    #[test]
    fn test_terrain_expansion_overlaps_neighbours() {
        let terrain = Heightfield::flat(9, 9, Vec3::new(8.0, 1.0, 8.0)).unwrap();
        let chunks = GridChunker::default().chunk_terrain(&terrain, 2, 2, 4, 0.5, 0.0);
        // Chunk 0 covers x in [0, 4] plus half a cell
        assert!((chunks[0].local_bounds.max.x - 4.5).abs() < 1e-4);
        // Clamped at the terrain edge
        assert_eq!(chunks[0].local_bounds.min.x, 0.0);
    }

    #[test]
    fn test_terrain_uvs_span_patch() {
        let terrain = Heightfield::flat(5, 5, Vec3::new(4.0, 1.0, 4.0)).unwrap();
        let chunks = GridChunker::default().chunk_terrain(&terrain, 1, 1, 4, 0.0, 0.0);
        let uvs: Vec<Vec2> = chunks[0].triangles.iter().map(GrassVertex::uv).collect();
        assert!(uvs.contains(&Vec2::ZERO));
        assert!(uvs.contains(&Vec2::ONE));
    }

    #[test]
    fn test_source_world_bounds() {
        let local = Aabb::new(Vec3::ZERO, Vec3::ONE);
        let transform = Mat4::from_scale_rotation_translation(
            Vec3::splat(2.0),
            glam::Quat::IDENTITY,
            Vec3::new(10.0, 0.0, 0.0),
        );

        let mesh = SurfaceGeometrySource::Mesh(Arc::new(SurfaceMesh::plane(Vec2::ONE, 1)));
        let b = mesh.world_bounds(&local, &transform);
        assert_eq!(b.min, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(b.max, Vec3::new(12.0, 2.0, 2.0));

        let terrain = SurfaceGeometrySource::Terrain(Arc::new(Heightfield::flat(2, 2, Vec3::ONE).unwrap()));
        let b = terrain.world_bounds(&local, &transform);
        assert_eq!(b.min, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(b.max, Vec3::new(11.0, 1.0, 1.0));
    }

    #[test]
    fn test_empty_mesh_source_invalid() {
        let empty = SurfaceMesh::new(vec![], vec![], vec![], vec![]).unwrap();
        assert!(SurfaceGeometrySource::Mesh(Arc::new(empty)).validate().is_err());
    }
}
