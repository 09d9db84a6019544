//! GPU-ready grass structs. Each must match its counterpart in grass.wgsl.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

use super::material::GrassMaterial;

/// Per-surface uniform (128 bytes, 16-byte aligned). Matches `Surface`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SurfaceUniform {
    pub object_matrix: [[f32; 4]; 4],
    // -- 64 bytes --
    pub base_color: [f32; 4],
    // -- 16 bytes --
    /// height, width, wind strength, wind scale
    pub blade: [f32; 4],
    // -- 16 bytes --
    /// terrain map offset, ripple strength, flatten strength, unused
    pub misc: [f32; 4],
    // -- 16 bytes --
    /// blades per triangle, sample normal map, ripple capacity, unused
    pub flags: [u32; 4],
    // -- 16 bytes --
    // Total: 128 bytes
}

impl SurfaceUniform {
    pub fn new(
        object_matrix: Mat4,
        material: &GrassMaterial,
        blades_per_triangle: u32,
        terrain_map_offset: Option<f32>,
        ripple_capacity: u32,
    ) -> Self {
        Self {
            object_matrix: object_matrix.to_cols_array_2d(),
            base_color: material.base_color,
            blade: [
                material.blade_height,
                material.blade_width,
                material.wind_strength,
                material.wind_scale,
            ],
            misc: [
                terrain_map_offset.unwrap_or(0.0),
                material.ripple_strength,
                material.flatten_strength,
                0.0,
            ],
            flags: [
                blades_per_triangle.max(1),
                terrain_map_offset.is_some() as u32,
                ripple_capacity,
                0,
            ],
        }
    }
}

/// Per-chunk uniform (32 bytes). Matches `Chunk`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ChunkUniform {
    /// Chunk grid position, w = seed for blade placement
    pub grid_pos: [f32; 4],
    /// x = triangle count
    pub counts: [u32; 4],
}

impl ChunkUniform {
    pub fn new(grid_pos: [u32; 3], seed: u32, triangle_count: u32) -> Self {
        Self {
            grid_pos: [grid_pos[0] as f32, grid_pos[1] as f32, grid_pos[2] as f32, seed as f32],
            counts: [triangle_count, 0, 0, 0],
        }
    }
}

/// One corner of a chunk triangle (32 bytes). Matches `GrassVertex`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GrassVertex {
    /// xyz = local position, w = u
    pub pos_u: [f32; 4],
    /// xyz = local normal, w = v
    pub normal_v: [f32; 4],
}

impl GrassVertex {
    pub fn new(position: Vec3, normal: Vec3, uv: Vec2) -> Self {
        Self {
            pos_u: [position.x, position.y, position.z, uv.x],
            normal_v: [normal.x, normal.y, normal.z, uv.y],
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(self.pos_u[0], self.pos_u[1], self.pos_u[2])
    }

    pub fn uv(&self) -> Vec2 {
        Vec2::new(self.pos_u[3], self.normal_v[3])
    }
}

/// Arguments of a non-indexed indirect draw, laid out as wgpu expects.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct DrawIndirectArgs {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

/// Vertices emitted per blade by the vertex shader
pub const VERTICES_PER_BLADE: u32 = 9;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_uniform_size() {
        assert_eq!(std::mem::size_of::<SurfaceUniform>(), 128);
        assert_eq!(std::mem::size_of::<SurfaceUniform>() % 16, 0);
    }

    #[test]
    fn test_chunk_and_vertex_sizes() {
        assert_eq!(std::mem::size_of::<ChunkUniform>(), 32);
        assert_eq!(std::mem::size_of::<GrassVertex>(), 32);
        assert_eq!(std::mem::size_of::<DrawIndirectArgs>(), 16);
    }

    #[test]
    fn test_surface_flags() {
        let material = GrassMaterial::default();
        let mesh = SurfaceUniform::new(Mat4::IDENTITY, &material, 0, None, 128);
        assert_eq!(mesh.flags, [1, 0, 128, 0]);

        let terrain = SurfaceUniform::new(Mat4::IDENTITY, &material, 4, Some(0.25), 128);
        assert_eq!(terrain.flags[1], 1);
        assert_eq!(terrain.misc[0], 0.25);
    }

    #[test]
    fn test_vertex_accessors() {
        let v = GrassVertex::new(Vec3::new(1.0, 2.0, 3.0), Vec3::Y, Vec2::new(0.25, 0.75));
        assert_eq!(v.position(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(v.uv(), Vec2::new(0.25, 0.75));
    }
}
