//! Triangle mesh that grass grows on in mesh mode

use glam::{Vec2, Vec3};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::grass::params::GrassVertex;
use crate::math::Aabb;

/// Indexed triangle mesh with per-vertex normals and texture coordinates.
/// The texture coordinates address the surface's detail maps.
#[derive(Clone, Debug)]
pub struct SurfaceMesh {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    uvs: Vec<Vec2>,
    indices: Vec<u32>,
}

impl SurfaceMesh {
    /// Build a mesh. Missing normals (empty vec) are derived from face normals.
    pub fn new(positions: Vec<Vec3>, normals: Vec<Vec3>, uvs: Vec<Vec2>, indices: Vec<u32>) -> Result<Self> {
        if indices.len() % 3 != 0 {
            return Err(Error::InvalidConfig(format!(
                "index count {} is not a multiple of 3",
                indices.len()
            )));
        }
        if uvs.len() != positions.len() {
            return Err(Error::InvalidConfig("mesh needs one uv per vertex".to_string()));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(Error::InvalidConfig(format!("index {} out of range", bad)));
        }

        let normals = if normals.is_empty() {
            face_normals(&positions, &indices)
        } else if normals.len() == positions.len() {
            normals
        } else {
            return Err(Error::InvalidConfig("mesh needs one normal per vertex".to_string()));
        };

        Ok(Self {
            positions,
            normals,
            uvs,
            indices,
        })
    }

    /// Subdivided plane on XZ centered at the origin, facing +Y, uv (0,0) at -x/-z
    pub fn plane(size: Vec2, subdivisions: u32) -> Self {
        let n = subdivisions.max(1);
        let mut positions = Vec::with_capacity(((n + 1) * (n + 1)) as usize);
        let mut uvs = Vec::with_capacity(positions.capacity());
        for z in 0..=n {
            for x in 0..=n {
                let uv = Vec2::new(x as f32 / n as f32, z as f32 / n as f32);
                positions.push(Vec3::new((uv.x - 0.5) * size.x, 0.0, (uv.y - 0.5) * size.y));
                uvs.push(uv);
            }
        }

        let mut indices = Vec::with_capacity((n * n * 6) as usize);
        for z in 0..n {
            for x in 0..n {
                let i0 = z * (n + 1) + x;
                let i1 = i0 + 1;
                let i2 = i0 + n + 1;
                let i3 = i2 + 1;
                indices.extend_from_slice(&[i0, i2, i1, i1, i2, i3]);
            }
        }

        let normals = vec![Vec3::Y; positions.len()];
        Self {
            positions,
            normals,
            uvs,
            indices,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn bounds(&self) -> Aabb {
        let mut iter = self.positions.iter();
        let Some(&first) = iter.next() else {
            return Aabb::default();
        };
        let mut bounds = Aabb::new(first, first);
        for &p in iter {
            bounds.expand(p);
        }
        bounds
    }

    /// Corners of triangle `i` in shader layout
    pub fn triangle(&self, i: usize) -> [GrassVertex; 3] {
        let base = i * 3;
        [0, 1, 2].map(|k| {
            let v = self.indices[base + k] as usize;
            GrassVertex::new(self.positions[v], self.normals[v], self.uvs[v])
        })
    }

    /// Centroid of triangle `i`
    pub fn centroid(&self, i: usize) -> Vec3 {
        let base = i * 3;
        (self.positions[self.indices[base] as usize]
            + self.positions[self.indices[base + 1] as usize]
            + self.positions[self.indices[base + 2] as usize])
            / 3.0
    }
}

fn face_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let n = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        for i in [a, b, c] {
            normals[i] += n;
        }
    }
    normals
        .into_iter()
        .map(|n| n.try_normalize().unwrap_or(Vec3::Y))
        .collect()
}
