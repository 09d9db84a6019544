//! Surfaces grass grows on

pub mod heightfield;
pub mod mesh;

pub use heightfield::{Heightfield, TerrainParams, splat_layer_location};
pub use mesh::SurfaceMesh;
