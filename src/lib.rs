//! Verdant - chunked, LOD-culled instanced grass on wgpu

pub mod core;
pub mod math;
pub mod render;
pub mod grass;
pub mod terrain;
pub mod texture;
