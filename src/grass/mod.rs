//! Instanced grass surfaces.
//!
//! A [`GrassSurface`] chunks a mesh or terrain, LOD-culls the chunks every
//! frame and draws instanced blades shaped by two detail maps (color and
//! parameters). Maps can be painted on the GPU and saved back to PNG.
//! Ripples and wind noise live in [`GrassServices`], shared by all surfaces.

pub mod brush;
pub mod chunk;
pub mod config;
pub mod detail_map;
pub mod lod;
pub mod material;
pub mod paint;
pub mod params;
pub mod ripple;
pub mod services;
pub mod surface;

pub use brush::{Brush, BrushList};
pub use chunk::{Chunk, ChunkDescriptor, ChunkGeometryProvider, GridChunker, SurfaceGeometrySource};
pub use config::{ChunkGrid, GrassConfig, LodParams};
pub use detail_map::{DetailMap, DetailMapAsset, DetailMapStore, MapKind};
pub use lod::{DrawItem, LodCuller, LodView};
pub use material::GrassMaterial;
pub use paint::{BlendMode, PaintStroke, SplatMode};
pub use ripple::{RippleDesc, RippleEmitter, RippleSimulator};
pub use services::GrassServices;
pub use surface::{GrassSurface, SurfaceState};
