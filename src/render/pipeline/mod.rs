//! Render and compute pipelines

pub mod chunk_scan;
pub mod grass_draw;
pub mod paint;
pub mod ripple;
pub mod terrain_maps;

pub use chunk_scan::{ChunkScanPipeline, ScanParams};
pub use grass_draw::{GrassDrawPipeline, InstancingMode};
pub use paint::{PaintParams, PaintPipeline, SplatParams, SplatPipeline, DETAIL_MAP_FORMAT};
pub use ripple::{RippleParams, RipplePipeline};
pub use terrain_maps::{NoisePipeline, NormalMapPipeline, TerrainNormalMap, NOISE_SIZE};
