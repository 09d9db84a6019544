//! Grass surface configuration (user-facing settings).
//!
//! Everything here is plain data; GPU-facing values are derived into
//! `params.rs` structs when a surface initializes.

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;

/// Distance-based level-of-detail parameters.
///
/// `blade_factor = min(1, (distance_scale / (distance - near_offset)) ^ falloff_exponent)`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodParams {
    /// Distance at which the factor reaches 1 (with falloff 1 and no offset).
    pub distance_scale: f32,
    /// Density falloff sharpness. 0 disables distance falloff entirely.
    pub falloff_exponent: f32,
    /// Positive values keep full density within this distance.
    pub near_offset: f32,
}

impl Default for LodParams {
    fn default() -> Self {
        Self {
            distance_scale: 15.0,
            falloff_exponent: 1.1,
            near_offset: 0.0,
        }
    }
}

/// Chunk counts per axis. `y` only applies to mesh surfaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkGrid {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Default for ChunkGrid {
    fn default() -> Self {
        Self { x: 5, y: 1, z: 5 }
    }
}

impl ChunkGrid {
    pub fn count(&self) -> usize {
        self.x as usize * self.y as usize * self.z as usize
    }
}

/// Settings of one grass surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrassConfig {
    /// Maximum instances drawn per chunk (at full LOD).
    pub instance_budget: u32,
    pub lod: LodParams,
    /// Chunks farther than this are never drawn.
    pub max_render_distance: f32,
    pub chunks: ChunkGrid,
    /// Blades per triangle, per instance.
    pub blades_per_triangle: u32,
    /// Terrain patches are grown by this fraction of a heightfield cell so
    /// neighbouring chunks overlap slightly.
    pub terrain_expansion: f32,
    /// Cull chunks against the camera frustum on the CPU.
    pub manual_culling: bool,
    /// Draw with per-chunk GPU indirect-args buffers instead of a matrix array.
    pub indirect_instancing: bool,
    pub cast_shadows: bool,
    pub receive_shadows: bool,
    /// Keep live GPU copies of the detail maps so they can be painted.
    pub enable_map_painting: bool,
    /// Drop terrain chunks whose footprint has no density at init.
    pub discard_empty_chunks: bool,
    /// Generate the terrain normal map at twice the heightfield resolution.
    pub high_quality_normals: bool,
}

impl Default for GrassConfig {
    fn default() -> Self {
        Self {
            instance_budget: 50,
            lod: LodParams::default(),
            max_render_distance: 150.0,
            chunks: ChunkGrid::default(),
            blades_per_triangle: 4,
            terrain_expansion: 0.35,
            manual_culling: false,
            indirect_instancing: false,
            cast_shadows: false,
            receive_shadows: true,
            enable_map_painting: false,
            discard_empty_chunks: true,
            high_quality_normals: false,
        }
    }
}

impl GrassConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Reject settings the LOD and chunking math cannot handle.
    pub fn validate(&self) -> Result<()> {
        if !(self.lod.falloff_exponent >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "falloff exponent must be >= 0, got {}",
                self.lod.falloff_exponent
            )));
        }
        if !(self.lod.distance_scale > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "distance scale must be > 0, got {}",
                self.lod.distance_scale
            )));
        }
        if !(self.max_render_distance > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "max render distance must be > 0, got {}",
                self.max_render_distance
            )));
        }
        if self.chunks.x == 0 || self.chunks.y == 0 || self.chunks.z == 0 {
            return Err(Error::InvalidConfig(format!(
                "chunk grid must be at least 1x1x1, got {}x{}x{}",
                self.chunks.x, self.chunks.y, self.chunks.z
            )));
        }
        if self.blades_per_triangle == 0 {
            return Err(Error::InvalidConfig("blades per triangle must be > 0".to_string()));
        }
        if self.terrain_expansion < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "terrain expansion must be >= 0, got {}",
                self.terrain_expansion
            )));
        }
        Ok(())
    }

    pub fn max_render_distance_sqr(&self) -> f32 {
        self.max_render_distance * self.max_render_distance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GrassConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunks.count(), 25);
        assert_eq!(config.max_render_distance_sqr(), 150.0 * 150.0);
    }

    #[test]
    fn test_negative_falloff_rejected() {
        let mut config = GrassConfig::default();
        config.lod.falloff_exponent = -0.5;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_nan_falloff_rejected() {
        let mut config = GrassConfig::default();
        config.lod.falloff_exponent = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_distance_scale_rejected() {
        for scale in [-1.0, 0.0, f32::NAN] {
            let mut config = GrassConfig::default();
            config.lod.distance_scale = scale;
            assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
        }
    }

    #[test]
    fn test_zero_falloff_accepted() {
        let mut config = GrassConfig::default();
        config.lod.falloff_exponent = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_chunks_rejected() {
        let mut config = GrassConfig::default();
        config.chunks.z = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_distance_rejected() {
        let mut config = GrassConfig::default();
        config.max_render_distance = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let config = GrassConfig::from_json(
            r#"{ "instance_budget": 8, "chunks": { "x": 4, "z": 4 }, "indirect_instancing": true }"#,
        )
        .unwrap();
        assert_eq!(config.instance_budget, 8);
        assert_eq!(config.chunks, ChunkGrid { x: 4, y: 1, z: 4 });
        assert!(config.indirect_instancing);
        assert_eq!(config.lod, LodParams::default());
    }

    #[test]
    fn test_from_json_rejects_invalid() {
        assert!(GrassConfig::from_json(r#"{ "lod": { "falloff_exponent": -1.0 } }"#).is_err());
        assert!(GrassConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = GrassConfig::default();
        config.manual_culling = true;
        config.lod.near_offset = 3.0;
        let json = config.to_json().unwrap();
        assert_eq!(GrassConfig::from_json(&json).unwrap(), config);
    }
}
