//! Heightfield terrain with optional splat (layer opacity) maps

use glam::{Vec2, Vec3};
use image::Rgba32FImage;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use crate::core::error::Error;
use crate::core::types::Result;

/// Parameters controlling noise-generated heightfields
#[derive(Clone, Debug)]
pub struct TerrainParams {
    pub seed: u32,
    pub scale: f32,       // Horizontal noise scale in world units (larger = smoother)
    pub octaves: u32,     // FBM octaves (detail levels)
    pub persistence: f32, // FBM persistence (0.5 typical)
    pub lacunarity: f32,  // FBM lacunarity (2.0 typical)
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            seed: 12345,
            scale: 100.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

/// Grid of normalized heights spanning `size` in local space.
///
/// Sample `(x, z)` sits at `(x / (width - 1) * size.x, h * size.y, z / (depth - 1) * size.z)`.
/// Texture coordinate u runs along x and v along z.
#[derive(Clone, Debug)]
pub struct Heightfield {
    width: u32,
    depth: u32,
    size: Vec3,
    heights: Vec<f32>,
    splat_maps: Vec<Rgba32FImage>,
}

impl Heightfield {
    /// Build from row-major heights in [0, 1] (`z * width + x`)
    pub fn new(width: u32, depth: u32, size: Vec3, heights: Vec<f32>) -> Result<Self> {
        if width < 2 || depth < 2 {
            return Err(Error::InvalidConfig(format!(
                "heightfield needs at least 2x2 samples, got {}x{}",
                width, depth
            )));
        }
        if heights.len() != (width * depth) as usize {
            return Err(Error::InvalidConfig(format!(
                "heightfield expects {} samples, got {}",
                width * depth,
                heights.len()
            )));
        }
        if size.x <= 0.0 || size.z <= 0.0 {
            return Err(Error::InvalidConfig("heightfield size must be positive".to_string()));
        }
        Ok(Self {
            width,
            depth,
            size,
            heights,
            splat_maps: Vec::new(),
        })
    }

    /// Build by evaluating `f(u, v)` at every sample, u and v in [0, 1]
    pub fn from_fn(width: u32, depth: u32, size: Vec3, f: impl Fn(f32, f32) -> f32) -> Result<Self> {
        let w = width.max(2);
        let d = depth.max(2);
        let heights = (0..d)
            .flat_map(|z| (0..w).map(move |x| (x, z)))
            .map(|(x, z)| {
                let u = x as f32 / (w - 1) as f32;
                let v = z as f32 / (d - 1) as f32;
                f(u, v).clamp(0.0, 1.0)
            })
            .collect();
        Self::new(width, depth, size, heights)
    }

    /// Flat terrain at height 0
    pub fn flat(width: u32, depth: u32, size: Vec3) -> Result<Self> {
        Self::from_fn(width, depth, size, |_, _| 0.0)
    }

    /// Rolling terrain from fractal Brownian motion
    pub fn from_noise(width: u32, depth: u32, size: Vec3, params: &TerrainParams) -> Result<Self> {
        let noise = Fbm::<Perlin>::new(params.seed)
            .set_octaves(params.octaves as usize)
            .set_persistence(params.persistence as f64)
            .set_lacunarity(params.lacunarity as f64);

        Self::from_fn(width, depth, size, |u, v| {
            let nx = (u * size.x / params.scale) as f64;
            let nz = (v * size.z / params.scale) as f64;
            // [-1, 1] -> [0, 1]
            ((noise.get([nx, nz]) + 1.0) * 0.5) as f32
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn size(&self) -> Vec3 {
        self.size
    }

    pub fn heights(&self) -> &[f32] {
        &self.heights
    }

    /// Normalized height of a sample, coordinates clamped to the grid
    pub fn sample(&self, x: u32, z: u32) -> f32 {
        let x = x.min(self.width - 1);
        let z = z.min(self.depth - 1);
        self.heights[(z * self.width + x) as usize]
    }

    /// Bilinear normalized height at texture coordinate `uv`
    pub fn sample_uv(&self, uv: Vec2) -> f32 {
        let uv = uv.clamp(Vec2::ZERO, Vec2::ONE);
        let fx = uv.x * (self.width - 1) as f32;
        let fz = uv.y * (self.depth - 1) as f32;
        let x0 = fx.floor() as u32;
        let z0 = fz.floor() as u32;
        let tx = fx - x0 as f32;
        let tz = fz - z0 as f32;

        let h00 = self.sample(x0, z0);
        let h10 = self.sample(x0 + 1, z0);
        let h01 = self.sample(x0, z0 + 1);
        let h11 = self.sample(x0 + 1, z0 + 1);

        let a = h00 + (h10 - h00) * tx;
        let b = h01 + (h11 - h01) * tx;
        a + (b - a) * tz
    }

    /// Local-space surface point at texture coordinate `uv`
    pub fn point_at_uv(&self, uv: Vec2) -> Vec3 {
        Vec3::new(
            uv.x * self.size.x,
            self.sample_uv(uv) * self.size.y,
            uv.y * self.size.z,
        )
    }

    /// Local-space normal from central differences of the height samples
    pub fn normal_at_uv(&self, uv: Vec2) -> Vec3 {
        let du = 1.0 / (self.width - 1) as f32;
        let dv = 1.0 / (self.depth - 1) as f32;
        let hx = (self.sample_uv(uv + Vec2::new(du, 0.0)) - self.sample_uv(uv - Vec2::new(du, 0.0)))
            * self.size.y;
        let hz = (self.sample_uv(uv + Vec2::new(0.0, dv)) - self.sample_uv(uv - Vec2::new(0.0, dv)))
            * self.size.y;
        let sx = 2.0 * du * self.size.x;
        let sz = 2.0 * dv * self.size.z;
        Vec3::new(-hx / sx, 1.0, -hz / sz).normalize()
    }

    /// Attach the next four splat layers (one per channel)
    pub fn add_splat_map(&mut self, map: Rgba32FImage) {
        self.splat_maps.push(map);
    }

    pub fn splat_maps(&self) -> &[Rgba32FImage] {
        &self.splat_maps
    }

    /// Alpha map and channel holding splat layer `layer`
    pub fn splat_layer(&self, layer: u32) -> Option<(&Rgba32FImage, u32)> {
        let (index, channel) = splat_layer_location(layer);
        self.splat_maps.get(index).map(|map| (map, channel))
    }
}

/// Splat layer `l` lives in alpha map `l / 4`, channel `l % 4`
pub fn splat_layer_location(layer: u32) -> (usize, u32) {
    ((layer / 4) as usize, layer % 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_bad_sample_count() {
        assert!(Heightfield::new(4, 4, Vec3::ONE, vec![0.0; 15]).is_err());
        assert!(Heightfield::new(1, 4, Vec3::ONE, vec![0.0; 4]).is_err());
    }

    #[test]
    fn test_flat_heights() {
        let hf = Heightfield::flat(8, 8, Vec3::new(10.0, 5.0, 10.0)).unwrap();
        assert!(hf.heights().iter().all(|&h| h == 0.0));
        assert_eq!(hf.normal_at_uv(Vec2::splat(0.5)), Vec3::Y);
    }

    #[test]
    fn test_bilinear_sampling() {
        let hf = Heightfield::new(2, 2, Vec3::ONE, vec![0.0, 1.0, 0.0, 1.0]).unwrap();
        assert!((hf.sample_uv(Vec2::new(0.5, 0.5)) - 0.5).abs() < 1e-6);
        assert!((hf.sample_uv(Vec2::new(0.25, 0.0)) - 0.25).abs() < 1e-6);
        assert_eq!(hf.sample_uv(Vec2::new(2.0, 0.0)), 1.0);
    }

    #[test]
    fn test_point_at_uv_scales() {
        let hf = Heightfield::from_fn(3, 3, Vec3::new(20.0, 4.0, 10.0), |_, _| 0.5).unwrap();
        let p = hf.point_at_uv(Vec2::new(1.0, 0.5));
        assert!((p - Vec3::new(20.0, 2.0, 5.0)).length() < 1e-5);
    }

    #[test]
    fn test_slope_normal_tilts() {
        // Rising along +x: normal leans toward -x
        let hf = Heightfield::from_fn(9, 9, Vec3::new(8.0, 8.0, 8.0), |u, _| u).unwrap();
        let n = hf.normal_at_uv(Vec2::splat(0.5));
        assert!(n.x < -0.5);
        assert!(n.z.abs() < 1e-5);
    }

    #[test]
    fn test_noise_heights_in_range() {
        let hf = Heightfield::from_noise(16, 16, Vec3::splat(64.0), &TerrainParams::default()).unwrap();
        assert!(hf.heights().iter().all(|h| (0.0..=1.0).contains(h)));
    }

    #[test]
    fn test_splat_layer_addressing() {
        assert_eq!(splat_layer_location(0), (0, 0));
        assert_eq!(splat_layer_location(3), (0, 3));
        assert_eq!(splat_layer_location(4), (1, 0));
        assert_eq!(splat_layer_location(6), (1, 2));

        let mut hf = Heightfield::flat(2, 2, Vec3::ONE).unwrap();
        hf.add_splat_map(Rgba32FImage::new(4, 4));
        assert_eq!(hf.splat_layer(2).map(|(_, c)| c), Some(2));
        assert!(hf.splat_layer(4).is_none());
    }
}
