//! Noise-based starting color and parameter maps.
//!
//! Each channel is a Perlin Fbm field remapped by its normalization:
//! `value = normalization + (1 - normalization) * n` with `n` in [0, 1].
//! A normalization of 1 yields a constant channel, 0 uses the full noise range.

use image::RgbaImage;
use noise::{Fbm, NoiseFn, Perlin};
use rayon::prelude::*;

use crate::core::error::Error;
use crate::core::types::Result;
use crate::grass::detail_map::{DetailMapAsset, MapKind};

/// One noise layer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseChannel {
    /// Noise features per map width
    pub scale: f32,
    /// Lower bound of the remapped channel
    pub normalization: f32,
}

impl NoiseChannel {
    pub fn new(scale: f32, normalization: f32) -> Self {
        Self { scale, normalization }
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !(self.scale > 0.0) {
            return Err(Error::InvalidConfig(format!("{} noise scale must be > 0", name)));
        }
        if !(0.0..=1.0).contains(&self.normalization) {
            return Err(Error::InvalidConfig(format!(
                "{} normalization must be in [0, 1], got {}",
                name, self.normalization
            )));
        }
        Ok(())
    }
}

/// Sampled noise in [0, 1]
struct Layer {
    noise: Fbm<Perlin>,
    channel: NoiseChannel,
}

impl Layer {
    fn new(seed: u32, channel: NoiseChannel) -> Self {
        Self {
            noise: Fbm::<Perlin>::new(seed),
            channel,
        }
    }

    fn sample(&self, u: f32, v: f32) -> f32 {
        let p = [(u * self.channel.scale) as f64, (v * self.channel.scale) as f64];
        let n = ((self.noise.get(p) + 1.0) * 0.5).clamp(0.0, 1.0) as f32;
        self.channel.normalization + (1.0 - self.channel.normalization) * n
    }
}

/// Synthesizes starting detail maps
#[derive(Clone, Debug)]
pub struct MapCreator {
    pub width: u32,
    pub height: u32,
    pub seed: u32,
    /// Color brightness (and density for parameter maps)
    pub primary: NoiseChannel,
    pub height_noise: NoiseChannel,
    pub wind_noise: NoiseChannel,
    /// Amplitude of the height variation: heights span [1 - m, 1]
    pub height_multiplier: f32,
}

impl Default for MapCreator {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
            seed: 0,
            primary: NoiseChannel::new(10.0, 0.85),
            height_noise: NoiseChannel::new(50.0, 0.6),
            wind_noise: NoiseChannel::new(8.0, 0.8),
            height_multiplier: 0.1,
        }
    }
}

impl MapCreator {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidConfig(format!(
                "map size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        self.primary.validate("primary")?;
        self.height_noise.validate("height")?;
        self.wind_noise.validate("wind")?;
        if !(0.0..=1.0).contains(&self.height_multiplier) {
            return Err(Error::InvalidConfig(format!(
                "height multiplier must be in [0, 1], got {}",
                self.height_multiplier
            )));
        }
        Ok(())
    }

    /// Fill every texel from `f(u, v)`, rows in parallel
    fn build(&self, f: impl Fn(f32, f32) -> [f32; 4] + Sync) -> RgbaImage {
        let (w, h) = (self.width, self.height);
        let mut image = RgbaImage::new(w, h);
        image
            .par_chunks_exact_mut(4 * w as usize)
            .enumerate()
            .for_each(|(y, row)| {
                let v = y as f32 / h as f32;
                for (x, texel) in row.chunks_exact_mut(4).enumerate() {
                    let u = x as f32 / w as f32;
                    let value = f(u, v);
                    for (dst, src) in texel.iter_mut().zip(value) {
                        *dst = (src.clamp(0.0, 1.0) * 255.0).round() as u8;
                    }
                }
            });
        image
    }

    /// Grayscale brightness variation for the color map
    pub fn color_map(&self) -> Result<DetailMapAsset> {
        self.validate()?;
        let brightness = Layer::new(self.seed, self.primary);
        let image = self.build(|u, v| {
            let b = brightness.sample(u, v);
            [b, b, b, 1.0]
        });
        log::debug!("Created {}x{} color map", self.width, self.height);
        Ok(DetailMapAsset::from_image(image))
    }

    /// Density, height and wind variation for the parameter map. Flatten starts at 0.
    pub fn param_map(&self) -> Result<DetailMapAsset> {
        self.validate()?;
        let density = Layer::new(self.seed, self.primary);
        let height = Layer::new(self.seed.wrapping_add(1), self.height_noise);
        let wind = Layer::new(self.seed.wrapping_add(2), self.wind_noise);
        let m = self.height_multiplier;
        let image = self.build(|u, v| {
            [
                density.sample(u, v),
                1.0 - m * (1.0 - height.sample(u, v)),
                0.0,
                wind.sample(u, v),
            ]
        });
        log::debug!("Created {}x{} parameter map", self.width, self.height);
        Ok(DetailMapAsset::from_image(image))
    }

    /// Map of `kind`
    pub fn create(&self, kind: MapKind) -> Result<DetailMapAsset> {
        match kind {
            MapKind::Color => self.color_map(),
            MapKind::Parameters => self.param_map(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> MapCreator {
        MapCreator::default().with_size(32, 16).with_seed(7)
    }

    #[test]
    fn test_color_map_respects_normalization() {
        let asset = small().color_map().unwrap();
        assert_eq!(asset.image.dimensions(), (32, 16));
        let floor = (0.85f32 * 255.0).round() as u8;
        for p in asset.image.pixels() {
            assert!(p.0[0] >= floor);
            assert_eq!(p.0[0], p.0[1]);
            assert_eq!(p.0[3], 255);
        }
    }

    #[test]
    fn test_param_map_channels() {
        let asset = small().param_map().unwrap();
        let height_floor = ((1.0f32 - 0.1) * 255.0).round() as u8;
        for p in asset.image.pixels() {
            assert!(p.0[1] >= height_floor);
            assert_eq!(p.0[2], 0);
            assert!(p.0[3] >= (0.8f32 * 255.0).round() as u8);
        }
    }

    #[test]
    fn test_full_normalization_is_constant() {
        let creator = MapCreator {
            primary: NoiseChannel::new(10.0, 1.0),
            ..small()
        };
        let asset = creator.color_map().unwrap();
        assert!(asset.image.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let a = small().param_map().unwrap();
        let b = small().param_map().unwrap();
        assert_eq!(a.image, b.image);
    }

    #[test]
    fn test_rejects_bad_settings() {
        assert!(small().with_size(0, 4).color_map().is_err());
        let creator = MapCreator {
            height_multiplier: 2.0,
            ..small()
        };
        assert!(matches!(creator.create(MapKind::Parameters), Err(Error::InvalidConfig(_))));
    }
}
