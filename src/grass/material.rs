//! Grass material: the blade look and the render targets blades draw into.

use crate::core::error::Error;
use crate::core::types::Result;

/// Static material asset a surface draws with.
#[derive(Clone, Debug)]
pub struct GrassMaterial {
    /// Multiplied into the color map where its alpha is 1.
    pub base_color: [f32; 4],
    pub blade_height: f32,
    pub blade_width: f32,
    pub wind_strength: f32,
    /// World-space frequency of the wind noise lookup.
    pub wind_scale: f32,
    pub ripple_strength: f32,
    /// How far the flatness channel can lay blades down (0..1).
    pub flatten_strength: f32,
    pub color_format: wgpu::TextureFormat,
    pub depth_format: Option<wgpu::TextureFormat>,
}

impl Default for GrassMaterial {
    fn default() -> Self {
        Self {
            base_color: [0.35, 0.6, 0.2, 1.0],
            blade_height: 1.0,
            blade_width: 0.08,
            wind_strength: 0.4,
            wind_scale: 0.02,
            ripple_strength: 1.0,
            flatten_strength: 0.9,
            color_format: wgpu::TextureFormat::Rgba8UnormSrgb,
            depth_format: Some(wgpu::TextureFormat::Depth32Float),
        }
    }
}

impl GrassMaterial {
    pub fn with_targets(
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Self {
        Self {
            color_format,
            depth_format,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.blade_height > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "blade height must be > 0, got {}",
                self.blade_height
            )));
        }
        if !(self.blade_width > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "blade width must be > 0, got {}",
                self.blade_width
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(GrassMaterial::default().validate().is_ok());
    }

    #[test]
    fn test_zero_height_rejected() {
        let material = GrassMaterial {
            blade_height: 0.0,
            ..Default::default()
        };
        assert!(material.validate().is_err());
    }

    #[test]
    fn test_with_targets() {
        let material = GrassMaterial::with_targets(wgpu::TextureFormat::Bgra8UnormSrgb, None);
        assert_eq!(material.color_format, wgpu::TextureFormat::Bgra8UnormSrgb);
        assert!(material.depth_format.is_none());
    }
}
