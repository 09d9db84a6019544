//! Brush painting and splat reconciliation on live detail maps.

use glam::{Vec2, Vec4};
use image::Rgba32FImage;

use super::detail_map::DetailMap;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::render::context::GpuContext;
use crate::render::pipeline::{PaintParams, PaintPipeline, SplatParams, SplatPipeline};
use crate::render::readback;

/// Brush footprint radius in uv per unit of brush size
pub const BRUSH_RADIUS_SCALE: f32 = 0.05;

/// How brush values combine with the existing texel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u32)]
pub enum BlendMode {
    /// Move toward the value by strength * mask
    #[default]
    Lerp = 0,
    /// Add value * strength * mask
    Additive = 1,
}

/// How a splat layer rewrites density
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum SplatMode {
    /// Density 1 where opacity >= tolerance
    Additive = 0,
    /// Density 0 where opacity >= 1 - tolerance
    Subtractive = 1,
    /// Density = (opacity >= tolerance)
    Replace = 2,
}

/// One brush application
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PaintStroke {
    /// Brush center in map uv
    pub uv: Vec2,
    pub brush_size: f32,
    pub brush_strength: f32,
    pub value: Vec4,
    /// Per-channel result range (min, max)
    pub clamp_range: Vec2,
    pub blend_mode: BlendMode,
}

impl PaintStroke {
    pub fn params(&self) -> PaintParams {
        PaintParams {
            brush_pos: self.uv.to_array(),
            radius: self.brush_size * BRUSH_RADIUS_SCALE,
            strength: self.brush_strength,
            value: self.value.to_array(),
            clamp_range: self.clamp_range.to_array(),
            blend_mode: self.blend_mode as u32,
            _pad: 0,
        }
    }
}

/// Runs paint and splat kernels against a map's live copy
pub struct PaintEngine {
    paint: PaintPipeline,
    splat: SplatPipeline,
    paint_params: wgpu::Buffer,
    splat_params: wgpu::Buffer,
    brush_sampler: wgpu::Sampler,
}

impl PaintEngine {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform = |label: &str, size: usize| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: size as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };

        let brush_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("brush_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            paint: PaintPipeline::new(device),
            splat: SplatPipeline::new(device),
            paint_params: uniform("paint_params", std::mem::size_of::<PaintParams>()),
            splat_params: uniform("splat_params", std::mem::size_of::<SplatParams>()),
            brush_sampler,
        }
    }

    /// Stamp `brush` onto `map`'s live copy
    pub fn paint(&self, gpu: &GpuContext, map: &DetailMap, brush: &wgpu::TextureView, stroke: &PaintStroke) -> Result<()> {
        let Some(live) = map.live() else {
            log::error!("Cannot paint {:?} map: map painting is not enabled", map.kind());
            return Err(Error::PaintingDisabled);
        };

        gpu.queue.write_buffer(&self.paint_params, 0, bytemuck::bytes_of(&stroke.params()));
        let bind_group = self.paint.create_bind_group(
            &gpu.device,
            &self.paint_params,
            &live.view,
            &live.scratch_view,
            brush,
            &self.brush_sampler,
        );

        let (width, height) = map.size();
        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("paint_encoder"),
        });
        self.paint.dispatch(&mut encoder, &bind_group, width, height);
        live.commit_scratch(&mut encoder);
        gpu.submit(encoder);
        Ok(())
    }

    /// Rewrite the density channel of `params_map`'s live copy from one
    /// channel of `splat`
    pub fn apply_splat(
        &self,
        gpu: &GpuContext,
        params_map: &DetailMap,
        splat: &Rgba32FImage,
        channel: u32,
        mode: SplatMode,
        tolerance: f32,
    ) -> Result<()> {
        let Some(live) = params_map.live() else {
            log::error!("Cannot apply splat texture: map painting is not enabled");
            return Err(Error::PaintingDisabled);
        };

        let splat_texture = upload_splat(gpu, splat)?;
        let splat_view = splat_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let params = SplatParams {
            channel: channel.min(3),
            mode: mode as u32,
            tolerance,
            _pad: 0,
        };
        gpu.queue.write_buffer(&self.splat_params, 0, bytemuck::bytes_of(&params));
        let bind_group = self.splat.create_bind_group(
            &gpu.device,
            &self.splat_params,
            &live.view,
            &live.scratch_view,
            &splat_view,
        );

        let (width, height) = params_map.size();
        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("splat_encoder"),
        });
        self.splat.dispatch(&mut encoder, &bind_group, width, height);
        live.commit_scratch(&mut encoder);
        gpu.submit(encoder);

        log::debug!("Applied splat channel {} ({:?}, tolerance {})", channel, mode, tolerance);
        Ok(())
    }
}

fn upload_splat(gpu: &GpuContext, splat: &Rgba32FImage) -> Result<wgpu::Texture> {
    let format = wgpu::TextureFormat::Rgba16Float;
    let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("splat_alpha_map"),
        size: wgpu::Extent3d {
            width: splat.width(),
            height: splat.height(),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let texels: Vec<[f32; 4]> = splat.pixels().map(|p| p.0).collect();
    readback::write_texture_2d(&gpu.queue, &texture, &readback::encode_texels(format, &texels)?)?;
    Ok(texture)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grass::brush::Brush;
    use crate::grass::detail_map::{DetailMapAsset, MapKind};
    use crate::render::context::test_gpu;

    fn live_params(gpu: &GpuContext, texel: [u8; 4]) -> DetailMap {
        let image = image::RgbaImage::from_pixel(16, 16, image::Rgba(texel));
        let mut map = DetailMap::new(gpu, MapKind::Parameters, DetailMapAsset::from_image(image)).unwrap();
        map.ensure_live(gpu).unwrap();
        map
    }

    #[test]
    fn test_stroke_params() {
        let stroke = PaintStroke {
            uv: Vec2::new(0.25, 0.75),
            brush_size: 2.0,
            brush_strength: 0.5,
            value: Vec4::ONE,
            clamp_range: Vec2::new(0.0, 1.0),
            blend_mode: BlendMode::Additive,
        };
        let params = stroke.params();
        assert_eq!(params.radius, 0.1);
        assert_eq!(params.blend_mode, 1);
        assert_eq!(params.brush_pos, [0.25, 0.75]);
    }

    #[test]
    fn test_paint_without_live_copy_fails() {
        let Some(gpu) = test_gpu() else { return };
        let engine = PaintEngine::new(&gpu.device);
        let mut brush = Brush::circle(8, 1.0);
        let image = image::RgbaImage::new(4, 4);
        let map = DetailMap::new(&gpu, MapKind::Color, DetailMapAsset::from_image(image)).unwrap();
        let stroke = PaintStroke {
            uv: Vec2::splat(0.5),
            brush_size: 1.0,
            brush_strength: 1.0,
            value: Vec4::ONE,
            clamp_range: Vec2::new(0.0, 1.0),
            blend_mode: BlendMode::Lerp,
        };
        let view = &brush.texture(&gpu).unwrap().view;
        assert!(matches!(engine.paint(&gpu, &map, view, &stroke), Err(Error::PaintingDisabled)));
    }

    #[test]
    fn test_lerp_paint_only_under_brush() {
        let Some(gpu) = test_gpu() else { return };
        let engine = PaintEngine::new(&gpu.device);
        let mut brush = Brush::circle(16, 1.0);
        let map = live_params(&gpu, [0, 0, 0, 0]);

        let stroke = PaintStroke {
            uv: Vec2::splat(0.5),
            brush_size: 4.0,
            brush_strength: 1.0,
            value: Vec4::ONE,
            clamp_range: Vec2::new(0.0, 1.0),
            blend_mode: BlendMode::Lerp,
        };
        engine.paint(&gpu, &map, &brush.texture(&gpu).unwrap().view, &stroke).unwrap();

        let painted = map.read_live(&gpu).unwrap();
        assert_eq!(painted.get_pixel(8, 8).0, [255, 255, 255, 255]);
        assert_eq!(painted.get_pixel(0, 0).0, [0, 0, 0, 0]);
        // The source is untouched
        assert_eq!(map.asset().image.get_pixel(8, 8).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_additive_paint_respects_clamp() {
        let Some(gpu) = test_gpu() else { return };
        let engine = PaintEngine::new(&gpu.device);
        let mut brush = Brush::circle(16, 1.0);
        let map = live_params(&gpu, [51, 51, 51, 51]);

        let stroke = PaintStroke {
            uv: Vec2::splat(0.5),
            brush_size: 4.0,
            brush_strength: 1.0,
            value: Vec4::ONE,
            clamp_range: Vec2::new(0.0, 0.6),
            blend_mode: BlendMode::Additive,
        };
        engine.paint(&gpu, &map, &brush.texture(&gpu).unwrap().view, &stroke).unwrap();

        let center = map.read_live(&gpu).unwrap().get_pixel(8, 8).0;
        assert!(center.iter().all(|&c| (c as i32 - 153).abs() <= 1));
    }

    #[test]
    fn test_replace_splat_at_tolerance_boundary() {
        let Some(gpu) = test_gpu() else { return };
        let engine = PaintEngine::new(&gpu.device);
        let map = live_params(&gpu, [0, 128, 0, 255]);
        let splat = Rgba32FImage::from_pixel(8, 8, image::Rgba([0.5, 0.0, 0.0, 0.0]));

        engine.apply_splat(&gpu, &map, &splat, 0, SplatMode::Replace, 0.5).unwrap();

        let result = map.read_live(&gpu).unwrap();
        assert!(result.pixels().all(|p| p.0 == [255, 128, 0, 255]));
    }

    #[test]
    fn test_subtractive_splat() {
        let Some(gpu) = test_gpu() else { return };
        let engine = PaintEngine::new(&gpu.device);
        let map = live_params(&gpu, [255, 255, 0, 255]);
        let splat = Rgba32FImage::from_fn(16, 16, |x, _| image::Rgba([0.0, if x < 8 { 1.0 } else { 0.0 }, 0.0, 0.0]));

        engine.apply_splat(&gpu, &map, &splat, 1, SplatMode::Subtractive, 0.2).unwrap();

        let result = map.read_live(&gpu).unwrap();
        assert_eq!(result.get_pixel(2, 5).0[0], 0);
        assert_eq!(result.get_pixel(12, 5).0[0], 255);
    }
}
