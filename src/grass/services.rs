//! Process-wide grass resources shared by every surface.
//!
//! The ripple ring, noise volume and compute kernels exist while at least
//! one surface is initialized. Surfaces acquire them on a successful init
//! and release them on teardown; the last release frees them.

use std::collections::HashMap;
use std::sync::Arc;

use image::Rgba32FImage;

use super::brush::Brush;
use super::detail_map::DetailMap;
use super::material::GrassMaterial;
use super::paint::{PaintEngine, PaintStroke, SplatMode};
use super::ripple::{RippleCounter, RippleDesc, RippleEntry, RippleSimulator};
use crate::core::camera::Camera;
use crate::core::error::Error;
use crate::core::time::FrameInfo;
use crate::core::types::Result;
use crate::render::buffer::CameraBuffer;
use crate::render::context::GpuContext;
use crate::render::pipeline::{ChunkScanPipeline, GrassDrawPipeline, NoisePipeline, NormalMapPipeline};
use crate::render::readback;

/// Reference count of initialized surfaces
#[derive(Debug, Default)]
pub struct LiveSurfaceRegistry {
    live: usize,
}

impl LiveSurfaceRegistry {
    /// Returns true on the first acquire
    pub fn acquire(&mut self) -> bool {
        self.live += 1;
        self.live == 1
    }

    /// Returns true when the last holder released. Extra releases are ignored.
    pub fn release(&mut self) -> bool {
        match self.live {
            0 => false,
            n => {
                self.live = n - 1;
                self.live == 0
            }
        }
    }

    pub fn live(&self) -> usize {
        self.live
    }
}

/// GPU resources that live as long as any surface does
pub struct SharedResources {
    pub ripples: RippleSimulator,
    pub noise: wgpu::Texture,
    pub noise_view: wgpu::TextureView,
    pub paint: PaintEngine,
    pub chunk_scan: ChunkScanPipeline,
    pub normal_maps: NormalMapPipeline,
    /// Stand-in normal map for mesh surfaces
    pub flat_normal_view: wgpu::TextureView,
    flat_normal: wgpu::Texture,
}

impl SharedResources {
    fn new(gpu: &GpuContext) -> Result<Self> {
        let noise = NoisePipeline::new(&gpu.device).generate(gpu);
        let noise_view = noise.create_view(&wgpu::TextureViewDescriptor::default());

        let flat_normal = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("flat_normal_map"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        readback::write_texture_2d(&gpu.queue, &flat_normal, &[128, 255, 128, 255])?;

        Ok(Self {
            ripples: RippleSimulator::new(&gpu.device),
            noise_view,
            noise,
            paint: PaintEngine::new(&gpu.device),
            chunk_scan: ChunkScanPipeline::new(&gpu.device),
            normal_maps: NormalMapPipeline::new(&gpu.device),
            flat_normal_view: flat_normal.create_view(&wgpu::TextureViewDescriptor::default()),
            flat_normal,
        })
    }

    fn destroy(self) {
        self.ripples.destroy();
        self.noise.destroy();
        self.flat_normal.destroy();
    }
}

type TargetKey = (wgpu::TextureFormat, Option<wgpu::TextureFormat>);

/// Shared grass services. Pass to every surface operation.
pub struct GrassServices {
    gpu: Arc<GpuContext>,
    registry: LiveSurfaceRegistry,
    shared: Option<SharedResources>,
    camera: CameraBuffer,
    /// View of the selected brush's cached stamp texture
    active_brush: Option<wgpu::TextureView>,
    draw_pipelines: HashMap<TargetKey, Arc<GrassDrawPipeline>>,
}

impl GrassServices {
    pub fn new(gpu: Arc<GpuContext>) -> Self {
        let camera = CameraBuffer::new(&gpu.device);
        Self {
            gpu,
            registry: LiveSurfaceRegistry::default(),
            shared: None,
            camera,
            active_brush: None,
            draw_pipelines: HashMap::new(),
        }
    }

    pub fn gpu(&self) -> &Arc<GpuContext> {
        &self.gpu
    }

    /// Number of initialized surfaces
    pub fn live_surfaces(&self) -> usize {
        self.registry.live()
    }

    pub fn has_shared_resources(&self) -> bool {
        self.shared.is_some()
    }

    pub(crate) fn acquire(&mut self) -> Result<()> {
        if self.registry.acquire() || self.shared.is_none() {
            self.shared = Some(SharedResources::new(&self.gpu)?);
            log::debug!("Created shared grass resources");
        }
        Ok(())
    }

    pub(crate) fn release(&mut self) {
        if self.registry.release() {
            if let Some(shared) = self.shared.take() {
                shared.destroy();
            }
            self.active_brush = None;
            log::debug!("Released shared grass resources");
        }
    }

    pub fn shared(&self) -> Result<&SharedResources> {
        self.shared.as_ref().ok_or(Error::NotInitialized)
    }

    /// Upload the frame's camera. Call before rendering any surface.
    pub fn update_camera(&self, camera: &Camera, time: f32) {
        self.camera.update(&self.gpu.queue, camera, time);
    }

    pub fn camera_bind_group(&self) -> &wgpu::BindGroup {
        self.camera.bind_group()
    }

    /// Draw pipelines for `material`'s render targets, built on first use
    pub fn draw_pipeline(&mut self, material: &GrassMaterial) -> Arc<GrassDrawPipeline> {
        let key = (material.color_format, material.depth_format);
        let camera_layout = self.camera.bind_group_layout();
        let device = &self.gpu.device;
        self.draw_pipelines
            .entry(key)
            .or_insert_with(|| Arc::new(GrassDrawPipeline::new(device, camera_layout, material)))
            .clone()
    }

    /// Append a ripple to the ring every surface samples
    pub fn add_ripple(&mut self, ripple: &RippleDesc) -> Result<()> {
        let Some(shared) = self.shared.as_mut() else {
            log::warn!("Ripple ignored: no grass surface is initialized");
            return Err(Error::NotInitialized);
        };
        shared.ripples.add_ripple(&self.gpu, ripple);
        Ok(())
    }

    /// Age ripples once for `frame`; later calls with the same index are no-ops
    pub fn advance_ripples(&mut self, frame: &FrameInfo) -> bool {
        match self.shared.as_mut() {
            Some(shared) => shared.ripples.advance(&self.gpu, frame),
            None => false,
        }
    }

    /// Stop aging ripples until the next one is added
    pub fn clear_ripple_latch(&mut self) {
        if let Some(shared) = self.shared.as_mut() {
            shared.ripples.clear_latch();
        }
    }

    pub fn read_ripples(&self) -> Result<(RippleCounter, Vec<RippleEntry>)> {
        self.shared()?.ripples.read_back(&self.gpu)
    }

    /// Use `brush` for subsequent paint strokes. Its stamp texture is only
    /// uploaded again when the mask changed.
    pub fn set_active_brush(&mut self, brush: &mut Brush) -> Result<()> {
        self.active_brush = Some(brush.texture(&self.gpu)?.view.clone());
        Ok(())
    }

    pub fn has_active_brush(&self) -> bool {
        self.active_brush.is_some()
    }

    /// Stamp the active brush (a soft circle unless set) onto `map`
    pub(crate) fn paint(&mut self, map: &DetailMap, stroke: &PaintStroke) -> Result<()> {
        if self.active_brush.is_none() {
            self.set_active_brush(&mut Brush::circle(64, 0.5))?;
        }
        let shared = self.shared()?;
        let brush = self.active_brush.as_ref().ok_or(Error::MissingAsset("brush"))?;
        shared.paint.paint(&self.gpu, map, brush, stroke)
    }

    pub(crate) fn apply_splat(
        &self,
        params_map: &DetailMap,
        splat: &Rgba32FImage,
        channel: u32,
        mode: SplatMode,
        tolerance: f32,
    ) -> Result<()> {
        self.shared()?
            .paint
            .apply_splat(&self.gpu, params_map, splat, channel, mode, tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_registry_counts() {
        let mut registry = LiveSurfaceRegistry::default();
        assert!(registry.acquire());
        assert!(!registry.acquire());
        assert!(!registry.release());
        assert!(registry.release());
        assert!(!registry.release());
        assert_eq!(registry.live(), 0);
    }

    #[test]
    fn test_shared_lifecycle() {
        let Some(gpu) = crate::render::context::test_gpu() else { return };
        let mut services = GrassServices::new(Arc::new(gpu));
        assert!(services.add_ripple(&RippleDesc::default()).is_err());

        services.acquire().unwrap();
        services.acquire().unwrap();
        services.add_ripple(&RippleDesc::at(Vec3::ONE)).unwrap();

        services.release();
        assert!(services.has_shared_resources());
        let (counter, _) = services.read_ripples().unwrap();
        assert_eq!(counter.live, 1);

        services.release();
        assert!(!services.has_shared_resources());
        assert_eq!(services.live_surfaces(), 0);
    }

    #[test]
    fn test_active_brush_uses_cached_texture() {
        let Some(gpu) = crate::render::context::test_gpu() else { return };
        let mut services = GrassServices::new(Arc::new(gpu));
        let mut brush = Brush::circle(16, 0.5);
        assert!(!services.has_active_brush());

        services.set_active_brush(&mut brush).unwrap();
        assert!(services.has_active_brush());
        brush.thumbnail(services.gpu()).unwrap();
        assert!(!brush.is_dirty());

        brush.set_mask(image::GrayImage::new(8, 8));
        services.set_active_brush(&mut brush).unwrap();
        assert_eq!(brush.texture(services.gpu()).unwrap().texture.width(), 8);
    }

    #[test]
    fn test_draw_pipelines_are_cached() {
        let Some(gpu) = crate::render::context::test_gpu() else { return };
        let mut services = GrassServices::new(Arc::new(gpu));
        let a = services.draw_pipeline(&GrassMaterial::default());
        let b = services.draw_pipeline(&GrassMaterial::default());
        assert!(Arc::ptr_eq(&a, &b));
    }
}
