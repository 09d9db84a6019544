//! Paint brushes: grayscale masks with lazily generated GPU textures.

use std::path::Path;

use image::{GrayImage, RgbaImage};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::render::context::GpuContext;
use crate::render::readback;

/// Edge length of brush thumbnails
pub const THUMBNAIL_SIZE: u32 = 64;

/// A texture derived from a brush mask
pub struct BrushTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

impl BrushTexture {
    /// Upload `mask` as linear rgba8 (mask value in every channel)
    pub fn from_mask(gpu: &GpuContext, label: &str, mask: &GrayImage) -> Result<Self> {
        let rgba = mask_to_rgba(mask);
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: rgba.width(),
                height: rgba.height(),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        readback::write_texture_2d(&gpu.queue, &texture, rgba.as_raw())?;

        Ok(Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            texture,
        })
    }
}

fn mask_to_rgba(mask: &GrayImage) -> RgbaImage {
    RgbaImage::from_fn(mask.width(), mask.height(), |x, y| {
        let v = mask.get_pixel(x, y).0[0];
        image::Rgba([v, v, v, v])
    })
}

/// A brush mask. The stamp (full resolution) and thumbnail textures are
/// rebuilt on next access after the mask is marked dirty.
pub struct Brush {
    mask: GrayImage,
    dirty_texture: bool,
    dirty_thumbnail: bool,
    texture: Option<BrushTexture>,
    thumbnail: Option<BrushTexture>,
}

impl Brush {
    pub fn new(mask: GrayImage) -> Self {
        Self {
            mask,
            dirty_texture: true,
            dirty_thumbnail: true,
            texture: None,
            thumbnail: None,
        }
    }

    /// Round brush of `size` texels. `hardness` in [0, 1] is the fraction of
    /// the radius at full strength before the linear falloff.
    pub fn circle(size: u32, hardness: f32) -> Self {
        let size = size.max(2);
        let hardness = hardness.clamp(0.0, 1.0);
        let radius = size as f32 * 0.5;
        let mask = GrayImage::from_fn(size, size, |x, y| {
            let dx = x as f32 + 0.5 - radius;
            let dy = y as f32 + 0.5 - radius;
            let d = (dx * dx + dy * dy).sqrt() / radius;
            let v = if d >= 1.0 {
                0.0
            } else if d <= hardness {
                1.0
            } else {
                1.0 - (d - hardness) / (1.0 - hardness)
            };
            image::Luma([(v * 255.0).round() as u8])
        });
        Self::new(mask)
    }

    /// Load a mask from an image file (luminance is used)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(image::open(path)?.to_luma8()))
    }

    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }

    pub fn set_mask(&mut self, mask: GrayImage) {
        self.mask = mask;
        self.set_dirty(true);
    }

    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty_texture |= dirty;
        self.dirty_thumbnail |= dirty;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_texture || self.dirty_thumbnail
    }

    /// Full resolution stamp texture
    pub fn texture(&mut self, gpu: &GpuContext) -> Result<&BrushTexture> {
        if self.dirty_texture || self.texture.is_none() {
            self.texture = Some(BrushTexture::from_mask(gpu, "brush_texture", &self.mask)?);
            self.dirty_texture = false;
        }
        self.texture.as_ref().ok_or(Error::MissingAsset("brush texture"))
    }

    pub fn thumbnail_mask(&self) -> GrayImage {
        image::imageops::resize(&self.mask, THUMBNAIL_SIZE, THUMBNAIL_SIZE, image::imageops::FilterType::Triangle)
    }

    /// `THUMBNAIL_SIZE` square preview texture
    pub fn thumbnail(&mut self, gpu: &GpuContext) -> Result<&BrushTexture> {
        if self.dirty_thumbnail || self.thumbnail.is_none() {
            self.thumbnail = Some(BrushTexture::from_mask(gpu, "brush_thumbnail", &self.thumbnail_mask())?);
            self.dirty_thumbnail = false;
        }
        self.thumbnail.as_ref().ok_or(Error::MissingAsset("brush thumbnail"))
    }
}

/// Ordered brushes with a selection
pub struct BrushList {
    brushes: Vec<Brush>,
    selected: usize,
}

impl Default for BrushList {
    fn default() -> Self {
        Self::builtin()
    }
}

impl BrushList {
    /// Hard and soft circles
    pub fn builtin() -> Self {
        Self {
            brushes: vec![Brush::circle(64, 0.8), Brush::circle(64, 0.0)],
            selected: 0,
        }
    }

    /// Append `brush_0.png`, `brush_1.png`, ... from `dir` until one is missing.
    /// Returns how many were loaded.
    pub fn load_user_brushes(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let mut loaded = 0;
        loop {
            let path = dir.join(format!("brush_{}.png", loaded));
            if !path.exists() {
                break;
            }
            self.brushes.push(Brush::load(&path)?);
            loaded += 1;
        }
        log::debug!("Loaded {} user brushes from {}", loaded, dir.display());
        Ok(loaded)
    }

    pub fn push(&mut self, brush: Brush) {
        self.brushes.push(brush);
    }

    pub fn len(&self) -> usize {
        self.brushes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brushes.is_empty()
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn select(&mut self, index: usize) {
        self.selected = index;
    }

    pub fn select_next(&mut self) {
        self.selected += 1;
        if self.selected >= self.brushes.len() {
            self.selected = 0;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = match self.selected {
            0 => self.brushes.len().saturating_sub(1),
            i => i - 1,
        };
    }

    /// First brush (always a circle for `builtin()` lists)
    pub fn circle_brush(&mut self) -> Option<&mut Brush> {
        self.brushes.first_mut()
    }

    /// Selected brush. An out-of-range selection falls back to the first.
    pub fn active(&mut self) -> Option<&mut Brush> {
        if self.selected >= self.brushes.len() {
            self.selected = 0;
        }
        self.brushes.get_mut(self.selected)
    }
}
