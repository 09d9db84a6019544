//! Detail maps: the persisted color/parameter images and their GPU copies.
//!
//! Every map has an immutable GPU upload of its source image, used for
//! drawing while painting is off, and an optional live copy that paint
//! operations write to. The source is only replaced by an explicit save.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::render::context::GpuContext;
use crate::render::pipeline::DETAIL_MAP_FORMAT;
use crate::render::readback;

/// Which of a surface's two maps
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MapKind {
    /// rgb = color, a = blend toward the material base color
    Color,
    /// r = density, g = height, b = flatness, a = wind response
    Parameters,
}

impl MapKind {
    fn label(self) -> &'static str {
        match self {
            MapKind::Color => "grass_color_map",
            MapKind::Parameters => "grass_param_map",
        }
    }

    /// Texel used when no source image is assigned
    pub fn default_texel(self) -> [u8; 4] {
        match self {
            MapKind::Color => [255, 255, 255, 255],
            MapKind::Parameters => [255, 255, 0, 255],
        }
    }
}

/// How a saved map should be loaded back: linear data, no mipmaps, CPU-readable.
/// Stored next to the image as `<file>.import.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImportHints {
    pub linear: bool,
    pub mipmaps: bool,
    pub cpu_readable: bool,
}

impl Default for ImportHints {
    fn default() -> Self {
        Self {
            linear: true,
            mipmaps: false,
            cpu_readable: true,
        }
    }
}

impl ImportHints {
    pub fn sidecar_path(image_path: &Path) -> PathBuf {
        let mut name = image_path.as_os_str().to_owned();
        name.push(".import.json");
        PathBuf::from(name)
    }

    pub fn save(&self, image_path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        std::fs::write(Self::sidecar_path(image_path), json)?;
        Ok(())
    }

    /// Hints for `image_path`, if a sidecar exists
    pub fn load(image_path: &Path) -> Result<Option<Self>> {
        let path = Self::sidecar_path(image_path);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}

/// A persisted detail map image
#[derive(Clone, Debug)]
pub struct DetailMapAsset {
    pub image: RgbaImage,
    pub path: Option<PathBuf>,
}

impl DetailMapAsset {
    pub fn from_image(image: RgbaImage) -> Self {
        Self { image, path: None }
    }

    /// Decode an image file (any format `image` reads) as 8-bit RGBA
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path)?.to_rgba8();
        if let Some(hints) = ImportHints::load(path)? {
            if !hints.linear {
                log::warn!("{} is marked as color data; grass maps are sampled as linear", path.display());
            }
        }
        Ok(Self {
            image,
            path: Some(path.to_path_buf()),
        })
    }

    /// Uniform map of `kind`'s default texel
    pub fn solid(kind: MapKind, width: u32, height: u32) -> Self {
        Self::from_image(RgbaImage::from_pixel(width.max(1), height.max(1), image::Rgba(kind.default_texel())))
    }
}

/// Reject anything but a `.png` target
pub fn check_save_path(path: Option<&Path>) -> Result<&Path> {
    let path = path.ok_or(Error::NoSourcePath)?;
    let is_png = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("png"));
    if !is_png {
        return Err(Error::UnsupportedFormat(format!(
            "detail maps save as PNG, got {}",
            path.display()
        )));
    }
    Ok(path)
}

fn create_map_texture(device: &wgpu::Device, label: &str, width: u32, height: u32, usage: wgpu::TextureUsages) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DETAIL_MAP_FORMAT,
        usage,
        view_formats: &[],
    })
}

/// Editable GPU copy plus the scratch target paint kernels write into
pub struct LiveCopy {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub scratch: wgpu::Texture,
    pub scratch_view: wgpu::TextureView,
}

impl LiveCopy {
    fn new(gpu: &GpuContext, kind: MapKind, source: &RgbaImage) -> Result<Self> {
        let (width, height) = source.dimensions();
        let texture = create_map_texture(
            &gpu.device,
            kind.label(),
            width,
            height,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
        );
        let scratch = create_map_texture(
            &gpu.device,
            "grass_paint_scratch",
            width,
            height,
            wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
        );
        readback::write_texture_2d(&gpu.queue, &texture, source.as_raw())?;

        Ok(Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            scratch_view: scratch.create_view(&wgpu::TextureViewDescriptor::default()),
            texture,
            scratch,
        })
    }

    /// Copy the scratch target over the live map
    pub fn commit_scratch(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_texture_to_texture(
            self.scratch.as_image_copy(),
            self.texture.as_image_copy(),
            self.texture.size(),
        );
    }

    fn destroy(self) {
        self.texture.destroy();
        self.scratch.destroy();
    }
}

/// One detail map on the GPU
pub struct DetailMap {
    kind: MapKind,
    asset: DetailMapAsset,
    source_texture: wgpu::Texture,
    source_view: wgpu::TextureView,
    live: Option<LiveCopy>,
}

impl DetailMap {
    pub fn new(gpu: &GpuContext, kind: MapKind, asset: DetailMapAsset) -> Result<Self> {
        let (width, height) = asset.image.dimensions();
        let source_texture = create_map_texture(
            &gpu.device,
            kind.label(),
            width,
            height,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
        );
        readback::write_texture_2d(&gpu.queue, &source_texture, asset.image.as_raw())?;

        Ok(Self {
            kind,
            source_view: source_texture.create_view(&wgpu::TextureViewDescriptor::default()),
            source_texture,
            asset,
            live: None,
        })
    }

    pub fn kind(&self) -> MapKind {
        self.kind
    }

    pub fn asset(&self) -> &DetailMapAsset {
        &self.asset
    }

    pub fn size(&self) -> (u32, u32) {
        self.asset.image.dimensions()
    }

    pub fn live(&self) -> Option<&LiveCopy> {
        self.live.as_ref()
    }

    /// Texture the renderer samples: the live copy when painting, else the source
    pub fn render_texture(&self) -> &wgpu::Texture {
        self.live.as_ref().map_or(&self.source_texture, |l| &l.texture)
    }

    pub fn render_view(&self) -> &wgpu::TextureView {
        self.live.as_ref().map_or(&self.source_view, |l| &l.view)
    }

    /// Create the live copy from the source if it does not exist yet
    pub fn ensure_live(&mut self, gpu: &GpuContext) -> Result<bool> {
        if self.live.is_some() {
            return Ok(false);
        }
        self.live = Some(LiveCopy::new(gpu, self.kind, &self.asset.image)?);
        log::debug!("Created live {:?} map", self.kind);
        Ok(true)
    }

    pub fn release_live(&mut self) -> bool {
        match self.live.take() {
            Some(live) => {
                live.destroy();
                log::debug!("Released live {:?} map", self.kind);
                true
            }
            None => false,
        }
    }

    /// Overwrite the live copy with the source image
    pub fn revert(&self, queue: &wgpu::Queue) -> Result<()> {
        if let Some(live) = &self.live {
            readback::write_texture_2d(queue, &live.texture, self.asset.image.as_raw())?;
        }
        Ok(())
    }

    /// Read the live copy back to the host
    pub fn read_live(&self, gpu: &GpuContext) -> Result<RgbaImage> {
        let live = self.live.as_ref().ok_or(Error::PaintingDisabled)?;
        let (width, height) = self.size();
        let bytes = readback::read_texture_2d(gpu, &live.texture)?;
        RgbaImage::from_raw(width, height, bytes)
            .ok_or_else(|| Error::Gpu("read-back size mismatch".to_string()))
    }

    /// Encode the live copy as PNG at `path` (or the asset's own path) and
    /// make it the new source
    pub fn save(&mut self, gpu: &GpuContext, path: Option<&Path>) -> Result<PathBuf> {
        if self.live.is_none() {
            return Err(Error::PaintingDisabled);
        }
        let target = check_save_path(path.or(self.asset.path.as_deref()))?.to_path_buf();

        let image = self.read_live(gpu)?;
        image.save_with_format(&target, image::ImageFormat::Png)?;
        ImportHints::default().save(&target)?;

        readback::write_texture_2d(&gpu.queue, &self.source_texture, image.as_raw())?;
        self.asset = DetailMapAsset {
            image,
            path: Some(target.clone()),
        };
        log::info!("Saved {:?} map to {}", self.kind, target.display());
        Ok(target)
    }

    pub fn destroy(mut self) {
        self.release_live();
        self.source_texture.destroy();
    }
}

/// The color and parameter maps of one surface
pub struct DetailMapStore {
    color: DetailMap,
    params: DetailMap,
}

impl DetailMapStore {
    pub fn new(gpu: &GpuContext, color: DetailMapAsset, params: DetailMapAsset) -> Result<Self> {
        Ok(Self {
            color: DetailMap::new(gpu, MapKind::Color, color)?,
            params: DetailMap::new(gpu, MapKind::Parameters, params)?,
        })
    }

    pub fn map(&self, kind: MapKind) -> &DetailMap {
        match kind {
            MapKind::Color => &self.color,
            MapKind::Parameters => &self.params,
        }
    }

    pub fn map_mut(&mut self, kind: MapKind) -> &mut DetailMap {
        match kind {
            MapKind::Color => &mut self.color,
            MapKind::Parameters => &mut self.params,
        }
    }

    pub fn has_live_copies(&self) -> bool {
        self.color.live.is_some() && self.params.live.is_some()
    }

    /// Returns true when any copy was created (render bindings need a rebuild)
    pub fn enable_live_copies(&mut self, gpu: &GpuContext) -> Result<bool> {
        let color = self.color.ensure_live(gpu)?;
        let params = self.params.ensure_live(gpu)?;
        Ok(color || params)
    }

    /// Returns true when any copy was released
    pub fn release_live_copies(&mut self) -> bool {
        let color = self.color.release_live();
        let params = self.params.release_live();
        color || params
    }

    pub fn revert(&self, queue: &wgpu::Queue) -> Result<()> {
        self.color.revert(queue)?;
        self.params.revert(queue)
    }

    pub fn destroy(self) {
        self.color.destroy();
        self.params.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::context::test_gpu;

    fn gradient(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| image::Rgba([(x * 16) as u8, (y * 16) as u8, 7, 200]))
    }

    #[test]
    fn test_check_save_path() {
        assert!(matches!(check_save_path(None), Err(Error::NoSourcePath)));
        assert!(matches!(
            check_save_path(Some(Path::new("maps/color.jpg"))),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(check_save_path(Some(Path::new("maps/color.PNG"))).is_ok());
    }

    #[test]
    fn test_import_hints_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = dir.path().join("params.png");
        assert_eq!(ImportHints::sidecar_path(&image_path), dir.path().join("params.png.import.json"));
        assert!(ImportHints::load(&image_path).unwrap().is_none());

        ImportHints::default().save(&image_path).unwrap();
        let hints = ImportHints::load(&image_path).unwrap().unwrap();
        assert!(hints.linear && !hints.mipmaps && hints.cpu_readable);
    }

    #[test]
    fn test_solid_defaults() {
        let params = DetailMapAsset::solid(MapKind::Parameters, 4, 2);
        assert_eq!(params.image.dimensions(), (4, 2));
        assert_eq!(params.image.get_pixel(3, 1).0, [255, 255, 0, 255]);
    }

    #[test]
    fn test_asset_load_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("color.png");
        gradient(4, 4).save(&path).unwrap();
        let asset = DetailMapAsset::load(&path).unwrap();
        assert_eq!(asset.image, gradient(4, 4));
        assert_eq!(asset.path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn test_live_copy_lazy_and_revert_is_idempotent() {
        let Some(gpu) = test_gpu() else { return };
        let source = gradient(12, 10);
        let mut map = DetailMap::new(&gpu, MapKind::Color, DetailMapAsset::from_image(source.clone())).unwrap();
        assert!(map.live().is_none());
        assert!(map.read_live(&gpu).is_err());

        assert!(map.ensure_live(&gpu).unwrap());
        assert!(!map.ensure_live(&gpu).unwrap());
        assert_eq!(map.read_live(&gpu).unwrap(), source);

        // Scribble over the live copy, then revert twice
        let live = map.live().unwrap();
        readback::write_texture_2d(&gpu.queue, &live.texture, &vec![9u8; 12 * 10 * 4]).unwrap();
        map.revert(&gpu.queue).unwrap();
        let first = map.read_live(&gpu).unwrap();
        map.revert(&gpu.queue).unwrap();
        let second = map.read_live(&gpu).unwrap();
        assert_eq!(first, source);
        assert_eq!(first.as_raw(), second.as_raw());
    }

    #[test]
    fn test_save_requires_live_and_png() {
        let Some(gpu) = test_gpu() else { return };
        let dir = tempfile::tempdir().unwrap();
        let mut map = DetailMap::new(&gpu, MapKind::Parameters, DetailMapAsset::from_image(gradient(4, 4))).unwrap();

        assert!(matches!(map.save(&gpu, Some(&dir.path().join("p.png"))), Err(Error::PaintingDisabled)));

        map.ensure_live(&gpu).unwrap();
        assert!(matches!(map.save(&gpu, None), Err(Error::NoSourcePath)));
        assert!(map.save(&gpu, Some(&dir.path().join("p.tga"))).is_err());
        assert!(map.asset().path.is_none());

        let saved = map.save(&gpu, Some(&dir.path().join("p.png"))).unwrap();
        assert!(ImportHints::sidecar_path(&saved).exists());
        assert_eq!(DetailMapAsset::load(&saved).unwrap().image, gradient(4, 4));
    }
}
