//! `GrassSurface`: one patch of grass on a mesh or terrain.
//!
//! A surface is inert until `init` succeeds. Initialization builds chunk
//! geometry, the detail maps (plus live copies when painting is enabled),
//! the terrain normal map and the per-surface bindings, and takes a
//! reference on the shared [`GrassServices`] resources. `refresh` rebuilds
//! the surface's own resources and keeps that reference. Disabling drops
//! both, and `destroy` is terminal.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::{Mat4, Vec2, Vec4};
use image::Rgba32FImage;

use super::chunk::{Chunk, ChunkGeometryProvider, GridChunker, SurfaceGeometrySource};
use super::config::GrassConfig;
use super::detail_map::{DetailMapAsset, DetailMapStore, MapKind};
use super::lod::{DrawItem, LodCuller, LodView};
use super::material::GrassMaterial;
use super::paint::{BlendMode, PaintStroke, SplatMode};
use super::params::{DrawIndirectArgs, SurfaceUniform};
use super::ripple::RIPPLE_CAPACITY;
use super::services::{GrassServices, SharedResources};
use crate::core::camera::Camera;
use crate::core::error::Error;
use crate::core::time::FrameInfo;
use crate::core::types::Result;
use crate::math::Aabb;
use crate::render::context::GpuContext;
use crate::render::pipeline::{GrassDrawPipeline, InstancingMode, TerrainNormalMap};
use crate::terrain::{Heightfield, SurfaceMesh};

/// Detail map resolution for mesh surfaces without assigned maps
pub const DEFAULT_MAP_SIZE: u32 = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SurfaceState {
    Uninitialized,
    Initialized,
    Destroyed,
}

/// Object matrices for direct instancing, one per budgeted instance
struct InstanceMatrices {
    buffer: wgpu::Buffer,
    count: u32,
}

impl InstanceMatrices {
    fn new(device: &wgpu::Device, count: u32) -> Self {
        let count = count.max(1);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_instance_matrices"),
            size: count as u64 * std::mem::size_of::<[[f32; 4]; 4]>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self { buffer, count }
    }

    fn write(&self, queue: &wgpu::Queue, object_matrix: &Mat4) {
        let matrices = vec![object_matrix.to_cols_array_2d(); self.count as usize];
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&matrices));
    }
}

/// GPU state owned by an initialized surface
struct SurfaceResources {
    pipeline: Arc<GrassDrawPipeline>,
    maps: DetailMapStore,
    chunks: Vec<Chunk>,
    normal_map: Option<TerrainNormalMap>,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    instances: Option<InstanceMatrices>,
}

impl SurfaceResources {
    fn rebuild_bind_group(&mut self, device: &wgpu::Device, shared: &SharedResources) {
        self.bind_group = surface_bind_group(
            &self.pipeline,
            device,
            &self.uniform,
            &self.maps,
            self.normal_map.as_ref(),
            shared,
        );
    }

    fn destroy(self) {
        for chunk in self.chunks {
            chunk.destroy();
        }
        self.maps.destroy();
        if let Some(normal_map) = self.normal_map {
            normal_map.texture.destroy();
        }
        if let Some(instances) = self.instances {
            instances.buffer.destroy();
        }
        self.uniform.destroy();
    }
}

fn surface_bind_group(
    pipeline: &GrassDrawPipeline,
    device: &wgpu::Device,
    uniform: &wgpu::Buffer,
    maps: &DetailMapStore,
    normal_map: Option<&TerrainNormalMap>,
    shared: &SharedResources,
) -> wgpu::BindGroup {
    pipeline.create_surface_bind_group(
        device,
        uniform,
        maps.map(MapKind::Color).render_view(),
        maps.map(MapKind::Parameters).render_view(),
        normal_map.map_or(&shared.flat_normal_view, |n| &n.view),
        &shared.noise_view,
        shared.ripples.ripple_buffer(),
        shared.ripples.counter_buffer(),
    )
}

fn chunk_seed(surface_seed: u32, grid_pos: [u32; 3]) -> u32 {
    let h = surface_seed
        ^ grid_pos[0].wrapping_mul(73_856_093)
        ^ grid_pos[1].wrapping_mul(19_349_663)
        ^ grid_pos[2].wrapping_mul(83_492_791);
    // Kept small enough to survive the trip through an f32
    h & 0xffff
}

/// A grass surface
pub struct GrassSurface {
    config: GrassConfig,
    material: Option<GrassMaterial>,
    source: Option<SurfaceGeometrySource>,
    color_map: Option<DetailMapAsset>,
    param_map: Option<DetailMapAsset>,
    provider: Box<dyn ChunkGeometryProvider + Send + Sync>,
    transform: Mat4,
    seed: u32,
    enabled: bool,
    state: SurfaceState,
    resources: Option<SurfaceResources>,
    culler: LodCuller,
}

impl GrassSurface {
    pub fn new(config: GrassConfig) -> Self {
        Self {
            config,
            material: None,
            source: None,
            color_map: None,
            param_map: None,
            provider: Box::new(GridChunker::default()),
            transform: Mat4::IDENTITY,
            seed: 0,
            enabled: true,
            state: SurfaceState::Uninitialized,
            resources: None,
            culler: LodCuller::new(),
        }
    }

    pub fn with_material(mut self, material: GrassMaterial) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_mesh(mut self, mesh: Arc<SurfaceMesh>) -> Self {
        self.source = Some(SurfaceGeometrySource::Mesh(mesh));
        self
    }

    pub fn with_terrain(mut self, terrain: Arc<Heightfield>) -> Self {
        self.source = Some(SurfaceGeometrySource::Terrain(terrain));
        self
    }

    pub fn with_color_map(mut self, map: DetailMapAsset) -> Self {
        self.color_map = Some(map);
        self
    }

    pub fn with_param_map(mut self, map: DetailMapAsset) -> Self {
        self.param_map = Some(map);
        self
    }

    pub fn with_provider(mut self, provider: Box<dyn ChunkGeometryProvider + Send + Sync>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    /// Takes effect on the next init or refresh
    pub fn set_material(&mut self, material: Option<GrassMaterial>) {
        self.material = material;
    }

    /// Takes effect on the next init or refresh
    pub fn set_geometry(&mut self, source: Option<SurfaceGeometrySource>) {
        self.source = source;
    }

    /// Replace the settings. Chunking, shadow and map settings take effect
    /// on the next refresh.
    pub fn set_config(&mut self, config: GrassConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &GrassConfig {
        &self.config
    }

    pub fn material(&self) -> Option<&GrassMaterial> {
        self.material.as_ref()
    }

    pub fn state(&self) -> SurfaceState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == SurfaceState::Initialized
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    pub fn chunks(&self) -> &[Chunk] {
        self.resources.as_ref().map_or(&[], |r| &r.chunks)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks().len()
    }

    /// World bounds of every chunk, for debug overlays
    pub fn chunk_world_bounds(&self) -> Vec<Aabb> {
        self.chunks().iter().map(|c| c.world_bounds).collect()
    }

    pub fn detail_maps(&self) -> Option<&DetailMapStore> {
        self.resources.as_ref().map(|r| &r.maps)
    }

    /// Draws issued by the most recent render call
    pub fn last_draws(&self) -> &[DrawItem] {
        self.culler.last_draws()
    }

    fn instancing_mode(&self) -> InstancingMode {
        if self.config.indirect_instancing {
            InstancingMode::Indirect
        } else {
            InstancingMode::Direct
        }
    }

    fn check_assets(&self) -> Result<(&GrassMaterial, &SurfaceGeometrySource)> {
        let material = self.material.as_ref().ok_or(Error::MissingAsset("material"))?;
        material.validate()?;
        let source = self.source.as_ref().ok_or(Error::MissingAsset("surface geometry"))?;
        source.validate()?;
        self.config.validate()?;
        Ok((material, source))
    }

    /// Build GPU state and start rendering. A failed attempt logs once,
    /// leaves the surface uninitialized and can be retried. A disabled
    /// surface stays inert until it is enabled.
    pub fn init(&mut self, services: &mut GrassServices) -> Result<()> {
        match self.state {
            SurfaceState::Destroyed => return Err(Error::Destroyed),
            SurfaceState::Initialized => return Ok(()),
            SurfaceState::Uninitialized => {}
        }
        if !self.enabled {
            log::debug!("Grass surface is disabled, skipping init");
            return Ok(());
        }

        if let Err(e) = self.check_assets() {
            log::error!("Grass surface init failed: {}", e);
            return Err(e);
        }

        if let Err(e) = services.acquire() {
            services.release();
            log::error!("Grass surface init failed: {}", e);
            return Err(e);
        }

        self.build_registered(services)
    }

    /// Build resources while holding a registry reference. On failure the
    /// reference is dropped, so an uninitialized surface never holds one.
    fn build_registered(&mut self, services: &mut GrassServices) -> Result<()> {
        match self.build(services) {
            Ok(resources) => {
                log::info!(
                    "Grass surface initialized with {} chunks ({:?} instancing)",
                    resources.chunks.len(),
                    self.instancing_mode()
                );
                self.resources = Some(resources);
                self.state = SurfaceState::Initialized;
                self.update_transform(services);
                Ok(())
            }
            Err(e) => {
                services.release();
                log::error!("Grass surface init failed: {}", e);
                Err(e)
            }
        }
    }

    fn build(&self, services: &mut GrassServices) -> Result<SurfaceResources> {
        let (material, source) = self.check_assets()?;
        let pipeline = services.draw_pipeline(material);
        let gpu: Arc<GpuContext> = services.gpu().clone();
        let shared = services.shared()?;

        let (map_width, map_height) = match source.heightfield() {
            Some(terrain) => (terrain.width(), terrain.depth()),
            None => (DEFAULT_MAP_SIZE, DEFAULT_MAP_SIZE),
        };
        let color = self
            .color_map
            .clone()
            .unwrap_or_else(|| DetailMapAsset::solid(MapKind::Color, map_width, map_height));
        let params = self
            .param_map
            .clone()
            .unwrap_or_else(|| DetailMapAsset::solid(MapKind::Parameters, map_width, map_height));
        let mut maps = DetailMapStore::new(&gpu, color, params)?;
        if self.config.enable_map_painting {
            maps.enable_live_copies(&gpu)?;
        }

        let mut descriptors = source.build_chunks(self.provider.as_ref(), &self.config, material.blade_height);
        if source.heightfield().is_some() && self.config.discard_empty_chunks {
            let (chunks_x, chunks_z) = (self.config.chunks.x, self.config.chunks.z);
            let density = shared.chunk_scan.count_density(
                &gpu,
                maps.map(MapKind::Parameters).render_texture(),
                chunks_x,
                chunks_z,
            )?;
            let before = descriptors.len();
            descriptors.retain(|d| {
                let cell = (d.grid_pos[2] * chunks_x + d.grid_pos[0]) as usize;
                density.get(cell).is_some_and(|&n| n > 0)
            });
            log::debug!("Discarded {} empty grass chunks", before - descriptors.len());
        }

        let chunks = descriptors
            .iter()
            .map(|desc| {
                let mut chunk = Chunk::upload(
                    &gpu.device,
                    &gpu.queue,
                    pipeline.chunk_layout(),
                    desc,
                    chunk_seed(self.seed, desc.grid_pos),
                );
                if self.config.indirect_instancing {
                    chunk.ensure_indirect_args(&gpu.device);
                }
                chunk
            })
            .collect();

        let normal_map = source
            .heightfield()
            .map(|terrain| shared.normal_maps.generate(&gpu, terrain, self.config.high_quality_normals));

        let uniform = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_surface_uniform"),
            size: std::mem::size_of::<SurfaceUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = surface_bind_group(&pipeline, &gpu.device, &uniform, &maps, normal_map.as_ref(), shared);

        let instances =
            (!self.config.indirect_instancing).then(|| InstanceMatrices::new(&gpu.device, self.config.instance_budget));

        Ok(SurfaceResources {
            pipeline,
            maps,
            chunks,
            normal_map,
            uniform,
            bind_group,
            instances,
        })
    }

    /// Destroy the surface's own GPU resources. The registry reference is
    /// kept; returns whether anything was released.
    fn release_resources(&mut self) -> bool {
        if self.state == SurfaceState::Initialized {
            self.state = SurfaceState::Uninitialized;
        }
        match self.resources.take() {
            Some(resources) => {
                resources.destroy();
                log::debug!("Grass surface released its GPU resources");
                true
            }
            None => false,
        }
    }

    /// Release the surface's resources and its registry reference
    fn teardown(&mut self, services: &mut GrassServices) {
        if self.release_resources() {
            services.release();
        }
    }

    /// Rebuild every surface-owned resource. Shared resources (ripples,
    /// noise, the active brush) survive. Unsaved paint is lost.
    pub fn refresh(&mut self, services: &mut GrassServices) -> Result<()> {
        if self.state == SurfaceState::Destroyed {
            return Err(Error::Destroyed);
        }
        if !self.enabled {
            return Ok(());
        }
        if !self.release_resources() {
            return self.init(services);
        }

        if let Err(e) = self.check_assets() {
            services.release();
            log::error!("Grass surface refresh failed: {}", e);
            return Err(e);
        }
        self.build_registered(services)
    }

    /// Enabling initializes, disabling releases every GPU resource
    pub fn set_enabled(&mut self, services: &mut GrassServices, enabled: bool) -> Result<()> {
        if self.enabled == enabled {
            return Ok(());
        }
        self.enabled = enabled;
        if enabled {
            self.init(services)
        } else {
            self.teardown(services);
            Ok(())
        }
    }

    /// Release everything. The surface cannot be initialized again.
    pub fn destroy(&mut self, services: &mut GrassServices) {
        self.teardown(services);
        self.state = SurfaceState::Destroyed;
    }

    pub fn set_transform(&mut self, services: &GrassServices, transform: Mat4) {
        self.transform = transform;
        self.update_transform(services);
    }

    /// Recompute chunk world bounds and upload the object matrices
    pub fn update_transform(&mut self, services: &GrassServices) {
        let (Some(res), Some(source), Some(material)) =
            (self.resources.as_mut(), self.source.as_ref(), self.material.as_ref())
        else {
            return;
        };

        for chunk in &mut res.chunks {
            chunk.update_world_bounds(source, &self.transform);
        }

        let object_matrix = source.object_matrix(&self.transform);
        let ripple_capacity = services
            .shared()
            .map_or(RIPPLE_CAPACITY, |shared| shared.ripples.capacity());
        let uniform = SurfaceUniform::new(
            object_matrix,
            material,
            self.config.blades_per_triangle,
            res.normal_map.as_ref().map(|n| n.map_offset),
            ripple_capacity,
        );
        let queue = &services.gpu().queue;
        queue.write_buffer(&res.uniform, 0, bytemuck::bytes_of(&uniform));
        if let Some(instances) = &res.instances {
            instances.write(queue, &object_matrix);
        }
    }

    pub fn set_instance_budget(&mut self, services: &GrassServices, budget: u32) {
        self.config.instance_budget = budget;
        if let Some(res) = self.resources.as_mut() {
            if let Some(old) = res.instances.take() {
                old.buffer.destroy();
                res.instances = Some(InstanceMatrices::new(&services.gpu().device, budget));
            }
        }
        self.update_transform(services);
    }

    /// Create or release the live map copies
    pub fn set_map_painting(&mut self, services: &GrassServices, enabled: bool) -> Result<()> {
        self.config.enable_map_painting = enabled;
        let Some(res) = self.resources.as_mut() else {
            return Ok(());
        };
        let gpu = services.gpu();
        let changed = if enabled {
            res.maps.enable_live_copies(gpu)?
        } else {
            res.maps.release_live_copies()
        };
        if changed {
            res.rebuild_bind_group(&gpu.device, services.shared()?);
        }
        Ok(())
    }

    /// Switch between per-chunk indirect args and the direct matrix array
    pub fn set_indirect_instancing(&mut self, services: &GrassServices, enabled: bool) {
        self.config.indirect_instancing = enabled;
        let Some(res) = self.resources.as_mut() else {
            return;
        };
        let device = &services.gpu().device;
        if enabled {
            for chunk in &mut res.chunks {
                chunk.ensure_indirect_args(device);
            }
            if let Some(instances) = res.instances.take() {
                instances.buffer.destroy();
            }
        } else {
            for chunk in &mut res.chunks {
                chunk.release_indirect_args();
            }
            if res.instances.is_none() {
                res.instances = Some(InstanceMatrices::new(device, self.config.instance_budget));
            }
        }
        self.update_transform(services);
    }

    /// Per-frame update: ages the shared ripples (once per frame overall)
    pub fn update(&mut self, services: &mut GrassServices, frame: &FrameInfo) {
        if self.is_initialized() && self.enabled {
            services.advance_ripples(frame);
        }
    }

    /// Cull and LOD the chunks for `camera`, recording each chunk's live
    /// instance count
    pub fn plan_draws(&mut self, camera: &Camera) -> &[DrawItem] {
        let Some(res) = self.resources.as_mut() else {
            return &[];
        };
        let view = LodView::new(camera, &self.config);
        let draws = self.culler.cull(&view, res.chunks.iter().map(|c| &c.world_bounds));

        for chunk in &mut res.chunks {
            chunk.live_instance_count = 0;
        }
        for draw in draws {
            res.chunks[draw.chunk].live_instance_count = draw.instance_count;
        }
        draws
    }

    /// Draw the visible chunks into `pass`. The camera bind group must have
    /// been updated through [`GrassServices::update_camera`]. Returns the
    /// number of draw calls.
    pub fn render(&mut self, pass: &mut wgpu::RenderPass<'_>, services: &GrassServices, camera: &Camera) -> usize {
        if !self.enabled || !self.is_initialized() {
            return 0;
        }
        let mode = self.instancing_mode();
        self.plan_draws(camera);

        let Some(res) = self.resources.as_ref() else {
            return 0;
        };
        let draws = self.culler.last_draws();
        if draws.is_empty() {
            return 0;
        }
        res.pipeline.bind(pass, mode, services.camera_bind_group(), &res.bind_group);
        encode_draws(pass, res, draws, mode, &services.gpu().queue, self.config.blades_per_triangle)
    }

    /// Depth-only draw for shadow casting, culled and LODed from the main
    /// `camera`, projected with `shadow_camera`
    pub fn render_shadows(
        &mut self,
        pass: &mut wgpu::RenderPass<'_>,
        services: &GrassServices,
        camera: &Camera,
        shadow_camera: &wgpu::BindGroup,
    ) -> usize {
        if !self.enabled || !self.is_initialized() || !self.config.cast_shadows {
            return 0;
        }
        let mode = self.instancing_mode();
        self.plan_draws(camera);

        let Some(res) = self.resources.as_ref() else {
            return 0;
        };
        let draws = self.culler.last_draws();
        if draws.is_empty() || !res.pipeline.bind_shadow(pass, mode, shadow_camera, &res.bind_group) {
            return 0;
        }
        encode_draws(pass, res, draws, mode, &services.gpu().queue, self.config.blades_per_triangle)
    }

    fn painting_resources(&self) -> Result<&SurfaceResources> {
        self.resources.as_ref().ok_or_else(|| {
            log::error!("Cannot paint: grass surface is not initialized");
            Error::NotInitialized
        })
    }

    /// Apply one brush stroke to a map's live copy
    pub fn paint(&self, services: &mut GrassServices, target: MapKind, stroke: &PaintStroke) -> Result<()> {
        let res = self.painting_resources()?;
        services.paint(res.maps.map(target), stroke)
    }

    /// Lerp the color map toward `color`
    pub fn paint_color(
        &self,
        services: &mut GrassServices,
        uv: Vec2,
        brush_size: f32,
        brush_strength: f32,
        color: Vec4,
        clamp_range: Vec2,
    ) -> Result<()> {
        let stroke = PaintStroke {
            uv,
            brush_size,
            brush_strength,
            value: color,
            clamp_range,
            blend_mode: BlendMode::Lerp,
        };
        self.paint(services, MapKind::Color, &stroke)
    }

    /// Add to the parameter channels (negative amounts subtract)
    #[allow(clippy::too_many_arguments)]
    pub fn paint_parameters(
        &self,
        services: &mut GrassServices,
        uv: Vec2,
        brush_size: f32,
        brush_strength: f32,
        density: f32,
        height: f32,
        flatten: f32,
        wind: f32,
        clamp_range: Vec2,
    ) -> Result<()> {
        let stroke = PaintStroke {
            uv,
            brush_size,
            brush_strength,
            value: Vec4::new(density, height, flatten, wind),
            clamp_range,
            blend_mode: BlendMode::Additive,
        };
        self.paint(services, MapKind::Parameters, &stroke)
    }

    /// Drive density from one channel of a splat alpha map
    pub fn apply_splat_tex(
        &self,
        services: &GrassServices,
        splat: &Rgba32FImage,
        channel: u32,
        mode: SplatMode,
        tolerance: f32,
    ) -> Result<()> {
        let res = self.painting_resources()?;
        services.apply_splat(res.maps.map(MapKind::Parameters), splat, channel, mode, tolerance)
    }

    /// Drive density from a splat layer of the surface's terrain
    pub fn apply_splat_layer(
        &self,
        services: &GrassServices,
        layer: u32,
        mode: SplatMode,
        tolerance: f32,
    ) -> Result<()> {
        let terrain = self
            .source
            .as_ref()
            .and_then(SurfaceGeometrySource::heightfield)
            .ok_or(Error::MissingAsset("terrain"))?;
        let (splat, channel) = terrain.splat_layer(layer).ok_or(Error::MissingAsset("splat layer"))?;
        self.apply_splat_tex(services, splat, channel, mode, tolerance)
    }

    /// Discard unsaved paint: live copies go back to the source images
    pub fn revert_detail_maps(&self, services: &GrassServices) -> Result<()> {
        let res = self.resources.as_ref().ok_or(Error::NotInitialized)?;
        res.maps.revert(&services.gpu().queue)
    }

    /// Write a map's live copy to `path` (or its own file) as PNG and use
    /// it as the source from now on
    pub fn save_detail_map(&mut self, services: &GrassServices, kind: MapKind, path: Option<&Path>) -> Result<PathBuf> {
        let res = self.resources.as_mut().ok_or(Error::NotInitialized)?;
        let map = res.maps.map_mut(kind);
        let saved = map.save(services.gpu(), path).inspect_err(|e| {
            log::error!("Saving {:?} map failed: {}", kind, e);
        })?;
        let asset = map.asset().clone();
        match kind {
            MapKind::Color => self.color_map = Some(asset),
            MapKind::Parameters => self.param_map = Some(asset),
        }
        Ok(saved)
    }
}

fn encode_draws(
    pass: &mut wgpu::RenderPass<'_>,
    res: &SurfaceResources,
    draws: &[DrawItem],
    mode: InstancingMode,
    queue: &wgpu::Queue,
    blades_per_triangle: u32,
) -> usize {
    let max_instances = match (mode, &res.instances) {
        (InstancingMode::Direct, Some(instances)) => {
            pass.set_vertex_buffer(0, instances.buffer.slice(..));
            instances.count
        }
        (InstancingMode::Direct, None) => return 0,
        (InstancingMode::Indirect, _) => u32::MAX,
    };

    let mut issued = 0;
    for draw in draws {
        let chunk = &res.chunks[draw.chunk];
        let vertex_count = chunk.vertex_count(blades_per_triangle);
        pass.set_bind_group(2, chunk.bind_group(), &[]);
        match mode {
            InstancingMode::Direct => {
                pass.draw(0..vertex_count, 0..draw.instance_count.min(max_instances));
            }
            InstancingMode::Indirect => {
                let Some(args) = chunk.indirect_args() else {
                    continue;
                };
                let data = DrawIndirectArgs {
                    vertex_count,
                    instance_count: draw.instance_count,
                    first_vertex: 0,
                    first_instance: 0,
                };
                queue.write_buffer(args, 0, bytemuck::bytes_of(&data));
                pass.draw_indirect(args, 0);
            }
        }
        issued += 1;
    }
    issued
}

impl Drop for GrassSurface {
    fn drop(&mut self) {
        if self.resources.is_some() {
            log::warn!("GrassSurface dropped while initialized; call destroy() to release shared resources");
        }
    }
}
