//! Meadow - interactive grass viewer
//!
//! Usage:
//!   cargo run --release --bin meadow                      # Grass on a flat plane
//!   cargo run --release --bin meadow -- --terrain         # Grass on a noise terrain
//!   cargo run --release --bin meadow -- --config <json>   # Load GrassConfig from JSON
//!   cargo run --release --bin meadow -- --maps <dir>      # Where S saves detail maps
//!
//! Controls:
//!   WASD / QE - Move camera, arrow keys - Look around
//!   Left mouse - Ripples under the cursor
//!   Right mouse - Paint (flatten, or color with C toggled)
//!   [ / ] - Previous / next brush
//!   P - Toggle map painting, I - Toggle indirect instancing
//!   1 / 2 / 3 - Apply splat layer 0 (additive / subtractive / replace)
//!   R - Revert paint, S - Save maps, F - Refresh surface
//!   Escape - Exit

use std::path::PathBuf;
use std::sync::Arc;

use glam::{Vec2, Vec3, Vec4};
use image::Rgba32FImage;
use noise::{NoiseFn, Perlin};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use verdant::core::camera::Camera;
use verdant::core::error::Error;
use verdant::core::logging;
use verdant::core::time::FrameTimer;
use verdant::core::types::Result;
use verdant::grass::{
    BrushList, GrassConfig, GrassMaterial, GrassServices, GrassSurface, MapKind, RippleEmitter, SplatMode,
};
use verdant::math::Ray;
use verdant::render::context::PresentSurface;
use verdant::terrain::{Heightfield, SurfaceMesh, TerrainParams};
use verdant::texture::MapCreator;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const PLANE_SIZE: f32 = 40.0;
const TERRAIN_SIZE: Vec3 = Vec3::new(64.0, 4.0, 64.0);
const MOVE_SPEED: f32 = 8.0;
const TURN_SPEED: f32 = 1.5;
const SKY: wgpu::Color = wgpu::Color {
    r: 0.53,
    g: 0.72,
    b: 0.88,
    a: 1.0,
};

struct Options {
    terrain: bool,
    config: Option<PathBuf>,
    maps_dir: PathBuf,
}

impl Options {
    fn from_args() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let value_of = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .map(PathBuf::from)
        };
        Self {
            terrain: args.iter().any(|a| a == "--terrain"),
            config: value_of("--config"),
            maps_dir: value_of("--maps").unwrap_or_else(|| PathBuf::from("maps")),
        }
    }

    fn grass_config(&self) -> Result<GrassConfig> {
        match &self.config {
            Some(path) => GrassConfig::from_json(&std::fs::read_to_string(path)?),
            None => Ok(GrassConfig {
                enable_map_painting: true,
                ..Default::default()
            }),
        }
    }
}

/// Where the surface lies, for turning cursor rays into map uvs
enum Ground {
    Plane,
    Terrain(Arc<Heightfield>),
}

impl Ground {
    /// Hit point, normal and map uv under `ray`
    fn pick(&self, ray: &Ray) -> Option<(Vec3, Vec3, Vec2)> {
        match self {
            Ground::Plane => {
                let t = ray.intersect_plane(Vec3::ZERO, Vec3::Y)?;
                let hit = ray.at(t);
                let uv = Vec2::new(hit.x, hit.z) / PLANE_SIZE + 0.5;
                in_unit(uv).then_some((hit, Vec3::Y, uv))
            }
            Ground::Terrain(terrain) => {
                // Refine the hit against the local height a few times
                let size = terrain.size();
                let mut height = 0.0;
                let mut uv = Vec2::ZERO;
                for _ in 0..4 {
                    let t = ray.intersect_plane(Vec3::new(0.0, height, 0.0), Vec3::Y)?;
                    let hit = ray.at(t);
                    uv = Vec2::new(hit.x / size.x, hit.z / size.z);
                    if !in_unit(uv) {
                        return None;
                    }
                    height = terrain.sample_uv(uv) * size.y;
                }
                Some((terrain.point_at_uv(uv), terrain.normal_at_uv(uv), uv))
            }
        }
    }
}

fn in_unit(uv: Vec2) -> bool {
    uv.cmpge(Vec2::ZERO).all() && uv.cmple(Vec2::ONE).all()
}

/// Two splat layers: low ground and high ground
fn terrain_splat(terrain: &Heightfield) -> Rgba32FImage {
    let (w, d) = (terrain.width(), terrain.depth());
    let wobble = Perlin::new(3);
    Rgba32FImage::from_fn(w, d, |x, z| {
        let h = terrain.sample(x, z) + 0.1 * wobble.get([x as f64 * 0.1, z as f64 * 0.1]) as f32;
        let low = if h < 0.45 { 1.0 } else { 0.0 };
        image::Rgba([low, 1.0 - low, 0.0, 0.0])
    })
}

fn create_depth(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("meadow_depth"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

struct MeadowState {
    window: Arc<Window>,
    present: PresentSurface,
    depth: wgpu::TextureView,
    services: GrassServices,
    surface: GrassSurface,
    ground: Ground,
    camera: Camera,
    yaw: f32,
    pitch: f32,
    timer: FrameTimer,
    emitter: RippleEmitter,
    brushes: BrushList,
    held: Vec<KeyCode>,
    cursor: Vec2,
    rippling: bool,
    painting: bool,
    paint_color: bool,
}

impl MeadowState {
    fn new(window: Arc<Window>, options: &Options) -> Result<Self> {
        let (gpu, present) = pollster::block_on(PresentSurface::new(window.clone()))?;
        let (width, height) = present.size();
        let mut services = GrassServices::new(Arc::new(gpu));

        let material = GrassMaterial::with_targets(present.format(), Some(DEPTH_FORMAT));
        let config = options.grass_config()?;
        let creator = MapCreator::default().with_size(256, 256);

        let (surface, ground) = if options.terrain {
            let mut terrain = Heightfield::from_noise(129, 129, TERRAIN_SIZE, &TerrainParams {
                scale: 40.0,
                ..Default::default()
            })?;
            let splat = terrain_splat(&terrain);
            terrain.add_splat_map(splat);
            let terrain = Arc::new(terrain);
            let surface = GrassSurface::new(config).with_terrain(terrain.clone());
            (surface, Ground::Terrain(terrain))
        } else {
            let mesh = Arc::new(SurfaceMesh::plane(Vec2::splat(PLANE_SIZE), 32));
            (GrassSurface::new(config).with_mesh(mesh), Ground::Plane)
        };
        let mut surface = surface
            .with_material(material)
            .with_color_map(creator.color_map()?)
            .with_param_map(creator.param_map()?);
        surface.init(&mut services)?;
        log::info!("Surface ready: {} chunks", surface.chunk_count());

        let mut brushes = BrushList::builtin();
        match brushes.load_user_brushes(options.maps_dir.join("brushes")) {
            Ok(n) if n > 0 => log::info!("Loaded {} user brushes", n),
            Ok(_) => {}
            Err(e) => log::debug!("No user brushes: {}", e),
        }
        if let Some(brush) = brushes.active() {
            services.set_active_brush(brush)?;
        }

        let mut camera = Camera::new(Vec3::new(0.0, 3.0, 12.0), 60.0, width as f32 / height.max(1) as f32);
        if options.terrain {
            camera.position = Vec3::new(TERRAIN_SIZE.x * 0.5, TERRAIN_SIZE.y + 3.0, TERRAIN_SIZE.z + 8.0);
        }
        let pitch = -0.2;
        camera.set_yaw_pitch(0.0, pitch);

        Ok(Self {
            depth: create_depth(&services.gpu().device, width, height),
            window,
            present,
            services,
            surface,
            ground,
            camera,
            yaw: 0.0,
            pitch,
            timer: FrameTimer::new(),
            emitter: RippleEmitter::default(),
            brushes,
            held: Vec::new(),
            cursor: Vec2::ZERO,
            rippling: false,
            painting: false,
            paint_color: false,
        })
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        let device = &self.services.gpu().device;
        self.present.resize(device, size.width, size.height);
        let (width, height) = self.present.size();
        self.depth = create_depth(device, width, height);
        self.camera.set_aspect(width as f32, height as f32);
    }

    fn cursor_ray(&self) -> Ray {
        let (width, height) = self.present.size();
        Ray::from_cursor(&self.camera, self.cursor, Vec2::new(width as f32, height as f32))
    }

    fn move_camera(&mut self, dt: f32) {
        let held = |k: KeyCode| self.held.contains(&k) as i32 as f32;
        self.yaw += (held(KeyCode::ArrowLeft) - held(KeyCode::ArrowRight)) * TURN_SPEED * dt;
        self.pitch = (self.pitch + (held(KeyCode::ArrowUp) - held(KeyCode::ArrowDown)) * TURN_SPEED * dt)
            .clamp(-1.5, 1.5);
        self.camera.set_yaw_pitch(self.yaw, self.pitch);

        let forward = self.camera.forward();
        let right = self.camera.right();
        let step = forward * (held(KeyCode::KeyW) - held(KeyCode::KeyS))
            + right * (held(KeyCode::KeyD) - held(KeyCode::KeyA))
            + Vec3::Y * (held(KeyCode::KeyE) - held(KeyCode::KeyQ));
        self.camera.position += step * MOVE_SPEED * dt;
    }

    fn interact(&mut self) {
        let Some((hit, normal, uv)) = self.ground.pick(&self.cursor_ray()) else {
            return;
        };
        if self.rippling {
            if let Some(ripple) = self.emitter.emit(hit, normal) {
                self.services.add_ripple(&ripple).ok();
            }
        }
        if self.painting {
            let clamp = Vec2::new(0.0, 1.0);
            let result = if self.paint_color {
                let tint = Vec4::new(0.55, 0.75, 0.2, 1.0);
                self.surface.paint_color(&mut self.services, uv, 1.0, 0.2, tint, clamp)
            } else {
                self.surface
                    .paint_parameters(&mut self.services, uv, 1.0, 0.1, 0.0, 0.0, 1.0, 0.0, clamp)
            };
            if result.is_err() {
                self.painting = false;
            }
        }
    }

    fn select_brush(&mut self, next: bool) {
        if next {
            self.brushes.select_next();
        } else {
            self.brushes.select_prev();
        }
        if let Some(brush) = self.brushes.active() {
            if let Err(e) = self.services.set_active_brush(brush) {
                log::error!("Brush upload failed: {}", e);
            }
        }
        log::info!("Brush {}/{}", self.brushes.selected_index() + 1, self.brushes.len());
    }

    fn save_maps(&mut self, dir: &std::path::Path) {
        if let Err(e) = std::fs::create_dir_all(dir) {
            log::error!("Cannot create {}: {}", dir.display(), e);
            return;
        }
        for (kind, file) in [(MapKind::Color, "color.png"), (MapKind::Parameters, "params.png")] {
            if let Ok(path) = self.surface.save_detail_map(&self.services, kind, Some(&dir.join(file))) {
                log::info!("Saved {}", path.display());
            }
        }
    }

    fn key(&mut self, code: KeyCode, maps_dir: &std::path::Path) {
        let outcome = match code {
            KeyCode::BracketLeft => {
                self.select_brush(false);
                Ok(())
            }
            KeyCode::BracketRight => {
                self.select_brush(true);
                Ok(())
            }
            KeyCode::KeyC => {
                self.paint_color = !self.paint_color;
                log::info!("Painting {}", if self.paint_color { "color" } else { "flatness" });
                Ok(())
            }
            KeyCode::KeyP => {
                let enabled = !self.surface.config().enable_map_painting;
                log::info!("Map painting {}", if enabled { "on" } else { "off" });
                self.surface.set_map_painting(&self.services, enabled)
            }
            KeyCode::KeyI => {
                let enabled = !self.surface.config().indirect_instancing;
                log::info!("Indirect instancing {}", if enabled { "on" } else { "off" });
                self.surface.set_indirect_instancing(&self.services, enabled);
                Ok(())
            }
            KeyCode::Digit1 => self.surface.apply_splat_layer(&self.services, 0, SplatMode::Additive, 0.5),
            KeyCode::Digit2 => self.surface.apply_splat_layer(&self.services, 0, SplatMode::Subtractive, 0.5),
            KeyCode::Digit3 => self.surface.apply_splat_layer(&self.services, 0, SplatMode::Replace, 0.5),
            KeyCode::KeyR => self.surface.revert_detail_maps(&self.services),
            KeyCode::KeyS => {
                self.save_maps(maps_dir);
                Ok(())
            }
            KeyCode::KeyF => self.surface.refresh(&mut self.services),
            _ => Ok(()),
        };
        if let Err(e) = outcome {
            log::warn!("{:?}: {}", code, e);
        }
    }

    fn redraw(&mut self) {
        let frame_info = self.timer.tick();
        self.move_camera(frame_info.delta_secs);
        self.emitter.tick(frame_info.delta_secs);
        self.interact();

        self.surface.update(&mut self.services, &frame_info);
        self.services.update_camera(&self.camera, frame_info.elapsed_secs);

        let frame = match self.present.get_current_texture() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Failed to get frame: {}", e);
                return;
            }
        };
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let gpu = self.services.gpu().clone();
        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("meadow_frame"),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("meadow_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(SKY),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            self.surface.render(&mut pass, &self.services, &self.camera);
        }
        gpu.submit(encoder);
        frame.present();

        if frame_info.index % 300 == 0 {
            let live: u32 = self.surface.chunks().iter().map(|c| c.live_instance_count).sum();
            log::info!(
                "{:.0} fps, {} chunk draws, {} instances",
                self.timer.fps(),
                self.surface.last_draws().len(),
                live
            );
        }
    }
}

struct App {
    options: Options,
    state: Option<MeadowState>,
}

impl App {
    fn shutdown(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.surface.destroy(&mut state.services);
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let attributes = Window::default_attributes()
            .with_title("Verdant Meadow")
            .with_inner_size(PhysicalSize::new(1280, 720));
        let window = match event_loop.create_window(attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };
        match MeadowState::new(window, &self.options) {
            Ok(state) => self.state = Some(state),
            Err(e) => {
                log::error!("Failed to start: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        let Some(state) = self.state.as_mut() else { return };
        match event {
            WindowEvent::CloseRequested => {
                self.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => state.resize(size),
            WindowEvent::CursorMoved { position, .. } => {
                state.cursor = Vec2::new(position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput { state: button_state, button, .. } => {
                let pressed = button_state == ElementState::Pressed;
                match button {
                    MouseButton::Left => state.rippling = pressed,
                    MouseButton::Right => state.painting = pressed,
                    _ => {}
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else { return };
                if event.state.is_pressed() {
                    if code == KeyCode::Escape {
                        self.shutdown();
                        event_loop.exit();
                        return;
                    }
                    if !event.repeat {
                        state.key(code, &self.options.maps_dir);
                    }
                    if !state.held.contains(&code) {
                        state.held.push(code);
                    }
                } else {
                    state.held.retain(|&k| k != code);
                }
            }
            WindowEvent::RedrawRequested => state.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    logging::init();
    log::info!("Meadow starting...");

    let event_loop = EventLoop::new().map_err(|e| Error::Gpu(e.to_string()))?;
    let mut app = App {
        options: Options::from_args(),
        state: None,
    };
    event_loop.run_app(&mut app).map_err(|e| Error::Gpu(e.to_string()))?;
    Ok(())
}
