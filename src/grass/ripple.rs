//! Ripple simulation: a fixed-capacity GPU ring of travelling disturbances
//! shared by every grass surface.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::core::time::FrameInfo;
use crate::core::types::Result;
use crate::render::context::GpuContext;
use crate::render::pipeline::{RippleParams, RipplePipeline};
use crate::render::readback;

/// Slots in the ripple ring
pub const RIPPLE_CAPACITY: u32 = 128;

/// Parameters of one ripple
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RippleDesc {
    pub position: Vec3,
    /// How hard blades are pushed
    pub strength: f32,
    /// Strength lost per second
    pub decay_rate: f32,
    /// Radius growth per second
    pub speed: f32,
    pub start_radius: f32,
    /// 0 = filled disc, higher = thinner ring
    pub sharpness: f32,
}

impl RippleDesc {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }
}

impl Default for RippleDesc {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            strength: 1.0,
            decay_rate: 2.5,
            speed: 25.0,
            start_radius: 0.0,
            sharpness: 0.0,
        }
    }
}

/// One ring slot (32 bytes). Matches `Ripple` in ripple.wgsl and grass.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct RippleEntry {
    /// xyz = position, w = strength
    pub pos: [f32; 4],
    /// decay rate, radius, sharpness, speed
    pub drss: [f32; 4],
}

impl RippleEntry {
    pub fn strength(&self) -> f32 {
        self.pos[3]
    }

    pub fn radius(&self) -> f32 {
        self.drss[1]
    }
}

impl From<&RippleDesc> for RippleEntry {
    fn from(desc: &RippleDesc) -> Self {
        Self {
            pos: [desc.position.x, desc.position.y, desc.position.z, desc.strength],
            drss: [desc.decay_rate, desc.start_radius, desc.sharpness, desc.speed],
        }
    }
}

/// Ring cursor (16 bytes). Matches `RippleCounter`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct RippleCounter {
    /// Slot the next ripple is written to
    pub next: u32,
    /// Slots written so far, saturating at capacity
    pub live: u32,
    pub _pad: [u32; 2],
}

/// When the aging kernel runs.
///
/// The update latch is raised by every append and stays up until a caller
/// clears it, since checking for fully decayed ripples would need a read-back.
/// Advances are keyed by frame index so many surfaces ticking the same frame
/// trigger one dispatch.
#[derive(Clone, Copy, Debug, Default)]
pub struct RippleSchedule {
    should_update: bool,
    last_advanced: Option<u64>,
}

impl RippleSchedule {
    pub fn request_update(&mut self) {
        self.should_update = true;
    }

    pub fn clear(&mut self) {
        self.should_update = false;
    }

    pub fn should_update(&self) -> bool {
        self.should_update
    }

    /// Returns true when `frame` should run the aging kernel, and records it
    pub fn try_advance(&mut self, frame: u64) -> bool {
        if !self.should_update || self.last_advanced == Some(frame) {
            return false;
        }
        self.last_advanced = Some(frame);
        true
    }
}

/// GPU ripple ring plus its kernels
pub struct RippleSimulator {
    pipeline: RipplePipeline,
    ripples: wgpu::Buffer,
    counter: wgpu::Buffer,
    params: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    schedule: RippleSchedule,
    capacity: u32,
}

impl RippleSimulator {
    pub fn new(device: &wgpu::Device) -> Self {
        Self::with_capacity(device, RIPPLE_CAPACITY)
    }

    pub fn with_capacity(device: &wgpu::Device, capacity: u32) -> Self {
        let capacity = capacity.max(1);
        let pipeline = RipplePipeline::new(device);

        // New buffers are zeroed, which is an empty ring
        let storage = wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST;
        let ripples = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ripple_buffer"),
            size: (capacity as usize * std::mem::size_of::<RippleEntry>()) as u64,
            usage: storage,
            mapped_at_creation: false,
        });
        let counter = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ripple_counter"),
            size: std::mem::size_of::<RippleCounter>() as u64,
            usage: storage,
            mapped_at_creation: false,
        });
        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ripple_params"),
            size: std::mem::size_of::<RippleParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = pipeline.create_bind_group(device, &ripples, &counter, &params);

        log::debug!("Created ripple ring with {} slots", capacity);

        Self {
            pipeline,
            ripples,
            counter,
            params,
            bind_group,
            schedule: RippleSchedule::default(),
            capacity,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn ripple_buffer(&self) -> &wgpu::Buffer {
        &self.ripples
    }

    pub fn counter_buffer(&self) -> &wgpu::Buffer {
        &self.counter
    }

    pub fn schedule(&self) -> &RippleSchedule {
        &self.schedule
    }

    /// Append a ripple, overwriting the oldest slot once the ring is full
    pub fn add_ripple(&mut self, gpu: &GpuContext, ripple: &RippleDesc) {
        let entry = RippleEntry::from(ripple);
        let params = RippleParams {
            pos: entry.pos,
            drss: entry.drss,
            delta_time: 0.0,
            capacity: self.capacity,
            _pad: [0; 2],
        };
        gpu.queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&params));

        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ripple_add_encoder"),
        });
        self.pipeline.dispatch_add(&mut encoder, &self.bind_group);
        gpu.submit(encoder);

        self.schedule.request_update();
    }

    /// Age every ripple by the frame's delta, at most once per frame index.
    /// Returns whether a dispatch was issued.
    pub fn advance(&mut self, gpu: &GpuContext, frame: &FrameInfo) -> bool {
        if !self.schedule.try_advance(frame.index) {
            return false;
        }

        let params = RippleParams {
            delta_time: frame.delta_secs,
            capacity: self.capacity,
            ..Default::default()
        };
        gpu.queue.write_buffer(&self.params, 0, bytemuck::bytes_of(&params));

        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ripple_update_encoder"),
        });
        self.pipeline.dispatch_update(&mut encoder, &self.bind_group, self.capacity);
        gpu.submit(encoder);
        true
    }

    /// Stop aging until the next append
    pub fn clear_latch(&mut self) {
        self.schedule.clear();
    }

    /// Blocking read of the counter and every slot
    pub fn read_back(&self, gpu: &GpuContext) -> Result<(RippleCounter, Vec<RippleEntry>)> {
        let counter = readback::read_buffer::<RippleCounter>(gpu, &self.counter)?
            .first()
            .copied()
            .unwrap_or_default();
        let entries = readback::read_buffer::<RippleEntry>(gpu, &self.ripples)?;
        Ok((counter, entries))
    }

    pub fn destroy(self) {
        self.ripples.destroy();
        self.counter.destroy();
        self.params.destroy();
    }
}

/// Rate-limited ripple source for held-down pointer input
#[derive(Clone, Debug)]
pub struct RippleEmitter {
    /// Minimum seconds between ripples
    pub rate: f32,
    /// Offset along the hit normal
    pub contact_offset: f32,
    pub template: RippleDesc,
    timer: f32,
}

impl Default for RippleEmitter {
    fn default() -> Self {
        Self {
            rate: 0.1,
            contact_offset: 1.0,
            template: RippleDesc::default(),
            timer: 0.0,
        }
    }
}

impl RippleEmitter {
    pub fn tick(&mut self, delta_secs: f32) {
        self.timer += delta_secs;
    }

    /// Ripple for a pointer hit, or None while still cooling down
    pub fn emit(&mut self, hit_point: Vec3, hit_normal: Vec3) -> Option<RippleDesc> {
        if self.timer <= self.rate {
            return None;
        }
        self.timer = 0.0;
        Some(RippleDesc {
            position: hit_point + hit_normal * self.contact_offset,
            ..self.template
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::context::test_gpu;

    #[test]
    fn test_layout_sizes() {
        assert_eq!(std::mem::size_of::<RippleEntry>(), 32);
        assert_eq!(std::mem::size_of::<RippleCounter>(), 16);
    }

    #[test]
    fn test_entry_packing() {
        let desc = RippleDesc {
            position: Vec3::new(1.0, 2.0, 3.0),
            strength: 0.5,
            decay_rate: 2.0,
            speed: 10.0,
            start_radius: 0.25,
            sharpness: 3.0,
        };
        let entry = RippleEntry::from(&desc);
        assert_eq!(entry.pos, [1.0, 2.0, 3.0, 0.5]);
        assert_eq!(entry.drss, [2.0, 0.25, 3.0, 10.0]);
    }

    #[test]
    fn test_schedule_once_per_frame() {
        let mut schedule = RippleSchedule::default();
        assert!(!schedule.try_advance(1));

        schedule.request_update();
        assert!(schedule.try_advance(1));
        assert!(!schedule.try_advance(1));
        assert!(schedule.try_advance(2));

        schedule.clear();
        assert!(!schedule.try_advance(3));
    }

    #[test]
    fn test_emitter_rate_limit() {
        let mut emitter = RippleEmitter::default();
        assert!(emitter.emit(Vec3::ZERO, Vec3::Y).is_none());

        emitter.tick(0.15);
        let ripple = emitter.emit(Vec3::ZERO, Vec3::Y).unwrap();
        assert_eq!(ripple.position, Vec3::Y);
        assert!(emitter.emit(Vec3::ZERO, Vec3::Y).is_none());
    }

    #[test]
    fn test_fill_ring_to_capacity() {
        let Some(gpu) = test_gpu() else { return };
        let mut sim = RippleSimulator::new(&gpu.device);
        for i in 0..RIPPLE_CAPACITY {
            sim.add_ripple(&gpu, &RippleDesc::at(Vec3::new(i as f32, 0.0, 0.0)));
        }

        let (counter, entries) = sim.read_back(&gpu).unwrap();
        assert_eq!(counter.live, RIPPLE_CAPACITY);
        assert_eq!(counter.next, 0);
        assert_eq!(entries.len(), RIPPLE_CAPACITY as usize);
        assert!(entries.iter().all(|e| e.strength() > 0.0));
        assert_eq!(entries[127].pos[0], 127.0);
    }

    #[test]
    fn test_overflow_overwrites_oldest() {
        let Some(gpu) = test_gpu() else { return };
        let mut sim = RippleSimulator::new(&gpu.device);
        for i in 0..130 {
            sim.add_ripple(&gpu, &RippleDesc::at(Vec3::new(i as f32, 0.0, 0.0)));
        }

        let (counter, entries) = sim.read_back(&gpu).unwrap();
        assert_eq!(counter.live, RIPPLE_CAPACITY);
        assert_eq!(counter.next, 2);
        assert_eq!(entries[0].pos[0], 128.0);
        assert_eq!(entries[1].pos[0], 129.0);
        assert_eq!(entries[2].pos[0], 2.0);
    }

    #[test]
    fn test_advance_ages_ripples() {
        let Some(gpu) = test_gpu() else { return };
        let mut sim = RippleSimulator::new(&gpu.device);
        assert!(!sim.advance(&gpu, &FrameInfo::fixed(1, 0.1)));

        sim.add_ripple(&gpu, &RippleDesc::default());
        let frame = FrameInfo::fixed(2, 0.1);
        assert!(sim.advance(&gpu, &frame));
        assert!(!sim.advance(&gpu, &frame));

        let (_, entries) = sim.read_back(&gpu).unwrap();
        // strength 1 - 2.5 * 0.1, radius 0 + 25 * 0.1
        assert!((entries[0].strength() - 0.75).abs() < 1e-5);
        assert!((entries[0].radius() - 2.5).abs() < 1e-5);
    }
}
