//! Ripple append and aging compute pipelines

use bytemuck::{Pod, Zeroable};

/// Ripple kernel parameters (must match `RippleParams` in ripple.wgsl)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct RippleParams {
    /// xyz = position, w = strength
    pub pos: [f32; 4],
    /// decay rate, radius, sharpness, speed
    pub drss: [f32; 4],
    pub delta_time: f32,
    pub capacity: u32,
    pub _pad: [u32; 2],
}

/// Two kernels sharing one layout: `add_ripple` writes one ring slot,
/// `update_ripples` ages every live slot.
pub struct RipplePipeline {
    add_pipeline: wgpu::ComputePipeline,
    update_pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl RipplePipeline {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("ripple_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/ripple.wgsl").into()),
        });

        let storage_entry = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ripple_layout"),
            entries: &[
                // Ripple ring
                storage_entry(0),
                // Counter
                storage_entry(1),
                // Params
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ripple_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let make = |label: &str, entry_point: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        Self {
            add_pipeline: make("ripple_add_pipeline", "add_ripple"),
            update_pipeline: make("ripple_update_pipeline", "update_ripples"),
            bind_group_layout,
        }
    }

    pub fn create_bind_group(
        &self,
        device: &wgpu::Device,
        ripples: &wgpu::Buffer,
        counter: &wgpu::Buffer,
        params: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ripple_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: ripples.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: counter.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params.as_entire_binding(),
                },
            ],
        })
    }

    /// Append one ripple (single invocation)
    pub fn dispatch_add(&self, encoder: &mut wgpu::CommandEncoder, bind_group: &wgpu::BindGroup) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("ripple_add_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.add_pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(1, 1, 1);
    }

    /// Age every slot of a ring with `capacity` entries
    pub fn dispatch_update(&self, encoder: &mut wgpu::CommandEncoder, bind_group: &wgpu::BindGroup, capacity: u32) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("ripple_update_pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.update_pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(capacity.div_ceil(64), 1, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::context::test_gpu;

    #[test]
    fn test_params_size() {
        assert_eq!(std::mem::size_of::<RippleParams>(), 48);
    }

    #[test]
    fn test_pipeline_builds() {
        let Some(gpu) = test_gpu() else { return };
        let pipeline = RipplePipeline::new(&gpu.device);
        let ripples = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("test_ripples"),
            size: 32 * 64,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        let counter = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("test_counter"),
            size: 16,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        let params = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("test_params"),
            size: std::mem::size_of::<RippleParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM,
            mapped_at_creation: false,
        });
        let bind_group = pipeline.create_bind_group(&gpu.device, &ripples, &counter, &params);
        let mut encoder = gpu.device.create_command_encoder(&Default::default());
        pipeline.dispatch_update(&mut encoder, &bind_group, 64);
        gpu.submit(encoder);
        gpu.wait_idle();
    }
}
