//! Per-chunk density scan used to discard empty terrain chunks

use bytemuck::{Pod, Zeroable};

use crate::core::types::Result;
use crate::render::context::GpuContext;
use crate::render::readback;

/// Scan parameters (must match `ScanParams` in chunk_scan.wgsl)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct ScanParams {
    pub chunks_x: u32,
    pub chunks_z: u32,
    pub _pad: [u32; 2],
}

/// Counts, per chunk of a `chunks_x * chunks_z` grid laid over the
/// parameter map, how many texels have non-zero density.
pub struct ChunkScanPipeline {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl ChunkScanPipeline {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("chunk_scan_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/chunk_scan.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("chunk_scan_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("chunk_scan_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("chunk_scan_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            pipeline,
            bind_group_layout,
        }
    }

    /// Run the scan and read the counts back (`z * chunks_x + x` order).
    /// Blocks until the GPU is done.
    pub fn count_density(
        &self,
        gpu: &GpuContext,
        param_map: &wgpu::Texture,
        chunks_x: u32,
        chunks_z: u32,
    ) -> Result<Vec<u32>> {
        let device = &gpu.device;
        let cell_count = (chunks_x * chunks_z).max(1) as usize;

        let params = ScanParams {
            chunks_x,
            chunks_z,
            _pad: [0; 2],
        };
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("chunk_scan_params"),
            size: std::mem::size_of::<ScanParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        gpu.queue.write_buffer(&params_buffer, 0, bytemuck::bytes_of(&params));

        let results = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("chunk_scan_results"),
            size: (cell_count * std::mem::size_of::<u32>()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        gpu.queue.write_buffer(&results, 0, bytemuck::cast_slice(&vec![0u32; cell_count]));

        let view = param_map.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("chunk_scan_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: results.as_entire_binding(),
                },
            ],
        });

        let size = param_map.size();
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("chunk_scan_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("chunk_scan_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups((size.width + 7) / 8, (size.height + 7) / 8, 1);
        }
        gpu.submit(encoder);

        let counts = readback::read_buffer::<u32>(gpu, &results)?;
        results.destroy();
        params_buffer.destroy();
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadrant_counts() {
        let Some(gpu) = crate::render::context::test_gpu() else { return };
        let scan = ChunkScanPipeline::new(&gpu.device);

        // 8x8 map, density zero in the +x/+z quadrant
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("scan_test_map"),
            size: wgpu::Extent3d { width: 8, height: 8, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let mut bytes = Vec::new();
        for y in 0..8 {
            for x in 0..8 {
                let density = if x >= 4 && y >= 4 { 0 } else { 255 };
                bytes.extend_from_slice(&[density, 255, 0, 255]);
            }
        }
        readback::write_texture_2d(&gpu.queue, &texture, &bytes).unwrap();

        let counts = scan.count_density(&gpu, &texture, 2, 2).unwrap();
        assert_eq!(counts, vec![16, 16, 16, 0]);
    }
}
