//! Compute kernels that synthesize shared and per-terrain textures:
//! the tileable 3-D wind noise and the terrain normal map.

use bytemuck::{Pod, Zeroable};

use crate::render::context::GpuContext;
use crate::terrain::Heightfield;

/// Edge length of the wind noise volume
pub const NOISE_SIZE: u32 = 32;

/// Generates the shared 3-D noise texture
pub struct NoisePipeline {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl NoisePipeline {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("noise3d_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/noise3d.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("noise3d_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::StorageTexture {
                    access: wgpu::StorageTextureAccess::WriteOnly,
                    format: wgpu::TextureFormat::Rgba8Unorm,
                    view_dimension: wgpu::TextureViewDimension::D3,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("noise3d_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("noise3d_pipeline"),
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

    /// Create and fill a `NOISE_SIZE`^3 noise volume
    pub fn generate(&self, gpu: &GpuContext) -> wgpu::Texture {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("grass_noise_3d"),
            size: wgpu::Extent3d {
                width: NOISE_SIZE,
                height: NOISE_SIZE,
                depth_or_array_layers: NOISE_SIZE,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("noise3d_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            }],
        });

        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("noise3d_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("noise3d_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(NOISE_SIZE / 8, NOISE_SIZE / 8, NOISE_SIZE / 4);
        }
        gpu.submit(encoder);

        texture
    }
}

/// Normal map parameters (must match `NormalParams` in normals.wgsl)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct NormalParams {
    pub hf_width: u32,
    pub hf_depth: u32,
    pub _pad: [u32; 2],
    pub size: [f32; 4],
}

/// A generated terrain normal map
pub struct TerrainNormalMap {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    /// Half a texel in uv, added when blades sample the map
    pub map_offset: f32,
}

/// Derives terrain normal maps from heightfields
pub struct NormalMapPipeline {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
}

impl NormalMapPipeline {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("terrain_normals_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/normals.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("terrain_normals_layout"),
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
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba8Unorm,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("terrain_normals_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("terrain_normals_pipeline"),
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

    /// Generate a normal map at heightfield resolution, or twice that when
    /// `high_quality` is set
    pub fn generate(&self, gpu: &GpuContext, terrain: &Heightfield, high_quality: bool) -> TerrainNormalMap {
        let device = &gpu.device;
        let scale = if high_quality { 2 } else { 1 };
        let width = terrain.width() * scale;
        let height = terrain.depth() * scale;

        let size = terrain.size();
        let params = NormalParams {
            hf_width: terrain.width(),
            hf_depth: terrain.depth(),
            _pad: [0; 2],
            size: [size.x, size.y, size.z, 0.0],
        };
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("terrain_normals_params"),
            size: std::mem::size_of::<NormalParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        gpu.queue.write_buffer(&params_buffer, 0, bytemuck::bytes_of(&params));

        let heights_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("terrain_heights"),
            size: std::mem::size_of_val(terrain.heights()) as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        gpu.queue.write_buffer(&heights_buffer, 0, bytemuck::cast_slice(terrain.heights()));

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("terrain_normal_map"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("terrain_normals_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: heights_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("terrain_normals_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("terrain_normals_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups((width + 7) / 8, (height + 7) / 8, 1);
        }
        gpu.submit(encoder);

        log::debug!("Generated {}x{} terrain normal map", width, height);

        TerrainNormalMap {
            texture,
            view,
            map_offset: normal_map_offset(width),
        }
    }
}

/// Half a texel of a normal map `width` texels wide, in uv
pub fn normal_map_offset(width: u32) -> f32 {
    0.5 / width.max(1) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::readback;
    use glam::Vec3;

    #[test]
    fn test_params_size() {
        assert_eq!(std::mem::size_of::<NormalParams>(), 32);
    }

    #[test]
    fn test_map_offset() {
        assert_eq!(normal_map_offset(256), 0.5 / 256.0);
        assert_eq!(normal_map_offset(0), 0.5);
    }

    #[test]
    fn test_flat_terrain_normals_point_up() {
        let Some(gpu) = crate::render::context::test_gpu() else { return };
        let pipeline = NormalMapPipeline::new(&gpu.device);
        let terrain = Heightfield::flat(8, 8, Vec3::new(16.0, 4.0, 16.0)).unwrap();

        let map = pipeline.generate(&gpu, &terrain, true);
        assert_eq!(map.texture.size().width, 16);
        assert_eq!(map.map_offset, 0.5 / 16.0);

        let bytes = readback::read_texture_2d(&gpu, &map.texture).unwrap();
        for texel in bytes.chunks_exact(4) {
            // (0, 1, 0) packed to (0.5, 1, 0.5)
            assert!((texel[0] as i32 - 128).abs() <= 1);
            assert_eq!(texel[1], 255);
            assert!((texel[2] as i32 - 128).abs() <= 1);
        }
    }
}
