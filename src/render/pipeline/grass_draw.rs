//! Grass blade render pipelines (direct and indirect instancing, plus
//! depth-only variants for shadow casting)

use crate::grass::material::GrassMaterial;

/// Per-instance object matrix columns for direct instancing
const INSTANCE_ATTRIBUTES: [wgpu::VertexAttribute; 4] = wgpu::vertex_attr_array![
    0 => Float32x4,
    1 => Float32x4,
    2 => Float32x4,
    3 => Float32x4
];

/// How a chunk's instances are submitted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstancingMode {
    /// Instance count on the CPU, object matrix per instance from a vertex buffer
    Direct,
    /// Instance count read from the chunk's GPU indirect-args buffer
    Indirect,
}

struct Variant {
    direct: wgpu::RenderPipeline,
    indirect: wgpu::RenderPipeline,
}

impl Variant {
    fn get(&self, mode: InstancingMode) -> &wgpu::RenderPipeline {
        match mode {
            InstancingMode::Direct => &self.direct,
            InstancingMode::Indirect => &self.indirect,
        }
    }
}

pub struct GrassDrawPipeline {
    color: Variant,
    shadow: Option<Variant>,
    surface_layout: wgpu::BindGroupLayout,
    chunk_layout: wgpu::BindGroupLayout,
    map_sampler: wgpu::Sampler,
    noise_sampler: wgpu::Sampler,
}

fn vertex_texture(binding: u32, dimension: wgpu::TextureViewDimension) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: dimension,
            multisampled: false,
        },
        count: None,
    }
}

fn vertex_buffer(binding: u32, ty: wgpu::BufferBindingType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn vertex_sampler(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

impl GrassDrawPipeline {
    /// Build pipelines drawing into `material`'s color (and depth) formats
    pub fn new(device: &wgpu::Device, camera_layout: &wgpu::BindGroupLayout, material: &GrassMaterial) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("grass_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/grass.wgsl").into()),
        });

        let read_only = wgpu::BufferBindingType::Storage { read_only: true };
        let surface_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_surface_layout"),
            entries: &[
                vertex_buffer(0, wgpu::BufferBindingType::Uniform),
                // Color map
                vertex_texture(1, wgpu::TextureViewDimension::D2),
                // Parameter map
                vertex_texture(2, wgpu::TextureViewDimension::D2),
                // Terrain normal map
                vertex_texture(3, wgpu::TextureViewDimension::D2),
                vertex_sampler(4),
                // Wind noise
                vertex_texture(5, wgpu::TextureViewDimension::D3),
                vertex_sampler(6),
                // Ripple ring + counter
                vertex_buffer(7, read_only),
                vertex_buffer(8, read_only),
            ],
        });

        let chunk_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("grass_chunk_layout"),
            entries: &[
                vertex_buffer(0, wgpu::BufferBindingType::Uniform),
                vertex_buffer(1, read_only),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("grass_pipeline_layout"),
            bind_group_layouts: &[camera_layout, &surface_layout, &chunk_layout],
            immediate_size: 0,
        });

        let depth_state = |format: wgpu::TextureFormat| wgpu::DepthStencilState {
            format,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        };

        let instance_buffers = [wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<[[f32; 4]; 4]>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &INSTANCE_ATTRIBUTES,
        }];

        let color_target = [Some(wgpu::ColorTargetState {
            format: material.color_format,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })];

        let make = |label: &str, mode: InstancingMode, with_color: bool| {
            let (entry_point, buffers): (&str, &[wgpu::VertexBufferLayout]) = match mode {
                InstancingMode::Direct => ("vs_direct", &instance_buffers),
                InstancingMode::Indirect => ("vs_indirect", &[]),
            };
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some(entry_point),
                    buffers,
                    compilation_options: Default::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    // Blades are visible from both sides
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: material.depth_format.map(depth_state),
                multisample: wgpu::MultisampleState::default(),
                fragment: with_color.then(|| wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &color_target,
                    compilation_options: Default::default(),
                }),
                multiview_mask: None,
                cache: None,
            })
        };

        let color = Variant {
            direct: make("grass_direct_pipeline", InstancingMode::Direct, true),
            indirect: make("grass_indirect_pipeline", InstancingMode::Indirect, true),
        };
        let shadow = material.depth_format.map(|_| Variant {
            direct: make("grass_shadow_direct_pipeline", InstancingMode::Direct, false),
            indirect: make("grass_shadow_indirect_pipeline", InstancingMode::Indirect, false),
        });

        let map_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("grass_map_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let noise_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("grass_noise_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            color,
            shadow,
            surface_layout,
            chunk_layout,
            map_sampler,
            noise_sampler,
        }
    }

    pub fn chunk_layout(&self) -> &wgpu::BindGroupLayout {
        &self.chunk_layout
    }

    /// Whether depth-only pipelines exist (requires a depth format)
    pub fn has_shadow_pipelines(&self) -> bool {
        self.shadow.is_some()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn create_surface_bind_group(
        &self,
        device: &wgpu::Device,
        uniform: &wgpu::Buffer,
        color_map: &wgpu::TextureView,
        param_map: &wgpu::TextureView,
        normal_map: &wgpu::TextureView,
        noise: &wgpu::TextureView,
        ripples: &wgpu::Buffer,
        ripple_counter: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("grass_surface_bind_group"),
            layout: &self.surface_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(color_map),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(param_map),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(normal_map),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(&self.map_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(noise),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: wgpu::BindingResource::Sampler(&self.noise_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: ripples.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 8,
                    resource: ripple_counter.as_entire_binding(),
                },
            ],
        })
    }

    /// Bind the color pipeline for `mode` and the frame-constant groups
    pub fn bind(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        mode: InstancingMode,
        camera: &wgpu::BindGroup,
        surface: &wgpu::BindGroup,
    ) {
        pass.set_pipeline(self.color.get(mode));
        pass.set_bind_group(0, camera, &[]);
        pass.set_bind_group(1, surface, &[]);
    }

    /// Bind the depth-only pipeline for `mode`. Returns false when the
    /// material has no depth format.
    pub fn bind_shadow(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        mode: InstancingMode,
        camera: &wgpu::BindGroup,
        surface: &wgpu::BindGroup,
    ) -> bool {
        let Some(shadow) = &self.shadow else {
            return false;
        };
        pass.set_pipeline(shadow.get(mode));
        pass.set_bind_group(0, camera, &[]);
        pass.set_bind_group(1, surface, &[]);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::buffer::CameraBuffer;

    #[test]
    fn test_instance_stride_matches_attributes() {
        let last = INSTANCE_ATTRIBUTES[3];
        assert_eq!(last.offset + 16, std::mem::size_of::<[[f32; 4]; 4]>() as u64);
        assert_eq!(last.shader_location, 3);
    }

    #[test]
    fn test_pipelines_build() {
        let Some(gpu) = crate::render::context::test_gpu() else { return };
        let camera = CameraBuffer::new(&gpu.device);

        let with_depth = GrassDrawPipeline::new(&gpu.device, camera.bind_group_layout(), &GrassMaterial::default());
        assert!(with_depth.has_shadow_pipelines());

        let material = GrassMaterial::with_targets(wgpu::TextureFormat::Rgba8Unorm, None);
        let color_only = GrassDrawPipeline::new(&gpu.device, camera.bind_group_layout(), &material);
        assert!(!color_only.has_shadow_pipelines());
    }
}
