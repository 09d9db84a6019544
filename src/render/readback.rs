//! Texture upload and GPU -> host read-back helpers
//!
//! Read-back blocks on the device; it is only used where a result is genuinely
//! needed on the host (chunk discarding, saving detail maps, debugging).

use crate::core::error::Error;
use crate::core::types::Result;
use crate::render::context::GpuContext;

/// Bytes per texel for the formats the grass renderer uses
pub fn bytes_per_texel(format: wgpu::TextureFormat) -> Result<u32> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::R32Float => Ok(4),
        wgpu::TextureFormat::Rgba16Float => Ok(8),
        wgpu::TextureFormat::Rgba32Float => Ok(16),
        other => Err(Error::UnsupportedFormat(format!("{:?}", other))),
    }
}

/// Encode normalized RGBA texels into the byte layout of `format`.
/// Rgba8Unorm values are rounded, float formats are stored as-is.
pub fn encode_texels(format: wgpu::TextureFormat, texels: &[[f32; 4]]) -> Result<Vec<u8>> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm => Ok(texels
            .iter()
            .flat_map(|t| t.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8))
            .collect()),
        wgpu::TextureFormat::Rgba16Float => {
            let halves: Vec<half::f16> = texels
                .iter()
                .flat_map(|t| t.map(half::f16::from_f32))
                .collect();
            Ok(bytemuck::cast_slice(&halves).to_vec())
        }
        wgpu::TextureFormat::Rgba32Float => Ok(bytemuck::cast_slice(texels).to_vec()),
        other => Err(Error::UnsupportedFormat(format!("{:?}", other))),
    }
}

/// Decode bytes of `format` into RGBA f32 texels
pub fn decode_texels(format: wgpu::TextureFormat, bytes: &[u8]) -> Result<Vec<[f32; 4]>> {
    match format {
        wgpu::TextureFormat::Rgba8Unorm => Ok(bytes
            .chunks_exact(4)
            .map(|p| [p[0], p[1], p[2], p[3]].map(|c| c as f32 / 255.0))
            .collect()),
        wgpu::TextureFormat::Rgba16Float => Ok(bytes
            .chunks_exact(8)
            .map(|p| {
                let mut out = [0.0; 4];
                for (c, pair) in out.iter_mut().zip(p.chunks_exact(2)) {
                    *c = half::f16::from_le_bytes([pair[0], pair[1]]).to_f32();
                }
                out
            })
            .collect()),
        wgpu::TextureFormat::Rgba32Float => Ok(bytes
            .chunks_exact(16)
            .map(|p| {
                let mut out = [0.0; 4];
                for (c, word) in out.iter_mut().zip(p.chunks_exact(4)) {
                    *c = f32::from_le_bytes([word[0], word[1], word[2], word[3]]);
                }
                out
            })
            .collect()),
        other => Err(Error::UnsupportedFormat(format!("{:?}", other))),
    }
}

/// Write tightly packed texel bytes into mip 0 of a 2D texture
pub fn write_texture_2d(queue: &wgpu::Queue, texture: &wgpu::Texture, bytes: &[u8]) -> Result<()> {
    let bpt = bytes_per_texel(texture.format())?;
    let size = texture.size();
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytes,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(size.width * bpt),
            rows_per_image: Some(size.height),
        },
        wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        },
    );
    Ok(())
}

/// Copy mip 0 of a 2D texture back to the host as tightly packed bytes.
/// The texture needs `COPY_SRC` usage.
pub fn read_texture_2d(gpu: &GpuContext, texture: &wgpu::Texture) -> Result<Vec<u8>> {
    let bpt = bytes_per_texel(texture.format())?;
    let size = texture.size();
    let unpadded_row = size.width * bpt;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_row = unpadded_row.div_ceil(align) * align;

    let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("texture_readback_staging"),
        size: (padded_row * size.height) as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("texture_readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row),
                rows_per_image: Some(size.height),
            },
        },
        wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        },
    );
    gpu.submit(encoder);

    let mapped = map_read(gpu, &staging)?;
    let mut out = Vec::with_capacity((unpadded_row * size.height) as usize);
    for row in mapped.chunks_exact(padded_row as usize) {
        out.extend_from_slice(&row[..unpadded_row as usize]);
    }
    Ok(out)
}

/// Copy a whole buffer back to the host and reinterpret it as `T`.
/// The buffer needs `COPY_SRC` usage.
pub fn read_buffer<T: bytemuck::Pod>(gpu: &GpuContext, buffer: &wgpu::Buffer) -> Result<Vec<T>> {
    let staging = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("buffer_readback_staging"),
        size: buffer.size(),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("buffer_readback_encoder"),
    });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, buffer.size());
    gpu.submit(encoder);

    let bytes = map_read(gpu, &staging)?;
    Ok(bytemuck::pod_collect_to_vec(&bytes))
}

fn map_read(gpu: &GpuContext, staging: &wgpu::Buffer) -> Result<Vec<u8>> {
    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        tx.send(result).ok();
    });
    gpu.wait_idle();

    match rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(Error::Gpu(format!("Buffer map failed: {}", e))),
        Err(_) => return Err(Error::Gpu("Buffer map callback dropped".to_string())),
    }

    let data = slice.get_mapped_range().to_vec();
    staging.unmap();
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba8_encode_decode_exact_on_byte_values() {
        let texels = vec![[0.0, 128.0 / 255.0, 1.0, 64.0 / 255.0]];
        let bytes = encode_texels(wgpu::TextureFormat::Rgba8Unorm, &texels).unwrap();
        assert_eq!(bytes, vec![0, 128, 255, 64]);
        let back = decode_texels(wgpu::TextureFormat::Rgba8Unorm, &bytes).unwrap();
        assert_eq!(back, texels);
    }

    #[test]
    fn test_rgba8_encode_clamps() {
        let bytes = encode_texels(wgpu::TextureFormat::Rgba8Unorm, &[[-1.0, 2.0, 0.5, 1.0]]).unwrap();
        assert_eq!(bytes, vec![0, 255, 128, 255]);
    }

    #[test]
    fn test_half_decode() {
        let bytes = encode_texels(wgpu::TextureFormat::Rgba16Float, &[[0.5, 2.0, 0.25, 1.0]]).unwrap();
        assert_eq!(bytes.len(), 8);
        let back = decode_texels(wgpu::TextureFormat::Rgba16Float, &bytes).unwrap();
        assert_eq!(back[0], [0.5, 2.0, 0.25, 1.0]);
    }

    #[test]
    fn test_unsupported_format() {
        assert!(bytes_per_texel(wgpu::TextureFormat::Depth32Float).is_err());
    }

    #[test]
    fn test_texture_round_trip_on_gpu() {
        let Some(gpu) = crate::render::context::test_gpu() else { return };
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("round_trip"),
            size: wgpu::Extent3d { width: 5, height: 3, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::COPY_DST | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let bytes: Vec<u8> = (0..5 * 3 * 4).map(|i| i as u8).collect();
        write_texture_2d(&gpu.queue, &texture, &bytes).unwrap();
        assert_eq!(read_texture_2d(&gpu, &texture).unwrap(), bytes);
    }
}
