use crate::render::capture::{CaptureError, CapturedFrame};
use futures_intrusive::channel::shared::oneshot_channel;

const BYTES_PER_PIXEL: usize = 4;

/// Rounds a row size up to the buffer-copy row alignment (256 bytes).
fn align_bytes_per_row(value: usize) -> usize {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    value.div_ceil(align) * align
}

fn depad_rows(data: &[u8], tight_bpr: usize, padded_bpr: usize, height: usize) -> Vec<u8> {
    let mut tight = Vec::with_capacity(tight_bpr * height);
    for row in 0..height {
        let start = row * padded_bpr;
        tight.extend_from_slice(&data[start..start + tight_bpr]);
    }
    tight
}

/// Copies an RGBA8 texture into a tightly packed CPU buffer. Blocks until
/// the GPU has finished.
pub fn read_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> Result<CapturedFrame, CaptureError> {
    let width = texture.width();
    let height = texture.height();
    if width == 0 || height == 0 {
        return Err(CaptureError::Readback("empty texture".to_string()));
    }
    match texture.format() {
        wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => {}
        other => {
            return Err(CaptureError::Readback(format!(
                "unsupported readback format {:?}",
                other
            )))
        }
    }

    let tight_bpr = BYTES_PER_PIXEL * width as usize;
    let padded_bpr = align_bytes_per_row(tight_bpr);
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("capture-readback"),
        size: (padded_bpr * height as usize) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("capture-readback-encoder"),
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
                bytes_per_row: Some(padded_bpr as u32),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = oneshot_channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device.poll(wgpu::Maintain::Wait);

    pollster::block_on(receiver.receive())
        .ok_or_else(|| CaptureError::Readback("map callback dropped".to_string()))?
        .map_err(|err| CaptureError::Readback(err.to_string()))?;

    let data = slice.get_mapped_range();
    let pixels = depad_rows(&data, tight_bpr, padded_bpr, height as usize);
    drop(data);
    staging.unmap();

    Ok(CapturedFrame {
        width,
        height,
        pixels,
    })
}

#[cfg(test)]
mod tests {
    use super::{align_bytes_per_row, depad_rows};

    #[test]
    fn rows_align_to_256_bytes() {
        assert_eq!(align_bytes_per_row(4), 256);
        assert_eq!(align_bytes_per_row(256), 256);
        assert_eq!(align_bytes_per_row(800 * 4), 3328);
    }

    #[test]
    fn depad_drops_row_padding() {
        let mut data = vec![0u8; 512];
        data[..8].copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
        data[256..264].copy_from_slice(&[9, 10, 11, 12, 13, 14, 15, 16]);
        let tight = depad_rows(&data, 8, 256, 2);
        assert_eq!(tight, (1..=16).collect::<Vec<u8>>());
    }
}
