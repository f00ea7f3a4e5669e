#![allow(dead_code)]

use std::{
    cell::Cell,
    ops::Range,
    path::{Path, PathBuf},
    time::Duration,
};

use image::{Rgba, RgbaImage};
use potato_gfx::{
    DeviceContext, Effect, context::GpuContext, data_structures::texture::CubeFace,
};

pub(crate) fn gpu() -> GpuContext {
    let _ = env_logger::builder().is_test(true).try_init();
    GpuContext::headless_blocking().expect("integration tests need a graphics adapter")
}

/// Solid colour whose red channel encodes `tag`.
pub(crate) fn tagged(size: u32, tag: u8) -> RgbaImage {
    RgbaImage::from_pixel(size, size, Rgba([tag, 255 - tag, 0, 255]))
}

pub(crate) fn write_png(dir: &Path, name: &str, img: &RgbaImage) -> PathBuf {
    let path = dir.join(name);
    img.save(&path).expect("failed to write fixture");
    path
}

/// 4:3 cross where every face is filled with its layer index times 10.
pub(crate) fn cross(face: u32) -> RgbaImage {
    let mut img = RgbaImage::new(face * 4, face * 3);
    for kind in CubeFace::ALL {
        let (col, row) = kind.cross_cell();
        let fill = tagged(face, kind as u8 * 10);
        image::imageops::replace(&mut img, &fill, (col * face) as i64, (row * face) as i64);
    }
    img
}

/// Copy mip 0 of one array layer back to the CPU.
///
/// `width * 4` has to be a multiple of 256.
pub(crate) fn read_layer(gpu: &GpuContext, texture: &wgpu::Texture, layer: u32) -> RgbaImage {
    let (width, height) = (texture.width(), texture.height());
    let u32_size = std::mem::size_of::<u32>() as u32;
    let output_buffer = gpu.device.create_buffer(&wgpu::BufferDescriptor {
        size: (u32_size * width * height) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        label: Some("readback buffer"),
        mapped_at_creation: false,
    });
    let mut encoder = gpu
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &output_buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(u32_size * width),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    gpu.queue.submit(std::iter::once(encoder.finish()));

    futures::executor::block_on(async {
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        let buffer_slice = output_buffer.slice(..);
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).unwrap();
        });
        gpu.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: Some(Duration::from_secs(3)),
            })
            .unwrap();
        rx.receive().await.unwrap().unwrap();
        let data = buffer_slice.get_mapped_range();
        RgbaImage::from_raw(width, height, data.to_vec()).unwrap()
    })
}

#[derive(Debug, PartialEq)]
pub(crate) enum Call {
    Pipeline,
    BindGroup(u32),
    VertexBuffer(u32),
    IndexBuffer(wgpu::IndexFormat),
    DrawIndexed {
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    },
}

/// Device context that only remembers what was recorded.
#[derive(Default)]
pub(crate) struct RecordingContext {
    pub(crate) calls: Vec<Call>,
}

impl RecordingContext {
    pub(crate) fn draws(&self) -> Vec<&Call> {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::DrawIndexed { .. }))
            .collect()
    }
}

impl DeviceContext for RecordingContext {
    fn set_pipeline(&mut self, _: &wgpu::RenderPipeline) {
        self.calls.push(Call::Pipeline);
    }

    fn set_bind_group(&mut self, index: u32, _: &wgpu::BindGroup) {
        self.calls.push(Call::BindGroup(index));
    }

    fn set_vertex_buffer(&mut self, slot: u32, _: wgpu::BufferSlice<'_>) {
        self.calls.push(Call::VertexBuffer(slot));
    }

    fn set_index_buffer(&mut self, _: wgpu::BufferSlice<'_>, format: wgpu::IndexFormat) {
        self.calls.push(Call::IndexBuffer(format));
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.calls.push(Call::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }
}

/// Effect that binds nothing and counts how often it was applied.
#[derive(Default)]
pub(crate) struct CountingEffect {
    pub(crate) applied: Cell<u32>,
}

impl Effect for CountingEffect {
    fn apply(&self, _: &mut dyn DeviceContext) {
        self.applied.set(self.applied.get() + 1);
    }
}

/// Legacy DDS with RGBA8 masks and a single mip.
pub(crate) fn rgba_dds(img: &RgbaImage) -> Vec<u8> {
    let mut out = vec![0u8; 128];
    out[..4].copy_from_slice(b"DDS ");
    let mut put = |offset: usize, v: u32| out[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
    put(4, 124);
    put(12, img.height());
    put(16, img.width());
    put(28, 1);
    put(76, 32);
    put(80, 0x40 | 0x1);
    put(88, 32);
    put(92, 0x0000_00ff);
    put(96, 0x0000_ff00);
    put(100, 0x00ff_0000);
    put(104, 0xff00_0000);
    out.extend_from_slice(img.as_raw());
    out
}

/// Legacy DXT1 DDS of the given size with zeroed blocks.
pub(crate) fn bc1_dds(width: u32, height: u32) -> Vec<u8> {
    let mut out = vec![0u8; 128];
    out[..4].copy_from_slice(b"DDS ");
    let mut put = |offset: usize, v: u32| out[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
    put(4, 124);
    put(12, height);
    put(16, width);
    put(28, 1);
    put(76, 32);
    put(80, 0x4);
    put(84, u32::from_le_bytes(*b"DXT1"));
    let blocks = width.div_ceil(4) * height.div_ceil(4);
    out.resize(128 + 8 * blocks as usize, 0);
    out
}
