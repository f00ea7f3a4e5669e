use anyhow::Result;
use wgpu::util::DeviceExt;

use crate::{
    data_structures::model::VertexType,
    pipelines::{DeviceContext, Effect, basic::BasicEffect},
    resources::shader::{ShaderModel, compile_wgsl},
};

const TERRAIN_SHADER: &str = include_str!("terrain.wgsl");

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TerrainUniform {
    pub view_proj: [[f32; 4]; 4],
    // w is unused, uniforms want 16 byte rows
    pub light_dir: [f32; 4],
}

impl TerrainUniform {
    pub fn new(view_proj: cgmath::Matrix4<f32>, light_dir: cgmath::Vector3<f32>) -> Self {
        Self {
            view_proj: view_proj.into(),
            light_dir: [light_dir.x, light_dir.y, light_dir.z, 0.0],
        }
    }
}

/// Height tinted, directionally lit terrain shading.
///
/// Group 0 holds a [`TerrainUniform`]; update it with [`TerrainEffect::update`]
/// before recording the frame.
#[derive(Debug)]
pub struct TerrainEffect {
    pub effect: BasicEffect,
    pub buffer: wgpu::Buffer,
}

impl TerrainEffect {
    pub fn new(
        device: &wgpu::Device,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
        uniform: TerrainUniform,
    ) -> Result<Self> {
        let vertex = compile_wgsl(TERRAIN_SHADER, "vs_main", ShaderModel::parse("vs_5_0")?)?;
        let fragment = compile_wgsl(TERRAIN_SHADER, "fs_main", ShaderModel::parse("ps_5_0")?)?;

        let layout = mk_bind_group_layout(device);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Terrain Uniform Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("terrain_bind_group"),
        });

        let effect = BasicEffect::new(
            device,
            &vertex,
            &fragment,
            &[&layout],
            VertexType::PosNormalTex,
            color_format,
            depth_format,
        )
        .with_bind_group(bind_group);
        Ok(Self { effect, buffer })
    }

    pub fn update(&self, queue: &wgpu::Queue, uniform: TerrainUniform) {
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[uniform]));
    }
}

impl Effect for TerrainEffect {
    fn apply(&self, ctx: &mut dyn DeviceContext) {
        self.effect.apply(ctx);
    }
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("terrain_bind_group_layout"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_terrain_shader_compiles_for_both_stages() {
        compile_wgsl(TERRAIN_SHADER, "vs_main", ShaderModel::parse("vs_5_0").unwrap()).unwrap();
        compile_wgsl(TERRAIN_SHADER, "fs_main", ShaderModel::parse("ps_5_0").unwrap()).unwrap();
    }

    #[test]
    fn uniform_is_padded_to_rows() {
        assert_eq!(std::mem::size_of::<TerrainUniform>(), 80);
    }
}
