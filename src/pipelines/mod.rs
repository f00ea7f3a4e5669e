//! Effects and the context they record into.
//!
//! An [`Effect`] owns everything a draw needs besides geometry: the render
//! pipeline and its bind groups. Draw calls go through [`DeviceContext`] so
//! that renderers like [`crate::Terrain`] do not care whether they record
//! into a real `wgpu::RenderPass` or something else.

use std::ops::Range;

pub mod basic;
pub mod terrain;

/// The subset of render pass commands renderers issue.
pub trait DeviceContext {
    fn set_pipeline(&mut self, pipeline: &wgpu::RenderPipeline);
    fn set_bind_group(&mut self, index: u32, group: &wgpu::BindGroup);
    fn set_vertex_buffer(&mut self, slot: u32, buffer: wgpu::BufferSlice<'_>);
    fn set_index_buffer(&mut self, buffer: wgpu::BufferSlice<'_>, format: wgpu::IndexFormat);
    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);
}

impl DeviceContext for wgpu::RenderPass<'_> {
    fn set_pipeline(&mut self, pipeline: &wgpu::RenderPipeline) {
        wgpu::RenderPass::set_pipeline(self, pipeline);
    }

    fn set_bind_group(&mut self, index: u32, group: &wgpu::BindGroup) {
        wgpu::RenderPass::set_bind_group(self, index, group, &[]);
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: wgpu::BufferSlice<'_>) {
        wgpu::RenderPass::set_vertex_buffer(self, slot, buffer);
    }

    fn set_index_buffer(&mut self, buffer: wgpu::BufferSlice<'_>, format: wgpu::IndexFormat) {
        wgpu::RenderPass::set_index_buffer(self, buffer, format);
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        wgpu::RenderPass::draw_indexed(self, indices, base_vertex, instances);
    }
}

/// A configured shading effect.
///
/// `apply` binds the effect's current pass state. Constants have to be
/// written by the caller before the draw is recorded.
pub trait Effect {
    fn apply(&self, ctx: &mut dyn DeviceContext);
}
