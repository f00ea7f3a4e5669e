//! Terrain mesh and its draw call.
//!
//! The terrain is a regular grid over the unit square in the XZ plane,
//! centred on the origin. `levels` is the number of quads along each side.
//! It is flat unless built from a heightmap.

use cgmath::InnerSpace;

use crate::{
    data_structures::{
        bitmap::BitMap,
        model::{Mesh, PosNormalTex, VertexType},
    },
    pipelines::{DeviceContext, Effect},
};

/// Most quads per side whose index count still fits in a `u32`.
pub const MAX_LEVELS: u32 = 26_754;

/// Clamp `levels` to what one vertex and one index buffer under `limits` can hold.
pub fn clamp_levels(levels: u32, limits: &wgpu::Limits) -> u32 {
    let max_bytes = limits.max_buffer_size;
    let vertex_bytes = std::mem::size_of::<PosNormalTex>() as u64;
    // (n + 1)^2 vertices and 6 n^2 indices.
    let by_vertices = (max_bytes / vertex_bytes).isqrt().saturating_sub(1);
    let by_indices = (max_bytes / (6 * std::mem::size_of::<u32>() as u64)).isqrt();
    let max = by_vertices.min(by_indices).min(u64::from(MAX_LEVELS)).max(1) as u32;
    if levels > max {
        log::warn!("Terrain with {levels} levels does not fit the device, using {max}");
    }
    levels.clamp(1, max)
}

#[derive(Debug)]
pub struct Terrain {
    vertex_type: VertexType,
    levels: u32,
    pub mesh: Mesh,
}

impl Terrain {
    /// Flat grid. `levels` is clamped to at least one and to what the
    /// device's buffers can hold.
    pub fn new(device: &wgpu::Device, levels: u32) -> Self {
        let levels = clamp_levels(levels, &device.limits());
        let (vertices, indices) = build_grid(levels, |_, _| 0.0);
        Self::from_geometry(device, levels, &vertices, &indices)
    }

    /// Grid displaced by the red channel of `heightmap`, scaled by `height_scale`.
    pub fn from_heightmap(
        device: &wgpu::Device,
        heightmap: &BitMap,
        levels: u32,
        height_scale: f32,
    ) -> Self {
        let levels = clamp_levels(levels, &device.limits());
        let (vertices, indices) =
            build_grid(levels, |u, v| heightmap.sample_red(u, v) * height_scale);
        Self::from_geometry(device, levels, &vertices, &indices)
    }

    fn from_geometry(
        device: &wgpu::Device,
        levels: u32,
        vertices: &[PosNormalTex],
        indices: &[u32],
    ) -> Self {
        let vertex_type = VertexType::PosNormalTex;
        let mesh = Mesh::new(device, "terrain", vertex_type, vertices, indices);
        log::debug!(
            "Built terrain with {} vertices and {} indices",
            vertices.len(),
            indices.len()
        );
        Self {
            vertex_type,
            levels,
            mesh,
        }
    }

    pub fn vertex_type(&self) -> VertexType {
        self.vertex_type
    }

    pub fn levels(&self) -> u32 {
        self.levels
    }

    /// Record the terrain with `effect`'s current state.
    ///
    /// The effect must already hold up to date constants.
    pub fn draw_terrain(&self, ctx: &mut dyn DeviceContext, effect: &dyn Effect) {
        effect.apply(ctx);
        ctx.set_vertex_buffer(0, self.mesh.vertex_buffer.slice(..));
        ctx.set_index_buffer(self.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        ctx.draw_indexed(0..self.mesh.num_elements, 0, 0..1);
    }
}

/// Vertices and triangle list indices of a `levels` x `levels` grid.
///
/// `height(u, v)` gives the y of the point at texture coordinate (u, v).
/// `levels` is clamped to `1..=MAX_LEVELS`.
pub fn build_grid(levels: u32, height: impl Fn(f32, f32) -> f32) -> (Vec<PosNormalTex>, Vec<u32>) {
    let n = levels.clamp(1, MAX_LEVELS);
    let step = 1.0 / n as f32;
    let h = |u: f32, v: f32| height(u.clamp(0.0, 1.0), v.clamp(0.0, 1.0));

    let side = n as usize + 1;
    let mut vertices = Vec::with_capacity(side * side);
    for j in 0..=n {
        for i in 0..=n {
            let u = i as f32 * step;
            let v = j as f32 * step;
            // Central differences; at the border the clamped sample makes
            // this a one sided difference over the same span.
            let dx = (h(u + step, v) - h(u - step, v)) / (2.0 * step);
            let dz = (h(u, v + step) - h(u, v - step)) / (2.0 * step);
            let normal = cgmath::Vector3::new(-dx, 1.0, -dz).normalize();
            vertices.push(PosNormalTex {
                position: [u - 0.5, h(u, v), v - 0.5],
                normal: normal.into(),
                tex_coords: [u, v],
            });
        }
    }

    let row = n + 1;
    let mut indices = Vec::with_capacity((n as usize).pow(2) * 6);
    for j in 0..n {
        for i in 0..n {
            let a = j * row + i;
            let b = a + 1;
            let c = a + row;
            let d = c + 1;
            // Counter-clockwise seen from +Y.
            indices.extend_from_slice(&[a, c, b, b, c, d]);
        }
    }
    (vertices, indices)
}
