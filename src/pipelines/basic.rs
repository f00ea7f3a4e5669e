use crate::{
    data_structures::model::VertexType,
    pipelines::{DeviceContext, Effect},
    resources::shader::ShaderBlob,
};

/// Pipeline plus the bind groups it is drawn with, bound in index order.
#[derive(Debug)]
pub struct BasicEffect {
    pub pipeline: wgpu::RenderPipeline,
    pub bind_groups: Vec<wgpu::BindGroup>,
}

impl BasicEffect {
    /// Build an effect from a compiled vertex and fragment blob.
    ///
    /// The blobs' entry point names are the ones they were compiled for.
    pub fn new(
        device: &wgpu::Device,
        vertex: &ShaderBlob,
        fragment: &ShaderBlob,
        bind_group_layouts: &[&wgpu::BindGroupLayout],
        vertex_type: VertexType,
        color_format: wgpu::TextureFormat,
        depth_format: Option<wgpu::TextureFormat>,
    ) -> Self {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Basic Effect Pipeline Layout"),
            bind_group_layouts: &bind_group_layouts.iter().copied().map(Some).collect::<Vec<_>>(),
            immediate_size: 0,
        });
        let pipeline = mk_render_pipeline(
            device,
            &layout,
            vertex,
            fragment,
            color_format,
            Some(wgpu::BlendState {
                alpha: wgpu::BlendComponent::REPLACE,
                color: wgpu::BlendComponent::REPLACE,
            }),
            depth_format,
            &[vertex_type.layout()],
        );
        Self {
            pipeline,
            bind_groups: Vec::new(),
        }
    }

    pub fn with_bind_group(mut self, group: wgpu::BindGroup) -> Self {
        self.bind_groups.push(group);
        self
    }
}

impl Effect for BasicEffect {
    fn apply(&self, ctx: &mut dyn DeviceContext) {
        ctx.set_pipeline(&self.pipeline);
        for (index, group) in self.bind_groups.iter().enumerate() {
            ctx.set_bind_group(index as u32, group);
        }
    }
}

pub fn mk_render_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    vertex: &ShaderBlob,
    fragment: &ShaderBlob,
    color_format: wgpu::TextureFormat,
    blend: Option<wgpu::BlendState>,
    depth_format: Option<wgpu::TextureFormat>,
    vertex_layouts: &[wgpu::VertexBufferLayout],
) -> wgpu::RenderPipeline {
    let vs_module = vertex.create_module(device, Some("Vertex Shader"));
    let fs_module = fragment.create_module(device, Some("Fragment Shader"));

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some("Render Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &vs_module,
            entry_point: Some(vertex.entry_point()),
            buffers: vertex_layouts,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &fs_module,
            entry_point: Some(fragment.entry_point()),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: Some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: Some(true),
            depth_compare: Some(wgpu::CompareFunction::Less),
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}
