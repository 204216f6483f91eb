use crate::compile::{self, compile_fragment_shader, compile_vertex_shader, VERTEX_SHADER_GLSL};
use crate::types::ShaderStage;
use crate::validate::CompileDiagnostic;

use super::uniforms::FrameUniforms;
use super::ErrorScope;

#[derive(Debug)]
pub(crate) enum PipelineError {
    Compile(CompileDiagnostic),
    Link(String),
}

/// Render pipeline for one translated program together with the uniform
/// buffer and bind group it reads from.
pub(crate) struct ProgramPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub uniform_buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl ProgramPipeline {
    /// Compiles both stages and links them for `format`.
    ///
    /// Stage sources are checked through naga first so compile failures carry
    /// positions; anything wgpu still rejects while creating modules is
    /// reported as a compile error, and failures while creating the pipeline
    /// as a link error.
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        program: &str,
    ) -> Result<Self, PipelineError> {
        for (stage, source) in [
            (ShaderStage::Vertex, VERTEX_SHADER_GLSL),
            (ShaderStage::Fragment, program),
        ] {
            compile::check_stage(stage, source).map_err(|error| {
                PipelineError::Compile(CompileDiagnostic::from_stage_error(error, source))
            })?;
        }

        let scope = ErrorScope::push(device);
        let vertex_module = compile_vertex_shader(device);
        let fragment_module = compile_fragment_shader(device, program);
        if let Some(error) = scope.finish() {
            return Err(PipelineError::Compile(CompileDiagnostic::from_backend_message(
                ShaderStage::Fragment,
                &error.to_string(),
                program,
            )));
        }

        let scope = ErrorScope::push(device);
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(FrameUniforms::SIZE),
                },
                count: None,
            }],
        });
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame uniforms"),
            size: FrameUniforms::SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform bind group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("program pipeline layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("program pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        if let Some(error) = scope.finish() {
            uniform_buffer.destroy();
            return Err(PipelineError::Link(error.to_string()));
        }

        Ok(Self {
            pipeline,
            uniform_buffer,
            bind_group,
        })
    }

    pub fn write_uniforms(&self, queue: &wgpu::Queue, uniforms: &FrameUniforms) {
        queue.write_buffer(&self.uniform_buffer, 0, uniforms.as_bytes());
    }

    /// Records the full-surface draw into `pass`.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    pub fn release(self) {
        self.uniform_buffer.destroy();
    }
}
