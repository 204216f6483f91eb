use std::borrow::Cow;

use wgpu::naga;

use crate::types::ShaderStage;

/// Compiler error with a 1-based position in the compiled text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StageError {
    pub stage: ShaderStage,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

/// Runs naga's GLSL frontend and validator over `source`.
///
/// This is the same compiler wgpu uses for GLSL modules, run up front so
/// failures carry a position instead of an opaque validation error.
pub(crate) fn check_stage(stage: ShaderStage, source: &str) -> Result<(), StageError> {
    let naga_stage = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    let mut frontend = naga::front::glsl::Frontend::default();
    let module = frontend
        .parse(&naga::front::glsl::Options::from(naga_stage), source)
        .map_err(|errors| {
            let first = errors.errors.first();
            let (line, column) = first
                .map(|error| {
                    let location = error.meta.location(source);
                    (location.line_number as usize, location.line_position as usize)
                })
                .unwrap_or((1, 1));
            let message = first
                .map(|error| error.kind.to_string())
                .unwrap_or_else(|| errors.to_string());
            StageError {
                stage,
                line: line.max(1),
                column: column.max(1),
                message,
            }
        })?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    );
    validator.validate(&module).map_err(|error| {
        let (line, column) = error
            .location(source)
            .map(|location| (location.line_number as usize, location.line_position as usize))
            .unwrap_or((1, 1));
        StageError {
            stage,
            line: line.max(1),
            column: column.max(1),
            message: error.as_inner().to_string(),
        }
    })?;
    Ok(())
}

/// Compiles the static full-screen triangle vertex shader.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fullscreen triangle vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: naga::ShaderStage::Vertex,
            defines: &[],
        },
    })
}

/// Compiles a translated fragment program as GLSL.
pub(crate) fn compile_fragment_shader(device: &wgpu::Device, program: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fragscope fragment"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(program.to_string()),
            stage: naga::ShaderStage::Fragment,
            defines: &[],
        },
    })
}

/// Minimal full-screen triangle vertex shader; needs no vertex buffer.
pub(crate) const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = pos * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";
