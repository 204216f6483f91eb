//! Offscreen compile-and-draw check for shader sources.
//!
//! [`Validator`] translates a source, links it against a headless device,
//! draws one frame into a small texture and reports what the backend said.
//! Every object it creates is released before it returns.

use std::fmt;

use translator::TranslationError;

use crate::compile::StageError;
use crate::gpu::context::{self, RuntimeWarnings};
use crate::gpu::pipeline::{PipelineError, ProgramPipeline};
use crate::gpu::uniforms::{FrameInputs, FrameUniforms, UniformBindingSet};
use crate::gpu::ErrorScope;
use crate::types::{GpuOptions, ShaderStage};

/// Lines shown on either side of the offending line in an excerpt.
const EXCERPT_CONTEXT: usize = 2;
const TRIAL_SIZE: u32 = 4;
const TRIAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Compiler failure located in the assembled program text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileDiagnostic {
    pub stage: ShaderStage,
    /// 1-based line in the compiled text, when the compiler reported one.
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub message: String,
    pub excerpt: Option<String>,
}

impl CompileDiagnostic {
    pub(crate) fn from_stage_error(error: StageError, source: &str) -> Self {
        Self {
            stage: error.stage,
            line: Some(error.line),
            column: Some(error.column),
            excerpt: source_excerpt(source, error.line),
            message: error.message,
        }
    }

    /// Builds a diagnostic from a free-form backend message, picking up a
    /// `line:column` position if the message carries one.
    pub(crate) fn from_backend_message(stage: ShaderStage, message: &str, source: &str) -> Self {
        match parse_line_column(message) {
            Some((line, column, rest)) => Self {
                stage,
                line: Some(line),
                column: Some(column),
                message: rest.trim().to_string(),
                excerpt: source_excerpt(source, line),
            },
            None => Self {
                stage,
                line: None,
                column: None,
                message: message.trim().to_string(),
                excerpt: None,
            },
        }
    }
}

impl fmt::Display for CompileDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} shader failed to compile", self.stage)?;
        match (self.line, self.column) {
            (Some(line), Some(column)) => write!(f, " at {line}:{column}")?,
            (Some(line), None) => write!(f, " at line {line}")?,
            _ => {}
        }
        write!(f, ": {}", self.message)?;
        if let Some(excerpt) = &self.excerpt {
            write!(f, "\n{excerpt}")?;
        }
        Ok(())
    }
}

/// Finds the first `<line>:<column>` pair in `message` and returns it with
/// the text that follows.
fn parse_line_column(message: &str) -> Option<(usize, usize, &str)> {
    let bytes = message.as_bytes();
    let mut index = 0;
    while index < bytes.len() {
        if !bytes[index].is_ascii_digit() || (index > 0 && bytes[index - 1].is_ascii_digit()) {
            index += 1;
            continue;
        }
        let line_end = digits_end(bytes, index);
        if bytes.get(line_end) == Some(&b':') {
            let column_start = line_end + 1;
            let column_end = digits_end(bytes, column_start);
            if column_end > column_start {
                let line = message[index..line_end].parse().ok()?;
                let column = message[column_start..column_end].parse().ok()?;
                let rest = message[column_end..].trim_start_matches(':');
                return Some((line, column, rest));
            }
        }
        index = line_end;
    }
    None
}

fn digits_end(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    end
}

/// Numbered lines around `line` (1-based) with the line itself marked.
pub fn source_excerpt(source: &str, line: usize) -> Option<String> {
    let lines: Vec<&str> = source.lines().collect();
    if line == 0 || line > lines.len() {
        return None;
    }
    let first = line.saturating_sub(EXCERPT_CONTEXT).max(1);
    let last = (line + EXCERPT_CONTEXT).min(lines.len());
    let width = last.to_string().len();

    let excerpt: Vec<String> = (first..=last)
        .map(|number| {
            let marker = if number == line { "->" } else { "  " };
            format!("{marker} {number:>width$} | {}", lines[number - 1])
        })
        .collect();
    Some(excerpt.join("\n"))
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error(transparent)]
    Translation(#[from] TranslationError),
    #[error("no compatible rendering backend: {0}")]
    ContextUnavailable(String),
    #[error("{0}")]
    Compile(CompileDiagnostic),
    #[error("program failed to link: {0}")]
    Link(String),
}

impl ValidationError {
    fn from_pipeline(error: PipelineError) -> Self {
        match error {
            PipelineError::Compile(diagnostic) => ValidationError::Compile(diagnostic),
            PipelineError::Link(message) => ValidationError::Link(message),
        }
    }
}

/// Successful validation result.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// The assembled program that was compiled.
    pub program: String,
    /// Backend warnings raised while drawing the trial frame.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    options: GpuOptions,
}

impl Validator {
    pub fn new(options: GpuOptions) -> Self {
        Self { options }
    }

    /// Translates `source`, then compiles and trial-draws the program.
    pub fn validate(&self, source: &str) -> Result<ValidationReport, ValidationError> {
        let unit = translator::translate(source)?;
        let mut report = self.validate_program(unit.program())?;
        tracing::debug!(
            entry = unit.entry(),
            warnings = report.warnings.len(),
            "shader validated"
        );
        report.program = unit.into_program();
        Ok(report)
    }

    /// Compiles and trial-draws an already assembled program.
    pub fn validate_program(&self, program: &str) -> Result<ValidationReport, ValidationError> {
        let trial = TrialContext::open(&self.options)?;
        let pipeline = ProgramPipeline::new(&trial.device, TRIAL_FORMAT, program)
            .map_err(ValidationError::from_pipeline)?;
        let warnings = trial.draw(&pipeline);
        pipeline.release();
        Ok(ValidationReport {
            program: program.to_string(),
            warnings,
        })
    }
}

/// Headless device plus a tiny render target, torn down on drop.
struct TrialContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: wgpu::Texture,
    warnings: RuntimeWarnings,
}

impl TrialContext {
    fn open(options: &GpuOptions) -> Result<Self, ValidationError> {
        let instance = context::create_instance();
        let unavailable = |err: anyhow::Error| ValidationError::ContextUnavailable(format!("{err:#}"));
        let adapter = context::request_adapter(&instance, options, None).map_err(unavailable)?;
        let timerless = GpuOptions {
            timer_queries: false,
            ..*options
        };
        let (device, queue, _) = context::request_device(&adapter, &timerless, "fragscope validator")
            .map_err(unavailable)?;
        let warnings = RuntimeWarnings::default();
        warnings.attach(&device);

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("validation target"),
            size: wgpu::Extent3d {
                width: TRIAL_SIZE,
                height: TRIAL_SIZE,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TRIAL_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        Ok(Self {
            device,
            queue,
            target,
            warnings,
        })
    }

    /// Draws one frame with every uniform bound; returns backend warnings.
    fn draw(&self, pipeline: &ProgramPipeline) -> Vec<String> {
        let mut uniforms = FrameUniforms::default();
        let bindings = UniformBindingSet::resolve(translator::UniformUsage::all());
        bindings.write_resolution(&mut uniforms, TRIAL_SIZE, TRIAL_SIZE);
        bindings.write_frame(
            &mut uniforms,
            &FrameInputs {
                elapsed: 0.0,
                delta: 0.0,
                frame: 0,
                pointer: [0.0; 4],
            },
        );
        pipeline.write_uniforms(&self.queue, &uniforms);

        let scope = ErrorScope::push(&self.device);
        let view = self.target.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("validation encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("validation pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pipeline.draw(&mut pass);
        }
        self.queue.submit(Some(encoder.finish()));
        let _ = self.device.poll(wgpu::PollType::Wait);

        let mut warnings = Vec::new();
        if let Some(error) = scope.finish() {
            warnings.push(error.to_string());
        }
        warnings.extend(self.warnings.recent());
        for warning in &warnings {
            tracing::warn!(warning = %warning, "trial draw reported a problem");
        }
        warnings
    }
}

impl Drop for TrialContext {
    fn drop(&mut self) {
        self.target.destroy();
        self.device.destroy();
    }
}
