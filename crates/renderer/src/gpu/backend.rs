use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use translator::TranslationUnit;

use crate::render_loop::{FrameBackend, FrameStatus, InitError, RenderLoop};
use crate::runtime::TickScheduler;
use crate::types::GpuOptions;

use super::context::GpuContext;
use super::pipeline::{PipelineError, ProgramPipeline};
use super::timer::{GpuTimer, TimerPoll};
use super::uniforms::FrameUniforms;

/// [`FrameBackend`] drawing into a window surface through wgpu.
pub struct WgpuBackend {
    context: GpuContext,
    pipeline: ProgramPipeline,
    timer: Option<GpuTimer>,
}

impl WgpuBackend {
    /// Opens a device for `target` and links `unit` against it.
    ///
    /// `target` must outlive the returned backend.
    pub fn connect<T>(
        target: &T,
        unit: &TranslationUnit,
        width: u32,
        height: u32,
        options: &GpuOptions,
    ) -> Result<Self, InitError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, width, height, options)
            .map_err(|err| InitError::ContextUnavailable(format!("{err:#}")))?;
        let pipeline = ProgramPipeline::new(&context.device, context.config.format, unit.program())
            .map_err(|error| match error {
                PipelineError::Compile(diagnostic) => InitError::Compile(diagnostic),
                PipelineError::Link(message) => InitError::Link(message),
            })?;
        let timer = context
            .timer_enabled
            .then(|| GpuTimer::new(&context.device, &context.queue));

        tracing::info!(
            width = context.config.width,
            height = context.config.height,
            format = ?context.config.format,
            gpu_timing = timer.is_some(),
            "renderer connected"
        );
        Ok(Self {
            context,
            pipeline,
            timer,
        })
    }
}

impl FrameBackend for WgpuBackend {
    fn configure(&mut self, width: u32, height: u32) {
        self.context.resize(width, height);
    }

    fn write_uniforms(&mut self, uniforms: &FrameUniforms) {
        self.pipeline.write_uniforms(&self.context.queue, uniforms);
    }

    fn timer_available(&self) -> bool {
        self.timer.is_some()
    }

    fn poll_timer(&mut self) -> TimerPoll {
        match self.timer.as_mut() {
            Some(timer) => timer.poll(&self.context.device),
            None => TimerPoll::Idle,
        }
    }

    fn draw(&mut self, timed: bool) -> anyhow::Result<FrameStatus> {
        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::debug!("surface lost or outdated; reconfiguring");
                self.context.reconfigure();
                return Ok(FrameStatus::Skipped);
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::debug!("surface acquire timed out");
                return Ok(FrameStatus::Skipped);
            }
            Err(err) => return Err(anyhow::anyhow!("failed to acquire surface texture: {err}")),
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("fragscope encoder"),
            });

        let timer = match self.timer.as_mut() {
            Some(timer) if timed && timer.is_idle() => {
                timer.begin();
                Some(&*timer)
            }
            _ => None,
        };

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("fragscope pass"),
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
                timestamp_writes: timer.map(GpuTimer::timestamp_writes),
                occlusion_query_set: None,
            });
            pass.set_viewport(
                0.0,
                0.0,
                self.context.config.width as f32,
                self.context.config.height as f32,
                0.0,
                1.0,
            );
            self.pipeline.draw(&mut pass);
        }

        if let Some(timer) = timer {
            timer.resolve(&mut encoder);
        }
        self.context.queue.submit(Some(encoder.finish()));
        frame.present();

        if let Some(timer) = self.timer.as_mut() {
            timer.after_submit();
        }
        Ok(FrameStatus::Presented)
    }

    fn runtime_warnings(&self) -> usize {
        self.context.warnings.total()
    }

    fn release(self) {
        if let Some(timer) = self.timer {
            timer.release();
        }
        self.pipeline.release();
        tracing::debug!("renderer released");
    }
}

impl<S: TickScheduler> RenderLoop<WgpuBackend, S> {
    /// Translates `source` and connects it to a surface on `target`.
    ///
    /// `target` must outlive the loop's backend; dispose the loop before the
    /// window goes away.
    pub fn initialize<T>(
        &mut self,
        target: &T,
        source: &str,
        width: u32,
        height: u32,
    ) -> Result<(), InitError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let options = self.config().gpu;
        let result = self.initialize_with(source, width, height, |unit, width, height| {
            WgpuBackend::connect(target, unit, width, height, &options)
        });
        if let Err(err) = &result {
            tracing::error!(error = %err, "failed to initialise renderer");
        }
        result
    }
}
