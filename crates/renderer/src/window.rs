//! Interactive preview window.
//!
//! Owns the winit event loop on the calling thread and forwards window
//! events into a [`RenderLoop`]. Ticks are driven by redraw requests, so
//! presentation is paced by the surface's present mode.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::gpu::backend::WgpuBackend;
use crate::render_loop::{LoopConfig, RenderLoop};
use crate::runtime::{TickScheduler, TickToken};
use crate::types::LoopState;

/// Settings for [`run_preview`].
#[derive(Debug, Clone)]
pub struct PreviewOptions {
    pub source: String,
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub loop_config: LoopConfig,
    pub start_paused: bool,
    /// Shader time shown while paused.
    pub frozen_time: f64,
}

/// Schedules ticks by asking the window for a redraw.
///
/// winit cannot withdraw a redraw request, so cancellation only forgets the
/// token; the loop ignores redraws it did not schedule.
struct RedrawScheduler {
    window: Arc<Window>,
    next: u64,
}

impl TickScheduler for RedrawScheduler {
    fn request_tick(&mut self) -> TickToken {
        self.next += 1;
        self.window.request_redraw();
        TickToken(self.next)
    }

    fn cancel_tick(&mut self, token: TickToken) {
        tracing::trace!(token = token.0, "redraw tick cancelled");
    }
}

/// Opens a window, renders `options.source` until the window is closed and
/// tears everything down before returning.
pub fn run_preview(options: PreviewOptions) -> Result<()> {
    let event_loop = EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title(options.title.as_str())
        .with_inner_size(PhysicalSize::new(options.width, options.height))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let scheduler = RedrawScheduler {
        window: Arc::clone(&window),
        next: 0,
    };
    let mut render_loop: RenderLoop<WgpuBackend, RedrawScheduler> =
        RenderLoop::new(options.loop_config.clone(), scheduler, |snapshot| {
            tracing::info!(
                fps = snapshot.fps,
                source = ?snapshot.fps_source,
                avg_ms = snapshot.avg_frame_time_ms,
                dropped = snapshot.dropped_frames,
                gpu_ms = ?snapshot.gpu_time_ms,
                frames = snapshot.total_frames,
                "metrics"
            );
        });

    let size = window.inner_size();
    render_loop.initialize(window.as_ref(), &options.source, size.width, size.height)?;
    if options.start_paused {
        render_loop.set_paused(true, options.frozen_time);
    }
    render_loop.start();

    let window_id = window.id();
    let mut cursor = (0.0_f32, 0.0_f32);
    let run_result = event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Wait);
        let Event::WindowEvent { window_id: id, event } = event else {
            return;
        };
        if id != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                render_loop.dispose();
                elwt.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                match event.logical_key {
                    Key::Named(NamedKey::Escape) => {
                        render_loop.dispose();
                        elwt.exit();
                    }
                    Key::Named(NamedKey::Space) => {
                        let elapsed = render_loop.elapsed(Instant::now());
                        let paused = !render_loop.is_paused();
                        render_loop.set_paused(paused, elapsed);
                        tracing::info!(paused, time = elapsed, "playback toggled");
                    }
                    Key::Character(ref value) if value.eq_ignore_ascii_case("d") => {
                        tracing::info!("diagnostics\n{}", render_loop.diagnostics());
                    }
                    _ => {}
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                cursor = (position.x as f32, position.y as f32);
                render_loop.on_pointer_move(cursor.0, cursor.1);
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                render_loop.on_pointer_down(cursor.0, cursor.1);
            }
            WindowEvent::Resized(new_size) => {
                render_loop.resize(new_size.width, new_size.height);
            }
            WindowEvent::RedrawRequested => {
                render_loop.tick(Instant::now());
                if render_loop.state() == LoopState::Disposed {
                    elwt.exit();
                }
            }
            _ => {}
        }
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))
}
