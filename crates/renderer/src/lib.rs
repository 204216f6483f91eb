//! Renderer for fragscope programs.
//!
//! The crate links a translated fragment program against a wgpu device and
//! drives it frame by frame:
//!
//! ```text
//!   source ──translate──▶ TranslationUnit ──RenderLoop::initialize──▶ WgpuBackend
//!                                                  │
//!        TickScheduler ──tick──▶ uniforms ─▶ timer poll ─▶ draw ─▶ Telemetry
//!                                                                    │
//!                                                    on_metrics ◀────┘ every N frames
//! ```
//!
//! [`RenderLoop`] is generic over its [`FrameBackend`] and [`TickScheduler`]
//! so the state machine can be exercised without a GPU. [`Validator`] runs
//! the same compile path offscreen, and [`run_preview`] hosts a loop in a
//! winit window.

mod compile;
mod gpu;
mod render_loop;
mod runtime;
pub mod types;
mod validate;
mod window;

pub use gpu::backend::WgpuBackend;
pub use gpu::timer::TimerPoll;
pub use gpu::uniforms::{FrameInputs, FrameUniforms, UniformBindingSet};
pub use render_loop::{
    DiagnosticsReport, FrameBackend, FrameStatus, InitError, LoopConfig, MetricsCallback,
    RenderLoop, ResizeHandle,
};
pub use runtime::{QueuedScheduler, TickScheduler, TickToken};
pub use types::{
    GpuOptions, GpuPowerPreference, LoopState, PointerState, PresentModePreference, ShaderStage,
};
pub use validate::{source_excerpt, CompileDiagnostic, ValidationError, ValidationReport, Validator};
pub use window::{run_preview, PreviewOptions};
