//! Per-frame state machine driving a compiled program.
//!
//! ```text
//!   Uninitialized ──initialize──▶ Ready ──start──▶ Running ⇄ Paused
//!         │                        ▲ ◀──halt─────────┘        │
//!         └──────────────── dispose (any state) ──────────────┴──▶ Disposed
//! ```
//!
//! Each tick applies pending resizes, advances the clock, writes uniforms,
//! consumes the previous GPU timing sample, issues one draw and publishes a
//! metrics snapshot every `publish_interval` frames.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

use telemetry::{MetricsSnapshot, RefreshRateProbe, Telemetry, TelemetryConfig};
use translator::{TranslationError, TranslationUnit};

use crate::gpu::timer::TimerPoll;
use crate::gpu::uniforms::{FrameInputs, FrameUniforms, UniformBindingSet};
use crate::runtime::{TickScheduler, TickToken};
use crate::types::{GpuOptions, LoopState, PointerState};
use crate::validate::CompileDiagnostic;

/// Outcome of one draw attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    Presented,
    /// Nothing was drawn (e.g. the surface had to be reconfigured); the
    /// frame is not counted.
    Skipped,
}

/// Rendering seam behind the loop.
///
/// The wgpu implementation owns the surface, pipeline, uniform buffer and
/// timer; tests substitute a recording implementation.
pub trait FrameBackend {
    /// Applies new surface and viewport dimensions.
    fn configure(&mut self, width: u32, height: u32);
    fn write_uniforms(&mut self, uniforms: &FrameUniforms);
    fn timer_available(&self) -> bool;
    /// Non-blocking check of the previously started timer query.
    fn poll_timer(&mut self) -> TimerPoll;
    /// Draws one frame covering the whole surface, bracketed by a timer
    /// query when `timed` is set.
    fn draw(&mut self, timed: bool) -> anyhow::Result<FrameStatus>;
    /// Backend errors observed outside any error scope so far.
    fn runtime_warnings(&self) -> usize;
    /// Releases the program, buffers and query objects.
    fn release(self);
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error(transparent)]
    Translation(#[from] TranslationError),
    #[error("no compatible rendering backend: {0}")]
    ContextUnavailable(String),
    #[error("{0}")]
    Compile(CompileDiagnostic),
    #[error("program failed to link: {0}")]
    Link(String),
    #[error("render loop has been disposed")]
    Disposed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    pub telemetry: TelemetryConfig,
    /// Frames between published snapshots.
    pub publish_interval: u64,
    /// Frame times included in a diagnostics report.
    pub diagnostics_samples: usize,
    pub gpu: GpuOptions,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            telemetry: TelemetryConfig::default(),
            publish_interval: 10,
            diagnostics_samples: 8,
            gpu: GpuOptions::default(),
        }
    }
}

/// Cloneable handle a layout system can use to request a new surface size.
///
/// The latest request wins and is applied at the start of the next tick.
#[derive(Debug, Clone, Default)]
pub struct ResizeHandle {
    requested: Rc<Cell<Option<(u32, u32)>>>,
}

impl ResizeHandle {
    pub fn request(&self, width: u32, height: u32) {
        self.requested.set(Some((width, height)));
    }

    fn take(&self) -> Option<(u32, u32)> {
        self.requested.take()
    }
}

/// Snapshot for interactive debugging.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticsReport {
    pub state: LoopState,
    pub frame_count: u64,
    pub recent_frame_times_ms: Vec<f64>,
    pub last_gpu_time_ms: Option<f64>,
    pub refresh_rate_hz: Option<u32>,
    pub runtime_warnings: usize,
    pub resolution: [u32; 2],
}

impl fmt::Display for DiagnosticsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "state: {}", self.state)?;
        writeln!(f, "frames: {}", self.frame_count)?;
        writeln!(f, "resolution: {}x{}", self.resolution[0], self.resolution[1])?;
        let recent: Vec<String> = self
            .recent_frame_times_ms
            .iter()
            .map(|ms| format!("{ms:.2}"))
            .collect();
        writeln!(f, "recent frame times (ms): [{}]", recent.join(", "))?;
        match self.last_gpu_time_ms {
            Some(ms) => writeln!(f, "last gpu time: {ms:.3} ms")?,
            None => writeln!(f, "last gpu time: n/a")?,
        }
        match self.refresh_rate_hz {
            Some(hz) => writeln!(f, "probed refresh rate: {hz} Hz")?,
            None => writeln!(f, "probed refresh rate: pending")?,
        }
        write!(f, "runtime warnings: {}", self.runtime_warnings)
    }
}

/// Mutable per-session values, owned by the loop and reset on initialize.
#[derive(Debug, Clone, Default)]
struct FrameState {
    /// Clock origin; elapsed time is `offset + (now - start)`.
    start: Option<Instant>,
    offset: f64,
    previous_tick: Option<Instant>,
    frame_count: u64,
    pointer: PointerState,
    paused: bool,
    frozen_elapsed: f64,
    resume_from: Option<f64>,
    width: u32,
    height: u32,
}

impl FrameState {
    fn running_elapsed(&self, now: Instant) -> f64 {
        match self.start {
            Some(start) => self.offset + now.saturating_duration_since(start).as_secs_f64(),
            None => self.offset,
        }
    }
}

pub type MetricsCallback = Box<dyn FnMut(&MetricsSnapshot)>;

pub struct RenderLoop<B: FrameBackend, S: TickScheduler> {
    state: LoopState,
    backend: Option<B>,
    scheduler: S,
    pending_tick: Option<TickToken>,
    frame: FrameState,
    bindings: Option<UniformBindingSet>,
    uniforms: FrameUniforms,
    telemetry: Telemetry,
    probe: RefreshRateProbe,
    last_gpu_ms: Option<f64>,
    config: LoopConfig,
    resize_requests: ResizeHandle,
    on_metrics: MetricsCallback,
}

impl<B: FrameBackend, S: TickScheduler> RenderLoop<B, S> {
    pub fn new(
        config: LoopConfig,
        scheduler: S,
        on_metrics: impl FnMut(&MetricsSnapshot) + 'static,
    ) -> Self {
        Self {
            state: LoopState::Uninitialized,
            backend: None,
            scheduler,
            pending_tick: None,
            frame: FrameState::default(),
            bindings: None,
            uniforms: FrameUniforms::default(),
            telemetry: Telemetry::new(config.telemetry.clone()),
            probe: RefreshRateProbe::new(),
            last_gpu_ms: None,
            config,
            resize_requests: ResizeHandle::default(),
            on_metrics: Box::new(on_metrics),
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Translates `source` and hands the unit to `connect` to build the
    /// backend. On any failure the loop is left `Uninitialized` with no live
    /// backend; on success it is `Ready` with fresh counters.
    pub fn initialize_with<F>(
        &mut self,
        source: &str,
        width: u32,
        height: u32,
        connect: F,
    ) -> Result<(), InitError>
    where
        F: FnOnce(&TranslationUnit, u32, u32) -> Result<B, InitError>,
    {
        if self.state == LoopState::Disposed {
            return Err(InitError::Disposed);
        }
        self.teardown();

        let unit = translator::translate(source)?;
        let width = width.max(1);
        let height = height.max(1);
        let backend = connect(&unit, width, height)?;

        let bindings = UniformBindingSet::resolve(unit.uniforms());
        self.frame = FrameState {
            paused: self.frame.paused,
            frozen_elapsed: self.frame.frozen_elapsed,
            width,
            height,
            ..FrameState::default()
        };
        self.uniforms = FrameUniforms::default();
        bindings.write_resolution(&mut self.uniforms, width, height);
        self.bindings = Some(bindings);
        self.telemetry.reset();
        self.last_gpu_ms = None;
        self.backend = Some(backend);
        self.state = LoopState::Ready;
        tracing::debug!(
            width,
            height,
            uniforms = ?bindings.usage().iter().map(|uniform| uniform.name()).collect::<Vec<_>>(),
            "render loop ready"
        );
        Ok(())
    }

    /// Enters `Running` (or `Paused` if a pause was requested) and schedules
    /// the first tick. Only valid from `Ready`.
    pub fn start(&mut self) {
        if self.state != LoopState::Ready {
            return;
        }
        self.state = if self.frame.paused {
            LoopState::Paused
        } else {
            LoopState::Running
        };
        tracing::debug!(state = %self.state, "render loop started");
        self.schedule();
    }

    /// Pauses at `frozen_elapsed` seconds, or resumes from that value.
    pub fn set_paused(&mut self, paused: bool, frozen_elapsed: f64) {
        if matches!(self.state, LoopState::Disposed) {
            return;
        }
        let frozen_elapsed = frozen_elapsed.max(0.0);
        self.frame.paused = paused;
        if paused {
            self.frame.frozen_elapsed = frozen_elapsed;
            self.frame.resume_from = None;
        } else {
            self.frame.resume_from = Some(frozen_elapsed);
        }

        let next = match (self.state, paused) {
            (LoopState::Running, true) => LoopState::Paused,
            (LoopState::Paused, false) => LoopState::Running,
            (state, _) => state,
        };
        if next != self.state {
            tracing::debug!(from = %self.state, to = %next, frozen_elapsed, "render loop state");
            self.state = next;
        }
    }

    /// Stops ticking without releasing anything; `start` resumes.
    pub fn halt(&mut self) {
        if !self.state.is_ticking() {
            return;
        }
        self.cancel_pending();
        self.state = LoopState::Ready;
        tracing::debug!("render loop halted");
    }

    /// Elapsed shader time as of `now`.
    pub fn elapsed(&self, now: Instant) -> f64 {
        if self.frame.paused {
            self.frame.frozen_elapsed
        } else if let Some(resume) = self.frame.resume_from {
            resume
        } else {
            self.frame.running_elapsed(now)
        }
    }

    pub fn is_paused(&self) -> bool {
        self.frame.paused
    }

    /// `y` is top-down in surface pixels.
    pub fn on_pointer_move(&mut self, x: f32, y: f32) {
        if self.state.is_live() {
            self.frame.pointer.moved(x, y, self.frame.height);
        }
    }

    pub fn on_pointer_down(&mut self, x: f32, y: f32) {
        if self.state.is_live() {
            self.frame.pointer.pressed(x, y, self.frame.height);
        }
    }

    /// Replaces surface size, viewport and resolution uniform. Never draws.
    pub fn resize(&mut self, width: u32, height: u32) {
        if !self.state.is_live() || width == 0 || height == 0 {
            return;
        }
        if (self.frame.width, self.frame.height) == (width, height) {
            return;
        }
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        self.frame.width = width;
        self.frame.height = height;
        if let Some(bindings) = &self.bindings {
            bindings.write_resolution(&mut self.uniforms, width, height);
        }
        backend.configure(width, height);
        tracing::debug!(width, height, "render surface resized");
    }

    pub fn resize_handle(&self) -> ResizeHandle {
        self.resize_requests.clone()
    }

    /// Runs one scheduled tick. Does nothing unless a tick is pending and
    /// the loop is running or paused.
    pub fn tick(&mut self, now: Instant) {
        if !self.state.is_ticking() || self.pending_tick.take().is_none() {
            return;
        }
        if let Some((width, height)) = self.resize_requests.take() {
            self.resize(width, height);
        }

        let (elapsed, delta) = self.advance_clock(now);
        if let Some(previous) = self.frame.previous_tick {
            let frame_ms = now.saturating_duration_since(previous).as_secs_f64() * 1000.0;
            self.telemetry.record_frame(frame_ms);
        }
        if let Some(hz) = self.probe.record(now) {
            tracing::info!(hz, "display refresh rate probed");
        }

        let (Some(bindings), Some(backend)) = (self.bindings, self.backend.as_mut()) else {
            return;
        };
        bindings.write_frame(
            &mut self.uniforms,
            &FrameInputs {
                elapsed: elapsed as f32,
                delta: delta as f32,
                frame: self.frame.frame_count,
                pointer: self.frame.pointer.as_uniform(),
            },
        );
        backend.write_uniforms(&self.uniforms);

        let timed = if backend.timer_available() {
            match backend.poll_timer() {
                TimerPoll::Ready(gpu_ms) => {
                    if self.telemetry.record_gpu(gpu_ms) {
                        self.last_gpu_ms = Some(gpu_ms);
                    }
                    true
                }
                TimerPoll::Idle => true,
                TimerPoll::Pending => false,
            }
        } else {
            false
        };

        match backend.draw(timed) {
            Ok(FrameStatus::Presented) => {
                self.frame.frame_count += 1;
                self.telemetry.set_total_frames(self.frame.frame_count);
                if self.frame.frame_count % self.config.publish_interval.max(1) == 0 {
                    self.publish();
                }
            }
            Ok(FrameStatus::Skipped) => {
                tracing::debug!(frame = self.frame.frame_count, "frame skipped");
            }
            Err(err) => {
                tracing::error!(error = %err, "draw failed; disposing render loop");
                self.dispose();
                return;
            }
        }

        self.frame.previous_tick = Some(now);
        self.schedule();
    }

    /// Cancels any pending tick and releases the backend. Safe to call any
    /// number of times from any state.
    pub fn dispose(&mut self) {
        if self.state == LoopState::Disposed {
            return;
        }
        self.teardown();
        self.state = LoopState::Disposed;
        tracing::debug!("render loop disposed");
    }

    pub fn diagnostics(&self) -> DiagnosticsReport {
        DiagnosticsReport {
            state: self.state,
            frame_count: self.frame.frame_count,
            recent_frame_times_ms: self
                .telemetry
                .frames()
                .recent(self.config.diagnostics_samples),
            last_gpu_time_ms: self.last_gpu_ms,
            refresh_rate_hz: self.probe.rate(),
            runtime_warnings: self
                .backend
                .as_ref()
                .map(FrameBackend::runtime_warnings)
                .unwrap_or(0),
            resolution: [self.frame.width, self.frame.height],
        }
    }

    pub fn frame_count(&self) -> u64 {
        self.frame.frame_count
    }

    pub fn size(&self) -> (u32, u32) {
        (self.frame.width, self.frame.height)
    }

    /// Uniform values as last written.
    pub fn uniforms(&self) -> &FrameUniforms {
        &self.uniforms
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    fn advance_clock(&mut self, now: Instant) -> (f64, f64) {
        if self.frame.paused {
            return (self.frame.frozen_elapsed, 0.0);
        }
        if let Some(resume) = self.frame.resume_from.take() {
            self.frame.start = Some(now);
            self.frame.offset = resume;
        }
        let start = *self.frame.start.get_or_insert(now);
        let elapsed = self.frame.offset + now.saturating_duration_since(start).as_secs_f64();
        let delta = self
            .frame
            .previous_tick
            .map(|previous| now.saturating_duration_since(previous).as_secs_f64())
            .unwrap_or(0.0);
        (elapsed, delta)
    }

    fn publish(&mut self) {
        let snapshot = self.telemetry.snapshot(self.frame.width, self.frame.height);
        tracing::debug!(
            fps = snapshot.fps,
            source = ?snapshot.fps_source,
            frame_time_ms = snapshot.frame_time_ms,
            dropped = snapshot.dropped_frames,
            gpu_ms = ?snapshot.gpu_time_ms,
            frame = snapshot.total_frames,
            "render stats"
        );
        (self.on_metrics)(&snapshot);
    }

    fn schedule(&mut self) {
        if self.pending_tick.is_none() {
            self.pending_tick = Some(self.scheduler.request_tick());
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(token) = self.pending_tick.take() {
            self.scheduler.cancel_tick(token);
        }
    }

    fn teardown(&mut self) {
        self.cancel_pending();
        if let Some(backend) = self.backend.take() {
            backend.release();
        }
        self.bindings = None;
        if self.state != LoopState::Disposed {
            self.state = LoopState::Uninitialized;
        }
    }
}

impl<B: FrameBackend, S: TickScheduler> Drop for RenderLoop<B, S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::time::Duration;

    use crate::runtime::QueuedScheduler;
    use translator::StandardUniform;

    const SHADER: &str = r"
void mainImage(out vec4 color, in vec2 coord) {
    color = vec4(coord / iResolution.xy, sin(iTime) + iTimeDelta, float(iFrame) + iMouse.x);
}
";

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Configure(u32, u32),
        Uniforms(FrameUniforms),
        Draw { timed: bool },
    }

    #[derive(Default)]
    struct Log {
        calls: Vec<Call>,
        released: usize,
    }

    struct RecordingBackend {
        log: Rc<RefCell<Log>>,
        timer: Option<VecDeque<TimerPoll>>,
        outcomes: VecDeque<FrameStatus>,
    }

    impl FrameBackend for RecordingBackend {
        fn configure(&mut self, width: u32, height: u32) {
            self.log.borrow_mut().calls.push(Call::Configure(width, height));
        }

        fn write_uniforms(&mut self, uniforms: &FrameUniforms) {
            self.log.borrow_mut().calls.push(Call::Uniforms(*uniforms));
        }

        fn timer_available(&self) -> bool {
            self.timer.is_some()
        }

        fn poll_timer(&mut self) -> TimerPoll {
            self.timer
                .as_mut()
                .and_then(VecDeque::pop_front)
                .unwrap_or(TimerPoll::Idle)
        }

        fn draw(&mut self, timed: bool) -> anyhow::Result<FrameStatus> {
            self.log.borrow_mut().calls.push(Call::Draw { timed });
            Ok(self.outcomes.pop_front().unwrap_or(FrameStatus::Presented))
        }

        fn runtime_warnings(&self) -> usize {
            0
        }

        fn release(self) {
            self.log.borrow_mut().released += 1;
        }
    }

    struct Harness {
        render_loop: RenderLoop<RecordingBackend, QueuedScheduler>,
        scheduler: QueuedScheduler,
        log: Rc<RefCell<Log>>,
        snapshots: Rc<RefCell<Vec<MetricsSnapshot>>>,
        base: Instant,
    }

    impl Harness {
        fn new(timer: Option<Vec<TimerPoll>>, outcomes: Vec<FrameStatus>) -> Self {
            let scheduler = QueuedScheduler::new();
            let snapshots = Rc::new(RefCell::new(Vec::new()));
            let sink = Rc::clone(&snapshots);
            let mut render_loop = RenderLoop::new(LoopConfig::default(), scheduler.clone(), {
                move |snapshot: &MetricsSnapshot| sink.borrow_mut().push(snapshot.clone())
            });
            let log = Rc::new(RefCell::new(Log::default()));
            let backend_log = Rc::clone(&log);
            render_loop
                .initialize_with(SHADER, 320, 240, move |_, _, _| {
                    Ok(RecordingBackend {
                        log: backend_log,
                        timer: timer.map(VecDeque::from),
                        outcomes: VecDeque::from(outcomes),
                    })
                })
                .expect("initialize");
            Self {
                render_loop,
                scheduler,
                log,
                snapshots,
                base: Instant::now(),
            }
        }

        fn at(&self, millis: u64) -> Instant {
            self.base + Duration::from_millis(millis)
        }

        /// Fires the pending tick at `millis` after the base instant.
        fn fire(&mut self, millis: u64) {
            assert!(self.scheduler.take().is_some(), "no tick scheduled");
            let now = self.at(millis);
            self.render_loop.tick(now);
        }

        fn uniform_writes(&self) -> Vec<FrameUniforms> {
            self.log
                .borrow()
                .calls
                .iter()
                .filter_map(|call| match call {
                    Call::Uniforms(uniforms) => Some(*uniforms),
                    _ => None,
                })
                .collect()
        }

        fn draws(&self) -> Vec<bool> {
            self.log
                .borrow()
                .calls
                .iter()
                .filter_map(|call| match call {
                    Call::Draw { timed } => Some(*timed),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn translation_failure_leaves_loop_uninitialized() {
        let mut render_loop: RenderLoop<RecordingBackend, QueuedScheduler> =
            RenderLoop::new(LoopConfig::default(), QueuedScheduler::new(), |_| {});
        let mut connected = false;
        let result = render_loop.initialize_with("float x;", 10, 10, |_, _, _| {
            connected = true;
            Err(InitError::ContextUnavailable("unused".into()))
        });
        assert!(matches!(
            result,
            Err(InitError::Translation(TranslationError::MissingEntryPoint))
        ));
        assert!(!connected);
        assert_eq!(render_loop.state(), LoopState::Uninitialized);
    }

    #[test]
    fn context_failure_leaves_no_live_state() {
        let mut render_loop: RenderLoop<RecordingBackend, QueuedScheduler> =
            RenderLoop::new(LoopConfig::default(), QueuedScheduler::new(), |_| {});
        let result = render_loop.initialize_with(SHADER, 10, 10, |unit, _, _| {
            assert!(unit.uniforms().contains(StandardUniform::Time));
            Err(InitError::ContextUnavailable("no adapter".into()))
        });
        assert!(matches!(result, Err(InitError::ContextUnavailable(_))));
        assert_eq!(render_loop.state(), LoopState::Uninitialized);
        render_loop.start();
        assert_eq!(render_loop.state(), LoopState::Uninitialized);
    }

    #[test]
    fn start_schedules_exactly_one_tick() {
        let mut harness = Harness::new(None, vec![]);
        assert_eq!(harness.render_loop.state(), LoopState::Ready);
        assert_eq!(harness.scheduler.pending(), 0);

        harness.render_loop.start();
        harness.render_loop.start();
        assert_eq!(harness.render_loop.state(), LoopState::Running);
        assert_eq!(harness.scheduler.pending(), 1);

        harness.fire(0);
        assert_eq!(harness.scheduler.pending(), 1);
        assert_eq!(harness.draws().len(), 1);
    }

    #[test]
    fn unscheduled_tick_is_ignored() {
        let mut harness = Harness::new(None, vec![]);
        let now = harness.at(0);
        harness.render_loop.tick(now);
        assert!(harness.draws().is_empty());

        harness.render_loop.start();
        harness.render_loop.halt();
        let now = harness.at(16);
        harness.render_loop.tick(now);
        assert!(harness.draws().is_empty());
        assert_eq!(harness.render_loop.state(), LoopState::Ready);
    }

    #[test]
    fn uniforms_precede_each_draw() {
        let mut harness = Harness::new(None, vec![]);
        harness.render_loop.start();
        for index in 0..3 {
            harness.fire(index * 16);
        }

        let calls = harness.log.borrow().calls.clone();
        let kinds: Vec<&str> = calls
            .iter()
            .map(|call| match call {
                Call::Configure(..) => "configure",
                Call::Uniforms(_) => "uniforms",
                Call::Draw { .. } => "draw",
            })
            .collect();
        assert_eq!(
            kinds,
            ["uniforms", "draw", "uniforms", "draw", "uniforms", "draw"]
        );

        let writes = harness.uniform_writes();
        assert_eq!(writes[0].frame, 0);
        assert_eq!(writes[2].frame, 2);
        assert_eq!(writes[0].time_delta, 0.0);
        assert!((writes[1].time_delta - 0.016).abs() < 1e-6);
        assert!((writes[2].time - 0.032).abs() < 1e-6);
        assert_eq!(writes[0].resolution, [320.0, 240.0, 1.0]);
        // iDate is not referenced by the shader.
        assert_eq!(writes[2].date, [0.0; 4]);
    }

    #[test]
    fn publishes_every_tenth_frame() {
        let mut harness = Harness::new(None, vec![]);
        harness.render_loop.start();
        for index in 0..25 {
            harness.fire(index * 16);
        }

        let snapshots = harness.snapshots.borrow();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].total_frames, 10);
        assert_eq!(snapshots[1].total_frames, 20);
        assert_eq!(snapshots[1].fps, 62.5);
        assert_eq!(snapshots[1].resolution, [320, 240]);
    }

    #[test]
    fn paused_ticks_freeze_time() {
        let mut harness = Harness::new(None, vec![]);
        harness.render_loop.start();
        harness.fire(0);
        harness.fire(100);

        harness.render_loop.set_paused(true, 4.0);
        assert_eq!(harness.render_loop.state(), LoopState::Paused);
        harness.fire(200);
        harness.fire(300);

        harness.render_loop.set_paused(false, 4.0);
        assert_eq!(harness.render_loop.state(), LoopState::Running);
        harness.fire(400);
        harness.fire(500);

        let writes = harness.uniform_writes();
        assert_eq!(writes[2].time, 4.0);
        assert_eq!(writes[3].time, 4.0);
        assert_eq!(writes[3].time_delta, 0.0);
        assert_eq!(writes[4].time, 4.0);
        assert!((writes[5].time - 4.1).abs() < 1e-5);
        // Paused ticks still draw and count.
        assert_eq!(harness.render_loop.frame_count(), 6);
    }

    #[test]
    fn pause_requested_before_start_starts_paused() {
        let mut harness = Harness::new(None, vec![]);
        harness.render_loop.set_paused(true, 1.5);
        harness.render_loop.start();
        assert_eq!(harness.render_loop.state(), LoopState::Paused);
        harness.fire(0);
        assert_eq!(harness.uniform_writes()[0].time, 1.5);
    }

    #[test]
    fn repeated_resize_is_idempotent() {
        let mut once = Harness::new(None, vec![]);
        once.render_loop.resize(800, 600);

        let mut twice = Harness::new(None, vec![]);
        twice.render_loop.resize(800, 600);
        twice.render_loop.resize(800, 600);

        assert_eq!(
            once.render_loop.uniforms().as_bytes(),
            twice.render_loop.uniforms().as_bytes()
        );
        assert_eq!(once.log.borrow().calls, twice.log.borrow().calls);
        assert_eq!(twice.log.borrow().calls, vec![Call::Configure(800, 600)]);
        assert!(twice.draws().is_empty());
    }

    #[test]
    fn zero_sized_resize_is_ignored() {
        let mut harness = Harness::new(None, vec![]);
        harness.render_loop.resize(0, 600);
        assert!(harness.log.borrow().calls.is_empty());
        assert_eq!(harness.render_loop.size(), (320, 240));
    }

    #[test]
    fn resize_handle_applies_before_next_uniform_write() {
        let mut harness = Harness::new(None, vec![]);
        let handle = harness.render_loop.resize_handle();
        harness.render_loop.start();
        handle.request(1024, 512);
        handle.request(640, 480);
        assert!(harness.log.borrow().calls.is_empty());

        harness.fire(0);
        let calls = harness.log.borrow().calls.clone();
        assert_eq!(calls[0], Call::Configure(640, 480));
        match &calls[1] {
            Call::Uniforms(uniforms) => assert_eq!(uniforms.resolution, [640.0, 480.0, 1.0]),
            other => panic!("expected uniform write, got {other:?}"),
        }
    }

    #[test]
    fn pointer_is_flipped_and_forwarded() {
        let mut harness = Harness::new(None, vec![]);
        harness.render_loop.start();
        harness.render_loop.on_pointer_down(10.0, 40.0);
        harness.render_loop.on_pointer_move(30.0, 60.0);
        harness.fire(0);
        assert_eq!(harness.uniform_writes()[0].mouse, [30.0, 180.0, 10.0, 200.0]);
    }

    #[test]
    fn gpu_sample_is_consumed_on_a_later_tick() {
        let timer = vec![TimerPoll::Idle, TimerPoll::Pending, TimerPoll::Ready(4.0)];
        let mut harness = Harness::new(Some(timer), vec![]);
        harness.render_loop.start();
        harness.fire(0);
        assert_eq!(harness.render_loop.diagnostics().last_gpu_time_ms, None);
        harness.fire(16);
        assert_eq!(harness.render_loop.diagnostics().last_gpu_time_ms, None);
        harness.fire(32);

        assert_eq!(harness.draws(), vec![true, false, true]);
        assert_eq!(harness.render_loop.diagnostics().last_gpu_time_ms, Some(4.0));
        assert_eq!(harness.render_loop.telemetry().gpu().len(), 1);
    }

    #[test]
    fn out_of_range_gpu_samples_are_dropped() {
        let timer = vec![TimerPoll::Ready(0.0), TimerPoll::Ready(1500.0)];
        let mut harness = Harness::new(Some(timer), vec![]);
        harness.render_loop.start();
        harness.fire(0);
        harness.fire(16);
        assert!(harness.render_loop.telemetry().gpu().is_empty());
        assert_eq!(harness.render_loop.diagnostics().last_gpu_time_ms, None);
    }

    #[test]
    fn skipped_frames_are_not_counted() {
        let outcomes = vec![FrameStatus::Presented, FrameStatus::Skipped, FrameStatus::Presented];
        let mut harness = Harness::new(None, outcomes);
        harness.render_loop.start();
        for index in 0..3 {
            harness.fire(index * 16);
        }
        assert_eq!(harness.render_loop.frame_count(), 2);
        assert_eq!(harness.scheduler.pending(), 1);
    }

    #[test]
    fn halt_cancels_pending_tick() {
        let mut harness = Harness::new(None, vec![]);
        harness.render_loop.start();
        harness.render_loop.halt();
        assert_eq!(harness.render_loop.state(), LoopState::Ready);
        assert_eq!(harness.scheduler.pending(), 0);
        assert_eq!(harness.scheduler.cancelled(), 1);

        harness.render_loop.start();
        harness.fire(0);
        assert_eq!(harness.draws().len(), 1);
    }

    #[test]
    fn dispose_twice_releases_once() {
        let mut harness = Harness::new(None, vec![]);
        harness.render_loop.start();
        harness.render_loop.dispose();
        harness.render_loop.dispose();

        assert_eq!(harness.render_loop.state(), LoopState::Disposed);
        assert_eq!(harness.log.borrow().released, 1);
        assert_eq!(harness.scheduler.pending(), 0);
        assert_eq!(harness.scheduler.cancelled(), 1);

        let now = harness.at(0);
        harness.render_loop.tick(now);
        harness.render_loop.resize(10, 10);
        harness.render_loop.on_pointer_move(1.0, 1.0);
        assert!(harness.log.borrow().calls.is_empty());
        assert!(matches!(
            harness.render_loop.initialize_with(SHADER, 1, 1, |_, _, _| unreachable!()),
            Err(InitError::Disposed)
        ));
    }

    #[test]
    fn dropping_the_loop_releases_backend() {
        let harness = Harness::new(None, vec![]);
        let log = Rc::clone(&harness.log);
        drop(harness);
        assert_eq!(log.borrow().released, 1);
    }

    #[test]
    fn reinitialize_releases_previous_backend_and_resets_counters() {
        let mut harness = Harness::new(None, vec![]);
        harness.render_loop.start();
        harness.fire(0);
        harness.fire(16);

        let log = Rc::clone(&harness.log);
        harness
            .render_loop
            .initialize_with(SHADER, 64, 64, move |_, _, _| {
                Ok(RecordingBackend {
                    log,
                    timer: None,
                    outcomes: VecDeque::new(),
                })
            })
            .expect("reinitialize");

        assert_eq!(harness.log.borrow().released, 1);
        assert_eq!(harness.render_loop.state(), LoopState::Ready);
        assert_eq!(harness.render_loop.frame_count(), 0);
        assert!(harness.render_loop.telemetry().frames().is_empty());
        assert_eq!(harness.scheduler.pending(), 0);
    }

    #[test]
    fn diagnostics_report_recent_frames() {
        let mut harness = Harness::new(None, vec![]);
        harness.render_loop.start();
        for index in 0..12 {
            harness.fire(index * 20);
        }
        let report = harness.render_loop.diagnostics();
        assert_eq!(report.recent_frame_times_ms.len(), 8);
        assert!(report.recent_frame_times_ms.iter().all(|ms| (*ms - 20.0).abs() < 1e-9));
        assert_eq!(report.refresh_rate_hz, Some(50));
        assert_eq!(report.frame_count, 12);
        assert!(report.to_string().contains("probed refresh rate: 50 Hz"));
    }
}
