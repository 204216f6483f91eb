//! Frame timing statistics for the render loop.
//!
//! [`Telemetry`] keeps two bounded windows: CPU-measured inter-frame times
//! and GPU-measured pass durations. Snapshots reconcile the two into one fps
//! figure, preferring the GPU median when it agrees with the CPU average to
//! within a configurable band.

mod probe;
mod rolling;

pub use probe::{RefreshRateProbe, PROBE_SAMPLES};
pub use rolling::RollingWindow;

use std::time::Duration;

use serde::Serialize;

/// GPU durations outside `(0, GPU_SAMPLE_CEILING_MS)` are discarded.
pub const GPU_SAMPLE_CEILING_MS: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    pub frame_window: usize,
    pub gpu_window: usize,
    /// Nominal frame interval used by the dropped-frame heuristic.
    pub target_interval: Duration,
    /// Frames slower than `target_interval * drop_factor` count as dropped.
    pub drop_factor: f64,
    /// GPU fps is trusted while `|gpu - cpu| < cpu * reconcile_band`.
    pub reconcile_band: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            frame_window: 120,
            gpu_window: 30,
            target_interval: Duration::from_secs_f64(1.0 / 60.0),
            drop_factor: 1.5,
            reconcile_band: 2.0,
        }
    }
}

impl TelemetryConfig {
    pub fn drop_threshold_ms(&self) -> f64 {
        self.target_interval.as_secs_f64() * 1000.0 * self.drop_factor
    }
}

/// Which measurement produced the published fps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FpsSource {
    Cpu,
    Gpu,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub fps: f64,
    pub fps_source: FpsSource,
    /// Most recent inter-frame time.
    pub frame_time_ms: f64,
    pub avg_frame_time_ms: f64,
    pub min_frame_time_ms: f64,
    pub max_frame_time_ms: f64,
    pub dropped_frames: usize,
    pub total_frames: u64,
    /// Median of the GPU window.
    pub gpu_time_ms: Option<f64>,
    pub resolution: [u32; 2],
    pub pixel_count: u64,
}

#[derive(Debug, Clone)]
pub struct Telemetry {
    config: TelemetryConfig,
    frames: RollingWindow,
    gpu: RollingWindow,
    total_frames: u64,
}

impl Telemetry {
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            frames: RollingWindow::new(config.frame_window),
            gpu: RollingWindow::new(config.gpu_window),
            config,
            total_frames: 0,
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn record_frame(&mut self, frame_ms: f64) {
        self.frames.push(frame_ms);
    }

    /// Records a GPU pass duration; returns whether it was kept.
    pub fn record_gpu(&mut self, gpu_ms: f64) -> bool {
        if gpu_ms > 0.0 && gpu_ms < GPU_SAMPLE_CEILING_MS {
            self.gpu.push(gpu_ms);
            true
        } else {
            tracing::debug!(gpu_ms, "discarding out-of-range gpu sample");
            false
        }
    }

    pub fn set_total_frames(&mut self, total: u64) {
        self.total_frames = total;
    }

    pub fn frames(&self) -> &RollingWindow {
        &self.frames
    }

    pub fn gpu(&self) -> &RollingWindow {
        &self.gpu
    }

    pub fn reset(&mut self) {
        self.frames.clear();
        self.gpu.clear();
        self.total_frames = 0;
    }

    pub fn dropped_frames(&self) -> usize {
        self.frames.count_above(self.config.drop_threshold_ms())
    }

    pub fn snapshot(&self, width: u32, height: u32) -> MetricsSnapshot {
        let average = self.frames.mean().unwrap_or(0.0);
        let cpu_fps = if average > 0.0 { 1000.0 / average } else { 0.0 };
        let gpu_median = self.gpu.median();
        let gpu_fps = gpu_median.map(|median| 1000.0 / median);
        let (fps, fps_source) = reconcile_fps(cpu_fps, gpu_fps, self.config.reconcile_band);

        MetricsSnapshot {
            fps: round2(fps),
            fps_source,
            frame_time_ms: round2(self.frames.last().unwrap_or(0.0)),
            avg_frame_time_ms: round2(average),
            min_frame_time_ms: round2(self.frames.min().unwrap_or(0.0)),
            max_frame_time_ms: round2(self.frames.max().unwrap_or(0.0)),
            dropped_frames: self.dropped_frames(),
            total_frames: self.total_frames,
            gpu_time_ms: gpu_median.map(round2),
            resolution: [width, height],
            pixel_count: u64::from(width) * u64::from(height),
        }
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(TelemetryConfig::default())
    }
}

/// Picks the GPU-derived fps when it lies within `band` times the CPU fps
/// of the CPU figure; otherwise falls back to the CPU figure.
pub fn reconcile_fps(cpu_fps: f64, gpu_fps: Option<f64>, band: f64) -> (f64, FpsSource) {
    match gpu_fps {
        Some(gpu) if gpu.is_finite() && (gpu - cpu_fps).abs() < cpu_fps * band => {
            (gpu, FpsSource::Gpu)
        }
        _ => (cpu_fps, FpsSource::Cpu),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
