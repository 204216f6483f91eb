use std::fmt;

/// Lifecycle of a [`RenderLoop`](crate::RenderLoop).
///
/// `Disposed` is terminal; every other state can reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Uninitialized,
    /// Program linked and bindings resolved; no tick scheduled.
    Ready,
    Running,
    /// Ticks keep firing but time is frozen.
    Paused,
    Disposed,
}

impl LoopState {
    pub fn is_ticking(self) -> bool {
        matches!(self, LoopState::Running | LoopState::Paused)
    }

    pub fn is_live(self) -> bool {
        matches!(self, LoopState::Ready | LoopState::Running | LoopState::Paused)
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoopState::Uninitialized => "uninitialized",
            LoopState::Ready => "ready",
            LoopState::Running => "running",
            LoopState::Paused => "paused",
            LoopState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// Pointer position and last press, `[x, y, down_x, down_y]`, in surface
/// pixels with a bottom-left origin.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState([f32; 4]);

impl PointerState {
    /// Records a move; `y` is given top-down and flipped against `height`.
    pub fn moved(&mut self, x: f32, y: f32, height: u32) {
        self.0[0] = x;
        self.0[1] = height as f32 - y;
    }

    /// Records a press at the given top-down position.
    pub fn pressed(&mut self, x: f32, y: f32, height: u32) {
        self.moved(x, y, height);
        self.0[2] = self.0[0];
        self.0[3] = self.0[1];
    }

    pub fn as_uniform(&self) -> [f32; 4] {
        self.0
    }
}

/// GPU adapter selection preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    #[default]
    High,
    Low,
    None,
}

impl From<GpuPowerPreference> for wgpu::PowerPreference {
    fn from(value: GpuPowerPreference) -> Self {
        match value {
            GpuPowerPreference::High => wgpu::PowerPreference::HighPerformance,
            GpuPowerPreference::Low => wgpu::PowerPreference::LowPower,
            GpuPowerPreference::None => wgpu::PowerPreference::None,
        }
    }
}

/// Swapchain presentation preference; unsupported modes fall back to FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PresentModePreference {
    #[default]
    AutoVsync,
    AutoNoVsync,
    Fifo,
    Mailbox,
    Immediate,
}

impl From<PresentModePreference> for wgpu::PresentMode {
    fn from(value: PresentModePreference) -> Self {
        match value {
            PresentModePreference::AutoVsync => wgpu::PresentMode::AutoVsync,
            PresentModePreference::AutoNoVsync => wgpu::PresentMode::AutoNoVsync,
            PresentModePreference::Fifo => wgpu::PresentMode::Fifo,
            PresentModePreference::Mailbox => wgpu::PresentMode::Mailbox,
            PresentModePreference::Immediate => wgpu::PresentMode::Immediate,
        }
    }
}

/// Device options shared by the live renderer and the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuOptions {
    pub power_preference: GpuPowerPreference,
    pub present_mode: PresentModePreference,
    /// Request timestamp queries when the adapter offers them.
    pub timer_queries: bool,
}

impl Default for GpuOptions {
    fn default() -> Self {
        Self {
            power_preference: GpuPowerPreference::default(),
            present_mode: PresentModePreference::default(),
            timer_queries: true,
        }
    }
}

/// Shader stage a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_flips_y_against_height() {
        let mut pointer = PointerState::default();
        pointer.moved(10.0, 30.0, 100);
        assert_eq!(pointer.as_uniform(), [10.0, 70.0, 0.0, 0.0]);

        pointer.pressed(20.0, 0.0, 100);
        assert_eq!(pointer.as_uniform(), [20.0, 100.0, 20.0, 100.0]);

        pointer.moved(25.0, 50.0, 100);
        assert_eq!(pointer.as_uniform(), [25.0, 50.0, 20.0, 100.0]);
    }

    #[test]
    fn only_ready_and_ticking_states_are_live() {
        assert!(!LoopState::Uninitialized.is_live());
        assert!(LoopState::Ready.is_live());
        assert!(LoopState::Paused.is_ticking());
        assert!(!LoopState::Ready.is_ticking());
        assert!(!LoopState::Disposed.is_live());
    }
}
