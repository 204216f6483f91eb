use bytemuck::{Pod, Zeroable};
use chrono::{Datelike, Local, Timelike};
use translator::{StandardUniform, UniformUsage};

/// CPU mirror of the `FrameUniforms` std140 block emitted by the translator.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub resolution: [f32; 3],
    pub time: f32,
    pub time_delta: f32,
    pub frame: i32,
    pub _padding0: [f32; 2],
    pub mouse: [f32; 4],
    pub date: [f32; 4],
}

impl Default for FrameUniforms {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl FrameUniforms {
    pub const SIZE: u64 = std::mem::size_of::<FrameUniforms>() as u64;

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Values produced by one tick, before being filtered through the bindings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInputs {
    pub elapsed: f32,
    pub delta: f32,
    pub frame: u64,
    pub pointer: [f32; 4],
}

/// Standard uniforms the current program actually reads.
///
/// Writes to uniforms outside the set leave their slot untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniformBindingSet {
    usage: UniformUsage,
}

impl UniformBindingSet {
    pub fn resolve(usage: UniformUsage) -> Self {
        Self { usage }
    }

    pub fn is_bound(&self, uniform: StandardUniform) -> bool {
        self.usage.contains(uniform)
    }

    pub fn usage(&self) -> UniformUsage {
        self.usage
    }

    pub fn write_resolution(&self, uniforms: &mut FrameUniforms, width: u32, height: u32) {
        if self.is_bound(StandardUniform::Resolution) {
            uniforms.resolution = [width as f32, height as f32, 1.0];
        }
    }

    /// Writes every time-varying uniform present in the set.
    pub fn write_frame(&self, uniforms: &mut FrameUniforms, inputs: &FrameInputs) {
        if self.is_bound(StandardUniform::Time) {
            uniforms.time = inputs.elapsed;
        }
        if self.is_bound(StandardUniform::TimeDelta) {
            uniforms.time_delta = inputs.delta;
        }
        if self.is_bound(StandardUniform::Frame) {
            uniforms.frame = inputs.frame.min(i32::MAX as u64) as i32;
        }
        if self.is_bound(StandardUniform::Mouse) {
            uniforms.mouse = inputs.pointer;
        }
        if self.is_bound(StandardUniform::Date) {
            uniforms.date = local_date();
        }
    }
}

/// Year, month, day and seconds since local midnight.
fn local_date() -> [f32; 4] {
    let local_now = Local::now();
    let seconds_since_midnight = local_now.num_seconds_from_midnight() as f32
        + local_now.nanosecond() as f32 / 1_000_000_000.0;
    [
        local_now.year() as f32,
        local_now.month() as f32,
        local_now.day() as f32,
        seconds_since_midnight,
    ]
}
