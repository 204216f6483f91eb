//! wgpu plumbing behind the render loop and the validator.
//!
//! - `context` opens instance/adapter/device, configures the window surface
//!   and routes uncaptured device errors into a warning log.
//! - `pipeline` turns a translated program into a render pipeline plus its
//!   uniform buffer and bind group.
//! - `uniforms` mirrors the translator's uniform block on the CPU side.
//! - `timer` brackets a render pass with timestamp queries and reads the
//!   result back without blocking.
//! - `backend` ties those together behind [`FrameBackend`](crate::FrameBackend).

pub(crate) mod backend;
pub(crate) mod context;
pub(crate) mod pipeline;
pub(crate) mod timer;
pub(crate) mod uniforms;

/// Validation error scope that is always popped, even on early return.
pub(crate) struct ErrorScope<'a> {
    device: &'a wgpu::Device,
    popped: bool,
}

impl<'a> ErrorScope<'a> {
    pub fn push(device: &'a wgpu::Device) -> Self {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        Self {
            device,
            popped: false,
        }
    }

    /// Pops the scope and returns the first error raised inside it.
    pub fn finish(mut self) -> Option<wgpu::Error> {
        self.popped = true;
        pollster::block_on(self.device.pop_error_scope())
    }
}

impl Drop for ErrorScope<'_> {
    fn drop(&mut self) {
        if !self.popped {
            drop(pollster::block_on(self.device.pop_error_scope()));
        }
    }
}
