use crossbeam_channel::{Receiver, TryRecvError};

/// Result of checking the in-flight timer query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimerPoll {
    /// Nothing in flight; a new query may begin.
    Idle,
    /// The previous query has not resolved yet.
    Pending,
    /// The previous query resolved to this many milliseconds.
    Ready(f64),
}

type MapResult = Result<(), wgpu::BufferAsyncError>;

enum TimerState {
    Idle,
    /// Timestamps written into the pass; readback not yet requested.
    Recorded,
    Mapping(Receiver<MapResult>),
}

const QUERY_BYTES: u64 = 2 * std::mem::size_of::<u64>() as u64;

/// Two-timestamp query around a render pass, read back asynchronously.
///
/// At most one measurement is in flight. The loop polls at the start of a
/// tick and only begins a new measurement once the previous one is
/// consumed, so a result is never read in the tick that produced it.
pub(crate) struct GpuTimer {
    query_set: wgpu::QuerySet,
    resolve_buffer: wgpu::Buffer,
    readback_buffer: wgpu::Buffer,
    period_ns: f64,
    state: TimerState,
}

impl GpuTimer {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let query_set = device.create_query_set(&wgpu::QuerySetDescriptor {
            label: Some("frame timer queries"),
            ty: wgpu::QueryType::Timestamp,
            count: 2,
        });
        let resolve_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame timer resolve"),
            size: QUERY_BYTES,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame timer readback"),
            size: QUERY_BYTES,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            query_set,
            resolve_buffer,
            readback_buffer,
            period_ns: f64::from(queue.get_timestamp_period()),
            state: TimerState::Idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, TimerState::Idle)
    }

    /// Non-blocking check of the previous measurement.
    pub fn poll(&mut self, device: &wgpu::Device) -> TimerPoll {
        let receiver = match &self.state {
            TimerState::Idle => return TimerPoll::Idle,
            TimerState::Recorded => return TimerPoll::Pending,
            TimerState::Mapping(receiver) => receiver,
        };

        let _ = device.poll(wgpu::PollType::Poll);
        match receiver.try_recv() {
            Ok(Ok(())) => {
                let elapsed_ms = {
                    let mapped = self.readback_buffer.slice(..).get_mapped_range();
                    let timestamps: &[u64] = bytemuck::cast_slice(&mapped);
                    let ticks = timestamps[1].saturating_sub(timestamps[0]);
                    ticks as f64 * self.period_ns / 1_000_000.0
                };
                self.readback_buffer.unmap();
                self.state = TimerState::Idle;
                TimerPoll::Ready(elapsed_ms)
            }
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "timer readback failed");
                self.state = TimerState::Idle;
                TimerPoll::Idle
            }
            Err(TryRecvError::Empty) => TimerPoll::Pending,
            Err(TryRecvError::Disconnected) => {
                self.state = TimerState::Idle;
                TimerPoll::Idle
            }
        }
    }

    /// Marks a measurement as started; only valid while idle.
    pub fn begin(&mut self) {
        self.state = TimerState::Recorded;
    }

    /// Timestamp writes for the pass being measured.
    pub fn timestamp_writes(&self) -> wgpu::RenderPassTimestampWrites<'_> {
        wgpu::RenderPassTimestampWrites {
            query_set: &self.query_set,
            beginning_of_pass_write_index: Some(0),
            end_of_pass_write_index: Some(1),
        }
    }

    /// Resolves the queries into the readback buffer; call after the pass.
    pub fn resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.resolve_query_set(&self.query_set, 0..2, &self.resolve_buffer, 0);
        encoder.copy_buffer_to_buffer(
            &self.resolve_buffer,
            0,
            &self.readback_buffer,
            0,
            QUERY_BYTES,
        );
    }

    /// Requests the readback; call after the resolving submission.
    pub fn after_submit(&mut self) {
        if !matches!(self.state, TimerState::Recorded) {
            return;
        }
        let (sender, receiver) = crossbeam_channel::bounded(1);
        self.readback_buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = sender.send(result);
            });
        self.state = TimerState::Mapping(receiver);
    }

    pub fn release(self) {
        self.resolve_buffer.destroy();
        self.readback_buffer.destroy();
    }
}
