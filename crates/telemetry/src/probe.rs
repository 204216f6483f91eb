use std::time::Instant;

/// Number of tick timestamps collected before the rate is computed.
pub const PROBE_SAMPLES: usize = 10;

/// One-shot estimate of the display refresh rate from scheduler tick
/// arrival times.
///
/// Once [`PROBE_SAMPLES`] timestamps have been seen the rounded rate is
/// stored and further timestamps are ignored; the probe never restarts.
#[derive(Debug, Clone, Default)]
pub struct RefreshRateProbe {
    stamps: Vec<Instant>,
    rate: Option<u32>,
}

impl RefreshRateProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one tick timestamp. Returns the rate on the call that completes
    /// the probe.
    pub fn record(&mut self, now: Instant) -> Option<u32> {
        if self.rate.is_some() {
            return None;
        }
        self.stamps.push(now);
        if self.stamps.len() < PROBE_SAMPLES {
            return None;
        }

        let first = self.stamps[0];
        let last = self.stamps[self.stamps.len() - 1];
        let intervals = (self.stamps.len() - 1) as f64;
        let mean_ms = last.saturating_duration_since(first).as_secs_f64() * 1000.0 / intervals;
        self.stamps = Vec::new();
        if mean_ms <= 0.0 {
            tracing::debug!("refresh probe saw no elapsed time; giving up");
            self.rate = Some(0);
            return None;
        }

        let rate = (1000.0 / mean_ms).round() as u32;
        tracing::debug!(hz = rate, mean_interval_ms = mean_ms, "refresh rate probed");
        self.rate = Some(rate);
        Some(rate)
    }

    pub fn is_complete(&self) -> bool {
        self.rate.is_some()
    }

    /// Probed rate in Hz; `None` until complete or when the probe saw no
    /// elapsed time.
    pub fn rate(&self) -> Option<u32> {
        self.rate.filter(|rate| *rate > 0)
    }
}
