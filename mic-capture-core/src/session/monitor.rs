use std::sync::Arc;

use crate::models::audio_models::RenderDiagnostics;
use crate::models::error::CaptureError;
use crate::processing::ring_buffer::RingReader;
use crate::render::CaptureShared;

/// Read-only view of the capture output for consumer threads.
///
/// Cheap to clone. Never blocks the audio thread: every read goes through
/// the ring's published index or an atomic.
#[derive(Debug, Clone)]
pub struct CaptureMonitor {
    shared: Arc<CaptureShared>,
}

impl CaptureMonitor {
    pub(crate) fn new(shared: Arc<CaptureShared>) -> Self {
        Self { shared }
    }

    /// Smoothed logarithmic input level. May be one period stale.
    pub fn current_level(&self) -> f32 {
        self.shared.level().current_level()
    }

    pub fn read_snapshot(&self, count: usize) -> Result<Vec<f32>, CaptureError> {
        self.shared.ring().read_snapshot(count)
    }

    pub fn read_channel_snapshot(&self, channel: usize, frames: usize) -> Result<Vec<f32>, CaptureError> {
        self.shared.ring().read_channel_snapshot(channel, frames)
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    pub fn total_written(&self) -> u64 {
        self.shared.ring().total_written()
    }

    pub fn capacity(&self) -> usize {
        self.shared.ring().capacity()
    }

    /// New index-tracking reader positioned at the current write cursor.
    pub fn reader(&self) -> RingReader {
        RingReader::new(Arc::clone(self.shared.ring()))
    }

    pub fn diagnostics(&self) -> RenderDiagnostics {
        self.shared.stats().snapshot()
    }
}
