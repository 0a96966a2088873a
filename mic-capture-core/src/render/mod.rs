//! Real-time render path.
//!
//! Everything reachable from [`EngineCallbacks`] runs on the hardware audio
//! thread: no allocation, no blocking, no logging. Failures are recorded in
//! lock-free counters and returned as [`RenderError`]; the control thread
//! reads the counters later.

pub mod capture;
pub mod playback;

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::models::audio_models::{RenderContext, RenderDiagnostics};
use crate::models::error::{HardwareStatus, RenderError};
use crate::processing::level::LevelEstimator;
use crate::processing::ring_buffer::RingBuffer;
use crate::traits::hardware::{InputRender, RenderCallbacks};

use self::capture::CaptureHandler;
use self::playback::PlaybackHandler;

/// State shared between the audio thread and the control/consumer side.
///
/// The ring and the level are single-writer (the capture callback). The
/// running flag is written only by the lifecycle controller; the callbacks
/// only read it.
#[derive(Debug)]
pub struct CaptureShared {
    ring: Arc<RingBuffer>,
    level: LevelEstimator,
    running: AtomicBool,
    stats: RenderStats,
}

impl CaptureShared {
    pub fn new(ring: RingBuffer) -> Self {
        Self {
            ring: Arc::new(ring),
            level: LevelEstimator::new(),
            running: AtomicBool::new(false),
            stats: RenderStats::default(),
        }
    }

    pub fn ring(&self) -> &Arc<RingBuffer> {
        &self.ring
    }

    pub fn level(&self) -> &LevelEstimator {
        &self.level
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }
}

const NO_FAILURE: u8 = 0;
const INVALID_BUFFER: u8 = 1;
const FORMAT_MISMATCH: u8 = 2;
const HARDWARE_FAILURE: u8 = 3;

/// Lock-free counters bumped by the render callbacks.
#[derive(Debug, Default)]
pub struct RenderStats {
    input_periods: AtomicU64,
    input_frames: AtomicU64,
    output_periods: AtomicU64,
    render_failures: AtomicU64,
    last_failure_status: AtomicI32,
    last_failure_kind: AtomicU8,
    skipped_periods: AtomicU64,
    playback_underruns: AtomicU64,
}

impl RenderStats {
    pub(crate) fn record_input(&self, frames: usize) {
        self.input_periods.fetch_add(1, Ordering::Relaxed);
        self.input_frames.fetch_add(frames as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_output(&self) {
        self.output_periods.fetch_add(1, Ordering::Relaxed);
    }

    /// Publish the status and kind before the count so a reader that sees
    /// the new count also sees them.
    pub(crate) fn record_failure(&self, error: RenderError) {
        let kind = match error {
            RenderError::InvalidBuffer => INVALID_BUFFER,
            RenderError::FormatMismatch => FORMAT_MISMATCH,
            RenderError::Hardware(_) => HARDWARE_FAILURE,
        };
        self.last_failure_status
            .store(error.status_code(), Ordering::Relaxed);
        self.last_failure_kind.store(kind, Ordering::Relaxed);
        self.render_failures.fetch_add(1, Ordering::Release);
    }

    pub(crate) fn record_skipped(&self) {
        self.skipped_periods.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_underrun(&self) {
        self.playback_underruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RenderDiagnostics {
        let render_failures = self.render_failures.load(Ordering::Acquire);
        let last_failure_status = self.last_failure_status.load(Ordering::Relaxed);
        let last_failure = match self.last_failure_kind.load(Ordering::Relaxed) {
            NO_FAILURE => None,
            INVALID_BUFFER => Some(RenderError::InvalidBuffer),
            FORMAT_MISMATCH => Some(RenderError::FormatMismatch),
            _ => Some(RenderError::Hardware(HardwareStatus(last_failure_status))),
        };
        RenderDiagnostics {
            input_periods: self.input_periods.load(Ordering::Relaxed),
            input_frames: self.input_frames.load(Ordering::Relaxed),
            output_periods: self.output_periods.load(Ordering::Relaxed),
            render_failures,
            last_failure_status,
            last_failure,
            skipped_periods: self.skipped_periods.load(Ordering::Relaxed),
            playback_underruns: self.playback_underruns.load(Ordering::Relaxed),
        }
    }
}

/// The core's implementation of the hardware callback pair.
///
/// Built on the control thread when a unit is created (all scratch memory is
/// allocated then) and moved into the hardware layer.
pub struct EngineCallbacks {
    capture: CaptureHandler,
    playback: PlaybackHandler,
}

impl EngineCallbacks {
    pub fn new(capture: CaptureHandler, playback: PlaybackHandler) -> Self {
        Self { capture, playback }
    }
}

impl RenderCallbacks for EngineCallbacks {
    fn render_input(
        &mut self,
        ctx: &RenderContext,
        input: &mut dyn InputRender,
    ) -> Result<(), RenderError> {
        self.capture.on_input(ctx, input)
    }

    fn render_output(&mut self, ctx: &RenderContext, output: &mut [u8]) -> Result<(), RenderError> {
        self.playback.on_output(ctx, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_snapshot_carries_last_status() {
        let stats = RenderStats::default();
        stats.record_failure(RenderError::Hardware(HardwareStatus(-66)));
        stats.record_failure(RenderError::Hardware(HardwareStatus(-77)));
        stats.record_input(256);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.render_failures, 2);
        assert_eq!(snapshot.last_failure_status, -77);
        assert_eq!(
            snapshot.last_failure,
            Some(RenderError::Hardware(HardwareStatus(-77)))
        );
        assert_eq!(snapshot.input_periods, 1);
        assert_eq!(snapshot.input_frames, 256);
    }

    #[test]
    fn failure_kind_survives_snapshot() {
        let stats = RenderStats::default();
        assert_eq!(stats.snapshot().last_failure, None);

        stats.record_failure(RenderError::FormatMismatch);
        assert_eq!(stats.snapshot().last_failure, Some(RenderError::FormatMismatch));

        stats.record_failure(RenderError::InvalidBuffer);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.last_failure, Some(RenderError::InvalidBuffer));
        assert_eq!(snapshot.last_failure_status, -50);
    }

    #[test]
    fn running_flag_starts_clear() {
        let shared = CaptureShared::new(RingBuffer::mono(8).unwrap());
        assert!(!shared.is_running());
        shared.set_running(true);
        assert!(shared.is_running());
    }
}
