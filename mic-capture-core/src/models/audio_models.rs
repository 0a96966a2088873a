use serde::Serialize;

use crate::models::error::RenderError;

/// Bus carrying output to the speaker.
pub const OUTPUT_BUS: u32 = 0;

/// Bus carrying microphone input.
pub const INPUT_BUS: u32 = 1;

/// Hardware timing for one render period.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AudioTimestamp {
    /// Position of the first frame, in samples since the unit started.
    pub sample_time: f64,

    /// Host clock reading at the start of the period, in nanoseconds.
    pub host_time_ns: u64,
}

/// Arguments the hardware layer passes with every render callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderContext {
    pub timestamp: AudioTimestamp,
    pub bus: u32,
    pub frame_count: u32,
}

impl RenderContext {
    pub fn input(timestamp: AudioTimestamp, frame_count: u32) -> Self {
        Self {
            timestamp,
            bus: INPUT_BUS,
            frame_count,
        }
    }

    pub fn output(timestamp: AudioTimestamp, frame_count: u32) -> Self {
        Self {
            timestamp,
            bus: OUTPUT_BUS,
            frame_count,
        }
    }
}

/// Microphone permission as reported by the audio session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordPermission {
    Undetermined,
    Denied,
    Granted,
}

/// External interruption signal (phone call, another app taking the device).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterruptionEvent {
    Began,
    Ended,
}

/// Point-in-time copy of the render path counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RenderDiagnostics {
    pub input_periods: u64,
    pub input_frames: u64,
    pub output_periods: u64,
    pub render_failures: u64,
    /// Status of the most recent failed period, 0 if none failed.
    pub last_failure_status: i32,
    pub last_failure: Option<RenderError>,
    /// Periods that arrived while the unit was marked stopped.
    pub skipped_periods: u64,
    pub playback_underruns: u64,
}
