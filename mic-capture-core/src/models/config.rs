use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default sample ring capacity, in samples.
pub const DEFAULT_BUFFER_CAPACITY: usize = 32768;

/// Default upper bound on frames delivered in one audio period.
pub const DEFAULT_MAX_FRAMES_PER_PERIOD: usize = 4096;

/// Encoding of one sample in the raw hardware buffer.
///
/// All encodings are packed, little-endian and interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    I16,
    I24,
    I32,
    F32,
}

impl SampleFormat {
    pub fn bits_per_sample(self) -> u16 {
        match self {
            Self::I16 => 16,
            Self::I24 => 24,
            Self::I32 | Self::F32 => 32,
        }
    }

    pub fn bytes_per_sample(self) -> usize {
        self.bits_per_sample() as usize / 8
    }

    /// Signed-integer format for a bit depth, if one exists.
    pub fn signed_integer(bits: u16) -> Option<Self> {
        match bits {
            16 => Some(Self::I16),
            24 => Some(Self::I24),
            32 => Some(Self::I32),
            _ => None,
        }
    }
}

/// Negotiated stream format handed to the render handlers at setup.
///
/// Immutable while a hardware unit is running.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioFormatDescriptor {
    /// Sample rate in Hz.
    pub sample_rate: f64,

    /// Channels per frame. 1 = mono, 2 = interleaved stereo.
    pub channels: u16,

    pub sample_format: SampleFormat,
}

impl AudioFormatDescriptor {
    pub fn new(sample_rate: f64, channels: u16, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format,
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.sample_format.bits_per_sample()
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.sample_format.bytes_per_sample()
    }

    /// Bytes per interleaved frame.
    pub fn frame_size(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    /// Wall-clock length of a period holding `frames` frames.
    pub fn period_duration(&self, frames: usize) -> Duration {
        Duration::from_secs_f64(frames as f64 / self.sample_rate)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err("sample rate must be positive".into());
        }
        if ![1, 2].contains(&self.channels) {
            return Err(format!("unsupported channel count: {}", self.channels));
        }
        Ok(())
    }
}

impl Default for AudioFormatDescriptor {
    fn default() -> Self {
        Self {
            sample_rate: 16000.0,
            channels: 2,
            sample_format: SampleFormat::I32,
        }
    }
}

/// Where the playback callback sources its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackSource {
    /// Output silence.
    #[default]
    Silence,

    /// Play back the most recently captured samples.
    Monitor,

    /// Drain a dedicated queue filled by a non-real-time producer.
    Queue,
}

/// Configuration supplied by the (external) setup layer.
///
/// Fixed at construction time; nothing here changes while a unit runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfiguration {
    pub format: AudioFormatDescriptor,

    /// Capture ring capacity in samples (default: 32768).
    pub buffer_capacity: usize,

    /// Largest period the hardware may deliver; sizes the render scratch.
    pub max_frames_per_period: usize,

    pub playback_source: PlaybackSource,

    /// Capacity of the playback queue in samples. Used with [`PlaybackSource::Queue`].
    pub playback_queue_capacity: usize,

    /// Restart the unit when an interruption ends (default: false).
    pub resume_after_interruption: bool,
}

impl CaptureConfiguration {
    pub fn with_format(format: AudioFormatDescriptor) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        self.format.validate()?;

        let channels = self.format.channels as usize;
        if self.buffer_capacity == 0 {
            return Err("buffer capacity must be positive".into());
        }
        if self.buffer_capacity % channels != 0 {
            return Err(format!(
                "buffer capacity {} is not a multiple of {} channels",
                self.buffer_capacity, channels
            ));
        }
        if self.max_frames_per_period == 0 {
            return Err("max frames per period must be positive".into());
        }
        if self.max_frames_per_period * channels > self.buffer_capacity {
            return Err(format!(
                "a {}-frame period does not fit a {}-sample buffer",
                self.max_frames_per_period, self.buffer_capacity
            ));
        }
        if self.playback_source == PlaybackSource::Queue && self.playback_queue_capacity == 0 {
            return Err("playback queue capacity must be positive".into());
        }
        Ok(())
    }
}

impl Default for CaptureConfiguration {
    fn default() -> Self {
        Self {
            format: AudioFormatDescriptor::default(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            max_frames_per_period: DEFAULT_MAX_FRAMES_PER_PERIOD,
            playback_source: PlaybackSource::Silence,
            playback_queue_capacity: DEFAULT_BUFFER_CAPACITY,
            resume_after_interruption: false,
        }
    }
}
