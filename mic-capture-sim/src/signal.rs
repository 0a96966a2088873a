//! Test signals fed into the simulated microphone.

use std::f32::consts::TAU;

use mic_capture_core::processing::sample_format;
use mic_capture_core::AudioFormatDescriptor;

/// What the simulated microphone "hears".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    Silence,
    /// Same value on every sample, in `[-1.0, 1.0]`.
    Constant(f32),
    Sine { frequency: f32, amplitude: f32 },
}

impl Default for Signal {
    fn default() -> Self {
        Signal::Sine {
            frequency: 440.0,
            amplitude: 0.5,
        }
    }
}

/// Generates interleaved frames of a [`Signal`] in the negotiated format.
///
/// Every channel carries the same waveform. Phase is continuous across
/// periods.
pub struct SignalGenerator {
    signal: Signal,
    format: AudioFormatDescriptor,
    phase: f32,
    scratch: Vec<f32>,
}

impl SignalGenerator {
    pub fn new(signal: Signal, format: AudioFormatDescriptor, max_frames: usize) -> Self {
        Self {
            signal,
            format,
            phase: 0.0,
            scratch: vec![0.0; max_frames * format.channels as usize],
        }
    }

    pub fn signal(&self) -> Signal {
        self.signal
    }

    /// Fill `dest` with whole frames encoded in the generator's format.
    /// Returns the number of frames written.
    pub fn fill(&mut self, dest: &mut [u8]) -> usize {
        let channels = self.format.channels as usize;
        let frames = (dest.len() / self.format.frame_size()).min(self.scratch.len() / channels);
        let samples = &mut self.scratch[..frames * channels];

        match self.signal {
            Signal::Silence => samples.fill(0.0),
            Signal::Constant(value) => samples.fill(value),
            Signal::Sine {
                frequency,
                amplitude,
            } => {
                let step = TAU * frequency / self.format.sample_rate as f32;
                for frame in samples.chunks_exact_mut(channels) {
                    frame.fill(amplitude * self.phase.sin());
                    self.phase = (self.phase + step) % TAU;
                }
            }
        }

        sample_format::encode_into(self.format.sample_format, samples, dest);
        frames
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use mic_capture_core::SampleFormat;

    use super::*;

    fn decode(format: SampleFormat, bytes: &[u8]) -> Vec<f32> {
        let mut out = vec![0.0; bytes.len() / format.bytes_per_sample()];
        sample_format::decode_into(format, bytes, &mut out);
        out
    }

    #[test]
    fn constant_signal_fills_every_channel() {
        let format = AudioFormatDescriptor::new(16000.0, 2, SampleFormat::I16);
        let mut generator = SignalGenerator::new(Signal::Constant(0.25), format, 8);
        let mut bytes = vec![0u8; 4 * format.frame_size()];

        assert_eq!(generator.fill(&mut bytes), 4);
        for sample in decode(SampleFormat::I16, &bytes) {
            assert_abs_diff_eq!(sample, 0.25, epsilon = 1e-4);
        }
    }

    #[test]
    fn sine_phase_continues_across_periods() {
        // A quarter-rate sine steps 0, 1, 0, -1.
        let format = AudioFormatDescriptor::new(8.0, 1, SampleFormat::F32);
        let signal = Signal::Sine {
            frequency: 2.0,
            amplitude: 1.0,
        };
        let mut generator = SignalGenerator::new(signal, format, 2);
        let mut first = [0u8; 8];
        let mut second = [0u8; 8];

        generator.fill(&mut first);
        generator.fill(&mut second);

        let samples: Vec<f32> = decode(SampleFormat::F32, &first)
            .into_iter()
            .chain(decode(SampleFormat::F32, &second))
            .collect();
        for (actual, expected) in samples.iter().zip([0.0, 1.0, 0.0, -1.0]) {
            assert_abs_diff_eq!(*actual, expected, epsilon = 1e-5);
        }
    }

    #[test]
    fn fill_is_capped_by_scratch_size() {
        let format = AudioFormatDescriptor::new(16000.0, 1, SampleFormat::I32);
        let mut generator = SignalGenerator::new(Signal::Silence, format, 4);
        let mut bytes = vec![0xFFu8; 8 * 4];

        assert_eq!(generator.fill(&mut bytes), 4);
        assert!(bytes[..16].iter().all(|&b| b == 0));
        assert!(bytes[16..].iter().all(|&b| b == 0xFF));
    }
}
