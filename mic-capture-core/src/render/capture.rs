use std::sync::Arc;

use crate::models::audio_models::RenderContext;
use crate::models::config::AudioFormatDescriptor;
use crate::models::error::RenderError;
use crate::processing::sample_format;
use crate::traits::hardware::InputRender;

use super::CaptureShared;

/// Input-bus callback: pull, convert, buffer, meter.
///
/// Scratch for the largest allowed period is allocated in [`CaptureHandler::new`];
/// `on_input` only slices into it.
pub struct CaptureHandler {
    format: AudioFormatDescriptor,
    raw: Box<[u8]>,
    samples: Box<[f32]>,
    shared: Arc<CaptureShared>,
}

impl CaptureHandler {
    pub fn new(
        format: AudioFormatDescriptor,
        max_frames_per_period: usize,
        shared: Arc<CaptureShared>,
    ) -> Self {
        let channels = format.channels as usize;
        Self {
            format,
            raw: vec![0u8; max_frames_per_period * format.frame_size()].into_boxed_slice(),
            samples: vec![0.0f32; max_frames_per_period * channels].into_boxed_slice(),
            shared,
        }
    }

    /// Handle one period of microphone input.
    ///
    /// Nothing is written to the ring or the level unless the unit is marked
    /// running and the render call succeeded. A failed render is counted and
    /// its status returned unchanged.
    pub fn on_input(
        &mut self,
        ctx: &RenderContext,
        input: &mut dyn InputRender,
    ) -> Result<(), RenderError> {
        if !self.shared.is_running() {
            self.shared.stats().record_skipped();
            return Ok(());
        }

        let frames = ctx.frame_count as usize;
        let sample_count = frames * self.format.channels as usize;
        if frames == 0 || sample_count > self.samples.len() {
            return Self::fail(&self.shared, RenderError::InvalidBuffer);
        }

        let raw = &mut self.raw[..frames * self.format.frame_size()];
        if let Err(status) = input.render(ctx, raw) {
            return Self::fail(&self.shared, status.into());
        }

        let samples = &mut self.samples[..sample_count];
        sample_format::decode_into(self.format.sample_format, raw, samples);
        let energy = sample_format::sum_of_squares(samples);

        self.shared.ring().write(samples);
        self.shared.level().update(energy, sample_count);
        self.shared.stats().record_input(frames);
        Ok(())
    }

    fn fail(shared: &CaptureShared, error: RenderError) -> Result<(), RenderError> {
        shared.stats().record_failure(error);
        Err(error)
    }
}
