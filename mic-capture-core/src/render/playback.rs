use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};

use crate::models::audio_models::RenderContext;
use crate::models::config::AudioFormatDescriptor;
use crate::models::error::RenderError;
use crate::processing::ring_buffer::RingReader;
use crate::processing::sample_format;

use super::CaptureShared;

struct QueueShared {
    demand: AtomicU64,
    /// Consumer waiting for the next unit. Touched only on the control thread.
    parked: Mutex<Option<HeapCons<f32>>>,
}

/// Controller-side handle to the playback queue.
///
/// Owns the consumer between units. Each new unit takes it with
/// [`PlaybackQueue::attach`]; when that unit's callbacks are dropped the
/// consumer is parked here again for the next one.
pub struct PlaybackQueue {
    shared: Arc<QueueShared>,
}

impl PlaybackQueue {
    /// Create the queue and the producer handle for the non-real-time side.
    pub fn with_capacity(capacity: usize) -> (Self, PlaybackFeeder) {
        let (producer, consumer) = HeapRb::<f32>::new(capacity).split();
        let shared = Arc::new(QueueShared {
            demand: AtomicU64::new(0),
            parked: Mutex::new(Some(consumer)),
        });
        let feeder = PlaybackFeeder {
            producer,
            shared: Arc::clone(&shared),
        };
        (Self { shared }, feeder)
    }

    /// Hand the consumer to a new output callback. `None` while a previous
    /// unit's callbacks still hold it.
    pub fn attach(&self) -> Option<QueueSource> {
        let consumer = self.shared.parked.lock().take()?;
        Some(QueueSource {
            consumer: Some(consumer),
            shared: Arc::clone(&self.shared),
        })
    }
}

/// Consumer half of the playback queue, owned by one output callback.
///
/// Reads never lock. Dropping the source parks the consumer back in its
/// [`PlaybackQueue`].
pub struct QueueSource {
    consumer: Option<HeapCons<f32>>,
    shared: Arc<QueueShared>,
}

impl QueueSource {
    /// Pop up to `out.len()` samples and record the request as demand.
    fn pop_into(&mut self, out: &mut [f32]) -> usize {
        self.shared
            .demand
            .fetch_add(out.len() as u64, Ordering::Relaxed);
        match self.consumer.as_mut() {
            Some(consumer) => consumer.pop_slice(out),
            None => 0,
        }
    }
}

impl Drop for QueueSource {
    fn drop(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            *self.shared.parked.lock() = Some(consumer);
        }
    }
}

/// Producer side of the playback queue, driven from a normal-priority thread.
///
/// The output callback never waits on the feeder. It records how many samples
/// it wanted in an atomic counter; the feeder polls that with
/// [`PlaybackFeeder::take_demand`] and refills at its own pace.
pub struct PlaybackFeeder {
    producer: HeapProd<f32>,
    shared: Arc<QueueShared>,
}

impl PlaybackFeeder {
    /// Queue interleaved samples. Returns how many fit.
    pub fn push(&mut self, samples: &[f32]) -> usize {
        self.producer.push_slice(samples)
    }

    /// Samples queued and not yet played.
    pub fn queued(&self) -> usize {
        self.producer.occupied_len()
    }

    /// Free space in the queue, in samples.
    pub fn vacant(&self) -> usize {
        self.producer.vacant_len()
    }

    /// Samples requested by the output callback since the last call.
    pub fn take_demand(&self) -> u64 {
        self.shared.demand.swap(0, Ordering::Relaxed)
    }
}

/// Where an output period gets its samples.
pub enum OutputSource {
    Silence,
    Monitor(RingReader),
    Queue(QueueSource),
}

/// Output-bus callback.
///
/// Fills every requested frame. Whatever the source cannot supply is silence,
/// and a shortfall from a real source counts as an underrun. A stopped unit
/// outputs silence without touching its source.
pub struct PlaybackHandler {
    format: AudioFormatDescriptor,
    source: OutputSource,
    samples: Box<[f32]>,
    shared: Arc<CaptureShared>,
}

impl PlaybackHandler {
    pub fn new(
        format: AudioFormatDescriptor,
        max_frames_per_period: usize,
        source: OutputSource,
        shared: Arc<CaptureShared>,
    ) -> Self {
        let channels = format.channels as usize;
        Self {
            format,
            source,
            samples: vec![0.0f32; max_frames_per_period * channels].into_boxed_slice(),
            shared,
        }
    }

    pub fn on_output(&mut self, ctx: &RenderContext, output: &mut [u8]) -> Result<(), RenderError> {
        let frames = ctx.frame_count as usize;
        let sample_count = frames * self.format.channels as usize;
        if frames == 0 || sample_count > self.samples.len() {
            return Self::fail(&self.shared, RenderError::InvalidBuffer);
        }
        let byte_count = frames * self.format.frame_size();
        if output.len() < byte_count {
            return Self::fail(&self.shared, RenderError::FormatMismatch);
        }

        let samples = &mut self.samples[..sample_count];
        if self.shared.is_running() {
            let filled = match &mut self.source {
                OutputSource::Silence => {
                    samples.fill(0.0);
                    sample_count
                }
                OutputSource::Monitor(reader) => reader.read_into(samples).copied,
                OutputSource::Queue(queue) => queue.pop_into(samples),
            };
            samples[filled..].fill(0.0);
            if filled < sample_count {
                self.shared.stats().record_underrun();
            }
        } else {
            samples.fill(0.0);
        }

        sample_format::encode_into(self.format.sample_format, samples, &mut output[..byte_count]);
        self.shared.stats().record_output();
        Ok(())
    }

    fn fail(shared: &CaptureShared, error: RenderError) -> Result<(), RenderError> {
        shared.stats().record_failure(error);
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::audio_models::AudioTimestamp;
    use crate::models::config::SampleFormat;
    use crate::processing::ring_buffer::RingBuffer;

    fn shared() -> Arc<CaptureShared> {
        let shared = Arc::new(CaptureShared::new(RingBuffer::mono(32).unwrap()));
        shared.set_running(true);
        shared
    }

    fn format() -> AudioFormatDescriptor {
        AudioFormatDescriptor::new(48000.0, 1, SampleFormat::F32)
    }

    fn ctx(frames: u32) -> RenderContext {
        RenderContext::output(AudioTimestamp::default(), frames)
    }

    fn decode(bytes: &[u8]) -> Vec<f32> {
        let mut out = vec![0.0f32; bytes.len() / 4];
        sample_format::decode_into(SampleFormat::F32, bytes, &mut out);
        out
    }

    #[test]
    fn silence_source_zeroes_output() {
        let shared = shared();
        let mut playback = PlaybackHandler::new(format(), 8, OutputSource::Silence, Arc::clone(&shared));
        let mut out = [0xAAu8; 16];

        playback.on_output(&ctx(4), &mut out).unwrap();

        assert_eq!(decode(&out), vec![0.0; 4]);
        assert_eq!(shared.stats().snapshot().playback_underruns, 0);
        assert_eq!(shared.stats().snapshot().output_periods, 1);
    }

    #[test]
    fn monitor_plays_back_captured_samples() {
        let shared = shared();
        let reader = RingReader::new(Arc::clone(shared.ring()));
        let mut playback =
            PlaybackHandler::new(format(), 8, OutputSource::Monitor(reader), Arc::clone(&shared));

        shared.ring().write(&[0.1, 0.2, 0.3]);
        let mut out = [0u8; 16];
        playback.on_output(&ctx(4), &mut out).unwrap();

        assert_eq!(decode(&out), vec![0.1, 0.2, 0.3, 0.0]);
        assert_eq!(shared.stats().snapshot().playback_underruns, 1);
    }

    #[test]
    fn queue_drains_and_reports_demand() {
        let shared = shared();
        let (queue, mut feeder) = PlaybackQueue::with_capacity(16);
        let source = OutputSource::Queue(queue.attach().unwrap());
        let mut playback = PlaybackHandler::new(format(), 8, source, Arc::clone(&shared));

        assert_eq!(feeder.push(&[0.5, -0.5, 0.25, -0.25, 0.125]), 5);
        let mut out = [0u8; 16];
        playback.on_output(&ctx(4), &mut out).unwrap();

        assert_eq!(decode(&out), vec![0.5, -0.5, 0.25, -0.25]);
        assert_eq!(feeder.queued(), 1);
        assert_eq!(feeder.vacant(), 15);
        assert_eq!(feeder.take_demand(), 4);
        assert_eq!(feeder.take_demand(), 0);
        assert_eq!(shared.stats().snapshot().playback_underruns, 0);
    }

    #[test]
    fn stopped_unit_outputs_silence() {
        let shared = shared();
        let (queue, mut feeder) = PlaybackQueue::with_capacity(8);
        let source = OutputSource::Queue(queue.attach().unwrap());
        let mut playback = PlaybackHandler::new(format(), 8, source, Arc::clone(&shared));
        feeder.push(&[0.9; 4]);

        shared.set_running(false);
        let mut out = [0u8; 8];
        playback.on_output(&ctx(2), &mut out).unwrap();

        assert_eq!(decode(&out), vec![0.0, 0.0]);
        assert_eq!(feeder.queued(), 4);
        assert_eq!(feeder.take_demand(), 0);
        assert_eq!(shared.stats().snapshot().playback_underruns, 0);
    }

    #[test]
    fn stopped_monitor_counts_no_underruns() {
        let shared = shared();
        let reader = RingReader::new(Arc::clone(shared.ring()));
        let mut playback =
            PlaybackHandler::new(format(), 8, OutputSource::Monitor(reader), Arc::clone(&shared));

        shared.set_running(false);
        for _ in 0..3 {
            playback.on_output(&ctx(4), &mut [0u8; 16]).unwrap();
        }

        let stats = shared.stats().snapshot();
        assert_eq!(stats.output_periods, 3);
        assert_eq!(stats.playback_underruns, 0);
    }

    #[test]
    fn dropped_handler_parks_consumer_for_next_unit() {
        let shared = shared();
        let (queue, mut feeder) = PlaybackQueue::with_capacity(8);
        let first = queue.attach().unwrap();
        assert!(queue.attach().is_none());

        let playback =
            PlaybackHandler::new(format(), 8, OutputSource::Queue(first), Arc::clone(&shared));
        feeder.push(&[0.5, 0.25]);
        drop(playback);

        let mut playback = PlaybackHandler::new(
            format(),
            8,
            OutputSource::Queue(queue.attach().unwrap()),
            Arc::clone(&shared),
        );
        let mut out = [0u8; 8];
        playback.on_output(&ctx(2), &mut out).unwrap();

        assert_eq!(decode(&out), vec![0.5, 0.25]);
        assert_eq!(feeder.queued(), 0);
    }

    #[test]
    fn short_output_buffer_is_a_format_mismatch() {
        let shared = shared();
        let mut playback = PlaybackHandler::new(format(), 8, OutputSource::Silence, Arc::clone(&shared));
        let mut out = [0u8; 7];

        assert_eq!(playback.on_output(&ctx(2), &mut out), Err(RenderError::FormatMismatch));
        assert_eq!(playback.on_output(&ctx(9), &mut [0u8; 64]), Err(RenderError::InvalidBuffer));
        assert_eq!(shared.stats().snapshot().render_failures, 2);
    }
}
