use std::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crate::models::error::CaptureError;

/// Times a snapshot is retried when the writer laps the copied region.
const SNAPSHOT_ATTEMPTS: usize = 3;

/// Fixed-capacity circular store of normalised samples.
///
/// One writer (the capture callback) and any number of readers. Samples live
/// in atomic slots, so a reader racing the writer sees either the old or the
/// new value of a slot and never a torn one. The writer publishes progress
/// with a single monotonic counter; the write index is that counter modulo
/// the capacity. Before touching any slot the writer also announces how far
/// it is about to write, so a reader can tell which of the slots it copied
/// may already hold newer data.
///
/// Overflow behavior: sliding window. The writer never waits for readers and
/// always overwrites the oldest samples. Readers that need every sample use a
/// [`RingReader`], which detects and reports what it lost.
///
/// `stride` is the number of interleaved channels per frame (1 = mono,
/// 2 = stereo). Capacity is a whole number of frames and writes are whole
/// frames, so the write index always sits on a frame boundary.
#[derive(Debug)]
pub struct RingBuffer {
    slots: Box<[AtomicU32]>,
    stride: usize,
    claimed: AtomicU64,
    written: AtomicU64,
}

impl RingBuffer {
    /// Allocates the storage up front. Nothing allocates after this.
    pub fn new(capacity: usize, stride: usize) -> Result<Self, CaptureError> {
        if capacity == 0 || stride == 0 {
            return Err(CaptureError::ConfigurationFailed(
                "ring capacity and stride must be positive".into(),
            ));
        }
        if capacity % stride != 0 {
            return Err(CaptureError::ConfigurationFailed(format!(
                "ring capacity {capacity} is not a multiple of stride {stride}"
            )));
        }

        let slots = (0..capacity)
            .map(|_| AtomicU32::new(0.0f32.to_bits()))
            .collect();

        Ok(Self {
            slots,
            stride,
            claimed: AtomicU64::new(0),
            written: AtomicU64::new(0),
        })
    }

    /// Mono ring (stride 1).
    pub fn mono(capacity: usize) -> Result<Self, CaptureError> {
        Self::new(capacity, 1)
    }

    /// Append samples at the write cursor, wrapping to 0 past the end.
    ///
    /// Must only be called from the single writer. Never blocks or allocates.
    /// If `samples` is longer than the capacity only the tail survives, which
    /// is what writing them one by one would leave behind.
    pub fn write(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        debug_assert_eq!(samples.len() % self.stride, 0, "partial frame written");

        let capacity = self.slots.len();
        let start = self.written.load(Ordering::Relaxed);
        let end = start + samples.len() as u64;
        let skip = samples.len().saturating_sub(capacity);

        self.claimed.store(end, Ordering::Relaxed);
        fence(Ordering::Release);

        let mut index = ((start + skip as u64) % capacity as u64) as usize;
        for &sample in &samples[skip..] {
            self.slots[index].store(sample.to_bits(), Ordering::Relaxed);
            index += 1;
            if index == capacity {
                index = 0;
            }
        }

        self.written.store(end, Ordering::Release);
    }

    /// The most recent `count` samples, oldest first.
    ///
    /// Slots that were never written read as silence.
    pub fn read_snapshot(&self, count: usize) -> Result<Vec<f32>, CaptureError> {
        self.check_request(count)?;
        let mut out = vec![0.0f32; count];
        let outcome = self.read_latest_into(&mut out)?;
        if !outcome.consistent {
            log::trace!("Snapshot of {} samples lapped by writer at {}", count, outcome.end);
        }
        Ok(out)
    }

    /// Fill `out` with the most recent `out.len()` samples, oldest first.
    ///
    /// Does not claim the slots: the writer may overwrite them mid-copy. The
    /// writer's claim is re-checked afterwards and the copy retried a few
    /// times if the writer lapped it; after that the slightly stale copy is
    /// returned with `consistent` cleared.
    pub fn read_latest_into(&self, out: &mut [f32]) -> Result<SnapshotOutcome, CaptureError> {
        let count = out.len();
        self.check_request(count)?;

        let slack = (self.slots.len() - count) as u64;
        let mut outcome = SnapshotOutcome {
            end: 0,
            consistent: false,
        };
        for _ in 0..SNAPSHOT_ATTEMPTS {
            outcome.end = self.written.load(Ordering::Acquire);
            self.copy_ending_at(outcome.end, out);
            if self.claimed_after_copy() - outcome.end <= slack {
                outcome.consistent = true;
                break;
            }
        }
        Ok(outcome)
    }

    /// The most recent `frames` frames of one channel, oldest first.
    pub fn read_channel_snapshot(
        &self,
        channel: usize,
        frames: usize,
    ) -> Result<Vec<f32>, CaptureError> {
        if channel >= self.stride {
            return Err(CaptureError::ConfigurationFailed(format!(
                "channel {channel} out of range for stride {}",
                self.stride
            )));
        }
        let interleaved = self.read_snapshot(frames.saturating_mul(self.stride))?;
        Ok(interleaved
            .into_iter()
            .skip(channel)
            .step_by(self.stride)
            .collect())
    }

    /// Current write cursor, always in `[0, capacity)`.
    pub fn write_index(&self) -> usize {
        (self.written.load(Ordering::Acquire) % self.slots.len() as u64) as usize
    }

    /// Total samples ever written.
    pub fn total_written(&self) -> u64 {
        self.written.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw slot contents in index order. Test and debugging aid.
    pub fn slots(&self) -> Vec<f32> {
        self.slots
            .iter()
            .map(|slot| f32::from_bits(slot.load(Ordering::Relaxed)))
            .collect()
    }

    /// Furthest position the writer may have touched while we were copying.
    ///
    /// Pairs with the release fence in `write`: if any slot load observed a
    /// newer sample, this load observes that write's claim.
    fn claimed_after_copy(&self) -> u64 {
        fence(Ordering::Acquire);
        self.claimed.load(Ordering::Relaxed)
    }

    fn check_request(&self, count: usize) -> Result<(), CaptureError> {
        if count > self.slots.len() {
            return Err(CaptureError::BufferOverrequest {
                requested: count,
                capacity: self.slots.len(),
            });
        }
        Ok(())
    }

    /// Copy the `out.len()` samples ending just before published position `end`.
    fn copy_ending_at(&self, end: u64, out: &mut [f32]) {
        let capacity = self.slots.len();
        let end_index = (end % capacity as u64) as usize;
        let mut index = (end_index + capacity - out.len()) % capacity;
        for sample in out.iter_mut() {
            *sample = f32::from_bits(self.slots[index].load(Ordering::Relaxed));
            index += 1;
            if index == capacity {
                index = 0;
            }
        }
    }

    /// Copy samples starting at published position `start`.
    fn copy_starting_at(&self, start: u64, out: &mut [f32]) {
        let capacity = self.slots.len();
        let mut index = (start % capacity as u64) as usize;
        for sample in out.iter_mut() {
            *sample = f32::from_bits(self.slots[index].load(Ordering::Relaxed));
            index += 1;
            if index == capacity {
                index = 0;
            }
        }
    }
}

/// Result of one [`RingBuffer::read_latest_into`] copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotOutcome {
    /// Published sample count the copy ends at.
    pub end: u64,
    /// False when every attempt was lapped by the writer. The copy may then
    /// mix samples from both sides of `end`.
    pub consistent: bool,
}

/// Result of one [`RingReader`] read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadOutcome {
    /// Samples copied into the output.
    pub copied: usize,
    /// Samples overwritten by the writer before this reader got to them.
    pub overrun: u64,
}

/// Index-tracking consumer of a [`RingBuffer`].
///
/// Remembers how far it has read in the writer's monotonic sample count and
/// hands out only samples it has not seen. When the writer laps it, the lost
/// samples are skipped and reported as overrun; the writer is never held back.
#[derive(Debug, Clone)]
pub struct RingReader {
    ring: Arc<RingBuffer>,
    position: u64,
}

impl RingReader {
    /// Starts at the current write position, so only future samples are read.
    pub fn new(ring: Arc<RingBuffer>) -> Self {
        let position = ring.total_written();
        Self { ring, position }
    }

    /// Starts at the oldest sample still held in the ring.
    pub fn from_oldest(ring: Arc<RingBuffer>) -> Self {
        let position = ring
            .total_written()
            .saturating_sub(ring.capacity() as u64);
        Self { ring, position }
    }

    /// Samples written since the last read, capped at the ring capacity.
    pub fn available(&self) -> usize {
        let pending = self.ring.total_written().saturating_sub(self.position);
        pending.min(self.ring.capacity() as u64) as usize
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Copy unread samples into `out`, whole frames only.
    ///
    /// Allocation-free and lock-free, so it can run on the audio thread.
    pub fn read_into(&mut self, out: &mut [f32]) -> ReadOutcome {
        let capacity = self.ring.capacity() as u64;
        let stride = self.ring.stride();
        let mut overrun = 0;

        let end = self.ring.written.load(Ordering::Acquire);
        if end - self.position > capacity {
            overrun = end - self.position - capacity;
            self.position = end - capacity;
        }

        let pending = (end - self.position) as usize;
        let mut copied = pending.min(out.len());
        copied -= copied % stride;
        self.ring.copy_starting_at(self.position, &mut out[..copied]);

        // Anything the writer reached during the copy is newer data, not ours.
        let safe_from = self.ring.claimed_after_copy().saturating_sub(capacity);
        if safe_from > self.position {
            let lost = ((safe_from - self.position) as usize).min(copied);
            let lost = lost.next_multiple_of(stride).min(copied);
            out.copy_within(lost..copied, 0);
            copied -= lost;
            overrun += lost as u64;
            self.position += lost as u64;
        }

        self.position += copied as u64;
        ReadOutcome { copied, overrun }
    }

    /// Read everything unread into a new vector.
    pub fn read_available(&mut self) -> (Vec<f32>, ReadOutcome) {
        let mut out = vec![0.0f32; self.ring.capacity()];
        let outcome = self.read_into(&mut out);
        out.truncate(outcome.copied);
        (out, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(range: std::ops::RangeInclusive<u32>) -> Vec<f32> {
        range.map(|v| v as f32).collect()
    }

    #[test]
    fn snapshot_returns_last_written_in_order() {
        let ring = RingBuffer::mono(16).unwrap();
        ring.write(&[1.0, 2.0, 3.0]);
        ring.write(&[4.0, 5.0]);

        assert_eq!(ring.read_snapshot(5).unwrap(), ramp(1..=5));
        assert_eq!(ring.read_snapshot(2).unwrap(), vec![4.0, 5.0]);
        assert!(ring.read_snapshot(0).unwrap().is_empty());
    }

    #[test]
    fn single_sample_writes_wrap_oldest_first() {
        let ring = RingBuffer::mono(8).unwrap();
        for value in 1..=10 {
            ring.write(&[value as f32]);
        }

        assert_eq!(ring.slots(), vec![9.0, 10.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(ring.write_index(), 2);
        assert_eq!(ring.read_snapshot(8).unwrap(), ramp(3..=10));
    }

    #[test]
    fn wraparound_keeps_last_capacity_samples() {
        let ring = RingBuffer::mono(8).unwrap();
        ring.write(&ramp(1..=8));
        ring.write(&ramp(9..=11));

        assert_eq!(ring.write_index(), 3);
        assert_eq!(ring.total_written(), 11);
        assert_eq!(ring.read_snapshot(8).unwrap(), ramp(4..=11));
    }

    #[test]
    fn oversized_write_keeps_tail_at_correct_index() {
        let ring = RingBuffer::mono(4).unwrap();
        ring.write(&ramp(1..=6));

        assert_eq!(ring.write_index(), 2);
        assert_eq!(ring.slots(), vec![5.0, 6.0, 3.0, 4.0]);
        assert_eq!(ring.read_snapshot(4).unwrap(), ramp(3..=6));
    }

    #[test]
    fn overrequest_is_rejected_without_side_effects() {
        let ring = RingBuffer::mono(4).unwrap();
        ring.write(&[1.0, 2.0]);

        let err = ring.read_snapshot(5).unwrap_err();
        assert_eq!(
            err,
            CaptureError::BufferOverrequest {
                requested: 5,
                capacity: 4
            }
        );
        assert_eq!(ring.write_index(), 2);
        assert_eq!(ring.slots(), vec![1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn unwritten_slots_read_as_silence() {
        let ring = RingBuffer::mono(4).unwrap();
        ring.write(&[7.0]);
        assert_eq!(ring.read_snapshot(3).unwrap(), vec![0.0, 0.0, 7.0]);
    }

    #[test]
    fn stride_must_divide_capacity() {
        assert!(RingBuffer::new(7, 2).is_err());
        assert!(RingBuffer::new(0, 1).is_err());
        assert!(RingBuffer::new(8, 0).is_err());
    }

    #[test]
    fn stereo_channel_snapshot() {
        let ring = RingBuffer::new(8, 2).unwrap();
        ring.write(&[0.1, -0.1, 0.2, -0.2, 0.3, -0.3]);

        assert_eq!(ring.read_channel_snapshot(0, 2).unwrap(), vec![0.2, 0.3]);
        assert_eq!(ring.read_channel_snapshot(1, 3).unwrap(), vec![-0.1, -0.2, -0.3]);
        assert!(ring.read_channel_snapshot(2, 1).is_err());
        assert!(ring.read_channel_snapshot(0, 5).is_err());
    }

    #[test]
    fn reader_sees_only_new_samples() {
        let ring = Arc::new(RingBuffer::mono(8).unwrap());
        ring.write(&[1.0, 2.0]);

        let mut reader = RingReader::new(Arc::clone(&ring));
        assert_eq!(reader.available(), 0);

        ring.write(&[3.0, 4.0, 5.0]);
        let (samples, outcome) = reader.read_available();
        assert_eq!(samples, vec![3.0, 4.0, 5.0]);
        assert_eq!(outcome.overrun, 0);
        assert_eq!(reader.available(), 0);
    }

    #[test]
    fn reader_partial_reads_continue_where_they_left_off() {
        let ring = Arc::new(RingBuffer::mono(8).unwrap());
        let mut reader = RingReader::new(Arc::clone(&ring));
        ring.write(&ramp(1..=5));

        let mut out = [0.0f32; 3];
        assert_eq!(reader.read_into(&mut out).copied, 3);
        assert_eq!(out, [1.0, 2.0, 3.0]);

        let (rest, _) = reader.read_available();
        assert_eq!(rest, vec![4.0, 5.0]);
    }

    #[test]
    fn reader_reports_overrun_when_lapped() {
        let ring = Arc::new(RingBuffer::mono(4).unwrap());
        let mut reader = RingReader::new(Arc::clone(&ring));
        ring.write(&ramp(1..=6));

        let (samples, outcome) = reader.read_available();
        assert_eq!(samples, ramp(3..=6));
        assert_eq!(outcome.overrun, 2);
        assert_eq!(reader.position(), 6);
    }

    #[test]
    fn reader_from_oldest_and_whole_frames() {
        let ring = Arc::new(RingBuffer::new(6, 2).unwrap());
        ring.write(&[1.0, 1.5, 2.0, 2.5]);

        let mut reader = RingReader::from_oldest(Arc::clone(&ring));
        let mut out = [0.0f32; 3];
        let outcome = reader.read_into(&mut out);

        assert_eq!(outcome.copied, 2);
        assert_eq!(&out[..2], &[1.0, 1.5]);
        assert_eq!(reader.available(), 2);
    }

    #[test]
    fn concurrent_reader_never_sees_torn_frames() {
        let ring = Arc::new(RingBuffer::new(64, 2).unwrap());
        let writer_ring = Arc::clone(&ring);

        let writer = std::thread::spawn(move || {
            for n in 1..=20_000u32 {
                let v = n as f32;
                writer_ring.write(&[v, -v]);
            }
        });

        let mut reader = RingReader::new(Arc::clone(&ring));
        let mut out = [0.0f32; 32];
        let mut last = 0.0f32;
        while !writer.is_finished() || reader.available() > 0 {
            let outcome = reader.read_into(&mut out);
            for frame in out[..outcome.copied].chunks_exact(2) {
                assert_eq!(frame[0], -frame[1]);
                assert!(frame[0] > last);
                last = frame[0];
            }
        }
        writer.join().unwrap();
    }

    #[test]
    fn concurrent_snapshot_holds_whole_frames_in_order() {
        let ring = Arc::new(RingBuffer::new(64, 2).unwrap());
        let writer_ring = Arc::clone(&ring);

        let writer = std::thread::spawn(move || {
            for n in 1..=50_000u32 {
                let v = n as f32;
                writer_ring.write(&[v, -v]);
            }
        });

        // Sample at published position p belongs to frame p / 2 + 1.
        let expected_at = |position: i64| -> f32 {
            if position < 0 {
                return 0.0;
            }
            let v = (position / 2 + 1) as f32;
            if position % 2 == 0 {
                v
            } else {
                -v
            }
        };

        let mut out = [0.0f32; 60];
        let mut last_end = 0u64;
        while !writer.is_finished() {
            let outcome = ring.read_latest_into(&mut out).unwrap();
            assert_eq!(outcome.end % 2, 0);
            assert!(outcome.end >= last_end);
            last_end = outcome.end;
            if !outcome.consistent {
                continue;
            }

            let first = outcome.end as i64 - out.len() as i64;
            for (offset, frame) in out.chunks_exact(2).enumerate() {
                let position = first + 2 * offset as i64;
                assert_eq!(frame[0], expected_at(position));
                assert_eq!(frame[1], expected_at(position + 1));
            }
        }
        writer.join().unwrap();

        // A final read with the writer idle always passes the re-check.
        let outcome = ring.read_latest_into(&mut out).unwrap();
        assert!(outcome.consistent);
        assert_eq!(outcome.end, 100_000);
        assert_eq!(out[58..], [50_000.0, -50_000.0]);
    }
}
