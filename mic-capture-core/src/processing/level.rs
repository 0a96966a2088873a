use std::sync::atomic::{AtomicU32, Ordering};

/// Weight of the newest period in the smoothed level.
pub const SMOOTHING: f32 = 0.2;

const LOG_OFFSET: f32 = 20.0;
const LOG_SCALE: f32 = 5.0;

/// Exponentially smoothed logarithmic loudness meter.
///
/// Written once per period by the capture callback, read from anywhere.
/// Last writer wins; a reader may see a value one period stale.
#[derive(Debug)]
pub struct LevelEstimator {
    level: AtomicU32,
}

impl LevelEstimator {
    pub fn new() -> Self {
        Self::with_level(0.0)
    }

    pub fn with_level(level: f32) -> Self {
        Self {
            level: AtomicU32::new(level.to_bits()),
        }
    }

    /// Fold one period's energy into the level.
    ///
    /// `raw = 5 * (ln(sum / count) + 20)`, then
    /// `level = 0.2 * raw + 0.8 * level`. A silent or empty period leaves the
    /// level untouched.
    pub fn update(&self, sum_squares: f32, sample_count: usize) {
        if sum_squares.is_nan() || sum_squares <= 0.0 || sample_count == 0 {
            return;
        }
        let Some(raw) = Self::raw_level(sum_squares, sample_count) else {
            return;
        };

        let previous = self.current_level();
        let smoothed = SMOOTHING * raw + (1.0 - SMOOTHING) * previous;
        self.level.store(smoothed.to_bits(), Ordering::Relaxed);
    }

    /// Unsmoothed level of one period, `None` when it would not be finite.
    pub fn raw_level(sum_squares: f32, sample_count: usize) -> Option<f32> {
        if sample_count == 0 {
            return None;
        }
        let raw = LOG_SCALE * ((sum_squares / sample_count as f32).ln() + LOG_OFFSET);
        raw.is_finite().then_some(raw)
    }

    pub fn current_level(&self) -> f32 {
        f32::from_bits(self.level.load(Ordering::Relaxed))
    }
}

impl Default for LevelEstimator {
    fn default() -> Self {
        Self::new()
    }
}
