//! # mic-capture-core
//!
//! Real-time microphone capture core.
//!
//! A hardware audio layer invokes the core's render callbacks on its
//! real-time thread once per audio period. The core converts the raw input to
//! normalised `f32`, appends it to a lock-free ring and updates a smoothed
//! level, all without allocating, locking or blocking. Consumers on other
//! threads read the level and snapshots of the ring. A lifecycle controller
//! on the control thread owns the hardware unit and drives
//! start/stop/interruption transitions.
//!
//! Platform backends implement `HardwareBackend` + `HardwareUnit` and
//! `AudioSession` and plug into the generic `LifecycleController`.
//!
//! ## Architecture
//!
//! ```text
//! mic-capture-core (this crate)
//! ├── traits/       ← HardwareBackend, HardwareUnit, RenderCallbacks, AudioSession, CaptureDelegate
//! ├── models/       ← CaptureError, RenderError, RecordingState, CaptureConfiguration, RenderContext
//! ├── processing/   ← RingBuffer, RingReader, LevelEstimator, sample format conversion
//! ├── render/       ← CaptureHandler, PlaybackHandler (audio thread)
//! └── session/      ← LifecycleController, CaptureMonitor (control/consumer threads)
//! ```

pub mod models;
pub mod processing;
pub mod render;
pub mod session;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types at crate root for convenience.
pub use models::audio_models::{
    AudioTimestamp, InterruptionEvent, RecordPermission, RenderContext, RenderDiagnostics,
    INPUT_BUS, OUTPUT_BUS,
};
pub use models::config::{AudioFormatDescriptor, CaptureConfiguration, PlaybackSource, SampleFormat};
pub use models::error::{CaptureError, HardwareStatus, RenderError};
pub use models::state::RecordingState;
pub use processing::level::LevelEstimator;
pub use processing::ring_buffer::{ReadOutcome, RingBuffer, RingReader, SnapshotOutcome};
pub use render::playback::PlaybackFeeder;
pub use session::controller::LifecycleController;
pub use session::monitor::CaptureMonitor;
pub use traits::audio_session::AudioSession;
pub use traits::capture_delegate::CaptureDelegate;
pub use traits::hardware::{HardwareBackend, HardwareUnit, InputRender, RenderCallbacks};
