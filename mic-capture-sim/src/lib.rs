//! # mic-capture-sim
//!
//! Simulated hardware backend for mic-capture-core.
//!
//! Provides:
//! - `SimulatedBackend` / `SimulatedUnit`: a threaded audio unit that drives
//!   the core's render callbacks once per period
//! - `SimulatedHardware`: counters, output tap and fault injection for the unit
//! - `SimulatedSession`: an audio session with a scriptable record permission
//! - `Signal`: what the simulated microphone captures
//!
//! ## Usage
//! ```ignore
//! use mic_capture_core::{CaptureConfiguration, LifecycleController};
//! use mic_capture_sim::{SimulatedBackend, SimulatedSession};
//!
//! let backend = SimulatedBackend::default();
//! let mut controller = LifecycleController::new(
//!     backend,
//!     SimulatedSession::granted(),
//!     CaptureConfiguration::default(),
//! )?;
//! controller.start_recording()?;
//! ```

pub mod backend;
pub mod session;
pub mod signal;

pub use backend::{Pacing, SimulatedBackend, SimulatedHardware, SimulatedOptions, SimulatedUnit};
pub use session::SimulatedSession;
pub use signal::{Signal, SignalGenerator};
