use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use mic_capture_core::{
    CaptureDelegate, CaptureError, LifecycleController, RecordingState, RenderDiagnostics,
};
use mic_capture_sim::{SimulatedBackend, SimulatedHardware, SimulatedSession};

pub type Controller = LifecycleController<SimulatedBackend, SimulatedSession>;

/// Host state holding the controller behind the one control-side mutex.
pub struct AudioState {
    pub controller: Mutex<Option<Controller>>,
    pub hardware: Mutex<Option<SimulatedHardware>>,
}

impl AudioState {
    pub fn new() -> Self {
        Self {
            controller: Mutex::new(None),
            hardware: Mutex::new(None),
        }
    }
}

/// CaptureDelegate that prints events as JSON lines on stdout.
pub struct ConsoleDelegate;

impl ConsoleDelegate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self)
    }

    fn emit<T: Serialize>(event: &str, payload: T) {
        match serde_json::to_string(&Event { event, payload }) {
            Ok(line) => println!("{}", line),
            Err(e) => log::warn!("Failed to serialize {} event: {}", event, e),
        }
    }
}

// -- Event payloads --

#[derive(Serialize)]
struct Event<'a, T> {
    event: &'a str,
    payload: T,
}

#[derive(Clone, Serialize)]
struct StateChangedPayload {
    state: &'static str,
}

#[derive(Clone, Serialize)]
struct ErrorPayload {
    message: String,
}

#[derive(Clone, Serialize)]
pub struct LevelPayload {
    pub level: f32,
    pub total_written: u64,
}

impl CaptureDelegate for ConsoleDelegate {
    fn on_state_changed(&self, state: RecordingState) {
        Self::emit(
            "audio://state-changed",
            StateChangedPayload {
                state: state.as_str(),
            },
        );
    }

    fn on_error(&self, error: &CaptureError) {
        Self::emit(
            "audio://error",
            ErrorPayload {
                message: error.to_string(),
            },
        );
    }
}

pub fn emit_level(level: LevelPayload) {
    ConsoleDelegate::emit("audio://level", level);
}

/// Serializable diagnostics snapshot, core counters plus the simulated
/// hardware's own view.
#[derive(Clone, Serialize)]
pub struct DiagnosticsInfo {
    pub state: &'static str,
    pub render: RenderDiagnostics,
    pub hardware_periods: u64,
    pub units_created: usize,
    pub live_units: usize,
}

impl DiagnosticsInfo {
    pub fn new(
        state: RecordingState,
        render: RenderDiagnostics,
        hardware: &SimulatedHardware,
    ) -> Self {
        Self {
            state: state.as_str(),
            render,
            hardware_periods: hardware.periods(),
            units_created: hardware.units_created(),
            live_units: hardware.live_units(),
        }
    }
}
