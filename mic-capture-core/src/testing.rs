//! Recording test doubles for the hardware and session traits.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::audio_models::{RecordPermission, RenderContext};
use crate::models::config::AudioFormatDescriptor;
use crate::models::error::{CaptureError, HardwareStatus};
use crate::traits::audio_session::AudioSession;
use crate::traits::hardware::{HardwareBackend, HardwareUnit, InputRender, RenderCallbacks};

/// One call into the mock hardware, tagged with the unit number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitCall {
    Create(usize),
    Initialize(usize),
    Start(usize),
    Stop(usize),
    Uninitialize(usize),
    Dispose(usize),
}

#[derive(Default)]
struct BackendState {
    calls: Vec<UnitCall>,
    next_id: usize,
    live: usize,
    fail_initialize: Option<i32>,
    fail_start: Option<i32>,
    fail_stop: Option<i32>,
    // Kept past dispose so tests can deliver a straggling callback.
    callbacks: Option<Box<dyn RenderCallbacks>>,
}

/// Backend that logs every unit call. Clones share the log.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<BackendState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<UnitCall> {
        self.state.lock().calls.clone()
    }

    /// Units created and not yet disposed.
    pub fn live_units(&self) -> usize {
        self.state.lock().live
    }

    pub fn fail_initialize(&self, status: i32) {
        self.state.lock().fail_initialize = Some(status);
    }

    pub fn fail_start(&self, status: i32) {
        self.state.lock().fail_start = Some(status);
    }

    pub fn fail_stop(&self, status: i32) {
        self.state.lock().fail_stop = Some(status);
    }

    /// Invoke the most recently registered callbacks, as the audio thread would.
    pub fn with_callbacks<R>(&self, f: impl FnOnce(&mut dyn RenderCallbacks) -> R) -> R {
        let mut state = self.state.lock();
        let callbacks = state
            .callbacks
            .as_mut()
            .expect("no unit has been created");
        f(callbacks.as_mut())
    }
}

impl HardwareBackend for MockBackend {
    type Unit = MockUnit;

    fn create_unit(
        &mut self,
        _format: &AudioFormatDescriptor,
        _max_frames_per_period: usize,
        callbacks: Box<dyn RenderCallbacks>,
    ) -> Result<MockUnit, HardwareStatus> {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.live += 1;
        state.calls.push(UnitCall::Create(id));
        state.callbacks = Some(callbacks);
        Ok(MockUnit {
            id,
            state: Arc::clone(&self.state),
        })
    }
}

pub struct MockUnit {
    id: usize,
    state: Arc<Mutex<BackendState>>,
}

impl MockUnit {
    fn call(&self, call: UnitCall, failure: impl FnOnce(&mut BackendState) -> Option<i32>) -> Result<(), HardwareStatus> {
        let mut state = self.state.lock();
        state.calls.push(call);
        match failure(&mut state) {
            Some(code) => Err(HardwareStatus(code)),
            None => Ok(()),
        }
    }
}

impl HardwareUnit for MockUnit {
    fn initialize(&mut self) -> Result<(), HardwareStatus> {
        self.call(UnitCall::Initialize(self.id), |s| s.fail_initialize.take())
    }

    fn start(&mut self) -> Result<(), HardwareStatus> {
        self.call(UnitCall::Start(self.id), |s| s.fail_start.take())
    }

    fn stop(&mut self) -> Result<(), HardwareStatus> {
        self.call(UnitCall::Stop(self.id), |s| s.fail_stop.take())
    }

    fn uninitialize(&mut self) -> Result<(), HardwareStatus> {
        self.call(UnitCall::Uninitialize(self.id), |_| None)
    }

    fn dispose(self) -> Result<(), HardwareStatus> {
        let mut state = self.state.lock();
        state.live -= 1;
        state.calls.push(UnitCall::Dispose(self.id));
        Ok(())
    }
}

#[derive(Debug)]
struct SessionState {
    permission: RecordPermission,
    grant_on_request: bool,
    permission_requests: usize,
    activations: usize,
    deactivations: usize,
    fail_activation: bool,
}

/// Session double with scripted permission. Clones share counters.
#[derive(Debug, Clone)]
pub struct MockSession {
    state: Arc<Mutex<SessionState>>,
}

impl MockSession {
    fn with_permission(permission: RecordPermission, grant_on_request: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                permission,
                grant_on_request,
                permission_requests: 0,
                activations: 0,
                deactivations: 0,
                fail_activation: false,
            })),
        }
    }

    pub fn granted() -> Self {
        Self::with_permission(RecordPermission::Granted, true)
    }

    pub fn denied() -> Self {
        Self::with_permission(RecordPermission::Denied, false)
    }

    pub fn undetermined(grant_on_request: bool) -> Self {
        Self::with_permission(RecordPermission::Undetermined, grant_on_request)
    }

    pub fn fail_activation(&self) {
        self.state.lock().fail_activation = true;
    }

    pub fn activations(&self) -> usize {
        self.state.lock().activations
    }

    pub fn deactivations(&self) -> usize {
        self.state.lock().deactivations
    }

    pub fn permission_requests(&self) -> usize {
        self.state.lock().permission_requests
    }
}

impl AudioSession for MockSession {
    fn record_permission(&self) -> RecordPermission {
        self.state.lock().permission
    }

    fn request_record_permission(&mut self) -> bool {
        let mut state = self.state.lock();
        state.permission_requests += 1;
        state.permission = if state.grant_on_request {
            RecordPermission::Granted
        } else {
            RecordPermission::Denied
        };
        state.grant_on_request
    }

    fn activate(&mut self) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if state.fail_activation {
            return Err(CaptureError::SessionActivationFailed("category rejected".into()));
        }
        state.activations += 1;
        Ok(())
    }

    fn deactivate(&mut self) -> Result<(), CaptureError> {
        self.state.lock().deactivations += 1;
        Ok(())
    }
}

/// Input that renders a constant 16-bit level, or fails with a status.
pub struct ToneInput {
    amplitude: f32,
    status: Option<i32>,
}

impl ToneInput {
    pub fn new(amplitude: f32) -> Self {
        Self {
            amplitude,
            status: None,
        }
    }

    pub fn failing(status: i32) -> Self {
        Self {
            amplitude: 0.0,
            status: Some(status),
        }
    }
}

impl InputRender for ToneInput {
    fn render(&mut self, _ctx: &RenderContext, dest: &mut [u8]) -> Result<(), HardwareStatus> {
        if let Some(code) = self.status {
            return Err(HardwareStatus(code));
        }
        let value = (self.amplitude * i16::MAX as f32) as i16;
        for bytes in dest.chunks_exact_mut(2) {
            bytes.copy_from_slice(&value.to_le_bytes());
        }
        Ok(())
    }
}
