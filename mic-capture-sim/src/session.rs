//! Simulated audio session with a scriptable record permission.
//!
//! Stands in for the platform's microphone privacy prompt and
//! play-and-record session. The host can flip the permission or make the
//! next activation fail through a clone kept outside the controller.

use std::sync::Arc;

use parking_lot::Mutex;

use mic_capture_core::{AudioSession, CaptureError, RecordPermission};

#[derive(Debug)]
struct SessionState {
    permission: RecordPermission,
    grant_on_request: bool,
    active: bool,
    fail_next_activation: bool,
}

/// [`AudioSession`] backed by in-memory state. Clones share that state.
#[derive(Debug, Clone)]
pub struct SimulatedSession {
    state: Arc<Mutex<SessionState>>,
}

impl SimulatedSession {
    /// Session whose permission starts as `permission`. An undetermined
    /// permission resolves to `grant_on_request` when the controller asks.
    pub fn new(permission: RecordPermission, grant_on_request: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                permission,
                grant_on_request,
                active: false,
                fail_next_activation: false,
            })),
        }
    }

    pub fn granted() -> Self {
        Self::new(RecordPermission::Granted, true)
    }

    pub fn set_permission(&self, permission: RecordPermission) {
        self.state.lock().permission = permission;
    }

    pub fn fail_next_activation(&self) {
        self.state.lock().fail_next_activation = true;
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }
}

impl Default for SimulatedSession {
    fn default() -> Self {
        Self::granted()
    }
}

impl AudioSession for SimulatedSession {
    fn record_permission(&self) -> RecordPermission {
        self.state.lock().permission
    }

    fn request_record_permission(&mut self) -> bool {
        let mut state = self.state.lock();
        let granted = state.grant_on_request;
        state.permission = if granted {
            RecordPermission::Granted
        } else {
            RecordPermission::Denied
        };
        log::info!("Simulated record permission prompt answered: {}", granted);
        granted
    }

    fn activate(&mut self) -> Result<(), CaptureError> {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.fail_next_activation) {
            return Err(CaptureError::SessionActivationFailed(
                "simulated session refused play-and-record".into(),
            ));
        }
        state.active = true;
        Ok(())
    }

    fn deactivate(&mut self) -> Result<(), CaptureError> {
        self.state.lock().active = false;
        Ok(())
    }
}
