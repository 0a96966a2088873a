use crate::models::error::CaptureError;
use crate::models::state::RecordingState;

/// Event delegate for lifecycle notifications.
///
/// All methods are called on the control thread that drove the transition,
/// never on the audio thread. Implementations should marshal to the UI
/// thread if needed.
pub trait CaptureDelegate: Send + Sync {
    /// Called after every state transition.
    fn on_state_changed(&self, state: RecordingState);

    /// Called when a control operation or a render health check fails.
    fn on_error(&self, error: &CaptureError);
}
