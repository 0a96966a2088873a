use crate::models::audio_models::RecordPermission;
use crate::models::error::CaptureError;

/// Process-wide audio session: microphone permission and activation.
///
/// Supplied by the hosting platform. Called only from the control thread.
pub trait AudioSession: Send {
    fn record_permission(&self) -> RecordPermission;

    /// Ask the user for microphone access. Returns whether it was granted.
    fn request_record_permission(&mut self) -> bool;

    /// Configure for simultaneous record and playback and make the session active.
    fn activate(&mut self) -> Result<(), CaptureError>;

    fn deactivate(&mut self) -> Result<(), CaptureError>;
}
