use serde::Serialize;
use thiserror::Error;

/// Raw non-zero status returned by a hardware call.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[error("hardware status {0}")]
pub struct HardwareStatus(pub i32);

impl HardwareStatus {
    /// Converts a raw status code into a `Result`, treating zero as success.
    pub fn check(code: i32) -> Result<(), HardwareStatus> {
        if code == 0 {
            Ok(())
        } else {
            Err(HardwareStatus(code))
        }
    }

    pub fn code(self) -> i32 {
        self.0
    }
}

/// Errors surfaced to the control domain.
///
/// Returned synchronously from controller and buffer operations. Nothing in
/// the render path constructs one of these; see [`RenderError`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("record permission denied")]
    PermissionDenied,

    #[error("audio session activation failed: {0}")]
    SessionActivationFailed(String),

    #[error("{operation} failed with {status}")]
    HardwareStatus {
        operation: &'static str,
        status: HardwareStatus,
    },

    /// A render period was rejected before reaching the hardware.
    #[error("render period failed: {0}")]
    Render(RenderError),

    #[error("requested {requested} samples but buffer capacity is {capacity}")]
    BufferOverrequest { requested: usize, capacity: usize },

    #[error("capture interrupted; explicit restart required")]
    Interrupted,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),
}

impl CaptureError {
    pub(crate) fn hardware(operation: &'static str, status: HardwareStatus) -> Self {
        Self::HardwareStatus { operation, status }
    }
}

/// Failure of a single render period.
///
/// `Copy` and heap-free so it can be returned from the audio thread.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RenderError {
    /// Zero frames requested, or more frames than the pre-allocated scratch holds.
    #[error("invalid render buffer")]
    InvalidBuffer,

    /// Output buffer size does not match the negotiated frame size.
    #[error("buffer does not match negotiated format")]
    FormatMismatch,

    #[error("render call failed: {0}")]
    Hardware(HardwareStatus),
}

impl RenderError {
    /// Status code handed back to a hardware layer that expects one.
    pub fn status_code(self) -> i32 {
        match self {
            Self::InvalidBuffer => -50,
            Self::FormatMismatch => -10863,
            Self::Hardware(status) => status.code(),
        }
    }
}

impl From<HardwareStatus> for RenderError {
    fn from(status: HardwareStatus) -> Self {
        Self::Hardware(status)
    }
}
