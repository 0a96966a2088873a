/// Recording lifecycle state machine.
///
/// State transitions:
/// ```text
/// idle → session_active → unit_running → interrupted
///   ↑          ↑               │              │
///   │          └── stop_unit ──┘              │
///   └──────────── stop_recording ─────────────┤
///                 unit_running ←── restart ───┘
/// ```
///
/// Only the lifecycle controller performs transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    SessionActive,
    UnitRunning,
    Interrupted,
}

impl RecordingState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::UnitRunning)
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// Whether the audio session is active in this state.
    pub fn has_session(&self) -> bool {
        matches!(self, Self::SessionActive | Self::UnitRunning)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::SessionActive => "session_active",
            Self::UnitRunning => "unit_running",
            Self::Interrupted => "interrupted",
        }
    }
}

impl std::fmt::Display for RecordingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_idle() {
        assert!(RecordingState::default().is_idle());
    }

    #[test]
    fn session_flag_follows_state() {
        assert!(!RecordingState::Idle.has_session());
        assert!(RecordingState::SessionActive.has_session());
        assert!(RecordingState::UnitRunning.has_session());
        assert!(!RecordingState::Interrupted.has_session());
    }
}
