/// Capture session state machine.
///
/// Transitions are one-directional and driven only by construction and
/// destruction; there is no pause/resume:
/// ```text
/// uninitialized → negotiating → running → stopped
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Uninitialized,
    Negotiating,
    Running,
    Stopped,
}

impl CaptureState {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}
