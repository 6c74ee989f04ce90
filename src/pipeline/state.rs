//! Pipeline state machine

/// Lifecycle of one processing run.
///
/// Idle → Running on a successful start; Running → Idle at end-of-stream or
/// on an explicit stop; Stopping is the transient teardown window guarding
/// against re-entrant stop requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No run in progress, handles released.
    Idle,
    /// The tick worker is pulling frames.
    Running,
    /// Teardown in progress: no new ticks, waiting for the in-flight one.
    Stopping,
}

impl PipelineState {
    pub fn can_transition_to(&self, target: &PipelineState) -> bool {
        use PipelineState::*;

        match (self, target) {
            (Idle, Running) => true,
            (Running, Stopping) => true,
            (Running, Idle) => true, // end-of-stream completes on its own
            (Stopping, Idle) => true,
            (a, b) if a == b => true,
            _ => false,
        }
    }

    /// Label for the control surface (start/stop button text).
    pub fn description(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Idle",
            PipelineState::Running => "Running",
            PipelineState::Stopping => "Stopping",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, PipelineState::Running)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, PipelineState::Idle)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(PipelineState::Idle.can_transition_to(&PipelineState::Running));
        assert!(PipelineState::Running.can_transition_to(&PipelineState::Stopping));
        assert!(PipelineState::Running.can_transition_to(&PipelineState::Idle));
        assert!(PipelineState::Stopping.can_transition_to(&PipelineState::Idle));

        // Self-transitions (idempotent stop, repeated start guard).
        assert!(PipelineState::Idle.can_transition_to(&PipelineState::Idle));
        assert!(PipelineState::Stopping.can_transition_to(&PipelineState::Stopping));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!PipelineState::Idle.can_transition_to(&PipelineState::Stopping));
        assert!(!PipelineState::Stopping.can_transition_to(&PipelineState::Running));
    }

    #[test]
    fn test_state_checks() {
        assert!(PipelineState::Running.is_running());
        assert!(!PipelineState::Running.is_idle());
        assert!(PipelineState::Idle.is_idle());
        assert_eq!(PipelineState::Stopping.to_string(), "Stopping");
    }
}
