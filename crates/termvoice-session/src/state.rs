//! Session lifecycle state machine.
//!
//! Valid transitions:
//! - Idle -> Recording (first session started)
//! - Recording -> Stopped (explicit stop, silence commit, chat accept, engine end)
//! - Stopped -> Recording (next session started)

use std::fmt;

use termvoice_core::error::TermVoiceError;

/// Lifecycle status of the voice session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// No session has run yet.
    #[default]
    Idle,
    /// A recognition stream is open and events are applied.
    Recording,
    /// The last session ended. Late events are ignored.
    Stopped,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Idle => write!(f, "Idle"),
            SessionStatus::Recording => write!(f, "Recording"),
            SessionStatus::Stopped => write!(f, "Stopped"),
        }
    }
}

impl SessionStatus {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SessionStatus) -> bool {
        matches!(
            (self, target),
            (SessionStatus::Idle, SessionStatus::Recording)
                | (SessionStatus::Recording, SessionStatus::Stopped)
                | (SessionStatus::Stopped, SessionStatus::Recording)
        )
    }
}

/// Validated holder of the current [`SessionStatus`].
///
/// Owned by the session controller; all mutation happens on the
/// controller's task, so no locking is needed.
#[derive(Debug, Clone, Default)]
pub struct StateMachine {
    state: SessionStatus,
}

impl StateMachine {
    /// Create a new state machine initialized to `Idle`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> SessionStatus {
        self.state
    }

    /// Attempt to transition to the target state.
    pub fn transition(&mut self, target: SessionStatus) -> Result<(), TermVoiceError> {
        if self.state.can_transition_to(&target) {
            tracing::debug!("Session state: {} -> {}", self.state, target);
            self.state = target;
            Ok(())
        } else {
            Err(TermVoiceError::Session(format!(
                "Invalid state transition: {} -> {}",
                self.state, target
            )))
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
