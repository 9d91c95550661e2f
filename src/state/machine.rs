use super::error::{StateError, StateResult};
use super::{event::StateTransition, CaptureEvent, CaptureState};

#[derive(Debug)]
pub struct StateMachine {
    state: CaptureState,
    transition_history: Vec<StateTransition>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: CaptureState::default(),
            transition_history: Vec::new(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn can_transition(&self, event: CaptureEvent) -> bool {
        self.next_state(event).is_some()
    }

    pub fn next_state(&self, event: CaptureEvent) -> Option<CaptureState> {
        use CaptureEvent::*;
        use CaptureState::*;
        match (self.state, event) {
            (Idle | Live | Unavailable, Start) => Some(Starting),
            (Starting, StreamReady) => Some(Live),
            (Starting, StreamFailed) => Some(Unavailable),
            (Live, CaptureStill) => Some(Reviewing),
            (Idle | Starting | Live | Unavailable, AdoptUpload) => Some(Reviewing),
            (Reviewing, Retake) => Some(Idle),
            (Reviewing, Confirm) => Some(Closed),
            (_, End) => Some(Closed),
            _ => None,
        }
    }

    pub fn transition(&mut self, event: CaptureEvent) -> StateResult<CaptureState> {
        tracing::debug!(from = ?self.state, event = ?event, "request capture transition");
        let next = self.next_state(event).ok_or_else(|| {
            let from = self.state;
            tracing::warn!(from = ?from, event = ?event, "invalid capture transition requested");
            StateError::InvalidStateTransition { from, event }
        })?;

        let record = StateTransition::new(Some(self.state), event, next);
        self.state = next;
        self.transition_history.push(record);

        Ok(self.state)
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.transition_history
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CaptureState::{:?}", self.state)
    }
}
