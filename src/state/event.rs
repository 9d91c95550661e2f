use super::model::CaptureState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureEvent {
    Start,
    StreamReady,
    StreamFailed,
    CaptureStill,
    AdoptUpload,
    Retake,
    Confirm,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: Option<CaptureState>,
    pub event: CaptureEvent,
    pub to: CaptureState,
}

impl StateTransition {
    pub const fn new(from: Option<CaptureState>, event: CaptureEvent, to: CaptureState) -> Self {
        Self { from, event, to }
    }
}
