/// Lifecycle of a capture screen.
///
/// Torch on/off is tracked separately as a sub-state of `Live`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    #[default]
    Idle,
    Starting,
    Live,
    Unavailable,
    Reviewing,
    Closed,
}

impl CaptureState {
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }

    pub const fn is_reviewing(self) -> bool {
        matches!(self, Self::Reviewing)
    }

    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}
