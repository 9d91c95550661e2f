use crate::capture::CaptureError;
use crate::compose::ComposeError;
use crate::config::ConfigPathError;
use crate::records::RecordError;
use crate::state::StateError;
use crate::storage::StorageError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error("cannot resolve data directory: {0:?}")]
    ConfigPath(ConfigPathError),
    #[error("{action} is not available on the {route:?} screen")]
    WrongScreen {
        action: &'static str,
        route: crate::navigation::Route,
    },
    #[error("no analysed result to save")]
    NoPendingResult,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

impl From<ConfigPathError> for AppError {
    fn from(value: ConfigPathError) -> Self {
        Self::ConfigPath(value)
    }
}
