use std::io;

use thiserror::Error;

mod images;
mod kv;

pub use images::{ImageLibrary, PruneReport, TEMP_CAPTURE_PREFIX};
pub use kv::{FileStorage, KeyValueStorage, MemoryStorage};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("capture id is empty")]
    MissingCaptureId,
    #[error("invalid storage key: {key:?}")]
    InvalidKey { key: String },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;
