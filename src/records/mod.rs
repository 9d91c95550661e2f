use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::StorageError;

mod store;

pub use store::{RecordStore, RECORDS_KEY};

pub const UNKNOWN_LOCATION: &str = "Unknown";
pub const PLACEHOLDER_IMAGE: &str = "/placeholder.png";
pub const FRESH: &str = "Fresh";

/// One identified catch as persisted in the record collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatchRecord {
    pub id: i64,
    pub species: String,
    pub weight: String,
    pub date: String,
    pub time: String,
    #[serde(default = "default_location")]
    pub location: String,
    pub freshness: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl CatchRecord {
    /// Image reference to display, falling back to the placeholder.
    pub fn image_ref(&self) -> &str {
        self.image.as_deref().unwrap_or(PLACEHOLDER_IMAGE)
    }

    pub fn is_fresh(&self) -> bool {
        self.freshness == FRESH
    }

    pub fn badge(&self) -> BadgeTone {
        BadgeTone::for_freshness(&self.freshness)
    }
}

fn default_location() -> String {
    UNKNOWN_LOCATION.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeTone {
    Success,
    Warning,
}

impl BadgeTone {
    pub fn for_freshness(freshness: &str) -> Self {
        if freshness == FRESH {
            Self::Success
        } else {
            Self::Warning
        }
    }
}

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("record id {id} already exists")]
    DuplicateId { id: i64 },
    #[error("failed to encode record collection: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write record collection: {0}")]
    Write(#[source] StorageError),
}

pub type RecordResult<T> = std::result::Result<T, RecordError>;
