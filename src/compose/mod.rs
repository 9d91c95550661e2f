use std::cell::Cell;
use std::path::Path;

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::records::{
    CatchRecord, RecordError, RecordStore, FRESH, PLACEHOLDER_IMAGE, UNKNOWN_LOCATION,
};
use crate::storage::KeyValueStorage;

const DATE_FORMAT: &str = "%b %-d, %Y";
const TIME_FORMAT: &str = "%H:%M";

/// What the recognition service reports for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentificationOutcome {
    pub species: String,
    pub scientific_name: Option<String>,
    pub weight: String,
    pub count: u32,
    /// Percent, 0..=100.
    pub confidence: u8,
    pub freshness: String,
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("identification failed: {message}")]
    Identification { message: String },
}

pub type ComposeResult<T> = std::result::Result<T, ComposeError>;

/// Species recognition; `image` is the still to analyse, if there is one.
pub trait Identifier {
    fn identify(&self, image: Option<&Path>) -> ComposeResult<IdentificationOutcome>;
}

/// Fixed outcome used until a real recognition service is plugged in.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaceholderIdentifier;

impl Identifier for PlaceholderIdentifier {
    fn identify(&self, image: Option<&Path>) -> ComposeResult<IdentificationOutcome> {
        tracing::debug!(image = ?image, "returning placeholder identification");
        Ok(IdentificationOutcome {
            species: "Yellowfin Tuna".to_string(),
            scientific_name: Some("Thunnus albacares".to_string()),
            weight: "2.3 kg".to_string(),
            count: 1,
            confidence: 96,
            freshness: FRESH.to_string(),
        })
    }
}

/// Decides the freshness label stored with a record.
pub trait FreshnessPolicy {
    fn assess(&self, outcome: &IdentificationOutcome) -> String;
}

/// Keeps whatever the identifier reported.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReportedFreshness;

impl FreshnessPolicy for ReportedFreshness {
    fn assess(&self, outcome: &IdentificationOutcome) -> String {
        outcome.freshness.clone()
    }
}

pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

impl<T: Clock + ?Sized> Clock for Box<T> {
    fn now(&self) -> DateTime<Local> {
        (**self).now()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}

/// Builds catch records from an image and an identification outcome.
///
/// Ids are creation-time milliseconds, bumped past the last issued id so they
/// stay unique even within one millisecond.
pub struct ResultComposer<C = SystemClock> {
    clock: C,
    last_id: Cell<i64>,
}

impl ResultComposer<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for ResultComposer<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> ResultComposer<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            clock,
            last_id: Cell::new(i64::MIN),
        }
    }

    /// Makes later ids larger than `id`, e.g. the largest already stored.
    pub fn seed_last_id(&self, id: Option<i64>) {
        if let Some(id) = id {
            self.last_id.set(self.last_id.get().max(id));
        }
    }

    fn allocate_id(&self, now: &DateTime<Local>) -> i64 {
        let id = now
            .timestamp_millis()
            .max(self.last_id.get().saturating_add(1));
        self.last_id.set(id);
        id
    }

    pub fn compose_record(
        &self,
        image: Option<&str>,
        outcome: &IdentificationOutcome,
        location: Option<&str>,
    ) -> CatchRecord {
        let now = self.clock.now();
        CatchRecord {
            id: self.allocate_id(&now),
            species: outcome.species.clone(),
            weight: outcome.weight.clone(),
            date: now.format(DATE_FORMAT).to_string(),
            time: now.format(TIME_FORMAT).to_string(),
            location: location
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .unwrap_or(UNKNOWN_LOCATION)
                .to_string(),
            freshness: outcome.freshness.clone(),
            image: Some(image.unwrap_or(PLACEHOLDER_IMAGE).to_string()),
        }
    }

    pub fn save_record<S: KeyValueStorage>(
        &self,
        store: &RecordStore<S>,
        record: CatchRecord,
    ) -> Result<CatchRecord, RecordError> {
        store.append_record(record.clone())?;
        Ok(record)
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for ResultComposer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultComposer")
            .field("clock", &self.clock)
            .field("last_id", &self.last_id.get())
            .finish()
    }
}
