use crate::capture::StillImage;
use crate::compose::IdentificationOutcome;
use crate::records::{BadgeTone, CatchRecord, PLACEHOLDER_IMAGE};

pub const NO_SCANS_MESSAGE: &str = "No scans yet. Capture your first fish!";
pub const NO_RECORDS_MESSAGE: &str =
    "No records found. Capture or upload to save your first record.";

/// Latest catch and totals shown on the home screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeView {
    pub latest: Option<CatchRecord>,
    pub total_scans: usize,
}

impl HomeView {
    pub fn summary_line(&self) -> String {
        match &self.latest {
            Some(record) => format!(
                "{} | {} | {} | {} {}",
                record.species, record.weight, record.freshness, record.date, record.time
            ),
            None => NO_SCANS_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordsView {
    pub query: String,
    pub records: Vec<CatchRecord>,
}

impl RecordsView {
    pub fn summary(&self) -> String {
        format!("{} catches recorded", self.records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// An analysed still waiting to be saved or retaken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResult {
    pub still: Option<StillImage>,
    pub outcome: IdentificationOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultView {
    pub species: String,
    pub scientific_name: Option<String>,
    pub weight: String,
    pub count: u32,
    pub confidence: u8,
    pub freshness: String,
    pub badge: BadgeTone,
    pub image: String,
}

impl From<&PendingResult> for ResultView {
    fn from(pending: &PendingResult) -> Self {
        let outcome = &pending.outcome;
        Self {
            species: outcome.species.clone(),
            scientific_name: outcome.scientific_name.clone(),
            weight: outcome.weight.clone(),
            count: outcome.count,
            confidence: outcome.confidence.min(100),
            freshness: outcome.freshness.clone(),
            badge: BadgeTone::for_freshness(&outcome.freshness),
            image: pending
                .still
                .as_ref()
                .map(|still| still.temp_path.to_string_lossy().into_owned())
                .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
        }
    }
}

/// Preferences shown on the settings screen; not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingsState {
    pub offline_mode: bool,
}

impl SettingsState {
    pub const fn mode_message(self) -> &'static str {
        if self.offline_mode {
            "Offline mode enabled"
        } else {
            "Online mode enabled"
        }
    }
}
