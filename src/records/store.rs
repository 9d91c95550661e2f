use crate::storage::KeyValueStorage;

use super::{CatchRecord, RecordError, RecordResult};

pub const RECORDS_KEY: &str = "records";

/// Ordered catch record collection kept as one JSON array under a single key.
///
/// Every write replaces the whole collection. Concurrent writers are not
/// coordinated.
#[derive(Debug)]
pub struct RecordStore<S> {
    storage: S,
    key: String,
}

impl<S: KeyValueStorage> RecordStore<S> {
    pub fn new(storage: S) -> Self {
        Self::with_key(storage, RECORDS_KEY)
    }

    pub fn with_key(storage: S, key: impl Into<String>) -> Self {
        Self {
            storage,
            key: key.into(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Unreadable or corrupt storage reads as an empty collection.
    pub fn list_records(&self) -> Vec<CatchRecord> {
        let raw = match self.storage.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                tracing::warn!(key = %self.key, ?err, "failed to read record collection");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Option<Vec<CatchRecord>>>(&raw) {
            Ok(records) => records.unwrap_or_default(),
            Err(err) => {
                tracing::warn!(
                    key = %self.key,
                    ?err,
                    "stored record collection is corrupt; treating as empty"
                );
                Vec::new()
            }
        }
    }

    pub fn append_record(&self, record: CatchRecord) -> RecordResult<()> {
        let mut records = self.list_records();
        if records.iter().any(|existing| existing.id == record.id) {
            return Err(RecordError::DuplicateId { id: record.id });
        }

        let id = record.id;
        records.push(record);
        let encoded = serde_json::to_string(&records)?;
        self.storage
            .set(&self.key, &encoded)
            .map_err(RecordError::Write)?;

        tracing::info!(id, total = records.len(), "appended catch record");
        Ok(())
    }

    pub fn latest_record(&self) -> Option<CatchRecord> {
        self.list_records().pop()
    }

    pub fn count(&self) -> usize {
        self.list_records().len()
    }

    pub fn max_id(&self) -> Option<i64> {
        self.list_records().iter().map(|record| record.id).max()
    }

    /// Case-insensitive match on species, date or location.
    pub fn search(&self, query: &str) -> Vec<CatchRecord> {
        let needle = query.trim().to_lowercase();
        let records = self.list_records();
        if needle.is_empty() {
            return records;
        }

        records
            .into_iter()
            .filter(|record| {
                [&record.species, &record.date, &record.location]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&needle))
            })
            .collect()
    }
}
