//! Record storage collaborator
//!
//! The analytics core never reads storage itself; callers fetch a user's
//! records for a window through [`RecordStore`] and pass them in.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::models::{PsychologicalRecord, ReadinessRecord, Record, RecordKind, TrainingRecord};
use crate::normalizer::DateRange;

/// Identifier assigned to a stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    pub fn new() -> Self {
        RecordId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One user's records for a window, split by kind and sorted by date
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserHistory {
    pub readiness: Vec<ReadinessRecord>,
    pub training: Vec<TrainingRecord>,
    pub psychological: Vec<PsychologicalRecord>,
}

impl UserHistory {
    pub fn is_empty(&self) -> bool {
        self.readiness.is_empty() && self.training.is_empty() && self.psychological.is_empty()
    }
}

/// Read/write contract of the storage layer
pub trait RecordStore {
    /// Records of one kind within `range`, ascending by date
    fn get_records(&self, kind: RecordKind, user_id: &str, range: &DateRange) -> Result<Vec<Record>>;

    /// Persist a record. Fails when the record is not of `kind`.
    fn save_record(&self, kind: RecordKind, user_id: &str, record: Record) -> Result<RecordId>;

    /// All three kinds for a window
    fn load_history(&self, user_id: &str, range: &DateRange) -> Result<UserHistory> {
        let mut history = UserHistory::default();
        for record in self.get_records(RecordKind::Readiness, user_id, range)? {
            if let Record::Readiness(r) = record {
                history.readiness.push(r);
            }
        }
        for record in self.get_records(RecordKind::Training, user_id, range)? {
            if let Record::Training(t) = record {
                history.training.push(t);
            }
        }
        for record in self.get_records(RecordKind::Psychological, user_id, range)? {
            if let Record::Psychological(p) = record {
                history.psychological.push(p);
            }
        }
        Ok(history)
    }
}

type Collection = Vec<(RecordId, Record)>;

/// Thread-safe in-memory store keyed by user and record kind
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<(String, RecordKind), Collection>>,
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Unavailable {
        reason: "store lock poisoned".to_string(),
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored for a user across all kinds
    pub fn count(&self, user_id: &str) -> Result<usize> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .map(|(_, records)| records.len())
            .sum())
    }

    /// Remove one record. `Ok(false)` when the user exists but the id does not.
    pub fn delete_record(&self, user_id: &str, id: RecordId) -> Result<bool> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let mut known_user = false;
        for ((user, _), records) in collections.iter_mut() {
            if user != user_id {
                continue;
            }
            known_user = true;
            if let Some(pos) = records.iter().position(|(rid, _)| *rid == id) {
                records.remove(pos);
                return Ok(true);
            }
        }
        if known_user {
            Ok(false)
        } else {
            Err(StorageError::UnknownUser {
                user_id: user_id.to_string(),
            }
            .into())
        }
    }
}

impl RecordStore for InMemoryStore {
    fn get_records(&self, kind: RecordKind, user_id: &str, range: &DateRange) -> Result<Vec<Record>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let mut records: Vec<Record> = collections
            .get(&(user_id.to_string(), kind))
            .map(|stored| {
                stored
                    .iter()
                    .filter(|(_, record)| range.contains(record.date()))
                    .map(|(_, record)| record.clone())
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by_key(Record::date);

        debug!(%kind, user_id, count = records.len(), "records fetched");
        Ok(records)
    }

    fn save_record(&self, kind: RecordKind, user_id: &str, record: Record) -> Result<RecordId> {
        if record.kind() != kind {
            return Err(StorageError::KindMismatch {
                expected: kind.as_str(),
                actual: record.kind().as_str(),
            }
            .into());
        }

        let id = RecordId::new();
        let mut collections = self.collections.write().map_err(poisoned)?;
        collections
            .entry((user_id.to_string(), kind))
            .or_default()
            .push((id, record));
        Ok(id)
    }
}
