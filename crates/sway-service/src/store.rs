//! Persistence contract for finished trials

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use parking_lot::RwLock;
use sway_core::{MeasurementId, MeasurementResult, MeasurementState, SwayResult};

/// A finished trial together with its validity verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub result: MeasurementResult,
    pub is_valid: bool,
    pub validation_message: Option<String>,
}

impl MeasurementRecord {
    /// Record for a finished snapshot; `None` while no result exists
    pub fn from_state(state: &MeasurementState) -> Option<Self> {
        let result = state.result.clone()?;
        Some(MeasurementRecord {
            result,
            is_valid: state.is_valid,
            validation_message: state.validation_message.clone(),
        })
    }
}

/// A record as kept by a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMeasurement {
    pub id: MeasurementId,
    pub saved_at: DateTime<Utc>,
    pub record: MeasurementRecord,
}

/// Storage for finished trials
pub trait MeasurementStore: Send + Sync {
    /// Persist a record and return its identifier
    fn save(&self, record: &MeasurementRecord) -> SwayResult<MeasurementId>;

    fn get(&self, id: &MeasurementId) -> SwayResult<Option<StoredMeasurement>>;

    /// All records, oldest first
    fn list(&self) -> SwayResult<Vec<StoredMeasurement>>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<StoredMeasurement>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MeasurementStore for InMemoryStore {
    fn save(&self, record: &MeasurementRecord) -> SwayResult<MeasurementId> {
        let stored = StoredMeasurement {
            id: MeasurementId::new(),
            saved_at: Utc::now(),
            record: record.clone(),
        };
        let id = stored.id;

        self.records.write().push(stored);
        tracing::debug!(%id, is_valid = record.is_valid, "Measurement stored");
        Ok(id)
    }

    fn get(&self, id: &MeasurementId) -> SwayResult<Option<StoredMeasurement>> {
        let records = self.records.read();
        Ok(records.iter().find(|stored| &stored.id == id).cloned())
    }

    fn list(&self) -> SwayResult<Vec<StoredMeasurement>> {
        Ok(self.records.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sway_core::{MeasurementMetrics, MeasurementStatus};

    fn record(stability: f64, is_valid: bool) -> MeasurementRecord {
        MeasurementRecord {
            result: MeasurementResult {
                metrics: MeasurementMetrics {
                    stability,
                    ..Default::default()
                },
                duration_sec: 10.0,
                ..Default::default()
            },
            is_valid,
            validation_message: (!is_valid).then(|| "Transport gap: 150 ms without samples".to_string()),
        }
    }

    #[test]
    fn test_save_and_get() {
        let store = InMemoryStore::new();
        assert!(store.is_empty());

        let id = store.save(&record(97.0, true)).unwrap();
        let stored = store.get(&id).unwrap().unwrap();

        assert_eq!(stored.id, id);
        assert_eq!(stored.record.result.metrics.stability, 97.0);
        assert!(stored.saved_at <= Utc::now());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_unknown_id() {
        let store = InMemoryStore::new();
        store.save(&record(50.0, true)).unwrap();
        assert!(store.get(&MeasurementId::new()).unwrap().is_none());
    }

    #[test]
    fn test_list_keeps_order_and_validity() {
        let store = InMemoryStore::new();
        let first = store.save(&record(80.0, true)).unwrap();
        let second = store.save(&record(60.0, false)).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.iter().map(|s| s.id).collect::<Vec<_>>(), vec![first, second]);
        assert!(!all[1].record.is_valid);
        assert!(all[1].record.validation_message.as_deref().unwrap().contains("gap"));
    }

    #[test]
    fn test_record_from_state() {
        let mut state = MeasurementState::default();
        assert!(MeasurementRecord::from_state(&state).is_none());

        state.status = MeasurementStatus::Finished;
        state.is_valid = false;
        state.validation_message = Some("Artifact: displacement exceeds ±40 mm".to_string());
        state.result = Some(MeasurementResult::default());

        let record = MeasurementRecord::from_state(&state).unwrap();
        assert!(!record.is_valid);
        assert_eq!(record.validation_message, state.validation_message);
    }
}
