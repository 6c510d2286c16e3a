// Temporal Status Filter
// Reconciles the flat Existing/Addition/Removed/Change record list into the
// set of records in effect for the target year. Input order is semantically
// significant: later records override earlier ones with the same key.

use std::collections::HashMap;
use tracing::info;

use crate::records::{AssetRecord, RecordKey, Status};

// ============================================================================
// ORDERED RECORD MAP
// ============================================================================

/// Mutable-by-key collection preserving admission order, with O(1) key
/// lookup. Removal tombstones the slot so surviving records keep their
/// relative order; re-admitting a key is delete-then-insert, so the record
/// moves to the end (last write wins).
#[derive(Debug, Default)]
pub struct OrderedRecordMap {
    slots: Vec<Option<AssetRecord>>,
    index: HashMap<RecordKey, usize>,
}

impl OrderedRecordMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, record: AssetRecord) {
        let key = record.key();
        if let Some(&slot) = self.index.get(&key) {
            self.slots[slot] = None;
        }
        self.index.insert(key, self.slots.len());
        self.slots.push(Some(record));
    }

    /// Delete the record with this key, if admitted. Returns whether anything
    /// was removed.
    pub fn remove(&mut self, key: &RecordKey) -> bool {
        match self.index.remove(key) {
            Some(slot) => {
                self.slots[slot] = None;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Surviving records in admission order.
    pub fn into_records(self) -> Vec<AssetRecord> {
        self.slots.into_iter().flatten().collect()
    }
}

// ============================================================================
// TEMPORAL FILTER
// ============================================================================

pub struct TemporalFilter {
    pub target_year: i32,
}

impl TemporalFilter {
    pub fn new(target_year: i32) -> Self {
        TemporalFilter { target_year }
    }

    /// Single pass over the records in original order.
    ///
    /// Transition rules against target year T:
    /// - Unspecified status or absent year: always admit.
    /// - Year > T: drop unconditionally, whatever the status.
    /// - Addition / Existing with year <= T: admit.
    /// - Removed with year <= T: delete the matching admitted key; the
    ///   removal record itself is not admitted.
    /// - Change with year <= T: delete the matching admitted key, then admit.
    pub fn reconcile(&self, records: Vec<AssetRecord>) -> Vec<AssetRecord> {
        let input_count = records.len();
        let mut admitted = OrderedRecordMap::new();

        for record in records {
            if record.status == Status::Unspecified {
                admitted.insert(record);
                continue;
            }
            let Some(year) = record.effective_year else {
                admitted.insert(record);
                continue;
            };
            if year > self.target_year {
                continue;
            }
            match record.status {
                Status::Addition | Status::Existing => admitted.insert(record),
                Status::Removed => {
                    admitted.remove(&record.key());
                }
                Status::Change => {
                    let key = record.key();
                    admitted.remove(&key);
                    admitted.insert(record);
                }
                Status::Unspecified => unreachable!("handled above"),
            }
        }

        info!(
            target_year = self.target_year,
            input = input_count,
            admitted = admitted.len(),
            "temporal reconciliation complete"
        );
        admitted.into_records()
    }
}

// ============================================================================
// TESTS
// ============================================================================
