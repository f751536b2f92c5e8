//! Batch reconciliation on a natural key.
//!
//! Two kinds of collision are classified, both by exact, case-sensitive
//! comparison of the key's string form:
//!
//! - **in-batch duplicates**: the 2nd..nth record carrying a key already seen
//!   earlier in the batch. These stay in the batch, flagged by index, and
//!   block commit until renamed or edited.
//! - **existing keys**: records whose key is already in the backend. These are
//!   removed from the committable set and reported separately.
//!
//! Records with a blank key are never compared; they are listed in
//! `missing_key_indices` instead.
//!
//! All functions here are pure. [`ImportBatch`] holds the records under review
//! and re-runs them explicitly after every edit.

use std::collections::HashSet;

use serde::Serialize;

use crate::{
    data::{CanonicalRecord, FieldValue},
    error::CommitBlocked,
    schema::FieldSchema,
    trace::{NoTrace, TraceEvent, TraceSink},
};

/// A record excluded because its key already exists in the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRecord {
    /// Position in the list handed to [`reconcile`]. Rejections reported by
    /// [`ImportBatch`] use the position in the list the batch was created
    /// from, so the value stays stable across edits and removals.
    pub source_index: usize,
    pub key: String,
    pub record: CanonicalRecord,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationResult {
    pub records: Vec<CanonicalRecord>,
    pub duplicate_indices: Vec<usize>,
    pub missing_key_indices: Vec<usize>,
    pub rejected: Vec<RejectedRecord>,
}

impl ReconciliationResult {
    pub fn has_duplicates(&self) -> bool {
        !self.duplicate_indices.is_empty()
    }
}

/// A required field left blank, by position within the batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingValue {
    pub index: usize,
    pub field: String,
}

/// String form of a record's key, `None` when absent or blank.
pub fn record_key(record: &CanonicalRecord, key_field: &str) -> Option<String> {
    record.text(key_field)
}

pub fn find_duplicate_indices(records: &[CanonicalRecord], key_field: &str) -> Vec<usize> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for (index, record) in records.iter().enumerate() {
        if let Some(key) = record_key(record, key_field)
            && !seen.insert(key)
        {
            duplicates.push(index);
        }
    }
    duplicates
}

pub fn find_missing_keys(records: &[CanonicalRecord], key_field: &str) -> Vec<usize> {
    records
        .iter()
        .enumerate()
        .filter(|(_, record)| record_key(record, key_field).is_none())
        .map(|(index, _)| index)
        .collect()
}

pub fn reconcile(
    records: Vec<CanonicalRecord>,
    key_field: &str,
    existing_keys: &HashSet<String>,
) -> ReconciliationResult {
    reconcile_traced(records, key_field, existing_keys, &mut NoTrace)
}

pub fn reconcile_traced(
    records: Vec<CanonicalRecord>,
    key_field: &str,
    existing_keys: &HashSet<String>,
    sink: &mut dyn TraceSink,
) -> ReconciliationResult {
    let mut kept = Vec::with_capacity(records.len());
    let mut rejected = Vec::new();
    for (source_index, record) in records.into_iter().enumerate() {
        match record_key(&record, key_field) {
            Some(key) if existing_keys.contains(&key) => {
                sink.trace(&TraceEvent::ExistingKey {
                    index: source_index,
                    key: &key,
                });
                rejected.push(RejectedRecord {
                    source_index,
                    key,
                    record,
                });
            }
            _ => kept.push(record),
        }
    }

    let duplicate_indices = find_duplicate_indices(&kept, key_field);
    for &index in &duplicate_indices {
        if let Some(key) = record_key(&kept[index], key_field) {
            sink.trace(&TraceEvent::DuplicateKey { index, key: &key });
        }
    }
    let missing_key_indices = find_missing_keys(&kept, key_field);

    ReconciliationResult {
        records: kept,
        duplicate_indices,
        missing_key_indices,
        rejected,
    }
}

pub fn auto_fix_duplicates(records: &[CanonicalRecord], key_field: &str) -> Vec<CanonicalRecord> {
    auto_fix_duplicates_traced(records, key_field, &mut NoTrace)
}

/// Renames every flagged duplicate's key to `key-1`, `key-2`, ... choosing the
/// first suffix not already used anywhere in the batch.
///
/// The taken set starts with the keys of all unflagged records, so a rename
/// can never collide with a later first occurrence. Unflagged records come
/// back unchanged and the result has no in-batch duplicates.
pub fn auto_fix_duplicates_traced(
    records: &[CanonicalRecord],
    key_field: &str,
    sink: &mut dyn TraceSink,
) -> Vec<CanonicalRecord> {
    let flagged: HashSet<usize> = find_duplicate_indices(records, key_field)
        .into_iter()
        .collect();
    let mut taken: HashSet<String> = records
        .iter()
        .enumerate()
        .filter(|(index, _)| !flagged.contains(index))
        .filter_map(|(_, record)| record_key(record, key_field))
        .collect();

    let mut fixed = records.to_vec();
    for (index, record) in fixed.iter_mut().enumerate() {
        if !flagged.contains(&index) {
            continue;
        }
        let Some(original) = record_key(record, key_field) else {
            continue;
        };
        let mut counter = 1usize;
        let mut candidate = format!("{original}-{counter}");
        while taken.contains(&candidate) {
            counter += 1;
            candidate = format!("{original}-{counter}");
        }
        sink.trace(&TraceEvent::KeyRenamed {
            index,
            from: &original,
            to: &candidate,
        });
        record.set(key_field, Some(FieldValue::Text(candidate.clone())));
        taken.insert(candidate);
    }
    fixed
}

/// Required fields that are blank, row by row.
pub fn missing_required(records: &[CanonicalRecord], schema: &FieldSchema) -> Vec<MissingValue> {
    let required = schema.required_fields().collect::<Vec<_>>();
    let mut missing = Vec::new();
    for (index, record) in records.iter().enumerate() {
        for field in &required {
            if record.text(field).is_none() {
                missing.push(MissingValue {
                    index,
                    field: (*field).to_string(),
                });
            }
        }
    }
    missing
}

/// Records under human review before a bulk create.
///
/// Every mutation re-runs [`reconcile`] over the current records together
/// with the rows rejected so far, so both the duplicate list and
/// [`rejected`] always describe the latest edits and the latest snapshot of
/// existing keys. A row whose key the backend no longer holds rejoins the
/// batch at its original position.
///
/// [`rejected`]: ImportBatch::rejected
#[derive(Debug, Clone)]
pub struct ImportBatch {
    key_field: String,
    existing_keys: HashSet<String>,
    records: Vec<CanonicalRecord>,
    /// Position of each entry of `records` in the list the batch started from.
    origins: Vec<usize>,
    duplicate_indices: Vec<usize>,
    missing_key_indices: Vec<usize>,
    rejected: Vec<RejectedRecord>,
}

impl ImportBatch {
    pub fn new(
        records: Vec<CanonicalRecord>,
        key_field: impl Into<String>,
        existing_keys: HashSet<String>,
    ) -> Self {
        let origins = (0..records.len()).collect();
        let mut batch = ImportBatch {
            key_field: key_field.into(),
            existing_keys,
            records,
            origins,
            duplicate_indices: Vec::new(),
            missing_key_indices: Vec::new(),
            rejected: Vec::new(),
        };
        batch.recompute(&mut NoTrace);
        batch
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub fn duplicate_indices(&self) -> &[usize] {
        &self.duplicate_indices
    }

    pub fn missing_key_indices(&self) -> &[usize] {
        &self.missing_key_indices
    }

    pub fn rejected(&self) -> &[RejectedRecord] {
        &self.rejected
    }

    /// Position of the record at `index` in the list the batch started from.
    pub fn origin(&self, index: usize) -> Option<usize> {
        self.origins.get(index).copied()
    }

    pub fn is_duplicate(&self, index: usize) -> bool {
        self.duplicate_indices.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Re-runs reconciliation over the kept and previously rejected rows,
    /// forwarding events to `sink`.
    pub fn recompute(&mut self, sink: &mut dyn TraceSink) {
        let mut rows = self
            .origins
            .drain(..)
            .zip(self.records.drain(..))
            .chain(
                self.rejected
                    .drain(..)
                    .map(|rejected| (rejected.source_index, rejected.record)),
            )
            .collect::<Vec<_>>();
        rows.sort_by_key(|(origin, _)| *origin);
        let (origins, records): (Vec<usize>, Vec<CanonicalRecord>) = rows.into_iter().unzip();

        let result = reconcile_traced(records, &self.key_field, &self.existing_keys, sink);
        let rejected_at = result
            .rejected
            .iter()
            .map(|rejected| rejected.source_index)
            .collect::<HashSet<_>>();
        self.origins = origins
            .iter()
            .enumerate()
            .filter(|(position, _)| !rejected_at.contains(position))
            .map(|(_, origin)| *origin)
            .collect();
        self.rejected = result
            .rejected
            .into_iter()
            .map(|mut rejected| {
                rejected.source_index = origins[rejected.source_index];
                rejected
            })
            .collect();
        self.records = result.records;
        self.duplicate_indices = result.duplicate_indices;
        self.missing_key_indices = result.missing_key_indices;
    }

    /// Overwrites one cell. Returns `false` when `index` is out of range.
    pub fn edit_cell(&mut self, index: usize, field: &str, value: Option<FieldValue>) -> bool {
        let Some(record) = self.records.get_mut(index) else {
            return false;
        };
        record.set(field, value);
        if field == self.key_field {
            self.recompute(&mut NoTrace);
        }
        true
    }

    pub fn remove_row(&mut self, index: usize) -> Option<CanonicalRecord> {
        if index >= self.records.len() {
            return None;
        }
        let removed = self.records.remove(index);
        self.origins.remove(index);
        self.recompute(&mut NoTrace);
        Some(removed)
    }

    /// Applies [`auto_fix_duplicates`] and returns how many keys were renamed.
    pub fn auto_fix(&mut self) -> usize {
        self.auto_fix_traced(&mut NoTrace)
    }

    pub fn auto_fix_traced(&mut self, sink: &mut dyn TraceSink) -> usize {
        let renamed = self.duplicate_indices.len();
        if renamed == 0 {
            return 0;
        }
        self.records = auto_fix_duplicates_traced(&self.records, &self.key_field, sink);
        self.recompute(sink);
        renamed
    }

    /// Swaps in a fresh snapshot of backend keys and re-reconciles.
    pub fn refresh_existing(&mut self, existing_keys: HashSet<String>) {
        self.existing_keys = existing_keys;
        self.recompute(&mut NoTrace);
    }

    pub fn validate(&self, schema: &FieldSchema) -> Vec<MissingValue> {
        missing_required(&self.records, schema)
    }

    /// Returns the records to submit, or why they cannot be submitted yet.
    pub fn commit(&self, schema: &FieldSchema) -> Result<&[CanonicalRecord], CommitBlocked> {
        if !self.duplicate_indices.is_empty() {
            return Err(CommitBlocked::DuplicateKeys(self.duplicate_indices.len()));
        }
        let missing = self.validate(schema);
        if !missing.is_empty() {
            return Err(CommitBlocked::MissingValues(missing.len()));
        }
        Ok(&self.records)
    }
}
