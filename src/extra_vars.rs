//! Auxiliary per-timestamp fields carried alongside emitted records.
//!
//! Fields that are not part of the simulation state (e.g. the plasma boundary
//! outline of an ingested equilibrium) are captured here during ingestion and
//! merged back into records at emission time.
//!
//! Fill policy: `pad` makes the collection dense. Any timestamp seen by one
//! field but missing from another is backfilled with a zero value of that
//! field's element type: `0.0` for scalar fields, a zero array as long as the
//! field's earliest entry for array fields. Values are never interpolated.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::record::PhysicsRecord;

/// Value of an auxiliary field at one timestamp.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtraValue {
    /// Single number.
    Scalar(f64),
    /// Array of numbers.
    Array(Vec<f64>),
}

impl ExtraValue {
    fn zero_like(&self) -> Self {
        match self {
            Self::Scalar(_) => Self::Scalar(0.0),
            Self::Array(values) => Self::Array(vec![0.0; values.len()]),
        }
    }
}

/// Totally ordered timestamp key.
#[derive(Debug, Clone, Copy)]
struct TimeKey(f64);

impl PartialEq for TimeKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TimeKey {}

impl PartialOrd for TimeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Sparse-to-dense collection of auxiliary fields keyed by timestamp.
#[derive(Debug, Clone, Default)]
pub struct ExtraVarCollection {
    fields: BTreeMap<String, BTreeMap<TimeKey, ExtraValue>>,
}

impl ExtraVarCollection {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` for `field` at `time`, replacing an earlier value at the same time.
    pub fn add(&mut self, field: impl Into<String>, time: f64, value: ExtraValue) {
        self.fields
            .entry(field.into())
            .or_default()
            .insert(TimeKey(time), value);
    }

    /// Backfills every field so it has an entry for every timestamp of any field.
    ///
    /// Idempotent. Call once after an ingestion batch, never mid-batch.
    pub fn pad(&mut self) {
        let union: BTreeSet<TimeKey> = self
            .fields
            .values()
            .flat_map(|entries| entries.keys().copied())
            .collect();

        for entries in self.fields.values_mut() {
            let Some(template) = entries.values().next().map(ExtraValue::zero_like) else {
                continue;
            };
            for key in &union {
                entries.entry(*key).or_insert_with(|| template.clone());
            }
        }
    }

    /// All timestamps seen by any field, ascending.
    #[must_use]
    pub fn timestamps(&self) -> Vec<f64> {
        let union: BTreeSet<TimeKey> = self
            .fields
            .values()
            .flat_map(|entries| entries.keys().copied())
            .collect();
        union.into_iter().map(|k| k.0).collect()
    }

    /// Ordered `(timestamp, value)` entries of a field.
    #[must_use]
    pub fn entries(&self, field: &str) -> Vec<(f64, &ExtraValue)> {
        self.fields
            .get(field)
            .map(|entries| entries.iter().map(|(k, v)| (k.0, v)).collect())
            .unwrap_or_default()
    }

    /// Field values recorded exactly at `time`.
    #[must_use]
    pub fn values_at(&self, time: f64) -> Vec<(&str, &ExtraValue)> {
        self.fields
            .iter()
            .filter_map(|(name, entries)| entries.get(&TimeKey(time)).map(|v| (name.as_str(), v)))
            .collect()
    }

    /// Names of all fields.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Returns true if no field has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Writes the fields recorded at each slice's time into that slice.
    ///
    /// Scalars go to `scalars`, arrays to `profiles`; existing quantities of
    /// the same name are overwritten.
    pub fn merge_into(&self, record: &mut PhysicsRecord) {
        for slice in &mut record.slices {
            for (name, value) in self.values_at(slice.time) {
                match value {
                    ExtraValue::Scalar(v) => {
                        slice.scalars.insert(name.to_string(), *v);
                    }
                    ExtraValue::Array(values) => {
                        slice.profiles.insert(name.to_string(), values.clone());
                    }
                }
            }
        }
    }
}
