//! In-memory physics data store.
//!
//! Holds at most one record per kind and serves time slices out of it. The
//! actor uses it two ways: as a resampling utility during ingestion, and as
//! the accumulator for full-history output.

use std::collections::HashMap;

use crate::record::{PhysicsRecord, RecordKind, RecordSlice};

/// How `get_slice` picks a slice for a requested time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Nearest stored time; ties resolve to the earlier slice.
    #[default]
    Closest,
}

/// Index of the slice nearest to `t` in ascending `times`.
pub(crate) fn closest_index(times: &[f64], t: f64) -> Option<usize> {
    if times.is_empty() {
        return None;
    }
    let upper = times.partition_point(|&x| x < t);
    if upper == 0 {
        return Some(0);
    }
    if upper == times.len() {
        return Some(times.len() - 1);
    }
    let below = upper - 1;
    if (t - times[below]) <= (times[upper] - t) {
        Some(below)
    } else {
        Some(upper)
    }
}

/// Resolves `t` against ascending `times` with the given method.
pub(crate) fn slice_index(times: &[f64], t: f64, method: Interpolation) -> Option<usize> {
    match method {
        Interpolation::Closest => closest_index(times, t),
    }
}

/// In-memory record store keyed by record kind.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: HashMap<RecordKind, PhysicsRecord>,
}

impl RecordStore {
    /// Opens an empty in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Stores a whole record, replacing any record of the same kind.
    ///
    /// Slices are kept sorted by time.
    pub fn put(&mut self, record: &PhysicsRecord) {
        let mut slices = record.slices.clone();
        slices.sort_by(|a, b| a.time.total_cmp(&b.time));
        let mut stored = PhysicsRecord::from_slices(record.kind, slices);
        stored.code = record.code.clone();
        self.records.insert(record.kind, stored);
    }

    /// Appends the slices of `record` to the stored record of the same kind.
    ///
    /// A slice whose time is already stored replaces the stored slice.
    pub fn put_slice(&mut self, record: &PhysicsRecord) {
        let stored = self
            .records
            .entry(record.kind)
            .or_insert_with(|| PhysicsRecord::new(record.kind));
        for slice in &record.slices {
            let pos = stored.time.partition_point(|&x| x < slice.time);
            if stored.time.get(pos).is_some_and(|&x| x == slice.time) {
                stored.slices[pos] = slice.clone();
            } else {
                stored.time.insert(pos, slice.time);
                stored.slices.insert(pos, slice.clone());
            }
        }
        if stored.code.name.is_none() {
            stored.code.clone_from(&record.code);
        }
    }

    /// Returns the full stored record of a kind.
    #[must_use]
    pub fn get(&self, kind: RecordKind) -> Option<PhysicsRecord> {
        self.records.get(&kind).cloned()
    }

    /// Returns a single-slice record for the requested time.
    #[must_use]
    pub fn get_slice(&self, kind: RecordKind, time: f64, method: Interpolation) -> Option<PhysicsRecord> {
        let stored = self.records.get(&kind)?;
        let idx = slice_index(&stored.time, time, method)?;
        let slice: RecordSlice = stored.slices[idx].clone();
        let mut record = PhysicsRecord::from_slices(kind, vec![slice]);
        record.code = stored.code.clone();
        Some(record)
    }

    /// Number of slices stored for a kind.
    #[must_use]
    pub fn slice_count(&self, kind: RecordKind) -> usize {
        self.records.get(&kind).map_or(0, |r| r.slices.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(times: &[f64]) -> PhysicsRecord {
        PhysicsRecord::from_slices(
            RecordKind::Equilibrium,
            times
                .iter()
                .map(|&t| RecordSlice::at(t).with_scalar("t_copy", t))
                .collect(),
        )
    }

    #[test]
    fn closest_index_prefers_nearest_and_earlier_on_tie() {
        let times = [0.0, 1.0, 2.0];
        assert_eq!(closest_index(&times, -5.0), Some(0));
        assert_eq!(closest_index(&times, 0.4), Some(0));
        assert_eq!(closest_index(&times, 0.5), Some(0));
        assert_eq!(closest_index(&times, 0.6), Some(1));
        assert_eq!(closest_index(&times, 9.0), Some(2));
        assert_eq!(closest_index(&[], 1.0), None);
    }

    #[test]
    fn get_slice_returns_closest_slice() {
        let mut store = RecordStore::in_memory();
        store.put(&record(&[0.0, 1.0, 2.0]));
        let slice = store
            .get_slice(RecordKind::Equilibrium, 1.2, Interpolation::Closest)
            .unwrap();
        assert_eq!(slice.time, vec![1.0]);
        assert_eq!(slice.slices[0].scalars["t_copy"], 1.0);
        assert!(store
            .get_slice(RecordKind::CoreProfiles, 1.0, Interpolation::Closest)
            .is_none());
    }

    #[test]
    fn put_sorts_slices() {
        let mut store = RecordStore::in_memory();
        store.put(&record(&[2.0, 0.0, 1.0]));
        assert_eq!(store.get(RecordKind::Equilibrium).unwrap().time, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn put_slice_accumulates_and_replaces_same_time() {
        let mut store = RecordStore::in_memory();
        store.put_slice(&record(&[0.0]));
        store.put_slice(&record(&[0.2]));
        store.put_slice(&record(&[0.1]));
        let mut replacement = record(&[0.2]);
        replacement.slices[0].scalars.insert("t_copy".to_string(), 42.0);
        store.put_slice(&replacement);

        let all = store.get(RecordKind::Equilibrium).unwrap();
        assert_eq!(all.time, vec![0.0, 0.1, 0.2]);
        assert_eq!(all.slices[2].scalars["t_copy"], 42.0);
        assert_eq!(store.slice_count(RecordKind::Equilibrium), 3);
    }
}
