//! State ingestion: turning received records into simulation configuration.
//!
//! A valid record is resampled (closest time) into one configuration slice
//! per timestamp it carries. Auxiliary fields listed by `extra_fields` are
//! moved out of the slices into the side channel. The step function is then
//! rebuilt, since its configuration changed. A record flagged as carrying no
//! valid data is rejected before anything else is looked at.

use std::collections::BTreeMap;

use log::{debug, warn};

use crate::clock::{ClockState, SyncScope};
use crate::config::SimulationConfig;
use crate::coupling::{CouplingInstance, Message};
use crate::engine::SimulationEngine;
use crate::error::{ActorResult, CouplingError};
use crate::extra_vars::{ExtraValue, ExtraVarCollection};
use crate::handle::{SimulationHandle, VersionedStepFn};
use crate::ports::PortName;
use crate::record::{PhysicsRecord, RecordKind, RecordSlice};
use crate::store::{Interpolation, RecordStore};

/// Tolerance used when comparing a received timestamp with the clock.
const TIME_MATCH_TOLERANCE: f64 = 1e-9;

/// Fields of a record kind that travel in the side channel instead of the configuration.
#[must_use]
pub const fn extra_fields(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Equilibrium => &["r_boundary_outline", "z_boundary_outline"],
        RecordKind::CoreProfiles => &[],
    }
}

/// Outcome of one ingestion attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ingestion {
    /// Record kind that was received.
    pub kind: RecordKind,
    /// Whether the record was applied to the configuration.
    pub accepted: bool,
    /// Timestamp of the received message.
    pub t_received: f64,
    /// Next-timestamp hint carried by the message.
    pub t_next: Option<f64>,
}

/// Receives and decodes the record on `port`.
///
/// # Errors
///
/// `PortNotConnected` if the topology did not connect the port; decoding
/// errors if the payload is not a record of the port's kind.
pub fn receive_record<I: CouplingInstance + ?Sized>(
    instance: &mut I,
    port: PortName,
) -> ActorResult<(Message, PhysicsRecord)> {
    let name = port.to_string();
    if !instance.is_connected(&name) {
        return Err(CouplingError::PortNotConnected { port: name }.into());
    }
    let message = instance.receive(&name)?;
    let record = PhysicsRecord::decode(port.kind, &message.data)?;
    if record.kind != port.kind {
        return Err(CouplingError::KindMismatch {
            port: name,
            expected: port.kind.to_string(),
            actual: record.kind.to_string(),
        }
        .into());
    }
    debug!(
        "received '{name}' at t={} (next {:?}, {} slice(s))",
        message.timestamp,
        message.next_timestamp,
        record.slices.len()
    );
    Ok((message, record))
}

fn strip_extras(kind: RecordKind, slice: &mut RecordSlice, extras: &mut ExtraVarCollection) {
    for &field in extra_fields(kind) {
        if let Some(values) = slice.profiles.remove(field) {
            extras.add(field, slice.time, ExtraValue::Array(values));
        } else if let Some(value) = slice.scalars.remove(field) {
            extras.add(field, slice.time, ExtraValue::Scalar(value));
        }
    }
}

/// Applies a record to the configuration section of its kind.
///
/// Returns false, changing nothing, if the record carries no valid data or
/// no time slices.
pub fn apply_record(
    config: &mut SimulationConfig,
    extras: &mut ExtraVarCollection,
    record: &PhysicsRecord,
) -> bool {
    if !record.is_valid() || record.time.is_empty() {
        return false;
    }

    let mut store = RecordStore::in_memory();
    store.put(record);

    let mut slices = Vec::with_capacity(record.time.len());
    for &t in &record.time {
        let Some(resampled) = store.get_slice(record.kind, t, Interpolation::Closest) else {
            continue;
        };
        for slice in resampled.slices {
            let mut slice = slice.retimed(t);
            strip_extras(record.kind, &mut slice, extras);
            slices.push(slice);
        }
    }
    extras.pad();

    match record.kind {
        RecordKind::Equilibrium => config.import_geometry(slices),
        RecordKind::CoreProfiles => config.import_profile_conditions(slices),
    }
    true
}

/// Everything an ingestion reads or rewrites.
pub struct StateIngestor<'a, E: SimulationEngine> {
    engine: &'a E,
    config: &'a mut SimulationConfig,
    extras: &'a mut BTreeMap<RecordKind, ExtraVarCollection>,
    clock: &'a mut ClockState,
}

impl<'a, E: SimulationEngine> StateIngestor<'a, E> {
    /// Bundles the pieces an ingestion touches.
    pub fn new(
        engine: &'a E,
        config: &'a mut SimulationConfig,
        extras: &'a mut BTreeMap<RecordKind, ExtraVarCollection>,
        clock: &'a mut ClockState,
    ) -> Self {
        Self {
            engine,
            config,
            extras,
            clock,
        }
    }

    /// Ingests a received record and returns the (possibly replaced) handle.
    ///
    /// On acceptance the configuration section of the record's kind is
    /// replaced, the step function is rebuilt and the next-timestamp hint of
    /// `scope` is taken from the message. On rejection nothing changes.
    pub fn ingest_record(
        &mut self,
        handle: SimulationHandle<E>,
        message: &Message,
        record: &PhysicsRecord,
        scope: SyncScope,
    ) -> ActorResult<(SimulationHandle<E>, Ingestion)> {
        let mut ingestion = Ingestion {
            kind: record.kind,
            accepted: false,
            t_received: message.timestamp,
            t_next: message.next_timestamp,
        };

        let extras = self.extras.entry(record.kind).or_default();
        if !apply_record(self.config, extras, record) {
            warn!(
                "skipping '{}' record at t={}: no valid data",
                record.kind, message.timestamp
            );
            return Ok((handle, ingestion));
        }

        if (message.timestamp - self.clock.t_cur()).abs() > TIME_MATCH_TOLERANCE {
            warn!(
                "'{}' record stamped t={} while the clock is at t={}",
                record.kind,
                message.timestamp,
                self.clock.t_cur()
            );
        }

        let step_fn = VersionedStepFn::build(self.engine, self.config, Some(handle.step_fn()))?;
        debug!(
            "rebuilt step function v{} after '{}' ingestion (config {})",
            step_fn.version(),
            record.kind,
            step_fn.fingerprint().short()
        );
        self.clock.set_next(scope, message.next_timestamp);
        ingestion.accepted = true;
        Ok((handle.with_step_fn(step_fn), ingestion))
    }
}
