//! State emission.
//!
//! Emission never touches the simulation: it reads the handle, merges the
//! side-channel fields recorded at the current time and stamps the result
//! with the clock's time and the hint of the operator's scope.

use std::collections::BTreeMap;

use log::debug;

use crate::clock::ClockState;
use crate::coupling::{CouplingInstance, Message};
use crate::engine::SimulationEngine;
use crate::error::ActorResult;
use crate::extra_vars::ExtraVarCollection;
use crate::handle::SimulationHandle;
use crate::ports::{Operator, PortName};
use crate::record::{PhysicsRecord, RecordKind};

/// Derives a record of `kind` from the current state, side-channel fields merged.
pub fn emit_record<E: SimulationEngine>(
    engine: &E,
    handle: &SimulationHandle<E>,
    extras: &BTreeMap<RecordKind, ExtraVarCollection>,
    kind: RecordKind,
) -> ActorResult<PhysicsRecord> {
    let mut record = engine.to_record(kind, handle.step_fn().get(), handle.state(), handle.outputs())?;
    if let Some(fields) = extras.get(&kind) {
        fields.merge_into(&mut record);
    }
    Ok(record)
}

/// Wraps a record into a message stamped for `operator`.
pub fn stamp(record: &PhysicsRecord, clock: &ClockState, operator: Operator) -> ActorResult<Message> {
    Ok(Message::new(
        clock.t_cur(),
        clock.next(operator.scope()),
        record.encode()?,
    ))
}

/// Sends `record` on the port of its kind for `operator`.
pub fn send_record<I: CouplingInstance + ?Sized>(
    instance: &mut I,
    record: &PhysicsRecord,
    clock: &ClockState,
    operator: Operator,
) -> ActorResult<()> {
    let port = PortName::new(record.kind, operator).to_string();
    let message = stamp(record, clock, operator)?;
    debug!(
        "sending '{port}' at t={} (next {:?}, {} slice(s))",
        message.timestamp,
        message.next_timestamp,
        record.slices.len()
    );
    instance.send(&port, message)?;
    Ok(())
}
