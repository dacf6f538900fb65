//! Coupling orchestrator.
//!
//! `CouplingActor` drives one simulation through the coupling runtime's
//! synchronization points:
//!
//! ```text
//! UNSTARTED -> PREPARED -> { INITIALIZING -> STEPPING* -> FINALIZING }* -> DONE
//! ```
//!
//! The braced block runs once per outer reuse iteration, for as long as the
//! runtime says the instance is reused. Within a stepping round the interval
//! gate is read once, before anything changes, and the same answer governs
//! both the intermediate send and the intermediate receive.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::Serialize;
use uuid::Uuid;

use crate::clock::{ClockState, SyncScope};
use crate::config::SimulationConfig;
use crate::coupling::CouplingInstance;
use crate::emit::{emit_record, send_record};
use crate::engine::{SimulationEngine, SimulationState, StepFunction};
use crate::error::{ActorError, ActorResult, UsageError};
use crate::extra_vars::ExtraVarCollection;
use crate::handle::{SimulationHandle, VersionedStepFn};
use crate::ingest::{receive_record, Ingestion, StateIngestor};
use crate::ports::{Operator, PortGateway, PortName};
use crate::record::RecordKind;
use crate::settings::ActorSettings;
use crate::store::RecordStore;

/// Lifecycle phase of the actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorPhase {
    /// Nothing has happened yet.
    Unstarted,
    /// Settings and configuration are loaded.
    Prepared,
    /// Receiving initial inputs and building the initial state.
    Initializing,
    /// Inside the time loop.
    Stepping,
    /// Sending final outputs.
    Finalizing,
    /// The runtime stopped reusing the instance.
    Done,
    /// The session aborted with an error.
    Failed,
}

impl ActorPhase {
    /// Whether `run` may no longer be called.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

/// Summary of a completed session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    /// Session identifier, also used in log lines.
    pub session_id: Uuid,
    /// Outer reuse iterations completed.
    pub iterations: u64,
    /// Simulation steps taken across all iterations.
    pub steps: u64,
    /// Simulation time when the session ended, if it was ever prepared.
    pub final_time: Option<f64>,
    /// Version of the last step function, if one was built.
    pub step_fn_version: Option<u64>,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end.
    pub finished_at: DateTime<Utc>,
}

struct Session<E: SimulationEngine> {
    settings: ActorSettings,
    config: SimulationConfig,
    handle: Option<SimulationHandle<E>>,
    clock: ClockState,
    extras: BTreeMap<RecordKind, ExtraVarCollection>,
    history: Option<RecordStore>,
    first_run: bool,
}

impl<E: SimulationEngine> Session<E> {
    fn handle(&self) -> ActorResult<&SimulationHandle<E>> {
        self.handle
            .as_ref()
            .ok_or_else(|| ActorError::internal("simulation handle missing"))
    }

    fn take_handle(&mut self) -> ActorResult<SimulationHandle<E>> {
        self.handle
            .take()
            .ok_or_else(|| ActorError::internal("simulation handle missing"))
    }

    fn is_done(&self) -> ActorResult<bool> {
        Ok(self.handle()?.step_fn().get().is_done(self.clock.t_cur()))
    }

    fn receive_and_ingest<I: CouplingInstance + ?Sized>(
        &mut self,
        engine: &E,
        instance: &mut I,
        kind: RecordKind,
        operator: Operator,
    ) -> ActorResult<Ingestion> {
        let (message, record) = receive_record(instance, PortName::new(kind, operator))?;
        let handle = self.take_handle()?;
        let mut ingestor = StateIngestor::new(engine, &mut self.config, &mut self.extras, &mut self.clock);
        let (handle, ingestion) = ingestor.ingest_record(handle, &message, &record, operator.scope())?;
        self.handle = Some(handle);
        Ok(ingestion)
    }

    fn emit_and_send<I: CouplingInstance + ?Sized>(
        &self,
        engine: &E,
        instance: &mut I,
        kind: RecordKind,
        operator: Operator,
    ) -> ActorResult<()> {
        let record = emit_record(engine, self.handle()?, &self.extras, kind)?;
        send_record(instance, &record, &self.clock, operator)
    }

    fn snapshot(&mut self, engine: &E) -> ActorResult<()> {
        let Some(store) = self.history.as_mut() else {
            return Ok(());
        };
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| ActorError::internal("simulation handle missing"))?;
        for kind in RecordKind::ALL {
            store.put_slice(&emit_record(engine, handle, &self.extras, kind)?);
        }
        Ok(())
    }
}

/// The simulation-hosting side of a coupled model.
pub struct CouplingActor<E: SimulationEngine, I: CouplingInstance> {
    engine: E,
    instance: I,
    phase: ActorPhase,
    session_id: Uuid,
    session: Option<Session<E>>,
    iterations: u64,
    steps: u64,
}

impl<E: SimulationEngine, I: CouplingInstance> CouplingActor<E, I> {
    /// Creates an actor that runs `engine` through `instance`.
    pub fn new(engine: E, instance: I) -> Self {
        Self {
            engine,
            instance,
            phase: ActorPhase::Unstarted,
            session_id: Uuid::new_v4(),
            session: None,
            iterations: 0,
            steps: 0,
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> ActorPhase {
        self.phase
    }

    /// Session identifier.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The coupling instance.
    #[must_use]
    pub const fn instance(&self) -> &I {
        &self.instance
    }

    /// Clock of the prepared session.
    #[must_use]
    pub fn clock(&self) -> Option<&ClockState> {
        self.session.as_ref().map(|s| &s.clock)
    }

    /// Current simulation configuration, including imported slices.
    #[must_use]
    pub fn config(&self) -> Option<&SimulationConfig> {
        self.session.as_ref().map(|s| &s.config)
    }

    /// Current simulation handle.
    #[must_use]
    pub fn handle(&self) -> Option<&SimulationHandle<E>> {
        self.session.as_ref().and_then(|s| s.handle.as_ref())
    }

    /// Runs the outer reuse loop until the runtime stops reusing the instance.
    ///
    /// # Errors
    ///
    /// Settings, configuration, coupling and simulation failures end the
    /// session; the actor is then terminal. Calling `run` on a terminal actor
    /// returns `UsageError::AlreadyFinished`.
    pub fn run(&mut self) -> ActorResult<SessionReport> {
        if self.phase.is_terminal() {
            return Err(UsageError::AlreadyFinished.into());
        }
        let started_at = Utc::now();
        info!("session {}: started", self.session_id);

        if let Err(err) = self.run_loop() {
            error!("session {}: aborted in {:?}: {err}", self.session_id, self.phase);
            self.phase = ActorPhase::Failed;
            return Err(err);
        }
        self.phase = ActorPhase::Done;

        let report = SessionReport {
            session_id: self.session_id,
            iterations: self.iterations,
            steps: self.steps,
            final_time: self.clock().map(ClockState::t_cur),
            step_fn_version: self.handle().map(|h| h.step_fn().version()),
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "session {}: done after {} iteration(s), {} step(s)",
            self.session_id, report.iterations, report.steps
        );
        Ok(report)
    }

    fn run_loop(&mut self) -> ActorResult<()> {
        while self.instance.reuse_instance() {
            if self.phase == ActorPhase::Unstarted {
                self.run_prep()?;
            }
            info!("session {}: iteration {} begins", self.session_id, self.iterations + 1);
            self.run_f_init()?;
            while !self.session()?.is_done()? {
                self.run_round()?;
            }
            self.run_o_f()?;
            self.iterations += 1;
            info!("session {}: iteration {} finished", self.session_id, self.iterations);
        }
        Ok(())
    }

    fn session(&self) -> ActorResult<&Session<E>> {
        self.session.as_ref().ok_or_else(|| UsageError::NotPrepared.into())
    }

    fn run_prep(&mut self) -> ActorResult<()> {
        let settings = ActorSettings::from_instance(&self.instance)?;
        let config = SimulationConfig::from_path(&settings.config_source)?;
        let step_fn = VersionedStepFn::build(&self.engine, &config, None)?;
        let handle = SimulationHandle::initial(&self.engine, step_fn)?;
        let clock = ClockState::new(
            handle.time(),
            handle.step_fn().get().t_final(),
            settings.equilibrium_interval,
        );
        info!(
            "session {}: prepared from '{}' (config {}, interval {}, full history {})",
            self.session_id,
            settings.config_source,
            handle.step_fn().fingerprint().short(),
            settings.equilibrium_interval,
            settings.output_all_timeslices
        );

        self.session = Some(Session {
            settings,
            config,
            handle: Some(handle),
            clock,
            extras: BTreeMap::new(),
            history: None,
            first_run: true,
        });
        self.phase = ActorPhase::Prepared;
        Ok(())
    }

    fn run_f_init(&mut self) -> ActorResult<()> {
        self.phase = ActorPhase::Initializing;
        let Self {
            engine,
            instance,
            session,
            ..
        } = self;
        let session = session.as_mut().ok_or(UsageError::NotPrepared)?;
        session.history = session
            .settings
            .output_all_timeslices
            .then(RecordStore::in_memory);

        let kinds = PortGateway::new(&*instance).active_kinds(Operator::FInit);
        let mut accepted = false;
        for kind in kinds {
            accepted |= session
                .receive_and_ingest(engine, instance, kind, Operator::FInit)?
                .accepted;
        }

        if accepted || session.first_run {
            let handle = session.take_handle()?.restarted(engine)?;
            session
                .clock
                .restart(handle.time(), handle.step_fn().get().t_final());
            session.handle = Some(handle);
        }
        session.first_run = false;
        session.snapshot(engine)?;

        debug!(
            "initialized at t={} (t_final {}, outer next {:?})",
            session.clock.t_cur(),
            session.clock.t_final(),
            session.clock.next(SyncScope::Outer)
        );
        Ok(())
    }

    fn run_round(&mut self) -> ActorResult<()> {
        self.phase = ActorPhase::Stepping;
        let Self {
            engine,
            instance,
            session,
            steps,
            ..
        } = self;
        let session = session.as_mut().ok_or(UsageError::NotPrepared)?;

        {
            let handle = session
                .handle
                .as_ref()
                .ok_or_else(|| ActorError::internal("simulation handle missing"))?;
            let step_fn = handle.step_fn().get();
            let dt = engine.next_dt(step_fn, handle.state());
            session.clock.advance_next(dt, |t| step_fn.is_done(t));
        }

        let due = session.clock.due_for_gated_exchange();
        debug!(
            "round {} at t={} (inner next {:?}, gated exchange due: {due})",
            *steps + 1,
            session.clock.t_cur(),
            session.clock.next(SyncScope::Inner)
        );
        if due {
            let gateway = PortGateway::new(&*instance);
            let sending = gateway.active_kinds(Operator::OI);
            let receiving = gateway.active_kinds(Operator::S);
            for kind in sending {
                session.emit_and_send(engine, instance, kind, Operator::OI)?;
            }
            for kind in receiving {
                session.receive_and_ingest(engine, instance, kind, Operator::S)?;
            }
            session.clock.mark_gated_exchange();
        }

        let handle = session.take_handle()?;
        let step_fn = handle.step_fn().get();
        let (state, outputs) = step_fn.step(handle.state(), handle.outputs());
        let code = step_fn.check_errors(&state, &outputs);
        if !code.is_ok() {
            let time = state.time();
            session.handle = Some(handle);
            return Err(ActorError::SimulationFailed { code, time });
        }

        let handle = handle.with_state(state, outputs);
        let t = handle.time();
        session.handle = Some(handle);
        session.clock.advance_to(t)?;
        *steps += 1;
        session.snapshot(engine)
    }

    fn run_o_f(&mut self) -> ActorResult<()> {
        self.phase = ActorPhase::Finalizing;
        let Self {
            engine,
            instance,
            session,
            session_id,
            ..
        } = self;
        let session = session.as_mut().ok_or(UsageError::NotPrepared)?;

        let kinds = PortGateway::new(&*instance).active_kinds(Operator::OF);
        let history = session.history.take();
        for kind in kinds {
            let record = match history.as_ref().and_then(|store| store.get(kind)) {
                Some(record) => record,
                None => emit_record(engine, session.handle()?, &session.extras, kind)?,
            };
            send_record(instance, &record, &session.clock, Operator::OF)?;
        }
        info!(
            "session {session_id}: finalized at t={} ({} history)",
            session.clock.t_cur(),
            if history.is_some() { "full" } else { "no" }
        );
        Ok(())
    }
}
