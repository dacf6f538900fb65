//! Versioned step functions and the simulation handle.
//!
//! A step function is never patched: every configuration change builds a new
//! one with the next version number. The handle pairs the current step
//! function with the current state and is replaced wholesale on every
//! change.

use crate::config::{ConfigFingerprint, SimulationConfig};
use crate::engine::{EngineOutputs, EngineState, SimulationEngine, SimulationState};
use crate::error::ActorResult;

/// A step function tagged with its version and the fingerprint of its configuration.
#[derive(Debug, Clone)]
pub struct VersionedStepFn<S> {
    version: u64,
    fingerprint: ConfigFingerprint,
    inner: S,
}

impl<S> VersionedStepFn<S> {
    /// Builds the successor of `previous` (or version 1) from `config`.
    pub fn build<E>(engine: &E, config: &SimulationConfig, previous: Option<&Self>) -> ActorResult<Self>
    where
        E: SimulationEngine<StepFn = S>,
    {
        let inner = engine.build_step_fn(config)?;
        Ok(Self {
            version: previous.map_or(1, |p| p.version + 1),
            fingerprint: config.fingerprint(),
            inner,
        })
    }

    /// Monotonic version, starting at 1.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Fingerprint of the configuration the step function was built from.
    #[must_use]
    pub const fn fingerprint(&self) -> &ConfigFingerprint {
        &self.fingerprint
    }

    /// The engine step function.
    #[must_use]
    pub const fn get(&self) -> &S {
        &self.inner
    }
}

/// Exclusive owner of the simulation: current step function, state and outputs.
pub struct SimulationHandle<E: SimulationEngine> {
    step_fn: VersionedStepFn<E::StepFn>,
    state: EngineState<E>,
    outputs: EngineOutputs<E>,
}

impl<E: SimulationEngine> SimulationHandle<E> {
    /// Builds a handle holding the initial state of `step_fn`.
    pub fn initial(engine: &E, step_fn: VersionedStepFn<E::StepFn>) -> ActorResult<Self> {
        let (state, outputs) = engine.initial_state(step_fn.get())?;
        Ok(Self {
            step_fn,
            state,
            outputs,
        })
    }

    /// Rebuilds the initial state from the current step function.
    pub fn restarted(self, engine: &E) -> ActorResult<Self> {
        Self::initial(engine, self.step_fn)
    }

    /// Replaces the step function, keeping the current state.
    #[must_use]
    pub fn with_step_fn(self, step_fn: VersionedStepFn<E::StepFn>) -> Self {
        Self {
            step_fn,
            state: self.state,
            outputs: self.outputs,
        }
    }

    /// Replaces state and outputs, keeping the step function.
    #[must_use]
    pub fn with_state(self, state: EngineState<E>, outputs: EngineOutputs<E>) -> Self {
        Self {
            step_fn: self.step_fn,
            state,
            outputs,
        }
    }

    /// Current versioned step function.
    #[must_use]
    pub const fn step_fn(&self) -> &VersionedStepFn<E::StepFn> {
        &self.step_fn
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &EngineState<E> {
        &self.state
    }

    /// Current post-processed outputs.
    #[must_use]
    pub const fn outputs(&self) -> &EngineOutputs<E> {
        &self.outputs
    }

    /// Time of the current state.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.state.time()
    }
}
