//! Simulation engine interface.
//!
//! The actor does not know the numerics of the simulation. It builds a step
//! function from a configuration, asks it for an initial state, advances the
//! state one step at a time and converts states into records. A step function
//! is a pure function of its configuration: when the configuration changes a
//! new one is built, the old one is never patched.

pub mod relaxation;

pub use relaxation::{RelaxationEngine, RelaxationStepFn};

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SimulationConfig;
use crate::error::ActorResult;
use crate::record::{PhysicsRecord, RecordKind};

/// Status reported by a step function after a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimError {
    /// The step succeeded.
    NoError,
    /// A state quantity became NaN or infinite.
    NonFinite,
    /// The timestep collapsed below the admissible minimum.
    DtTooSmall,
    /// Engine-specific failure.
    Other {
        /// Engine error code.
        code: i32,
        /// Human readable description.
        message: String,
    },
}

impl SimError {
    /// Whether this is the `NoError` sentinel.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::NoError)
    }
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoError => f.write_str("no error"),
            Self::NonFinite => f.write_str("non-finite value in simulation state"),
            Self::DtTooSmall => f.write_str("timestep below minimum"),
            Self::Other { code, message } => write!(f, "engine error {code}: {message}"),
        }
    }
}

/// Mutable simulation state produced by a step function.
pub trait SimulationState: Clone {
    /// Simulation time of this state.
    fn time(&self) -> f64;
}

/// An engine step function built from one configuration.
pub trait StepFunction {
    /// Simulation state.
    type State: SimulationState;
    /// Post-processed outputs that accompany a state.
    type Outputs: Clone;
    /// Runtime parameters at a given time.
    type Params;
    /// Geometry at a given time.
    type Geometry;

    /// Advances `state` by one step.
    fn step(&self, state: &Self::State, outputs: &Self::Outputs) -> (Self::State, Self::Outputs);

    /// Inspects a freshly stepped state for numerical failure.
    fn check_errors(&self, state: &Self::State, outputs: &Self::Outputs) -> SimError;

    /// Runtime parameters and geometry consistent with time `t`.
    fn params_and_geometry(&self, t: f64) -> (Self::Params, Self::Geometry);

    /// Admissible timestep from `t` given the consistent parameters and geometry.
    fn next_dt(&self, t: f64, params: &Self::Params, geometry: &Self::Geometry, state: &Self::State) -> f64;

    /// Whether the simulation has reached its end at `t`.
    fn is_done(&self, t: f64) -> bool;

    /// Final simulation time.
    fn t_final(&self) -> f64;
}

/// State type of an engine.
pub type EngineState<E> = <<E as SimulationEngine>::StepFn as StepFunction>::State;
/// Outputs type of an engine.
pub type EngineOutputs<E> = <<E as SimulationEngine>::StepFn as StepFunction>::Outputs;

/// A simulation engine.
pub trait SimulationEngine {
    /// Step function built by this engine.
    type StepFn: StepFunction;

    /// Builds a step function reflecting `config`.
    fn build_step_fn(&self, config: &SimulationConfig) -> ActorResult<Self::StepFn>;

    /// Initial state and outputs for a step function.
    fn initial_state(&self, step_fn: &Self::StepFn) -> ActorResult<(EngineState<Self>, EngineOutputs<Self>)>;

    /// Converts a state into a single-slice record of `kind`.
    fn to_record(
        &self,
        kind: RecordKind,
        step_fn: &Self::StepFn,
        state: &EngineState<Self>,
        outputs: &EngineOutputs<Self>,
    ) -> ActorResult<PhysicsRecord>;

    /// Next admissible time after `state`, computed from parameters consistent with its time.
    fn next_dt(&self, step_fn: &Self::StepFn, state: &EngineState<Self>) -> f64 {
        let t = state.time();
        let (params, geometry) = step_fn.params_and_geometry(t);
        step_fn.next_dt(t, &params, &geometry, state)
    }
}
