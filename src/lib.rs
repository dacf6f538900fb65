//! # torax-muscle3 - A coupling actor for a stepped simulation
//!
//! Hosts a time-stepped simulation inside a multiscale coupling runtime. At
//! each synchronization point the actor receives physics records from its
//! peers, folds them into the simulation configuration, advances the
//! simulation and sends records derived from its state back out.
//!
//! ## Core Concepts
//!
//! - **Operator**: one of the four synchronization points of a coupling round
//!   (`F_INIT`, `O_I`, `S`, `O_F`)
//! - **PhysicsRecord**: a timestamped record of one kind (`equilibrium`, `core_profiles`)
//! - **Step function**: built from a configuration, rebuilt whenever it changes
//! - **Interval gating**: intermediate exchanges happen at most once per `equilibrium_interval`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use torax_muscle3::{CouplingActor, RelaxationEngine, Topology};
//! use torax_muscle3::ports::declared_ports;
//!
//! let mut instances = Topology::new()
//!     .component("torax", declared_ports())
//!     .setting("config_source", "sim.json")
//!     .build()?;
//! let instance = instances.remove("torax").unwrap();
//!
//! let mut actor = CouplingActor::new(RelaxationEngine::default(), instance);
//! let report = actor.run()?;
//! println!("{} steps, t = {:?}", report.steps, report.final_time);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Data and configuration
pub mod config;
pub mod error;
pub mod extra_vars;
pub mod record;
pub mod settings;
pub mod store;

// Coupling
pub mod clock;
pub mod coupling;
pub mod ports;

// Simulation
pub mod engine;
pub mod handle;

// Orchestration
pub mod actor;
pub mod emit;
pub mod ingest;

// Re-export primary types at crate root for convenience
pub use actor::{ActorPhase, CouplingActor, SessionReport};
pub use clock::{CadenceGate, ClockState, NextTimestamps, SyncScope};
pub use config::{ConfigFingerprint, SimulationConfig, TimeTable};
pub use coupling::{CouplingInstance, LoopbackInstance, Message, SettingValue, Topology};
pub use engine::{RelaxationEngine, SimError, SimulationEngine, SimulationState, StepFunction};
pub use error::{
    ActorError, ActorResult, ConfigError, CouplingError, SettingsError, UsageError,
};
pub use extra_vars::{ExtraValue, ExtraVarCollection};
pub use handle::{SimulationHandle, VersionedStepFn};
pub use ports::{Operator, PortGateway, PortName};
pub use record::{PhysicsRecord, RecordKind, RecordSlice};
pub use settings::ActorSettings;
pub use store::{Interpolation, RecordStore};
